//! OpenAPI-derived provider client
//!
//! `SchemaClient` indexes the operations of one provider's OpenAPI document
//! and issues `GET`/`POST` requests against them. It does not retry; retry
//! policy belongs to the caller.

use serde::Serialize;
use serde_json::{Map, Value};

use super::filter::{EndpointFilter, MatchMode};
use crate::error::{RequestFailure, ResolverError, Result};

const HTTP_METHODS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Where a declared parameter travels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
    Cookie,
}

impl ParameterLocation {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "query" => Some(Self::Query),
            "path" => Some(Self::Path),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Option<Value>,
}

/// One callable operation of a provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub path: String,
    /// Lowercase, as keyed in the OpenAPI document
    pub method: String,
    pub tags: Vec<String>,
    pub request_body_schema: Option<Value>,
    pub parameters: Vec<ParameterDescriptor>,
}

impl Endpoint {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Split `/metadata/{GTIN}` into (`/metadata/`, `GTIN`)
    pub fn trailing_parameter(&self) -> Option<(&str, &str)> {
        let stripped = self.path.strip_suffix('}')?;
        let open = stripped.rfind('{')?;
        let name = &stripped[open + 1..];
        let prefix = &self.path[..open];
        if name.is_empty() || name.contains('/') || !prefix.ends_with('/') {
            return None;
        }
        Some((prefix, name))
    }

    pub fn query_parameters(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.parameters
            .iter()
            .filter(|p| p.location == ParameterLocation::Query)
    }
}

/// Response of an invoked endpoint
#[derive(Debug, Clone)]
pub struct InvokeResponse {
    pub url: String,
    pub status: u16,
    /// Parsed JSON, or the raw text as a JSON string when the body is not JSON
    pub body: Value,
}

pub struct SchemaClient {
    description: Value,
    openapi_version: Option<String>,
    endpoints: Vec<Endpoint>,
    http: reqwest::Client,
}

impl SchemaClient {
    /// Index an OpenAPI description with a fresh HTTP client
    pub fn build(description: Value) -> Result<Self> {
        Self::with_http(description, reqwest::Client::new())
    }

    /// Index an OpenAPI description, issuing requests through `http`
    pub fn with_http(description: Value, http: reqwest::Client) -> Result<Self> {
        let endpoints = parse_endpoints(&description)?;
        let openapi_version = description
            .get("openapi")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Self {
            description,
            openapi_version,
            endpoints,
            http,
        })
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn openapi_version(&self) -> Option<&str> {
        self.openapi_version.as_deref()
    }

    pub fn description(&self) -> &Value {
        &self.description
    }

    /// Resolve an internal `#/...` reference against this document
    pub fn resolve_ref(&self, reference: &str) -> Result<&Value> {
        resolve_ref(&self.description, reference)
    }

    pub fn filter_endpoints(&self, criteria: &EndpointFilter, mode: MatchMode) -> Vec<&Endpoint> {
        self.endpoints
            .iter()
            .filter(|e| criteria.matches(e, mode))
            .collect()
    }

    /// Call an endpoint. Path template parameters are filled from `args`;
    /// the remaining args become query parameters (`GET`) or the JSON body
    /// (`POST`).
    pub async fn invoke(
        &self,
        root_address: &str,
        endpoint: &Endpoint,
        args: &Map<String, Value>,
    ) -> Result<InvokeResponse> {
        let method = endpoint.method.to_ascii_lowercase();
        if method != "get" && method != "post" {
            return Err(ResolverError::UnsupportedMethod(endpoint.method.clone()));
        }

        let (path, remaining) = fill_path(&endpoint.path, args)?;
        let url = format!("{}{}", root_address.trim_end_matches('/'), path);

        let request = if method == "get" {
            let query: Vec<(String, String)> = remaining
                .iter()
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect();
            self.http.get(&url).query(&query)
        } else {
            self.http.post(&url).json(&Value::Object(remaining))
        };

        tracing::debug!(method = %method, url = %url, "Invoking provider endpoint");
        let response = request
            .send()
            .await
            .map_err(|e| ResolverError::request(&url, RequestFailure::from_reqwest(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::request(
                &url,
                RequestFailure::Status(status.as_u16()),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ResolverError::request(&url, RequestFailure::from_reqwest(&e)))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(InvokeResponse {
            url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Resolve an internal `#/...` reference against `document`
pub fn resolve_ref<'a>(document: &'a Value, reference: &str) -> Result<&'a Value> {
    let pointer = reference
        .strip_prefix('#')
        .filter(|p| p.starts_with('/'))
        .ok_or_else(|| ResolverError::Schema(format!("unsupported reference: {}", reference)))?;
    document
        .pointer(pointer)
        .ok_or_else(|| ResolverError::Schema(format!("invalid reference: {}", reference)))
}

/// Follow one level of `$ref` indirection
fn deref_once<'a>(document: &'a Value, value: &'a Value) -> Result<&'a Value> {
    match value.get("$ref").and_then(Value::as_str) {
        Some(reference) => resolve_ref(document, reference),
        None => Ok(value),
    }
}

fn parse_endpoints(document: &Value) -> Result<Vec<Endpoint>> {
    let paths = match document.get("paths") {
        None => return Ok(Vec::new()),
        Some(Value::Object(paths)) => paths,
        Some(_) => return Err(ResolverError::Schema("'paths' is not an object".to_string())),
    };

    let mut endpoints = Vec::new();
    for (path, item) in paths {
        let Value::Object(item) = item else {
            return Err(ResolverError::Schema(format!("path item '{}' is not an object", path)));
        };
        let shared = parse_parameters(document, item.get("parameters"))?;

        for (method, operation) in item {
            if !HTTP_METHODS.contains(&method.as_str()) {
                continue;
            }

            let tags = operation
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            let own = parse_parameters(document, operation.get("parameters"))?;
            let mut parameters: Vec<ParameterDescriptor> = shared
                .iter()
                .filter(|s| !own.iter().any(|o| o.name == s.name && o.location == s.location))
                .cloned()
                .collect();
            parameters.extend(own);

            endpoints.push(Endpoint {
                path: path.clone(),
                method: method.clone(),
                tags,
                request_body_schema: request_body_schema(document, operation)?,
                parameters,
            });
        }
    }
    Ok(endpoints)
}

fn parse_parameters(document: &Value, parameters: Option<&Value>) -> Result<Vec<ParameterDescriptor>> {
    let Some(parameters) = parameters.and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    parameters
        .iter()
        .map(|raw| {
            let param = deref_once(document, raw)?;
            let name = param
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ResolverError::Schema("parameter without a name".to_string()))?;
            let location = param
                .get("in")
                .and_then(Value::as_str)
                .and_then(ParameterLocation::parse)
                .ok_or_else(|| {
                    ResolverError::Schema(format!("parameter '{}' has no valid location", name))
                })?;
            let required = param
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(location == ParameterLocation::Path);
            Ok(ParameterDescriptor {
                name: name.to_string(),
                location,
                required,
                schema: param.get("schema").cloned(),
            })
        })
        .collect()
}

fn request_body_schema(document: &Value, operation: &Value) -> Result<Option<Value>> {
    let Some(body) = operation.get("requestBody") else {
        return Ok(None);
    };
    let body = deref_once(document, body)?;
    let Some(schema) = body.pointer("/content/application~1json/schema") else {
        return Ok(None);
    };
    Ok(Some(deref_once(document, schema)?.clone()))
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute `{name}` templates; returns the filled path and the unused args
fn fill_path(template: &str, args: &Map<String, Value>) -> Result<(String, Map<String, Value>)> {
    let mut remaining = args.clone();
    let mut path = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| open + c) else {
            break;
        };
        let name = &rest[open + 1..close];
        let value = remaining.remove(name).ok_or_else(|| {
            ResolverError::Schema(format!(
                "missing value for path parameter '{}' of {}",
                name, template
            ))
        })?;
        path.push_str(&rest[..open]);
        path.push_str(&value_to_string(&value));
        rest = &rest[close + 1..];
    }
    path.push_str(rest);
    Ok((path, remaining))
}
