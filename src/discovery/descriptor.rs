//! Service descriptors as published by the registry

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{ResolverError, Result};

/// One registered data provider. Field names on the wire follow the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub service_name: String,
    #[serde(deserialize_with = "numeric_id")]
    pub id: i64,
    pub root_address: String,
    #[serde(rename = "apiDocumentationAdress")]
    pub api_documentation_address: String,
    pub service_type: String,
    pub service_tags: Vec<String>,
    pub service_owner: String,
    pub maintainer_contact: String,
    #[serde(rename = "maintainanceStatus")]
    pub maintenance_status: String,
    pub source_code: String,
    pub version: String,
    pub last_updated: String,
}

impl ServiceDescriptor {
    /// Build a descriptor from one registry record, injecting the map key as
    /// `serviceName`.
    pub fn from_record(service_name: &str, record: Value) -> Result<Self> {
        let Value::Object(mut fields) = record else {
            return Err(ResolverError::Validation {
                record: service_name.to_string(),
                reason: "record is not a JSON object".to_string(),
            });
        };
        fields.insert(
            "serviceName".to_string(),
            Value::String(service_name.to_string()),
        );

        let descriptor: ServiceDescriptor =
            serde_json::from_value(Value::Object(fields)).map_err(|e| {
                ResolverError::Validation {
                    record: service_name.to_string(),
                    reason: e.to_string(),
                }
            })?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("rootAddress", &self.root_address),
            ("apiDocumentationAdress", &self.api_documentation_address),
        ] {
            Url::parse(value).map_err(|e| ResolverError::Validation {
                record: self.service_name.clone(),
                reason: format!("{} '{}' is not an absolute URL: {}", field, value, e),
            })?;
        }
        Ok(())
    }

    /// Directory name used for the persisted snapshot
    pub fn directory_name(&self) -> String {
        self.service_name.replace(' ', "_")
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.service_tags.iter().any(|t| t == tag)
    }
}

/// Registries publish ids as integers or as numeric strings
fn numeric_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(n),
        RawId::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("id '{}' is not numeric", s))),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::record;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_with_numeric_string_id() {
        let d = ServiceDescriptor::from_record(
            "Digital Object Memory Resolver",
            record(json!("7"), "http://resolver.local", &["test"]),
        )
        .unwrap();
        assert_eq!(d.id, 7);
        assert_eq!(d.service_name, "Digital Object Memory Resolver");
        assert_eq!(d.directory_name(), "Digital_Object_Memory_Resolver");
        assert!(d.has_tag("test"));
    }

    #[test]
    fn test_non_numeric_id_is_validation_error() {
        let err = ServiceDescriptor::from_record(
            "broken",
            record(json!("seven"), "http://resolver.local", &[]),
        )
        .unwrap_err();
        assert!(matches!(err, ResolverError::Validation { ref record, .. } if record == "broken"));
    }

    #[test]
    fn test_missing_field_is_validation_error() {
        let mut value = record(json!(1), "http://resolver.local", &[]);
        value.as_object_mut().unwrap().remove("serviceType");
        assert!(ServiceDescriptor::from_record("partial", value).is_err());
    }

    #[test]
    fn test_relative_root_address_is_rejected() {
        let err = ServiceDescriptor::from_record("relative", record(json!(1), "/api", &[]))
            .unwrap_err();
        assert!(err.to_string().contains("rootAddress"));
    }

    #[test]
    fn test_serializes_with_registry_field_names() {
        let d = super::fixtures::descriptor("svc", 3, &["metadata-provider"]);
        let value = serde_json::to_value(&d).unwrap();
        assert_eq!(value["serviceName"], "svc");
        assert_eq!(value["apiDocumentationAdress"], "http://provider.local/openapi.json");
        assert_eq!(value["maintainanceStatus"], "active");
        let back: ServiceDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(back, d);
    }
}
