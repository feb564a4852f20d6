//! Filter criteria for services and endpoints
//!
//! Each criterion is either one value or a list of candidates. Criteria on
//! different fields are ANDed, candidates within one list are ORed, absent
//! fields are unconstrained.
//!
//! Scalar string fields compare by substring containment in
//! [`MatchMode::Substring`] and by equality in [`MatchMode::Exact`]. Set
//! fields (tags) always compare by membership.

use serde::Deserialize;

use super::descriptor::ServiceDescriptor;
use super::schema_client::Endpoint;

/// How scalar string criteria compare against a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Criterion is contained in the field value
    #[default]
    Substring,
    /// Criterion equals the field value
    Exact,
}

/// A single value or a set of candidate values
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Criterion<T> {
    One(T),
    Any(Vec<T>),
}

impl<T> Criterion<T> {
    fn candidates(&self) -> &[T] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Any(values) => values,
        }
    }
}

impl<T> From<T> for Criterion<T> {
    fn from(value: T) -> Self {
        Self::One(value)
    }
}

impl From<&str> for Criterion<String> {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<&[&str]> for Criterion<String> {
    fn from(values: &[&str]) -> Self {
        Self::Any(values.iter().map(|v| v.to_string()).collect())
    }
}

fn scalar(criterion: &Option<Criterion<String>>, field: &str, mode: MatchMode) -> bool {
    let Some(criterion) = criterion else {
        return true;
    };
    criterion.candidates().iter().any(|c| match mode {
        MatchMode::Substring => field.contains(c.as_str()),
        MatchMode::Exact => field == c,
    })
}

fn membership(criterion: &Option<Criterion<String>>, field: &[String]) -> bool {
    let Some(criterion) = criterion else {
        return true;
    };
    criterion
        .candidates()
        .iter()
        .any(|c| field.iter().any(|f| f == c))
}

fn equality<T: PartialEq>(criterion: &Option<Criterion<T>>, field: &T) -> bool {
    let Some(criterion) = criterion else {
        return true;
    };
    criterion.candidates().iter().any(|c| c == field)
}

/// Criteria over [`ServiceDescriptor`] fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceFilter {
    pub service_name: Option<Criterion<String>>,
    pub id: Option<Criterion<i64>>,
    pub root_address: Option<Criterion<String>>,
    #[serde(rename = "apiDocumentationAdress")]
    pub api_documentation_address: Option<Criterion<String>>,
    pub service_type: Option<Criterion<String>>,
    pub service_tags: Option<Criterion<String>>,
    pub service_owner: Option<Criterion<String>>,
    pub maintainer_contact: Option<Criterion<String>>,
    #[serde(rename = "maintainanceStatus")]
    pub maintenance_status: Option<Criterion<String>>,
    pub source_code: Option<Criterion<String>>,
    pub version: Option<Criterion<String>>,
    pub last_updated: Option<Criterion<String>>,
}

impl ServiceFilter {
    pub fn by_tag(tag: impl Into<Criterion<String>>) -> Self {
        Self {
            service_tags: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, d: &ServiceDescriptor, mode: MatchMode) -> bool {
        scalar(&self.service_name, &d.service_name, mode)
            && equality(&self.id, &d.id)
            && scalar(&self.root_address, &d.root_address, mode)
            && scalar(&self.api_documentation_address, &d.api_documentation_address, mode)
            && scalar(&self.service_type, &d.service_type, mode)
            && membership(&self.service_tags, &d.service_tags)
            && scalar(&self.service_owner, &d.service_owner, mode)
            && scalar(&self.maintainer_contact, &d.maintainer_contact, mode)
            && scalar(&self.maintenance_status, &d.maintenance_status, mode)
            && scalar(&self.source_code, &d.source_code, mode)
            && scalar(&self.version, &d.version, mode)
            && scalar(&self.last_updated, &d.last_updated, mode)
    }

    pub fn apply(&self, services: &[ServiceDescriptor], mode: MatchMode) -> Vec<ServiceDescriptor> {
        services
            .iter()
            .filter(|d| self.matches(d, mode))
            .cloned()
            .collect()
    }
}

/// Criteria over [`Endpoint`] fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EndpointFilter {
    pub path: Option<Criterion<String>>,
    pub method: Option<Criterion<String>>,
    pub tags: Option<Criterion<String>>,
}

impl EndpointFilter {
    pub fn by_tag(tag: impl Into<Criterion<String>>) -> Self {
        Self {
            tags: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = Some(Criterion::One(method.to_ascii_lowercase()));
        self
    }

    pub fn matches(&self, e: &Endpoint, mode: MatchMode) -> bool {
        scalar(&self.path, &e.path, mode)
            && scalar(&self.method, &e.method, mode)
            && membership(&self.tags, &e.tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::descriptor::fixtures::descriptor;

    fn services() -> Vec<ServiceDescriptor> {
        let mut resolver = descriptor("Digital Object Memory Resolver", 1, &["test", "resolver"]);
        resolver.service_type = "resolver".to_string();
        vec![
            resolver,
            descriptor("Product Model Metadata Catalogue", 2, &["metadata-provider"]),
            descriptor("Event Interpretation Service", 3, &["events"]),
        ]
    }

    fn names(services: &[ServiceDescriptor]) -> Vec<&str> {
        services.iter().map(|s| s.service_name.as_str()).collect()
    }

    #[test]
    fn test_filter_by_single_tag() {
        let filtered = ServiceFilter::by_tag("metadata-provider").apply(&services(), MatchMode::Substring);
        assert_eq!(names(&filtered), vec!["Product Model Metadata Catalogue"]);
    }

    #[test]
    fn test_list_criterion_is_or() {
        let tags: &[&str] = &["events", "test"];
        let filtered = ServiceFilter::by_tag(tags).apply(&services(), MatchMode::Substring);
        assert_eq!(
            names(&filtered),
            vec!["Digital Object Memory Resolver", "Event Interpretation Service"]
        );
    }

    #[test]
    fn test_fields_are_anded() {
        let filter = ServiceFilter {
            service_type: Some("data provider".into()),
            id: Some(Criterion::Any(vec![1, 3])),
            ..ServiceFilter::default()
        };
        let filtered = filter.apply(&services(), MatchMode::Substring);
        assert_eq!(names(&filtered), vec!["Event Interpretation Service"]);
    }

    #[test]
    fn test_empty_filter_returns_input() {
        let all = services();
        assert_eq!(ServiceFilter::default().apply(&all, MatchMode::Exact), all);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filter = ServiceFilter {
            service_name: Some("Service".into()),
            ..ServiceFilter::default()
        };
        let once = filter.apply(&services(), MatchMode::Substring);
        let twice = filter.apply(&once, MatchMode::Substring);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_substring_versus_exact_mode() {
        let filter = ServiceFilter {
            service_name: Some("Metadata".into()),
            ..ServiceFilter::default()
        };
        assert_eq!(filter.apply(&services(), MatchMode::Substring).len(), 1);
        assert!(filter.apply(&services(), MatchMode::Exact).is_empty());

        let exact = ServiceFilter {
            service_name: Some("Product Model Metadata Catalogue".into()),
            ..ServiceFilter::default()
        };
        assert_eq!(exact.apply(&services(), MatchMode::Exact).len(), 1);
    }

    #[test]
    fn test_tags_never_match_by_substring() {
        let filtered = ServiceFilter::by_tag("metadata").apply(&services(), MatchMode::Substring);
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_deserialize_criteria() {
        let filter: ServiceFilter =
            serde_json::from_str(r#"{"serviceTags": ["a", "b"], "id": 4, "maintainanceStatus": "active"}"#)
                .unwrap();
        assert_eq!(filter.service_tags, Some(Criterion::Any(vec!["a".into(), "b".into()])));
        assert_eq!(filter.id, Some(Criterion::One(4)));
        assert_eq!(filter.maintenance_status, Some(Criterion::One("active".into())));
    }

    #[test]
    fn test_endpoint_filter() {
        let get = Endpoint {
            path: "/example".to_string(),
            method: "get".to_string(),
            tags: vec!["example-tag".to_string()],
            request_body_schema: None,
            parameters: vec![],
        };
        let post = Endpoint {
            path: "/test".to_string(),
            method: "post".to_string(),
            tags: vec!["test-tag".to_string()],
            request_body_schema: None,
            parameters: vec![],
        };
        let filter = EndpointFilter::by_tag("example-tag");
        assert!(filter.matches(&get, MatchMode::Substring));
        assert!(!filter.matches(&post, MatchMode::Substring));

        let by_method = EndpointFilter::default().with_method("POST");
        assert!(by_method.matches(&post, MatchMode::Exact));
        assert!(!by_method.matches(&get, MatchMode::Exact));
    }
}
