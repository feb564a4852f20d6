//! Registry client
//!
//! Fetches the list of registered providers, validates each record and keeps
//! the on-disk snapshot in step with the registry.

use serde_json::Value;
use std::time::Duration;

use super::descriptor::ServiceDescriptor;
use super::filter::{MatchMode, ServiceFilter};
use super::snapshot::SnapshotStore;
use crate::config::RegistryConfig;
use crate::error::{RequestFailure, ResolverError, Result};

pub struct ServiceCatalogue {
    endpoint: String,
    http: reqwest::Client,
    snapshot: SnapshotStore,
}

impl ServiceCatalogue {
    pub fn new(endpoint: impl Into<String>, http: reqwest::Client, snapshot: SnapshotStore) -> Self {
        Self {
            endpoint: endpoint.into(),
            http,
            snapshot,
        }
    }

    /// Build from configuration with a shared client carrying the request timeout
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let http = http_client(config.request_timeout())?;
        Ok(Self::new(
            config.endpoint.clone(),
            http,
            SnapshotStore::new(config.snapshot_dir.clone()),
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn snapshot(&self) -> &SnapshotStore {
        &self.snapshot
    }

    /// Fetch and validate the registered services, then persist them
    pub async fn refresh(&self) -> Result<Vec<ServiceDescriptor>> {
        let payload = get_json(&self.http, &self.endpoint).await?;
        if !payload.is_object() {
            return Err(ResolverError::discovery(
                &self.endpoint,
                "registry payload is not a JSON object",
            ));
        }

        let (services, rejected) = Self::parse_registry(&payload);
        for error in &rejected {
            tracing::warn!(error = %error, "Skipping registry record");
        }
        tracing::info!(
            endpoint = %self.endpoint,
            services = services.len(),
            rejected = rejected.len(),
            "Fetched service registry"
        );

        self.snapshot.persist(&services).await?;
        Ok(services)
    }

    /// Validate every record of a registry payload individually
    pub fn parse_registry(payload: &Value) -> (Vec<ServiceDescriptor>, Vec<ResolverError>) {
        let Some(records) = payload.as_object() else {
            return (
                Vec::new(),
                vec![ResolverError::Validation {
                    record: "<registry>".to_string(),
                    reason: "payload is not a JSON object".to_string(),
                }],
            );
        };

        let mut services = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        for (name, record) in records {
            match ServiceDescriptor::from_record(name, record.clone()) {
                Ok(descriptor) => services.push(descriptor),
                Err(e) => rejected.push(e),
            }
        }
        (services, rejected)
    }

    /// Fetch a provider's OpenAPI description and persist it with the snapshot
    pub async fn fetch_interface_description(&self, service: &ServiceDescriptor) -> Result<Value> {
        let description = get_json(&self.http, &service.api_documentation_address).await?;
        self.snapshot.store_description(service, &description).await?;
        Ok(description)
    }

    pub fn filter(
        services: &[ServiceDescriptor],
        criteria: &ServiceFilter,
        mode: MatchMode,
    ) -> Vec<ServiceDescriptor> {
        criteria.apply(services, mode)
    }
}

/// Outbound client shared by the registry and every provider
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ResolverError::Config(format!("failed to build HTTP client: {}", e)))
}

async fn get_json(http: &reqwest::Client, url: &str) -> Result<Value> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| ResolverError::discovery(url, RequestFailure::from_reqwest(&e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ResolverError::discovery(url, RequestFailure::Status(status.as_u16())));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ResolverError::discovery(url, RequestFailure::Decode(e.to_string())))
}
