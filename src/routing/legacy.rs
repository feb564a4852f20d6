//! Flat-file resolver
//!
//! Reduced mode that needs no registry: providers are listed in
//! `serviceapis.json` and the terms each one serves in `metadatalist.json`.
//! Tags are parsed with the fixed GS1 digital-link vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use super::engine::{EngineState, EngineStatus, ResolvedRoute};
use super::probe::{fetch_terms, get_json, with_retries};
use crate::config::{LegacyConfig, RoutingConfig};
use crate::error::{ResolverError, Result};
use crate::tagparser::digital_link::{parse_digital_link, UNQUALIFIED_FIELD};

/// One entry of `serviceapis.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySource {
    #[serde(rename = "ROOT_ADDRESS")]
    pub root_address: String,
    #[serde(rename = "DATA")]
    pub data: String,
    /// Digital-link field whose value identifies the datum
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "ALL_METADATA", default, skip_serializing_if = "Option::is_none")]
    pub all_metadata: Option<String>,
}

/// source name → terms it serves
pub type TermList = BTreeMap<String, Vec<String>>;

struct TermState {
    terms: TermList,
    updated_at: DateTime<Utc>,
}

pub struct LegacyResolver {
    sources: BTreeMap<String, LegacySource>,
    state: RwLock<TermState>,
    metadata_path: Option<PathBuf>,
    http: reqwest::Client,
    verify_term_availability: bool,
    term_key: String,
    request_retries: u32,
}

impl LegacyResolver {
    pub fn new(sources: BTreeMap<String, LegacySource>, terms: TermList, http: reqwest::Client) -> Self {
        Self {
            sources,
            state: RwLock::new(TermState {
                terms,
                updated_at: Utc::now(),
            }),
            metadata_path: None,
            http,
            verify_term_availability: false,
            term_key: "metaData".to_string(),
            request_retries: 0,
        }
    }

    /// Load both files; crawled term lists are written back to `metadata_list`
    pub async fn load(legacy: &LegacyConfig, routing: &RoutingConfig, http: reqwest::Client) -> Result<Self> {
        let sources = read_json_file(&legacy.service_apis).await?;
        let terms = read_json_file(&legacy.metadata_list).await?;
        tracing::info!(
            sources = %legacy.service_apis.display(),
            terms = %legacy.metadata_list.display(),
            "Loaded legacy resolver files"
        );

        let mut resolver = Self::new(sources, terms, http).with_routing(routing);
        resolver.metadata_path = Some(legacy.metadata_list.clone());
        Ok(resolver)
    }

    /// Take verification, term key and retry settings from the routing config
    pub fn with_routing(mut self, routing: &RoutingConfig) -> Self {
        self.verify_term_availability = routing.verify_term_availability;
        self.term_key = routing.term_key.clone();
        self.request_retries = routing.request_retries;
        self
    }

    pub fn sources(&self) -> &BTreeMap<String, LegacySource> {
        &self.sources
    }

    pub async fn terms(&self) -> TermList {
        self.state.read().await.terms.clone()
    }

    pub async fn resolve(&self, raw_tag: &str, term: &str) -> Result<ResolvedRoute> {
        let fields = parse_digital_link(raw_tag);

        let source_name = {
            let state = self.state.read().await;
            state
                .terms
                .iter()
                .find(|(_, terms)| terms.iter().any(|t| t == term))
                .map(|(source, _)| source.clone())
                .ok_or_else(|| ResolverError::UnknownTerm(term.to_string()))?
        };
        let source = self.sources.get(&source_name).ok_or_else(|| {
            ResolverError::Config(format!("term source '{}' is not registered", source_name))
        })?;

        let identifier = fields
            .get(UNQUALIFIED_FIELD)
            .or_else(|| fields.get(&source.id))
            .ok_or_else(|| ResolverError::UnresolvableIdentifier {
                tag: raw_tag.to_string(),
                key: source.id.clone(),
            })?;
        let url = format!("{}{}{}", source.root_address, source.data, identifier);

        if self.verify_term_availability {
            let served = fetch_terms(&self.http, &url, &self.term_key, self.request_retries).await?;
            if !served.contains(term) {
                return Err(ResolverError::TermUnavailable {
                    term: term.to_string(),
                    url,
                });
            }
        }

        Ok(ResolvedRoute {
            term: term.to_string(),
            service_name: source_name,
            url,
        })
    }

    /// Re-read every source's full term listing and replace the term list.
    /// A source whose listing fails keeps its previous terms.
    pub async fn crawl_terms(&self) -> Result<TermList> {
        let mut crawled = self.terms().await;

        for (name, source) in &self.sources {
            let Some(all_metadata) = &source.all_metadata else {
                continue;
            };
            let url = format!("{}{}", source.root_address, all_metadata);
            let (http, url) = (&self.http, url.as_str());
            match with_retries(self.request_retries, move || get_json(http, url)).await {
                Ok(body) => {
                    let terms = listed_terms(&body, &self.term_key);
                    tracing::info!(source = %name, terms = terms.len(), "Crawled term listing");
                    crawled.insert(name.clone(), terms);
                }
                Err(e) => tracing::warn!(source = %name, error = %e, "Term listing crawl failed"),
            }
        }

        if let Some(path) = &self.metadata_path {
            let bytes = serde_json::to_vec_pretty(&crawled)
                .map_err(|e| ResolverError::Storage(e.to_string()))?;
            tokio::fs::write(path, bytes).await?;
        }

        let mut state = self.state.write().await;
        state.terms = crawled.clone();
        state.updated_at = Utc::now();
        Ok(crawled)
    }

    pub async fn status(&self) -> EngineStatus {
        let state = self.state.read().await;
        let distinct: BTreeSet<&String> = state.terms.values().flatten().collect();
        EngineStatus {
            state: EngineState::Ready,
            last_refresh: Some(state.updated_at),
            source: None,
            last_error: None,
            last_error_at: None,
            services: self.sources.len(),
            terms: distinct.len(),
        }
    }
}

/// `metadata[].metaData` of a full listing
fn listed_terms(body: &serde_json::Value, key: &str) -> Vec<String> {
    body.get("metadata")
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(key).and_then(serde_json::Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

async fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        ResolverError::Config(format!("failed to read {}: {}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ResolverError::Config(format!("failed to parse {}: {}", path.display(), e)))
}
