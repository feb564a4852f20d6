//! Routing engine
//!
//! Owns the live [`CatalogueSnapshot`] and resolves `(tag, term)` pairs
//! against it. A refresh assembles a complete snapshot off to the side and
//! publishes it with a single `Arc` swap; a resolve clones the `Arc` once and
//! never sees a mix of old and new catalogues.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Map;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::probe::{collect_terms, fetch_terms, with_retries};
use crate::config::RoutingConfig;
use crate::discovery::{EndpointFilter, SchemaClient, ServiceCatalogue, ServiceDescriptor};
use crate::error::{ResolverError, Result};
use crate::tagparser::{ParsedTag, TagParser};

/// Lifecycle of the published catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No snapshot has ever been published
    Uninitialized,
    Ready,
    /// Serving the last good snapshot after a failed refresh
    Stale,
}

/// Where a published snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    Registry,
    Disk,
}

/// A registered provider and, when its description could be loaded, its client
pub struct ProviderEntry {
    pub descriptor: ServiceDescriptor,
    pub client: Option<SchemaClient>,
}

/// Immutable once published
pub struct CatalogueSnapshot {
    providers: Vec<ProviderEntry>,
    /// term → indices into `providers`, in registry order
    term_index: BTreeMap<String, Vec<usize>>,
    refreshed_at: DateTime<Utc>,
    source: SnapshotSource,
}

impl CatalogueSnapshot {
    pub fn providers(&self) -> &[ProviderEntry] {
        &self.providers
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.providers.iter().map(|p| &p.descriptor)
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.term_index.keys().map(String::as_str)
    }

    pub fn providers_for(&self, term: &str) -> impl Iterator<Item = &ProviderEntry> {
        self.term_index
            .get(term)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.providers.get(i))
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    pub fn source(&self) -> SnapshotSource {
        self.source
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub last_refresh: Option<DateTime<Utc>>,
    pub source: Option<SnapshotSource>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub services: usize,
    pub terms: usize,
}

/// Outcome of a successful refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub services: usize,
    pub clients: usize,
    pub terms: usize,
    /// Services whose interface description could not be loaded
    pub without_client: Vec<String>,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRoute {
    pub term: String,
    pub service_name: String,
    pub url: String,
}

/// Hook deciding whether a candidate provider may serve a request
pub trait ResolvePolicy: Send + Sync {
    fn admits(&self, tag: &ParsedTag, term: &str, provider: &ServiceDescriptor) -> bool;
}

/// Admits every provider
pub struct AdmitAll;

impl ResolvePolicy for AdmitAll {
    fn admits(&self, _tag: &ParsedTag, _term: &str, _provider: &ServiceDescriptor) -> bool {
        true
    }
}

#[derive(Default)]
struct Health {
    last_error: Option<String>,
    last_error_at: Option<DateTime<Utc>>,
}

pub struct RoutingEngine {
    catalogue: ServiceCatalogue,
    parser: Arc<TagParser>,
    options: RoutingConfig,
    snapshot: RwLock<Option<Arc<CatalogueSnapshot>>>,
    health: RwLock<Health>,
    refresh_lock: Mutex<()>,
}

impl RoutingEngine {
    pub fn new(catalogue: ServiceCatalogue, parser: Arc<TagParser>, options: RoutingConfig) -> Self {
        Self {
            catalogue,
            parser,
            options,
            snapshot: RwLock::new(None),
            health: RwLock::new(Health::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn parser(&self) -> &Arc<TagParser> {
        &self.parser
    }

    pub fn catalogue(&self) -> &ServiceCatalogue {
        &self.catalogue
    }

    /// The currently published snapshot
    pub async fn current(&self) -> Option<Arc<CatalogueSnapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Rebuild the catalogue from the registry and publish it. On failure the
    /// previous snapshot keeps serving and the engine turns stale.
    pub async fn refresh(&self) -> Result<RefreshReport> {
        let _guard = self.refresh_lock.lock().await;

        match self.build_from_registry().await {
            Ok((snapshot, report)) => {
                self.publish(snapshot).await;
                tracing::info!(
                    services = report.services,
                    clients = report.clients,
                    terms = report.terms,
                    "Catalogue refreshed"
                );
                Ok(report)
            }
            Err(e) => {
                let mut health = self.health.write().await;
                health.last_error = Some(e.to_string());
                health.last_error_at = Some(Utc::now());
                tracing::warn!(error = %e, "Catalogue refresh failed");
                Err(e)
            }
        }
    }

    /// Publish the catalogue persisted by an earlier refresh. Meant for cold
    /// start when the registry cannot be reached.
    pub async fn restore_from_disk(&self) -> Result<RefreshReport> {
        let _guard = self.refresh_lock.lock().await;

        let persisted = self.catalogue.snapshot().load().await?;
        if persisted.is_empty() {
            return Err(ResolverError::CatalogueUnavailable);
        }

        let mut without_client = Vec::new();
        let providers: Vec<ProviderEntry> = persisted
            .into_iter()
            .map(|p| {
                let client = p
                    .description
                    .and_then(|d| self.build_client(&p.descriptor, d));
                if client.is_none() {
                    without_client.push(p.descriptor.service_name.clone());
                }
                ProviderEntry {
                    descriptor: p.descriptor,
                    client,
                }
            })
            .collect();

        let (snapshot, report) = self
            .assemble(providers, without_client, SnapshotSource::Disk)
            .await;
        self.publish(snapshot).await;
        tracing::info!(
            services = report.services,
            terms = report.terms,
            path = %self.catalogue.snapshot().base_path().display(),
            "Catalogue restored from disk"
        );
        Ok(report)
    }

    pub async fn status(&self) -> EngineStatus {
        let snapshot = self.current().await;
        let health = self.health.read().await;
        let state = match &snapshot {
            None => EngineState::Uninitialized,
            Some(s) => match health.last_error_at {
                Some(failed_at) if failed_at >= s.refreshed_at => EngineState::Stale,
                _ if s.source == SnapshotSource::Disk => EngineState::Stale,
                _ => EngineState::Ready,
            },
        };
        EngineStatus {
            state,
            last_refresh: snapshot.as_ref().map(|s| s.refreshed_at),
            source: snapshot.as_ref().map(|s| s.source),
            last_error: health.last_error.clone(),
            last_error_at: health.last_error_at,
            services: snapshot.as_ref().map_or(0, |s| s.providers.len()),
            terms: snapshot.as_ref().map_or(0, |s| s.term_index.len()),
        }
    }

    pub async fn resolve(&self, raw_tag: &str, term: &str) -> Result<ResolvedRoute> {
        self.resolve_with(raw_tag, term, &AdmitAll).await
    }

    /// Resolve a tag and term to the URL of the provider datum
    pub async fn resolve_with(
        &self,
        raw_tag: &str,
        term: &str,
        policy: &dyn ResolvePolicy,
    ) -> Result<ResolvedRoute> {
        let snapshot = self.current().await.ok_or(ResolverError::CatalogueUnavailable)?;
        let parsed = self.parser.parse(raw_tag).await?;

        let candidates: Vec<&ProviderEntry> = snapshot
            .providers_for(term)
            .filter(|p| policy.admits(&parsed, term, &p.descriptor))
            .collect();
        if candidates.is_empty() {
            return Err(ResolverError::UnknownTerm(term.to_string()));
        }

        let mut last_error = ResolverError::UnknownTerm(term.to_string());
        for provider in candidates {
            let name = &provider.descriptor.service_name;
            let Some((data_path, key)) = self.data_endpoint(provider) else {
                tracing::debug!(service = %name, "Candidate has no data endpoint");
                last_error = ResolverError::NoDataEndpoint(name.clone());
                continue;
            };

            let identifier = match select_identifier(&parsed, key) {
                Ok(identifier) => identifier,
                Err(e) => {
                    tracing::debug!(service = %name, key = key, "Tag carries no value for provider key");
                    last_error = e;
                    continue;
                }
            };
            let url = format!(
                "{}{}{}",
                provider.descriptor.root_address.trim_end_matches('/'),
                data_path,
                identifier
            );

            if self.options.verify_term_availability {
                let served = match fetch_terms(
                    self.catalogue.http(),
                    &url,
                    &self.options.term_key,
                    self.options.request_retries,
                )
                .await
                {
                    Ok(served) => served,
                    Err(e) => {
                        tracing::warn!(service = %name, url = %url, error = %e, "Data URL check failed");
                        last_error = e;
                        continue;
                    }
                };
                if !served.contains(term) {
                    tracing::debug!(service = %name, url = %url, term = term, "Term not served at data URL");
                    last_error = ResolverError::TermUnavailable {
                        term: term.to_string(),
                        url,
                    };
                    continue;
                }
            }

            tracing::info!(tag = raw_tag, term = term, service = %name, url = %url, "Resolved route");
            return Ok(ResolvedRoute {
                term: term.to_string(),
                service_name: name.clone(),
                url,
            });
        }
        Err(last_error)
    }

    /// Data path and trailing parameter of the provider's per-identifier endpoint
    fn data_endpoint<'a>(&self, provider: &'a ProviderEntry) -> Option<(&'a str, &'a str)> {
        let client = provider.client.as_ref()?;
        let filter = EndpointFilter::by_tag(self.options.data_tag.as_str()).with_method("get");
        client
            .filter_endpoints(&filter, self.options.filter_match)
            .into_iter()
            .find_map(|e| e.trailing_parameter())
    }

    async fn publish(&self, snapshot: CatalogueSnapshot) {
        *self.snapshot.write().await = Some(Arc::new(snapshot));
    }

    async fn build_from_registry(&self) -> Result<(CatalogueSnapshot, RefreshReport)> {
        let services = self.catalogue.refresh().await?;

        let fetches = services.iter().map(|s| self.catalogue.fetch_interface_description(s));
        let descriptions = join_all(fetches).await;

        let mut without_client = Vec::new();
        let providers: Vec<ProviderEntry> = services
            .into_iter()
            .zip(descriptions)
            .map(|(descriptor, description)| {
                let client = match description {
                    Ok(d) => self.build_client(&descriptor, d),
                    Err(e) => {
                        tracing::warn!(service = %descriptor.service_name, error = %e, "Interface description unavailable");
                        None
                    }
                };
                if client.is_none() {
                    without_client.push(descriptor.service_name.clone());
                }
                ProviderEntry { descriptor, client }
            })
            .collect();

        Ok(self
            .assemble(providers, without_client, SnapshotSource::Registry)
            .await)
    }

    fn build_client(&self, descriptor: &ServiceDescriptor, description: serde_json::Value) -> Option<SchemaClient> {
        match SchemaClient::with_http(description, self.catalogue.http().clone()) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(service = %descriptor.service_name, error = %e, "Interface description rejected");
                None
            }
        }
    }

    async fn assemble(
        &self,
        providers: Vec<ProviderEntry>,
        without_client: Vec<String>,
        source: SnapshotSource,
    ) -> (CatalogueSnapshot, RefreshReport) {
        let term_index = self.build_term_index(&providers).await;
        let refreshed_at = Utc::now();
        let report = RefreshReport {
            services: providers.len(),
            clients: providers.iter().filter(|p| p.client.is_some()).count(),
            terms: term_index.len(),
            without_client,
            refreshed_at,
        };
        let snapshot = CatalogueSnapshot {
            providers,
            term_index,
            refreshed_at,
            source,
        };
        (snapshot, report)
    }

    async fn build_term_index(&self, providers: &[ProviderEntry]) -> BTreeMap<String, Vec<usize>> {
        let listings = providers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.descriptor.has_tag(&self.options.capability_tag))
            .filter_map(|(i, p)| p.client.as_ref().map(|client| (i, p, client)))
            .map(|(i, provider, client)| async move { (i, self.list_terms(provider, client).await) });

        let mut index: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, terms) in join_all(listings).await {
            for term in terms {
                index.entry(term).or_default().push(i);
            }
        }
        index
    }

    /// Terms published by the provider's term-listing endpoints. Failures are
    /// logged and leave the provider without terms.
    async fn list_terms(&self, provider: &ProviderEntry, client: &SchemaClient) -> BTreeSet<String> {
        let listing = EndpointFilter::by_tag(self.options.term_listing_tag.as_str()).with_method("get");
        let root = provider.descriptor.root_address.as_str();
        let no_args = Map::new();
        let args = &no_args;

        let mut terms = BTreeSet::new();
        for endpoint in client.filter_endpoints(&listing, self.options.filter_match) {
            let outcome = with_retries(self.options.request_retries, move || {
                client.invoke(root, endpoint, args)
            })
            .await;
            match outcome {
                Ok(response) => collect_terms(&response.body, &self.options.term_key, &mut terms),
                Err(e) => tracing::warn!(
                    service = %provider.descriptor.service_name,
                    path = %endpoint.path,
                    error = %e,
                    "Term listing failed"
                ),
            }
        }
        terms
    }
}

/// Pick the identifier for the provider's trailing path parameter
pub fn select_identifier(parsed: &ParsedTag, key: &str) -> Result<String> {
    if let Some(value) = parsed.fields.get(key) {
        return Ok(value.clone());
    }
    match parsed.fields.len() {
        0 => Ok(parsed.raw_tag.clone()),
        1 => Ok(parsed.fields.values().next().cloned().unwrap_or_default()),
        _ => Err(ResolverError::UnresolvableIdentifier {
            tag: parsed.raw_tag.clone(),
            key: key.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{http_client, SnapshotStore};
    use crate::tagparser::{GrammarPattern, MemoryPatternStore, PatternStore, TagGrammar};
    use axum::{extract::Path, routing::get, Json, Router};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tempfile::TempDir;

    fn parsed(raw: &str, fields: &[(&str, &str)]) -> ParsedTag {
        ParsedTag {
            grammar_name: "g".to_string(),
            raw_tag: raw.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_select_identifier_prefers_declared_key() {
        let tag = parsed("http://x/01/18/21/7", &[("GTIN", "18"), ("serial", "7")]);
        assert_eq!(select_identifier(&tag, "GTIN").unwrap(), "18");
        assert!(matches!(
            select_identifier(&tag, "lot"),
            Err(ResolverError::UnresolvableIdentifier { .. })
        ));
    }

    #[test]
    fn test_select_identifier_fallbacks() {
        assert_eq!(select_identifier(&parsed("18", &[]), "GTIN").unwrap(), "18");
        assert_eq!(
            select_identifier(&parsed("x/01/18", &[("id", "18")]), "GTIN").unwrap(),
            "18"
        );
    }

    /// Registry + one provider served from the same address
    async fn fake_network(terms: &'static [&'static str]) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let registry = json!({
            "Product Model Metadata Catalogue":
                crate::discovery::descriptor::fixtures::record(json!(1), &base, &["metadata-provider"]),
        });
        let openapi = json!({
            "openapi": "3.0.0",
            "paths": {
                "/metadata": {"get": {"tags": ["metadata-list"]}},
                "/metadata/{GTIN}": {
                    "get": {
                        "tags": ["metadata-by-id"],
                        "parameters": [{"name": "GTIN", "in": "path", "required": true}]
                    }
                }
            }
        });
        let listing: Vec<_> = terms.iter().map(|t| json!({"metaData": t})).collect();

        let app = Router::new()
            .route("/services", get(move || async move { Json(registry) }))
            .route("/openapi.json", get(move || async move { Json(openapi) }))
            .route("/metadata", get(move || async move { Json(json!({"metadata": listing})) }))
            .route(
                "/metadata/:gtin",
                get(|Path(gtin): Path<String>| async move {
                    Json(json!({"GTIN": gtin, "metadata": [{"metaData": "Product manufacturer", "value": "ACME"}]}))
                }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base
    }

    /// Two providers listing the same term under different identifier keys
    async fn shared_term_network(first_key: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let mut registry = serde_json::Map::new();
        registry.insert(
            "Lot Catalogue".to_string(),
            crate::discovery::descriptor::fixtures::record(json!(1), &format!("{}/a", base), &["metadata-provider"]),
        );
        registry.insert(
            "GTIN Catalogue".to_string(),
            crate::discovery::descriptor::fixtures::record(json!(2), &format!("{}/b", base), &["metadata-provider"]),
        );
        let openapi = |key: &str| {
            json!({
                "openapi": "3.0.0",
                "paths": {
                    "/metadata": {"get": {"tags": ["metadata-list"]}},
                    format!("/metadata/{{{}}}", key): {
                        "get": {
                            "tags": ["metadata-by-id"],
                            "parameters": [{"name": key, "in": "path", "required": true}]
                        }
                    }
                }
            })
        };
        let (first, second) = (openapi(first_key), openapi("GTIN"));
        let registry = Value::Object(registry);

        let app = Router::new()
            .route("/services", get(move || async move { Json(registry) }))
            .route("/a/openapi.json", get(move || async move { Json(first) }))
            .route("/b/openapi.json", get(move || async move { Json(second) }))
            .route(
                "/:provider/metadata",
                get(|| async { Json(json!({"metadata": [{"metaData": "Weight"}]})) }),
            )
            .route(
                "/b/metadata/:gtin",
                get(|Path(gtin): Path<String>| async move {
                    Json(json!({"GTIN": gtin, "metadata": [{"metaData": "Weight", "value": "3kg"}]}))
                }),
            );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base
    }

    async fn digital_link_engine(base: &str, dir: &TempDir, options: RoutingConfig) -> RoutingEngine {
        let store = Arc::new(MemoryPatternStore::new());
        store
            .create(&TagGrammar::new(
                GrammarPattern::new("digital_link", r"https?://[^/]+(/\d{2}/[^/]+)+"),
                vec![
                    GrammarPattern::new("GTIN", r"/01/(\d+)"),
                    GrammarPattern::new("serial", r"/21/([^/]+)"),
                ],
            ))
            .await
            .unwrap();
        let catalogue = ServiceCatalogue::new(
            format!("{}/services", base),
            http_client(Duration::from_secs(5)).unwrap(),
            SnapshotStore::new(dir.path()),
        );
        RoutingEngine::new(catalogue, Arc::new(TagParser::new(store)), options)
    }

    async fn engine(base: &str, dir: &TempDir, options: RoutingConfig) -> RoutingEngine {
        let store = Arc::new(MemoryPatternStore::new());
        store
            .create(&TagGrammar::new(GrammarPattern::new("plain", r"\d+"), vec![]))
            .await
            .unwrap();
        let catalogue = ServiceCatalogue::new(
            format!("{}/services", base),
            http_client(Duration::from_secs(5)).unwrap(),
            SnapshotStore::new(dir.path()),
        );
        RoutingEngine::new(catalogue, Arc::new(TagParser::new(store)), options)
    }

    #[tokio::test]
    async fn test_cold_start_is_catalogue_unavailable() {
        let dir = TempDir::new().unwrap();
        let engine = engine("http://127.0.0.1:9", &dir, RoutingConfig::default()).await;
        assert_eq!(engine.status().await.state, EngineState::Uninitialized);
        let err = engine.resolve("18", "Product manufacturer").await.unwrap_err();
        assert!(matches!(err, ResolverError::CatalogueUnavailable));
    }

    #[tokio::test]
    async fn test_refresh_then_resolve() {
        let base = fake_network(&["Product manufacturer", "Weight"]).await;
        let dir = TempDir::new().unwrap();
        let engine = engine(&base, &dir, RoutingConfig::default()).await;

        let report = engine.refresh().await.unwrap();
        assert_eq!(report.services, 1);
        assert_eq!(report.clients, 1);
        assert_eq!(report.terms, 2);
        assert_eq!(engine.status().await.state, EngineState::Ready);

        let route = engine.resolve("18", "Product manufacturer").await.unwrap();
        assert_eq!(route.service_name, "Product Model Metadata Catalogue");
        assert_eq!(route.url, format!("{}/metadata/18", base));
    }

    #[tokio::test]
    async fn test_unknown_term() {
        let base = fake_network(&["Weight"]).await;
        let dir = TempDir::new().unwrap();
        let engine = engine(&base, &dir, RoutingConfig::default()).await;
        engine.refresh().await.unwrap();

        let err = engine.resolve("18", "Product manufacturer").await.unwrap_err();
        assert!(matches!(err, ResolverError::UnknownTerm(t) if t == "Product manufacturer"));
    }

    #[tokio::test]
    async fn test_invalid_tag_propagates() {
        let base = fake_network(&["Weight"]).await;
        let dir = TempDir::new().unwrap();
        let engine = engine(&base, &dir, RoutingConfig::default()).await;
        engine.refresh().await.unwrap();

        let err = engine.resolve("not-a-number", "Weight").await.unwrap_err();
        assert!(matches!(err, ResolverError::InvalidTag { .. }));
    }

    #[tokio::test]
    async fn test_policy_can_veto_providers() {
        struct DenyAll;
        impl ResolvePolicy for DenyAll {
            fn admits(&self, _: &ParsedTag, _: &str, _: &ServiceDescriptor) -> bool {
                false
            }
        }

        let base = fake_network(&["Weight"]).await;
        let dir = TempDir::new().unwrap();
        let engine = engine(&base, &dir, RoutingConfig::default()).await;
        engine.refresh().await.unwrap();

        assert!(engine.resolve("18", "Weight").await.is_ok());
        let err = engine.resolve_with("18", "Weight", &DenyAll).await.unwrap_err();
        assert!(matches!(err, ResolverError::UnknownTerm(_)));
    }

    #[tokio::test]
    async fn test_verification_rejects_unserved_term() {
        let base = fake_network(&["Product manufacturer", "Weight"]).await;
        let dir = TempDir::new().unwrap();
        let options = RoutingConfig {
            verify_term_availability: true,
            ..RoutingConfig::default()
        };
        let engine = engine(&base, &dir, options).await;
        engine.refresh().await.unwrap();

        assert!(engine.resolve("18", "Product manufacturer").await.is_ok());
        let err = engine.resolve("18", "Weight").await.unwrap_err();
        assert!(matches!(err, ResolverError::TermUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_restore_from_disk_after_refresh() {
        let base = fake_network(&["Weight"]).await;
        let dir = TempDir::new().unwrap();
        engine(&base, &dir, RoutingConfig::default())
            .await
            .refresh()
            .await
            .unwrap();

        let restored = engine(&base, &dir, RoutingConfig::default()).await;
        let report = restored.restore_from_disk().await.unwrap();
        assert_eq!(report.services, 1);
        assert_eq!(report.clients, 1);

        let status = restored.status().await;
        assert_eq!(status.state, EngineState::Stale);
        assert_eq!(status.source, Some(SnapshotSource::Disk));
        assert!(restored.resolve("18", "Weight").await.is_ok());
    }

    #[tokio::test]
    async fn test_restore_without_snapshot_fails() {
        let dir = TempDir::new().unwrap();
        let engine = engine("http://127.0.0.1:9", &dir, RoutingConfig::default()).await;
        assert!(matches!(
            engine.restore_from_disk().await,
            Err(ResolverError::CatalogueUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_unresolvable_key_falls_through_to_next_provider() {
        let base = shared_term_network("lot").await;
        let dir = TempDir::new().unwrap();
        let engine = digital_link_engine(&base, &dir, RoutingConfig::default()).await;
        engine.refresh().await.unwrap();

        let route = engine.resolve("http://x/01/18/21/7", "Weight").await.unwrap();
        assert_eq!(route.service_name, "GTIN Catalogue");
        assert_eq!(route.url, format!("{}/b/metadata/18", base));
    }

    #[tokio::test]
    async fn test_failed_data_check_falls_through_to_next_provider() {
        // first provider's data URL is not served at all
        let base = shared_term_network("GTIN").await;
        let dir = TempDir::new().unwrap();
        let options = RoutingConfig {
            verify_term_availability: true,
            ..RoutingConfig::default()
        };
        let engine = digital_link_engine(&base, &dir, options).await;
        engine.refresh().await.unwrap();

        let route = engine.resolve("http://x/01/18/21/7", "Weight").await.unwrap();
        assert_eq!(route.service_name, "GTIN Catalogue");
    }

    #[tokio::test]
    async fn test_sole_field_serves_first_provider() {
        let base = shared_term_network("lot").await;
        let dir = TempDir::new().unwrap();
        let engine = digital_link_engine(&base, &dir, RoutingConfig::default()).await;
        engine.refresh().await.unwrap();

        // one parsed field satisfies any key
        let route = engine.resolve("http://x/01/18", "Weight").await.unwrap();
        assert_eq!(route.service_name, "Lot Catalogue");
        assert_eq!(route.url, format!("{}/a/metadata/18", base));
    }
}
