//! Resolution of `(tag, term)` pairs to provider URLs

pub mod engine;
pub mod legacy;
pub mod probe;
pub mod refresh;

use async_trait::async_trait;

pub use engine::{
    select_identifier, AdmitAll, CatalogueSnapshot, EngineState, EngineStatus, ProviderEntry,
    RefreshReport, ResolvePolicy, ResolvedRoute, RoutingEngine, SnapshotSource,
};
pub use legacy::{LegacyResolver, LegacySource, TermList};
pub use refresh::{run_crawl_loop, run_refresh_loop, spawn_crawl_loop, spawn_refresh_loop};

use crate::error::Result;

/// Common face of the catalogue engine and the flat-file resolver, as served
/// by the HTTP front-end
#[async_trait]
pub trait RouteResolver: Send + Sync {
    async fn resolve_route(&self, raw_tag: &str, term: &str) -> Result<ResolvedRoute>;

    async fn engine_status(&self) -> EngineStatus;
}

#[async_trait]
impl RouteResolver for RoutingEngine {
    async fn resolve_route(&self, raw_tag: &str, term: &str) -> Result<ResolvedRoute> {
        self.resolve(raw_tag, term).await
    }

    async fn engine_status(&self) -> EngineStatus {
        self.status().await
    }
}

#[async_trait]
impl RouteResolver for LegacyResolver {
    async fn resolve_route(&self, raw_tag: &str, term: &str) -> Result<ResolvedRoute> {
        self.resolve(raw_tag, term).await
    }

    async fn engine_status(&self) -> EngineStatus {
        self.status().await
    }
}
