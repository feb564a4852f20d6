//! DOM Resolver server
//!
//! ```bash
//! RESOLVER_CONFIG=config/resolver.yaml cargo run --bin dom-resolver
//! curl "http://localhost:20005/resolver/?identifier_content=18&term=Product%20manufacturer"
//! ```

use anyhow::{bail, Context};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dom_resolver::{
    config::{ResolverMode, StartupMode, StorageBackend},
    discovery::http_client,
    routing::{spawn_crawl_loop, spawn_refresh_loop},
    server::{create_router, AppState},
    tagparser::import_grammars,
    LegacyResolver, MemoryPatternStore, PatternStore, ResolverConfig, RouteResolver,
    RoutingEngine, ServiceCatalogue, TagParser,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dom_resolver=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DOM resolver");

    let config = ResolverConfig::load().context("loading configuration")?;
    tracing::info!(
        mode = ?config.routing.mode,
        registry = %config.registry.endpoint,
        storage = ?config.storage.backend,
        "Configuration loaded"
    );

    let store = open_store(&config).await?;
    if let Some(seed) = &config.storage.seed_grammars {
        import_grammars(store.as_ref(), seed)
            .await
            .with_context(|| format!("seeding grammars from {}", seed.display()))?;
    }
    let parser = Arc::new(TagParser::new(store));

    let resolver: Arc<dyn RouteResolver> = match config.routing.mode {
        ResolverMode::Catalogue => start_catalogue(&config, parser.clone()).await?,
        ResolverMode::Legacy => {
            let http = http_client(config.registry.request_timeout())?;
            let legacy = Arc::new(LegacyResolver::load(&config.legacy, &config.routing, http).await?);
            if config.legacy.crawl_on_startup {
                if let Err(e) = legacy.crawl_terms().await {
                    tracing::warn!(error = %e, "Startup term crawl failed, using stored term list");
                }
            }
            if config.legacy.crawl_interval_secs > 0 {
                spawn_crawl_loop(legacy.clone(), Duration::from_secs(config.legacy.crawl_interval_secs));
            }
            tracing::info!(sources = legacy.sources().len(), "Legacy resolver ready");
            legacy
        }
    };

    let app = create_router(AppState::new(parser, resolver));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "Resolver listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Resolver stopped");
    Ok(())
}

async fn open_store(config: &ResolverConfig) -> anyhow::Result<Arc<dyn PatternStore>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryPatternStore::new())),
        #[cfg(feature = "database")]
        StorageBackend::Postgres => {
            let env = &config.storage.connection_string_env;
            let url = std::env::var(env).with_context(|| format!("{} is not set", env))?;
            let store = dom_resolver::tagparser::PgPatternStore::connect(&url).await?;
            store.init_schema().await?;
            tracing::info!("Database connection established");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "database"))]
        StorageBackend::Postgres => {
            bail!("storage.backend is postgres but the binary was built without the `database` feature")
        }
    }
}

async fn start_catalogue(config: &ResolverConfig, parser: Arc<TagParser>) -> anyhow::Result<Arc<dyn RouteResolver>> {
    let catalogue = ServiceCatalogue::from_config(&config.registry)?;
    let engine = Arc::new(RoutingEngine::new(catalogue, parser, config.routing.clone()));
    let restore = config.refresh.restore_snapshot;

    match config.refresh.startup_mode {
        StartupMode::Sync => {
            tracing::info!("Performing synchronous initial refresh");
            initial_refresh(&engine, restore).await;
            if engine.current().await.is_none() {
                bail!("initial catalogue refresh failed and no snapshot could be restored");
            }
        }
        StartupMode::Async => {
            tracing::info!("Starting asynchronous initial refresh");
            let engine = engine.clone();
            tokio::spawn(async move { initial_refresh(&engine, restore).await });
        }
    }

    spawn_refresh_loop(engine.clone(), Duration::from_secs(config.refresh.interval_secs.max(1)));
    Ok(engine)
}

/// First refresh, falling back to the persisted snapshot
async fn initial_refresh(engine: &RoutingEngine, restore: bool) {
    match engine.refresh().await {
        Ok(report) => tracing::info!(services = report.services, terms = report.terms, "Initial refresh complete"),
        Err(e) if restore => {
            tracing::error!(error = %e, "Initial refresh failed, restoring persisted snapshot");
            if let Err(e) = engine.restore_from_disk().await {
                tracing::error!(error = %e, "No usable persisted snapshot");
            }
        }
        Err(e) => tracing::error!(error = %e, "Initial refresh failed"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
