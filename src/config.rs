//! Resolver configuration
//!
//! Loaded from YAML. Every field has a default so a partial (or missing)
//! file still yields a usable configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::discovery::MatchMode;
use crate::error::{ResolverError, Result};

/// Default configuration path
pub const DEFAULT_CONFIG_PATH: &str = "config/resolver.yaml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub refresh: RefreshConfig,
    pub routing: RoutingConfig,
    pub storage: StorageConfig,
    pub legacy: LegacyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:20005".to_string(),
        }
    }
}

/// Where the service registry lives and where its snapshot is persisted
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub endpoint: String,
    pub snapshot_dir: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:20000/services".to_string(),
            snapshot_dir: PathBuf::from("data/discovery/services"),
            request_timeout_secs: 30,
        }
    }
}

impl RegistryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Configuration for catalogue refresh behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    pub startup_mode: StartupMode,
    /// Fall back to the persisted snapshot when the first refresh fails
    pub restore_snapshot: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            startup_mode: StartupMode::Async,
            restore_snapshot: true,
        }
    }
}

/// Startup mode for the initial catalogue refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupMode {
    /// Refresh in the background (server starts immediately)
    #[default]
    Async,
    /// Refresh before the server starts accepting requests
    Sync,
}

/// Which resolution strategy the server runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverMode {
    /// Registry discovery + OpenAPI-derived clients
    #[default]
    Catalogue,
    /// Flat JSON registry with fixed GS1 application identifiers
    Legacy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub mode: ResolverMode,
    /// Service tag marking providers that publish a term listing
    pub capability_tag: String,
    /// Endpoint tag of the term-listing operation
    pub term_listing_tag: String,
    /// Endpoint tag of the per-identifier data operation
    pub data_tag: String,
    /// JSON key under which providers publish term names
    pub term_key: String,
    pub verify_term_availability: bool,
    pub request_retries: u32,
    pub filter_match: MatchMode,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: ResolverMode::Catalogue,
            capability_tag: "metadata-provider".to_string(),
            term_listing_tag: "metadata-list".to_string(),
            data_tag: "metadata-by-id".to_string(),
            term_key: "metaData".to_string(),
            verify_term_availability: false,
            request_retries: 1,
            filter_match: MatchMode::Substring,
        }
    }
}

/// Storage backend for tag grammars
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub connection_string_env: String,
    /// Optional tagstyles JSON imported at startup
    pub seed_grammars: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            connection_string_env: "DATABASE_URL".to_string(),
            seed_grammars: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    pub service_apis: PathBuf,
    pub metadata_list: PathBuf,
    /// Crawl every source's term listing once before serving
    pub crawl_on_startup: bool,
    /// Period of the background term crawl; 0 disables it
    pub crawl_interval_secs: u64,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            service_apis: PathBuf::from("data/serviceapis.json"),
            metadata_list: PathBuf::from("data/metadatalist.json"),
            crawl_on_startup: false,
            crawl_interval_secs: 0,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ResolverError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| ResolverError::Config(e.to_string()))
    }

    /// Load from `RESOLVER_CONFIG` (or the default path), then apply
    /// environment overrides. A missing default file yields defaults.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var("RESOLVER_CONFIG").ok();
        let path = explicit
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if explicit.is_some() || Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            tracing::info!(path = %path, "No configuration file found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("RESOLVER_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Ok(endpoint) = std::env::var("RESOLVER_REGISTRY_ENDPOINT") {
            self.registry.endpoint = endpoint;
        }
    }
}
