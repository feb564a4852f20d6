//! DOM Resolver - tag parsing and provider routing
//!
//! Resolves a product identifier tag plus a semantic term into the URL of
//! the data provider that serves that datum, without the caller knowing
//! which provider stores it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │              REST front-end (axum, `server`)                 │
//! └──────────────────────────────────────────────────────────────┘
//!                 │                               │
//!                 ▼                               ▼
//! ┌───────────────────────────┐   ┌──────────────────────────────┐
//! │  TagParser                │◄──│  RoutingEngine               │
//! │  PatternStore (mem / pg)  │   │  CatalogueSnapshot (Arc swap)│
//! └───────────────────────────┘   └──────────────────────────────┘
//!                                                 │
//!                                                 ▼
//!                                 ┌──────────────────────────────┐
//!                                 │  ServiceCatalogue (registry) │
//!                                 │  SchemaClient (OpenAPI)      │
//!                                 └──────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use dom_resolver::{ResolverConfig, RoutingEngine, ServiceCatalogue, TagParser, MemoryPatternStore};
//!
//! let config = ResolverConfig::load()?;
//! let parser = Arc::new(TagParser::new(Arc::new(MemoryPatternStore::new())));
//! let catalogue = ServiceCatalogue::from_config(&config.registry)?;
//! let engine = RoutingEngine::new(catalogue, parser, config.routing.clone());
//!
//! engine.refresh().await?;
//! let route = engine.resolve("http://circthread.eu/01/18/21/1234567", "Product manufacturer").await?;
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod routing;
#[cfg(feature = "server")]
pub mod server;
pub mod tagparser;

pub use config::ResolverConfig;
pub use discovery::{MatchMode, SchemaClient, ServiceCatalogue, ServiceDescriptor, ServiceFilter};
pub use error::{RequestFailure, ResolverError, Result};
pub use routing::{LegacyResolver, ResolvedRoute, RouteResolver, RoutingEngine};
pub use tagparser::{MemoryPatternStore, ParsedTag, PatternStore, TagGrammar, TagParser};
