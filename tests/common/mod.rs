//! Fake registry and providers served over loopback

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dom_resolver::config::RoutingConfig;
use dom_resolver::discovery::{http_client, SnapshotStore};
use dom_resolver::tagparser::import_grammars;
use dom_resolver::{MemoryPatternStore, RoutingEngine, ServiceCatalogue, TagParser};

pub const TERMS: &[&str] = &["Product manufacturer", "Product weight"];

/// Which providers the registry lists, switchable at runtime
pub struct Network {
    pub base: String,
    registry_up: AtomicBool,
    generation: AtomicUsize,
    generations: Vec<Vec<&'static str>>,
}

impl Network {
    pub fn set_registry_up(&self, up: bool) {
        self.registry_up.store(up, Ordering::SeqCst);
    }

    pub fn set_generation(&self, generation: usize) {
        self.generation.store(generation, Ordering::SeqCst);
    }

    pub fn root(&self, provider: &str) -> String {
        format!("{}/{}", self.base, provider)
    }

    fn registry(&self) -> Value {
        let listed = &self.generations[self.generation.load(Ordering::SeqCst)];
        let mut services = serde_json::Map::new();
        for (i, provider) in listed.iter().enumerate() {
            services.insert(
                format!("{} Metadata Catalogue", provider),
                json!({
                    "id": (i + 1).to_string(),
                    "rootAddress": self.root(provider),
                    "apiDocumentationAdress": format!("{}/openapi.json", self.root(provider)),
                    "serviceType": "data provider",
                    "serviceTags": ["metadata-provider"],
                    "serviceOwner": "CircThread",
                    "maintainerContact": "ops@example.org",
                    "maintainanceStatus": "active",
                    "sourceCode": "https://git.example.org/catalogue",
                    "version": "1.0.0",
                    "lastUpdated": "2024-05-01"
                }),
            );
        }
        Value::Object(services)
    }
}

fn openapi() -> Value {
    json!({
        "openapi": "3.0.0",
        "info": {"title": "Product model metadata catalogue", "version": "1.0.0"},
        "paths": {
            "/metadata": {"get": {"tags": ["metadata-list"]}},
            "/metadata/{GTIN}": {
                "parameters": [{"name": "GTIN", "in": "path", "required": true, "schema": {"type": "string"}}],
                "get": {"tags": ["metadata-by-id"]}
            }
        }
    })
}

async fn registry(State(network): State<Arc<Network>>) -> Response {
    if !network.registry_up.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "registry down").into_response();
    }
    Json(network.registry()).into_response()
}

async fn description(Path(provider): Path<String>) -> Response {
    if provider == "broken" {
        return (StatusCode::NOT_FOUND, "no description").into_response();
    }
    Json(openapi()).into_response()
}

async fn listing() -> Json<Value> {
    let items: Vec<Value> = TERMS.iter().map(|t| json!({"metaData": t})).collect();
    Json(json!({ "metadata": items }))
}

async fn datum(Path((_provider, gtin)): Path<(String, String)>) -> Json<Value> {
    Json(json!({
        "GTIN": gtin,
        "metadata": [{"metaData": "Product manufacturer", "value": "ACME"}]
    }))
}

/// Start a network whose registry lists `generations[0]` until switched
pub async fn start(generations: Vec<Vec<&'static str>>) -> Arc<Network> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let network = Arc::new(Network {
        base: format!("http://{}", listener.local_addr().unwrap()),
        registry_up: AtomicBool::new(true),
        generation: AtomicUsize::new(0),
        generations,
    });

    let app = Router::new()
        .route("/services", get(registry))
        .route("/:provider/openapi.json", get(description))
        .route("/:provider/metadata", get(listing))
        .route("/:provider/metadata/:gtin", get(datum))
        .with_state(network.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    network
}

/// Parser seeded with the plain and digital-link grammars
pub async fn parser() -> Arc<TagParser> {
    let store = Arc::new(MemoryPatternStore::new());
    let seed = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tagstyles.json");
    import_grammars(store.as_ref(), &seed).await.unwrap();
    Arc::new(TagParser::new(store))
}

pub async fn engine(network: &Network, snapshot_dir: &std::path::Path, options: RoutingConfig) -> RoutingEngine {
    let catalogue = ServiceCatalogue::new(
        format!("{}/services", network.base),
        http_client(Duration::from_secs(5)).unwrap(),
        SnapshotStore::new(snapshot_dir),
    );
    RoutingEngine::new(catalogue, parser().await, options)
}
