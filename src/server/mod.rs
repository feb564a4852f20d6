//! REST front-end
//!
//! ## Endpoints
//!
//! - `POST /tags/`, `GET /tags/` - create and list tag grammars
//! - `GET|PUT|DELETE /tags/:id` - one grammar
//! - `DELETE /tags` - remove every grammar
//! - `GET /resolver/?identifier_content=&term=` - resolve a tag and term to a URL
//! - `POST /parse/` - parse a tag without routing it
//! - `GET /healthcheck/` - storage and catalogue health

mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routing::RouteResolver;
use crate::tagparser::{PatternStore, TagParser};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PatternStore>,
    pub parser: Arc<TagParser>,
    pub resolver: Arc<dyn RouteResolver>,
}

impl AppState {
    pub fn new(parser: Arc<TagParser>, resolver: Arc<dyn RouteResolver>) -> Self {
        Self {
            store: parser.store().clone(),
            parser,
            resolver,
        }
    }
}

/// Build the router with CORS and request tracing
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/tags",
            get(routes::list_tags)
                .post(routes::create_tag)
                .delete(routes::delete_all_tags),
        )
        .route(
            "/tags/",
            get(routes::list_tags)
                .post(routes::create_tag)
                .delete(routes::delete_all_tags),
        )
        .route(
            "/tags/:id",
            get(routes::get_tag)
                .put(routes::update_tag)
                .delete(routes::delete_tag),
        )
        .route("/resolver/", get(routes::resolve))
        .route("/resolver", get(routes::resolve))
        .route("/parse/", post(routes::parse_tag))
        .route("/healthcheck/", get(routes::health_check))
        .route("/healthcheck", get(routes::health_check))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
