//! Request handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::AppState;
use crate::error::ResolverError;
use crate::routing::EngineStatus;
use crate::tagparser::{GrammarSummary, ParsedTag, TagGrammar};

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = std::result::Result<T, ApiError>;

fn api_error(err: ResolverError) -> ApiError {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    } else {
        tracing::debug!(error = %err, "Request rejected");
    }
    (status, Json(json!({ "error": err.to_string() })))
}

fn not_found(id: i64) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("tag grammar {} not found", id) })),
    )
}

#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// POST /tags/
pub async fn create_tag(
    State(state): State<AppState>,
    Json(grammar): Json<TagGrammar>,
) -> ApiResult<(StatusCode, Json<MutationResponse>)> {
    let id = state.store.create(&grammar).await.map_err(api_error)?;
    tracing::info!(id = id, name = grammar.name(), "Tag grammar created");
    Ok((
        StatusCode::CREATED,
        Json(MutationResponse {
            status: "created",
            id: Some(id),
        }),
    ))
}

/// GET /tags/
pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Json<Vec<GrammarSummary>>> {
    state.store.list_all().await.map(Json).map_err(api_error)
}

/// GET /tags/:id
pub async fn get_tag(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<TagGrammar>> {
    match state.store.get_by_id(id).await.map_err(api_error)? {
        Some(grammar) => Ok(Json(grammar)),
        None => Err(not_found(id)),
    }
}

/// PUT /tags/:id
pub async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(grammar): Json<TagGrammar>,
) -> ApiResult<Json<MutationResponse>> {
    if !state.store.update(id, &grammar).await.map_err(api_error)? {
        return Err(not_found(id));
    }
    tracing::info!(id = id, name = grammar.name(), "Tag grammar updated");
    Ok(Json(MutationResponse {
        status: "updated",
        id: Some(id),
    }))
}

/// DELETE /tags/:id
pub async fn delete_tag(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<MutationResponse>> {
    if !state.store.delete_by_id(id).await.map_err(api_error)? {
        return Err(not_found(id));
    }
    tracing::info!(id = id, "Tag grammar deleted");
    Ok(Json(MutationResponse {
        status: "deleted",
        id: Some(id),
    }))
}

/// DELETE /tags
pub async fn delete_all_tags(State(state): State<AppState>) -> ApiResult<Json<MutationResponse>> {
    state.store.delete_all().await.map_err(api_error)?;
    tracing::info!("All tag grammars deleted");
    Ok(Json(MutationResponse {
        status: "deleted",
        id: None,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub identifier_content: String,
    pub term: String,
    /// Requester role. Accepted for forward compatibility, not used for routing yet.
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub url: String,
    pub term: String,
    pub service: String,
}

/// GET /resolver/?identifier_content=...&term=...
pub async fn resolve(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> ApiResult<Json<ResolveResponse>> {
    tracing::debug!(
        tag = %query.identifier_content,
        term = %query.term,
        role = query.role.as_deref().unwrap_or("-"),
        "Resolve request"
    );
    let route = state
        .resolver
        .resolve_route(&query.identifier_content, &query.term)
        .await
        .map_err(api_error)?;
    Ok(Json(ResolveResponse {
        url: route.url,
        term: route.term,
        service: route.service_name,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub tag: String,
}

/// POST /parse/
pub async fn parse_tag(
    State(state): State<AppState>,
    Json(request): Json<ParseRequest>,
) -> ApiResult<Json<ParsedTag>> {
    state.parser.parse(&request.tag).await.map(Json).map_err(api_error)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub catalogue: EngineStatus,
}

/// GET /healthcheck/
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.store.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!(error = %e, "Grammar store health check failed");
            false
        }
    };
    let catalogue = state.resolver.engine_status().await;
    let status = if database && catalogue.state == crate::routing::EngineState::Ready {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status,
        database,
        catalogue,
    })
}
