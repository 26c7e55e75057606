// =============================================================================
// REST API Endpoints (Axum 0.7)
// =============================================================================
//
// All endpoints live under `/api/v1/`. Definition CRUD goes through the
// definition store first, then notifies the engine so the cached series of
// the touched definition is recomputed (or evicted) before the response.
//
// CORS is configured permissively for development.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::AppState;
use crate::definitions::{DefinitionStore, StoreError};
use crate::indicators::Series;
use crate::market_data::Candle;
use crate::types::{IndicatorDefinition, IndicatorKind};

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        StoreError::Persist(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/data", get(data))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/indicators", get(list_indicators).post(create_indicator))
        .route(
            "/api/v1/indicators/:id",
            get(get_indicator).put(update_indicator).delete(delete_indicator),
        )
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    results_version: u64,
    window_len: usize,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        results_version: state.engine.results().version(),
        window_len: state.engine.window().len(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Window + results
// =============================================================================

#[derive(Serialize)]
struct DataResponse {
    candles: Vec<Candle>,
    indicators: HashMap<String, Series>,
}

async fn data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let published = state.engine.published();
    Json(DataResponse {
        candles: published.candles,
        indicators: published.results,
    })
}

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot().await)
}

// =============================================================================
// Indicator definitions
// =============================================================================

#[derive(Debug, Deserialize)]
struct CreateIndicatorRequest {
    kind: String,
    period: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct UpdateIndicatorRequest {
    kind: Option<String>,
    period: Option<usize>,
}

#[derive(Serialize)]
struct IndicatorResponse {
    definition: IndicatorDefinition,
    values: Series,
}

fn resolve_kind(raw: &str) -> Result<IndicatorKind, ApiError> {
    let kind = IndicatorKind::parse(raw);
    if !kind.is_recognized() {
        let known = IndicatorKind::KNOWN.map(String::from).join(", ");
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("unknown indicator kind '{raw}', expected one of {known}"),
        ));
    }
    Ok(kind)
}

fn check_period(period: usize) -> Result<usize, ApiError> {
    if period == 0 {
        return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, "period must be at least 1"));
    }
    Ok(period)
}

async fn list_indicators(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let defs = state.definitions.list_definitions().await.map_err(store_error)?;
    Ok(Json(defs))
}

async fn create_indicator(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateIndicatorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = resolve_kind(&req.kind)?;
    let period = match req.period {
        Some(p) => check_period(p)?,
        None => kind.default_period().ok_or_else(|| {
            api_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("period is required for {kind}"),
            )
        })?,
    };

    let definition = state.definitions.create(kind, period).await.map_err(store_error)?;
    let values = state.engine.on_definition_changed(&definition);
    info!(id = %definition.id, "indicator created via API");

    Ok((StatusCode::CREATED, Json(IndicatorResponse { definition, values })))
}

async fn get_indicator(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let definition = state
        .definitions
        .get_definition(&id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| store_error(StoreError::NotFound(id.clone())))?;
    let values = state.engine.results().get(&id).unwrap_or_default();

    Ok(Json(IndicatorResponse { definition, values }))
}

async fn update_indicator(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateIndicatorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = req.kind.as_deref().map(resolve_kind).transpose()?;
    let period = req.period.map(check_period).transpose()?;

    let definition = state
        .definitions
        .update(&id, kind, period)
        .await
        .map_err(store_error)?;
    let values = state.engine.on_definition_changed(&definition);
    info!(id = %definition.id, "indicator updated via API");

    Ok(Json(IndicatorResponse { definition, values }))
}

async fn delete_indicator(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.definitions.delete(&id).await.map_err(store_error)?;
    state.engine.on_definition_deleted(&id);
    info!(id = %id, "indicator deleted via API");

    Ok(StatusCode::NO_CONTENT)
}
