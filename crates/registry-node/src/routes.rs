//! # Operator HTTP API
//!
//! axum routes over [`RegistryCacheController`]. Handlers only translate
//! between HTTP and the controller; every failure is rendered as an
//! [`ErrorResponse`] with the status of its error kind.
//!
//! | Method | Path | Action |
//! |--------|------|--------|
//! | POST | `/v0/registry/cache` | Process a block range |
//! | DELETE | `/v0/registry/cache` | Clear the cache |
//! | GET | `/v0/registry/cache` | Members (`companiesFilter` query) |
//! | POST | `/v0/registry/cache/event-service` | Start the live consumer |
//! | GET | `/v0/registry/cache/last-event` | Watermark |
//! | GET | `/v0/registry/products/:staticId` | Company products |
//! | GET | `/v0/registry/products/:staticId/:productId` | Product availability |
//! | GET | `/healthz` | Liveness and population state |
//! | GET | `/metrics` | Prometheus text exposition |

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::error;

use registry_cache::{
    BatchOutcome, ErrorResponse, MemberRecord, PopulateRequest, PopulationStateGate,
    ProductAvailability, RegistryCacheController, RegistryCacheError,
};
use shared_types::EventPosition;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache controller.
    pub controller: Arc<RegistryCacheController>,
    /// Read gate, reported by `/healthz`.
    pub gate: Arc<PopulationStateGate>,
}

/// Build the operator router. `request_timeout` bounds every request,
/// including populate calls that scan a block range.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .route(
            "/v0/registry/cache",
            post(populate).delete(clear).get(get_members),
        )
        .route("/v0/registry/cache/event-service", post(start_event_service))
        .route("/v0/registry/cache/last-event", get(last_event))
        .route("/v0/registry/products/:static_id", get(get_products))
        .route(
            "/v0/registry/products/:static_id/:product_id",
            get(get_product_availability),
        )
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics))
        .layer(middleware)
        .with_state(state)
}

/// Controller error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(RegistryCacheError);

impl From<RegistryCacheError> for ApiError {
    fn from(err: RegistryCacheError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(ErrorResponse::status_code(&self.0))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MembersQuery {
    companies_filter: Option<String>,
}

async fn populate(
    State(state): State<AppState>,
    body: Result<Json<PopulateRequest>, JsonRejection>,
) -> ApiResult<Json<BatchOutcome>> {
    let Json(request) =
        body.map_err(|e| RegistryCacheError::EventValidation(e.body_text()))?;
    Ok(Json(state.controller.populate(request).await?))
}

async fn clear(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.controller.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start_event_service(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.controller.start_cache_event_service().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_members(
    State(state): State<AppState>,
    Query(query): Query<MembersQuery>,
) -> ApiResult<Json<Vec<MemberRecord>>> {
    let members = state
        .controller
        .get_members(query.companies_filter.as_deref())
        .await?;
    Ok(Json(members))
}

async fn last_event(State(state): State<AppState>) -> ApiResult<Json<EventPosition>> {
    Ok(Json(state.controller.last_processed_event().await?))
}

async fn get_products(
    State(state): State<AppState>,
    Path(static_id): Path<String>,
) -> ApiResult<Json<Vec<Value>>> {
    Ok(Json(state.controller.get_products(&static_id).await?))
}

async fn get_product_availability(
    State(state): State<AppState>,
    Path((static_id, product_id)): Path<(String, String)>,
) -> ApiResult<Json<ProductAvailability>> {
    let availability = state
        .controller
        .get_product_availability(&static_id, &product_id)
        .await?;
    Ok(Json(availability))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "populationState": state.gate.state().to_string(),
    }))
}

async fn metrics() -> Response {
    match registry_telemetry::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
