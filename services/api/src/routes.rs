use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use fleet_lease::error::AppError;
use fleet_lease::workflows::quote::{
    parse_vehicle_groups, quote_router, QuoteRepository, QuoteService, QuoteStatus,
    ReferenceData, StatusHistoryRepository, StatusOption, VehicleGroup,
};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

pub(crate) fn with_quote_routes<R, H, D>(service: Arc<QuoteService<R, H, D>>) -> axum::Router
where
    R: QuoteRepository + 'static,
    H: StatusHistoryRepository + 'static,
    D: ReferenceData + 'static,
{
    quote_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/statuses", axum::routing::get(statuses_endpoint))
        .route(
            "/api/v1/catalog/groups/validate",
            axum::routing::post(validate_catalog_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Every status with its display label and progress, in workflow order.
pub(crate) async fn statuses_endpoint() -> Json<Vec<StatusOption>> {
    Json(QuoteStatus::all().into_iter().map(StatusOption::from).collect())
}

/// Dry-run a vehicle group CSV export before it replaces the catalog.
pub(crate) async fn validate_catalog_endpoint(
    body: String,
) -> Result<Json<Vec<VehicleGroup>>, AppError> {
    let groups = parse_vehicle_groups(Cursor::new(body.into_bytes()))?;
    Ok(Json(groups))
}
