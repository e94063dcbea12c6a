use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::domain::QuoteId;
use super::pricing::PricingError;
use super::repository::{QuoteRepository, ReferenceData, RepositoryError, StatusHistoryRepository};
use super::service::{
    CreateQuoteRequest, PreviewRequest, QuoteService, QuoteServiceError, RepriceRequest,
    TransitionRequest,
};
use super::status::TransitionRejection;

/// Router builder exposing pricing and workflow endpoints.
pub fn quote_router<R, H, D>(service: Arc<QuoteService<R, H, D>>) -> Router
where
    R: QuoteRepository + 'static,
    H: StatusHistoryRepository + 'static,
    D: ReferenceData + 'static,
{
    Router::new()
        .route("/api/v1/quotes", post(create_handler::<R, H, D>))
        .route("/api/v1/quotes/:quote_id", get(quote_handler::<R, H, D>))
        .route(
            "/api/v1/quotes/:quote_id/reprice",
            post(reprice_handler::<R, H, D>),
        )
        .route(
            "/api/v1/quotes/:quote_id/transitions",
            get(transition_options_handler::<R, H, D>).post(transition_handler::<R, H, D>),
        )
        .route(
            "/api/v1/quotes/:quote_id/history",
            get(history_handler::<R, H, D>),
        )
        .route("/api/v1/pricing/preview", post(preview_handler::<R, H, D>))
        .with_state(service)
}

impl IntoResponse for QuoteServiceError {
    fn into_response(self) -> Response {
        let (status, payload) = match &self {
            QuoteServiceError::Pricing(PricingError::Validation { field, constraint }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": self.to_string(),
                    "field": field,
                    "constraint": constraint,
                }),
            ),
            QuoteServiceError::Pricing(PricingError::MissingReferenceData(reference)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": self.to_string(),
                    "missing": reference.to_string(),
                }),
            ),
            QuoteServiceError::Transition(TransitionRejection::Illegal {
                current,
                attempted,
                allowed,
            }) => (
                StatusCode::CONFLICT,
                json!({
                    "error": self.to_string(),
                    "current": current,
                    "attempted": attempted,
                    "allowed": allowed,
                }),
            ),
            QuoteServiceError::Transition(TransitionRejection::ConcurrentModification {
                expected,
                actual,
            }) => (
                StatusCode::CONFLICT,
                json!({
                    "error": self.to_string(),
                    "expected": expected,
                    "actual": actual,
                }),
            ),
            QuoteServiceError::QuoteLocked { status, .. } => (
                StatusCode::CONFLICT,
                json!({
                    "error": self.to_string(),
                    "status": status,
                }),
            ),
            QuoteServiceError::ConcurrentUpdate { .. } => (
                StatusCode::CONFLICT,
                json!({ "error": self.to_string() }),
            ),
            QuoteServiceError::Repository(RepositoryError::NotFound) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "quote not found" }),
            ),
            QuoteServiceError::Repository(RepositoryError::Conflict) => (
                StatusCode::CONFLICT,
                json!({ "error": "quote already exists" }),
            ),
            QuoteServiceError::Repository(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
        };

        (status, axum::Json(payload)).into_response()
    }
}

pub(crate) async fn create_handler<R, H, D>(
    State(service): State<Arc<QuoteService<R, H, D>>>,
    axum::Json(request): axum::Json<CreateQuoteRequest>,
) -> Response
where
    R: QuoteRepository + 'static,
    H: StatusHistoryRepository + 'static,
    D: ReferenceData + 'static,
{
    match service.create(request) {
        Ok(priced) => (StatusCode::CREATED, axum::Json(priced)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn quote_handler<R, H, D>(
    State(service): State<Arc<QuoteService<R, H, D>>>,
    Path(quote_id): Path<String>,
) -> Response
where
    R: QuoteRepository + 'static,
    H: StatusHistoryRepository + 'static,
    D: ReferenceData + 'static,
{
    match service.get(&QuoteId(quote_id)) {
        Ok(quote) => {
            let payload = json!({
                "status_view": quote.status_view(),
                "quote": quote,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn reprice_handler<R, H, D>(
    State(service): State<Arc<QuoteService<R, H, D>>>,
    Path(quote_id): Path<String>,
    axum::Json(request): axum::Json<RepriceRequest>,
) -> Response
where
    R: QuoteRepository + 'static,
    H: StatusHistoryRepository + 'static,
    D: ReferenceData + 'static,
{
    match service.reprice(&QuoteId(quote_id), request) {
        Ok(priced) => (StatusCode::OK, axum::Json(priced)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn transition_options_handler<R, H, D>(
    State(service): State<Arc<QuoteService<R, H, D>>>,
    Path(quote_id): Path<String>,
) -> Response
where
    R: QuoteRepository + 'static,
    H: StatusHistoryRepository + 'static,
    D: ReferenceData + 'static,
{
    match service.transition_options(&QuoteId(quote_id)) {
        Ok(options) => (StatusCode::OK, axum::Json(options)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn transition_handler<R, H, D>(
    State(service): State<Arc<QuoteService<R, H, D>>>,
    Path(quote_id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    R: QuoteRepository + 'static,
    H: StatusHistoryRepository + 'static,
    D: ReferenceData + 'static,
{
    match service.transition(&QuoteId(quote_id), request) {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn history_handler<R, H, D>(
    State(service): State<Arc<QuoteService<R, H, D>>>,
    Path(quote_id): Path<String>,
) -> Response
where
    R: QuoteRepository + 'static,
    H: StatusHistoryRepository + 'static,
    D: ReferenceData + 'static,
{
    match service.history(&QuoteId(quote_id)) {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(error) => error.into_response(),
    }
}

pub(crate) async fn preview_handler<R, H, D>(
    State(service): State<Arc<QuoteService<R, H, D>>>,
    axum::Json(request): axum::Json<PreviewRequest>,
) -> Response
where
    R: QuoteRepository + 'static,
    H: StatusHistoryRepository + 'static,
    D: ReferenceData + 'static,
{
    match service.preview(request) {
        Ok(priced) => (StatusCode::OK, axum::Json(priced)).into_response(),
        Err(error) => error.into_response(),
    }
}
