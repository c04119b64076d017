//! Router assembly: HTTP endpoints, body limit, CORS and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::client::GenerativeBackend;
use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - the API under `/api/v1/...`
/// - at most one exam generation in flight, so callers share the model's rate budget
/// - request bodies capped at `max_upload_bytes`
/// - permissive CORS and per-request trace spans
pub fn build_router<B>(state: Arc<AppState<B>>, max_upload_bytes: usize) -> Router
where
    B: GenerativeBackend + 'static,
{
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/books", get(http::http_list_books::<B>).post(http::http_upload_book::<B>))
        .route(
            "/api/v1/exams",
            post(http::http_create_exam::<B>).layer(ConcurrencyLimitLayer::new(1)),
        )
        .route("/api/v1/exams/download", post(http::http_download_paper))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
