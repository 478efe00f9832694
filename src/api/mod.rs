//! HTTP API: routes, CSRF guard, and error responses.

pub mod errors;
pub mod guard;
pub mod handlers;

pub use errors::ApiError;

use crate::metrics::{http_metrics_middleware, metrics_handler};
use axum::routing::{get, post};
use axum::{middleware, Router};
use handlers::{
    create_contact, health_check, issue_csrf_token, report_vital, vitals_summary, AppState,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the application router. Shared between `main` and the integration
/// tests so both exercise the same middleware stack.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/csrf-token", get(issue_csrf_token))
        .route("/api/vitals", post(report_vital))
        .route("/api/vitals/summary", get(vitals_summary))
        .route("/api/contact", post(create_contact))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::csrf_guard,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            http_metrics_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
