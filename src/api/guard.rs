//! CSRF enforcement middleware
//!
//! Every state-changing request must present a token the CSRF manager
//! accepts. Safe methods (GET/HEAD/OPTIONS) and the health-check path pass
//! through unchanged; everything else is validated against the session-table
//! (session id from the session cookie or header) and rejected with a 403
//! JSON error on failure.

use super::errors::ApiError;
use super::handlers::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tracing::{debug, warn};

/// Axum middleware enforcing CSRF protection.
///
/// Inserted as a layer around the router; the manager lives in shared state.
pub async fn csrf_guard(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if is_bypassed(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let headers = request.headers();
    let session_id = state.csrf.session_from_headers(headers);
    let outcome = state.csrf.validate_request(headers, session_id.as_deref());

    if let Some(metrics) = &state.metrics {
        let label = match &outcome.error {
            None => "valid",
            Some(e) => e.label(),
        };
        metrics.record_csrf_validation(label);
    }

    if outcome.is_valid {
        debug!(path = request.uri().path(), "CSRF validation passed");
        return Ok(next.run(request).await);
    }

    let reason = outcome
        .error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "validation failed".to_string());
    warn!(
        method = %request.method(),
        path = request.uri().path(),
        %reason,
        "rejected request failing CSRF validation"
    );
    Err(ApiError::CsrfViolation(reason))
}

/// Safe methods and the health-check path skip CSRF validation.
fn is_bypassed(method: &Method, path: &str) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
        || path.contains("/api/health")
}
