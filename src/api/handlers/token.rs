//! CSRF token issuance handler.

use super::AppState;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Issue a CSRF token for the caller's session.
/// GET /api/csrf-token
///
/// Assigns a session identifier cookie when the request carries none, then
/// generates a token bound to that session and places it on the response as
/// both an HttpOnly cookie and a readable header. The JSON body carries the
/// token plus the field/header names a client needs to echo it back.
pub async fn issue_csrf_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let csrf = &state.csrf;

    let existing = csrf.session_from_headers(&headers);
    let is_new_session = existing.is_none();
    let session_id = existing.unwrap_or_else(|| Uuid::new_v4().to_string());

    let form = csrf.generate_form_token(Some(&session_id));
    let token = form.token.clone();

    if let Some(metrics) = &state.metrics {
        let kind = if is_new_session { "new_session" } else { "existing_session" };
        metrics
            .csrf_tokens_issued_total
            .with_label_values(&[kind])
            .inc();
    }
    debug!(session = %session_id, new_session = is_new_session, "issued CSRF token");

    let mut response = Json(form).into_response();
    csrf.add_token_to_response(response.headers_mut(), &token, Some(&session_id));

    if is_new_session {
        let cookie = csrf.build_cookie(&csrf.config().session_cookie, &session_id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}
