//! Contact intake handler.

use super::AppState;
use crate::api::errors::ApiError;
use crate::contact::ContactRequest;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Response body for a stored contact submission.
#[derive(Debug, Serialize)]
pub struct ContactCreated {
    pub id: Uuid,
}

/// Store a contact submission.
/// POST /api/contact
pub async fn create_contact(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ContactRequest>,
) -> Result<(StatusCode, Json<ContactCreated>), ApiError> {
    request
        .validate()
        .map_err(|field| ApiError::InvalidArgument(format!("{field} is missing or malformed")))?;

    let id = state.contacts.create(request);
    info!(%id, "stored contact submission");
    Ok((StatusCode::CREATED, Json(ContactCreated { id })))
}
