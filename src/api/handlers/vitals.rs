//! Web-vitals ingestion and summary handlers.

use super::AppState;
use crate::api::errors::ApiError;
use crate::vitals::{VitalReport, VitalSummary};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Ingest a client performance report.
/// POST /api/vitals
pub async fn report_vital(
    State(state): State<Arc<AppState>>,
    Json(report): Json<VitalReport>,
) -> Result<StatusCode, ApiError> {
    if report.name.trim().is_empty() {
        return Err(ApiError::InvalidArgument(
            "vital name must not be empty".to_string(),
        ));
    }
    if !report.value.is_finite() || report.value < 0.0 {
        return Err(ApiError::InvalidArgument(
            "vital value must be a non-negative number".to_string(),
        ));
    }

    debug!(name = %report.name, value = report.value, "recorded web vital");
    state.vitals.record(report);
    Ok(StatusCode::ACCEPTED)
}

/// Per-metric aggregates over the retained reports.
/// GET /api/vitals/summary
pub async fn vitals_summary(
    State(state): State<Arc<AppState>>,
) -> Json<HashMap<String, VitalSummary>> {
    Json(state.vitals.summary())
}
