//! API request handlers
//!
//! Split into submodules by domain:
//! - `status` — Health check
//! - `token` — CSRF token issuance
//! - `vitals` — Web-vitals report ingestion and summary
//! - `contact` — Contact intake

mod contact;
mod status;
mod token;
mod vitals;

use crate::contact::ContactStore;
use crate::csrf::CsrfProtect;
use crate::metrics::Metrics;
use crate::vitals::VitalsStore;
use std::sync::Arc;

// Re-export all public handlers and types so callers don't change.
pub use contact::{create_contact, ContactCreated};
pub use status::{get_peak_rss_bytes, health_check, HealthResponse};
pub use token::issue_csrf_token;
pub use vitals::{report_vital, vitals_summary};

/// Application state shared across handlers
pub struct AppState {
    pub csrf: Arc<CsrfProtect>,
    pub vitals: VitalsStore,
    pub contacts: ContactStore,
    pub metrics: Option<Metrics>,
}
