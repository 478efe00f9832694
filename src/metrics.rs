//! Prometheus metrics for the Bridge API server.
//!
//! All metric types use atomics internally (no locks on the hot path).
//! The `Metrics` struct is `Clone`-cheap (Arc-based registry + collectors).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{
    Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder, TEXT_FORMAT,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use crate::api::errors::ApiError;
use crate::api::handlers::AppState;

/// All Prometheus metrics for the Bridge API server.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // -- Process & Build --
    pub process_start_time_seconds: Gauge,
    pub build_info: GaugeVec,
    pub process_peak_rss_bytes: Gauge,

    // -- HTTP Requests --
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,

    // -- CSRF --
    pub csrf_validations_total: IntCounterVec,
    pub csrf_tokens_issued_total: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        // -- Process & Build --
        let process_start_time_seconds =
            Gauge::new("process_start_time_seconds", "Start time of the process").unwrap();
        registry
            .register(Box::new(process_start_time_seconds.clone()))
            .unwrap();

        let build_info = GaugeVec::new(
            Opts::new("bridge_api_build_info", "Build information"),
            &["version", "build_time"],
        )
        .unwrap();
        registry.register(Box::new(build_info.clone())).unwrap();

        let process_peak_rss_bytes = Gauge::new(
            "process_peak_rss_bytes",
            "Peak resident set size of the process",
        )
        .unwrap();
        registry
            .register(Box::new(process_peak_rss_bytes.clone()))
            .unwrap();

        // -- HTTP Requests --
        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "status", "operation"],
        )
        .unwrap();
        registry
            .register(Box::new(http_requests_total.clone()))
            .unwrap();

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "operation"],
        )
        .unwrap();
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .unwrap();

        // -- CSRF --
        let csrf_validations_total = IntCounterVec::new(
            Opts::new(
                "bridge_csrf_validations_total",
                "CSRF validation outcomes by result",
            ),
            &["result"],
        )
        .unwrap();
        registry
            .register(Box::new(csrf_validations_total.clone()))
            .unwrap();

        let csrf_tokens_issued_total = IntCounterVec::new(
            Opts::new("bridge_csrf_tokens_issued_total", "CSRF tokens issued"),
            &["kind"],
        )
        .unwrap();
        registry
            .register(Box::new(csrf_tokens_issued_total.clone()))
            .unwrap();

        let metrics = Self {
            registry,
            process_start_time_seconds,
            build_info,
            process_peak_rss_bytes,
            http_requests_total,
            http_request_duration_seconds,
            csrf_validations_total,
            csrf_tokens_issued_total,
        };

        metrics
            .process_start_time_seconds
            .set(chrono::Utc::now().timestamp() as f64);
        metrics
            .build_info
            .with_label_values(&[env!("CARGO_PKG_VERSION"), env!("BRIDGE_BUILD_TIME")])
            .set(1.0);

        metrics
    }

    /// Record the outcome of a CSRF validation ("valid" or a failure reason).
    pub fn record_csrf_validation(&self, result: &str) {
        self.csrf_validations_total
            .with_label_values(&[result])
            .inc();
    }
}

/// Map a request path to a stable operation label.
pub fn classify_operation(method: &str, path: &str) -> &'static str {
    match path {
        "/api/health" => return "health",
        "/api/csrf-token" => return "csrf_token",
        "/api/vitals" => return "vitals",
        "/api/vitals/summary" => return "vitals_summary",
        "/api/contact" => return "contact",
        "/metrics" => return "metrics",
        _ => {}
    }

    match method {
        "GET" | "HEAD" => "other_read",
        _ => "other_write",
    }
}

/// Axum middleware that records HTTP request metrics.
pub async fn http_metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let metrics = match &state.metrics {
        Some(m) => m,
        None => return next.run(request).await,
    };

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let operation = classify_operation(&method, &path);

    let start = Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed().as_secs_f64();

    let status = response.status().as_u16().to_string();

    metrics
        .http_requests_total
        .with_label_values(&[&method, &status, operation])
        .inc();
    metrics
        .http_request_duration_seconds
        .with_label_values(&[&method, operation])
        .observe(duration);

    response
}

/// Handler for GET /metrics — returns Prometheus text format.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = match &state.metrics {
        Some(m) => m,
        None => {
            return (StatusCode::NOT_FOUND, "Metrics not enabled").into_response();
        }
    };

    // Update on-demand gauges (O(1) atomic reads)
    metrics
        .process_peak_rss_bytes
        .set(crate::api::handlers::get_peak_rss_bytes() as f64);

    let encoder = TextEncoder::new();
    let metric_families = metrics.registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        return ApiError::Internal(e.to_string()).into_response();
    }

    (StatusCode::OK, [("content-type", TEXT_FORMAT)], buffer).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_operation() {
        assert_eq!(classify_operation("GET", "/api/health"), "health");
        assert_eq!(classify_operation("GET", "/api/csrf-token"), "csrf_token");
        assert_eq!(classify_operation("POST", "/api/vitals"), "vitals");
        assert_eq!(
            classify_operation("GET", "/api/vitals/summary"),
            "vitals_summary"
        );
        assert_eq!(classify_operation("POST", "/api/contact"), "contact");
        assert_eq!(classify_operation("GET", "/metrics"), "metrics");
        assert_eq!(classify_operation("GET", "/unknown"), "other_read");
        assert_eq!(classify_operation("POST", "/unknown"), "other_write");
    }

    #[test]
    fn test_csrf_validation_counter() {
        let metrics = Metrics::new();
        metrics.record_csrf_validation("valid");
        metrics.record_csrf_validation("valid");
        metrics.record_csrf_validation("expired");

        assert_eq!(
            metrics
                .csrf_validations_total
                .with_label_values(&["valid"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .csrf_validations_total
                .with_label_values(&["expired"])
                .get(),
            1
        );
    }
}
