//! CSRF token protection.
//!
//! Anti-forgery tokens for state-changing requests. Two validation paths are
//! supported:
//!
//! - **Session-table** — tokens are generated per session identifier and held
//!   in an in-memory table; validation compares the presented token against
//!   the stored one and enforces expiry.
//! - **Double-submit cookie** — stateless: the same token must arrive in both
//!   the token cookie and the token header. An attacker can make the browser
//!   send the cookie but cannot read it to also set the header.
//!
//! The table is process-local. A multi-replica deployment will not share
//! token state; session-table validation assumes a single instance.
//!
//! Validation failures are reported as [`TokenValidation`] records carrying a
//! [`CsrfError`] — the validation functions themselves never fail.

pub mod store;
pub mod token;

use crate::config::{ConfigError, CsrfConfig};
use axum::http::{header, HeaderMap, HeaderValue};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::debug;

use store::TokenStore;

/// Validation failure reasons.
///
/// Carried inside [`TokenValidation`]; only the HTTP guard translates these
/// into a response, and stored token values never appear in the messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("CSRF token not provided")]
    TokenNotProvided,

    #[error("no token found for session")]
    SessionTokenMissing,

    #[error("CSRF token expired")]
    TokenExpired,

    #[error("invalid token")]
    TokenMismatch,

    #[error("invalid token format")]
    InvalidFormat,

    #[error("double-submit token missing")]
    DoubleSubmitMissing,

    #[error("double-submit token mismatch")]
    DoubleSubmitMismatch,

    /// Reserved for a token backend that can fail at lookup time. The
    /// in-memory table cannot, so nothing in this crate constructs it.
    #[error("internal validation error: {0}")]
    Internal(String),
}

impl CsrfError {
    /// Short stable label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            CsrfError::TokenNotProvided => "not_provided",
            CsrfError::SessionTokenMissing => "session_missing",
            CsrfError::TokenExpired => "expired",
            CsrfError::TokenMismatch => "mismatch",
            CsrfError::InvalidFormat => "invalid_format",
            CsrfError::DoubleSubmitMissing => "double_submit_missing",
            CsrfError::DoubleSubmitMismatch => "double_submit_mismatch",
            CsrfError::Internal(_) => "internal",
        }
    }
}

/// Outcome of a validation attempt.
///
/// `timestamp_ms` is the validation-time clock reading (for audit logging),
/// not the token's creation time.
#[derive(Debug, Clone)]
pub struct TokenValidation {
    pub is_valid: bool,
    /// The matched token on success
    pub token: Option<String>,
    pub error: Option<CsrfError>,
    pub timestamp_ms: i64,
}

impl TokenValidation {
    fn valid(token: String) -> Self {
        Self {
            is_valid: true,
            token: Some(token),
            error: None,
            timestamp_ms: now_ms(),
        }
    }

    fn invalid(error: CsrfError) -> Self {
        Self {
            is_valid: false,
            token: None,
            error: Some(error),
            timestamp_ms: now_ms(),
        }
    }
}

/// A token bundled with the names a server-rendered form needs to echo it
/// back: the hidden field name and the request header name.
#[derive(Debug, Clone, Serialize)]
pub struct FormToken {
    pub token: String,
    pub field_name: String,
    pub header_name: String,
}

/// Milliseconds since epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// CSRF protection manager.
///
/// One instance is created at the composition root and shared via `Arc`; it
/// is the single owner of the session-to-token table. [`start_sweeper`]
/// schedules the periodic expired-entry sweep and [`stop`] halts it for
/// clean shutdown.
///
/// [`start_sweeper`]: CsrfProtect::start_sweeper
/// [`stop`]: CsrfProtect::stop
pub struct CsrfProtect {
    config: CsrfConfig,
    store: TokenStore,
    sweeper: Mutex<Option<SweeperHandle>>,
}

/// A running sweeper task and the signal that stops it.
///
/// The `Notify` belongs to this spawn: a `stop()` with no task running has
/// no handle to signal, so it cannot leave a stale permit behind that a
/// later `start_sweeper` would consume on its first `select!`.
struct SweeperHandle {
    task: tokio::task::JoinHandle<()>,
    shutdown: Arc<Notify>,
}

impl CsrfProtect {
    /// Create a manager, rejecting invalid configuration.
    pub fn new(config: CsrfConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            store: TokenStore::new(),
            sweeper: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    fn max_age_ms(&self) -> i64 {
        i64::try_from(self.config.max_age_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000)
    }

    /// Generate a fresh token, storing it server-side when a session
    /// identifier is supplied. At most one live token per session — a new
    /// generation overwrites the previous one.
    pub fn generate_token(&self, session_id: Option<&str>) -> String {
        let value = token::generate_value(self.config.token_length);
        if let Some(sid) = session_id {
            self.store.insert(sid, value.clone(), now_ms());
            debug!(session = sid, "generated CSRF token for session");
        } else {
            debug!("generated sessionless CSRF token");
        }
        value
    }

    /// Generate a token bundled with the form-field and header names.
    pub fn generate_form_token(&self, session_id: Option<&str>) -> FormToken {
        FormToken {
            token: self.generate_token(session_id),
            field_name: self.config.field_name.clone(),
            header_name: self.config.header_name.clone(),
        }
    }

    /// Validate a token extracted from a request.
    ///
    /// With a session identifier, the presented token must match the stored
    /// unexpired token for that session; an expired entry is deleted as a
    /// side effect. Without one, the check degrades to a format test (hex,
    /// exact configured length).
    pub fn validate_token(
        &self,
        provided: Option<&str>,
        session_id: Option<&str>,
    ) -> TokenValidation {
        let provided = match provided {
            Some(t) if !t.is_empty() => t,
            _ => return TokenValidation::invalid(CsrfError::TokenNotProvided),
        };

        let Some(sid) = session_id else {
            return if token::is_well_formed(provided, self.config.token_length) {
                TokenValidation::valid(provided.to_string())
            } else {
                TokenValidation::invalid(CsrfError::InvalidFormat)
            };
        };

        let Some(stored) = self.store.get(sid) else {
            return TokenValidation::invalid(CsrfError::SessionTokenMissing);
        };

        if stored.age_ms(now_ms()) > self.max_age_ms() {
            self.store.remove(sid);
            return TokenValidation::invalid(CsrfError::TokenExpired);
        }

        if !token::constant_time_eq(stored.value.as_bytes(), provided.as_bytes()) {
            return TokenValidation::invalid(CsrfError::TokenMismatch);
        }

        TokenValidation::valid(stored.value)
    }

    /// Extract the token from request headers (configured header first, then
    /// the token cookie) and validate it.
    pub fn validate_request(
        &self,
        headers: &HeaderMap,
        session_id: Option<&str>,
    ) -> TokenValidation {
        let provided = self.token_from_headers(headers);
        self.validate_token(provided.as_deref(), session_id)
    }

    /// Stateless double-submit check: the token cookie and the token header
    /// must both be present and equal.
    pub fn validate_double_submit(&self, headers: &HeaderMap) -> TokenValidation {
        let cookie_token = cookie_value(headers, &self.config.cookie_name);
        let header_token = header_value(headers, &self.config.header_name);

        match (cookie_token, header_token) {
            (Some(c), Some(h)) if !c.is_empty() && !h.is_empty() => {
                if token::constant_time_eq(c.as_bytes(), h.as_bytes()) {
                    TokenValidation::valid(h)
                } else {
                    TokenValidation::invalid(CsrfError::DoubleSubmitMismatch)
                }
            }
            _ => TokenValidation::invalid(CsrfError::DoubleSubmitMissing),
        }
    }

    /// Place a token on an outgoing response: an HttpOnly cookie plus a
    /// readable header with the same value, so either the double-submit or
    /// the session-table path can succeed on the next request. Re-stores the
    /// token server-side when a session identifier is given.
    pub fn add_token_to_response(
        &self,
        headers: &mut HeaderMap,
        token: &str,
        session_id: Option<&str>,
    ) {
        let cookie = self.build_cookie(&self.config.cookie_name, token);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.append(header::SET_COOKIE, value);
        }
        if let Ok(value) = HeaderValue::from_str(token) {
            if let Ok(name) = self.config.header_name.parse::<axum::http::HeaderName>() {
                headers.insert(name, value);
            }
        }
        if let Some(sid) = session_id {
            self.store.insert(sid, token.to_string(), now_ms());
        }
    }

    /// Build a Set-Cookie value with the configured attributes.
    pub fn build_cookie(&self, name: &str, value: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite={}",
            name,
            value,
            self.config.max_age_secs,
            self.config.same_site.as_str()
        );
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Token as presented by a request: configured header first, then the
    /// token cookie. First non-empty source wins.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        header_value(headers, &self.config.header_name)
            .filter(|t| !t.is_empty())
            .or_else(|| cookie_value(headers, &self.config.cookie_name))
            .filter(|t| !t.is_empty())
    }

    /// Session identifier as presented by a request: session cookie first,
    /// then the session header.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        cookie_value(headers, &self.config.session_cookie)
            .or_else(|| header_value(headers, &self.config.session_header))
            .filter(|s| !s.is_empty())
    }

    /// Number of sessions currently holding a token.
    pub fn table_len(&self) -> usize {
        self.store.len()
    }

    /// Drop expired table entries. Called by the sweeper task; exposed so
    /// operators and tests can force a pass.
    pub fn sweep(&self) -> usize {
        self.store.sweep_expired(now_ms(), self.max_age_ms())
    }

    /// Schedule the periodic expired-entry sweep. Idempotent.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut guard = self.sweeper.lock();
        if guard.is_some() {
            return;
        }

        let manager = Arc::clone(self);
        let shutdown = Arc::new(Notify::new());
        let signal = Arc::clone(&shutdown);
        let interval = Duration::from_secs(self.config.sweep_interval_secs);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = manager.sweep();
                        if removed > 0 {
                            debug!(removed, "swept expired CSRF tokens");
                        }
                    }
                    _ = signal.notified() => {
                        debug!("CSRF sweeper stopped");
                        break;
                    }
                }
            }
        });

        *guard = Some(SweeperHandle { task, shutdown });
    }

    /// Halt the sweeper. Safe to call multiple times, including before any
    /// `start_sweeper`; used by graceful shutdown and by tests that need the
    /// timer gone deterministically.
    pub fn stop(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.shutdown.notify_one();
            handle.task.abort();
        }
    }
}

impl Drop for CsrfProtect {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.task.abort();
        }
    }
}

/// Read a header value as a string, treating non-UTF-8 values as absent.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Extract a named cookie from the Cookie header(s).
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(raw) = cookie_header.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            if let Some((k, v)) = pair.trim().split_once('=') {
                if k == name {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CsrfConfig;

    fn manager() -> CsrfProtect {
        CsrfProtect::new(CsrfConfig::default()).unwrap()
    }

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(
                name.parse::<axum::http::HeaderName>().unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn test_round_trip_validity() {
        let csrf = manager();
        let token = csrf.generate_token(Some("sess-1"));

        let headers = headers_with(&[("X-CSRF-Token", &token)]);
        let outcome = csrf.validate_request(&headers, Some("sess-1"));
        assert!(outcome.is_valid);
        assert_eq!(outcome.token.as_deref(), Some(token.as_str()));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_tamper_detection() {
        let csrf = manager();
        csrf.generate_token(Some("sess-1"));

        let other = token::generate_value(32);
        let outcome = csrf.validate_token(Some(&other), Some("sess-1"));
        assert!(!outcome.is_valid);
        assert_eq!(outcome.error, Some(CsrfError::TokenMismatch));
    }

    #[test]
    fn test_missing_token() {
        let csrf = manager();
        let outcome = csrf.validate_request(&HeaderMap::new(), Some("sess-1"));
        assert!(!outcome.is_valid);
        assert_eq!(outcome.error, Some(CsrfError::TokenNotProvided));

        let outcome = csrf.validate_token(Some(""), Some("sess-1"));
        assert_eq!(outcome.error, Some(CsrfError::TokenNotProvided));
    }

    #[test]
    fn test_unknown_session() {
        let csrf = manager();
        let token = token::generate_value(32);
        let outcome = csrf.validate_token(Some(&token), Some("nobody"));
        assert!(!outcome.is_valid);
        assert_eq!(outcome.error, Some(CsrfError::SessionTokenMissing));
    }

    #[test]
    fn test_expiry_deletes_entry() {
        let csrf = manager();
        let token = csrf.generate_token(Some("sess-1"));

        // Backdate the entry beyond max_age
        let stale = now_ms() - (csrf.max_age_ms() + 2_000);
        csrf.store.insert("sess-1", token.clone(), stale);

        let outcome = csrf.validate_token(Some(&token), Some("sess-1"));
        assert!(!outcome.is_valid);
        assert_eq!(outcome.error, Some(CsrfError::TokenExpired));
        // Entry removed as a side effect
        assert!(csrf.store.get("sess-1").is_none());
    }

    #[test]
    fn test_format_only_path() {
        let csrf = manager();

        let good = token::generate_value(32);
        assert!(csrf.validate_token(Some(&good), None).is_valid);

        let short = token::generate_value(16);
        let outcome = csrf.validate_token(Some(&short), None);
        assert!(!outcome.is_valid);
        assert_eq!(outcome.error, Some(CsrfError::InvalidFormat));

        let outcome = csrf.validate_token(Some("not-hex-at-all"), None);
        assert_eq!(outcome.error, Some(CsrfError::InvalidFormat));
    }

    #[test]
    fn test_token_extraction_prefers_header_over_cookie() {
        let csrf = manager();
        let header_token = csrf.generate_token(Some("sess-1"));

        let headers = headers_with(&[
            ("X-CSRF-Token", &header_token),
            ("Cookie", "csrf_token=stale-cookie-token"),
        ]);
        let outcome = csrf.validate_request(&headers, Some("sess-1"));
        assert!(outcome.is_valid);
    }

    #[test]
    fn test_token_extraction_falls_back_to_cookie() {
        let csrf = manager();
        let token = csrf.generate_token(Some("sess-1"));

        let cookie = format!("other=1; csrf_token={}", token);
        let headers = headers_with(&[("Cookie", &cookie)]);
        let outcome = csrf.validate_request(&headers, Some("sess-1"));
        assert!(outcome.is_valid);
    }

    #[test]
    fn test_double_submit_agreement() {
        let csrf = manager();
        let token = token::generate_value(32);

        let cookie = format!("csrf_token={}", token);
        let headers = headers_with(&[("Cookie", &cookie), ("X-CSRF-Token", &token)]);
        assert!(csrf.validate_double_submit(&headers).is_valid);
    }

    #[test]
    fn test_double_submit_mismatch() {
        let csrf = manager();
        let cookie = format!("csrf_token={}", token::generate_value(32));
        let headers = headers_with(&[
            ("Cookie", &cookie),
            ("X-CSRF-Token", &token::generate_value(32)),
        ]);

        let outcome = csrf.validate_double_submit(&headers);
        assert!(!outcome.is_valid);
        assert_eq!(outcome.error, Some(CsrfError::DoubleSubmitMismatch));
    }

    #[test]
    fn test_double_submit_missing_either_side() {
        let csrf = manager();
        let token = token::generate_value(32);

        let headers = headers_with(&[("X-CSRF-Token", &token)]);
        let outcome = csrf.validate_double_submit(&headers);
        assert_eq!(outcome.error, Some(CsrfError::DoubleSubmitMissing));

        let cookie = format!("csrf_token={}", token);
        let headers = headers_with(&[("Cookie", &cookie)]);
        let outcome = csrf.validate_double_submit(&headers);
        assert_eq!(outcome.error, Some(CsrfError::DoubleSubmitMissing));
    }

    #[test]
    fn test_overwrite_invalidates_previous_token() {
        let csrf = manager();
        let first = csrf.generate_token(Some("sess-1"));
        let second = csrf.generate_token(Some("sess-1"));

        assert!(!csrf.validate_token(Some(&first), Some("sess-1")).is_valid);
        assert!(csrf.validate_token(Some(&second), Some("sess-1")).is_valid);
        assert_eq!(csrf.table_len(), 1);
    }

    #[test]
    fn test_sweep_correctness() {
        let csrf = manager();
        csrf.generate_token(Some("fresh"));
        csrf.store
            .insert("stale", "deadbeef".to_string(), now_ms() - csrf.max_age_ms() - 1_000);

        let removed = csrf.sweep();
        assert_eq!(removed, 1);
        assert!(csrf.store.get("stale").is_none());
        assert!(csrf.store.get("fresh").is_some());
    }

    #[test]
    fn test_example_scenario_16_byte_tokens() {
        let config = CsrfConfig {
            token_length: 16,
            max_age_secs: 3600,
            ..CsrfConfig::default()
        };
        let csrf = CsrfProtect::new(config).unwrap();

        let token = csrf.generate_token(Some("sess-1"));
        assert_eq!(token.len(), 32);

        let headers = headers_with(&[("X-CSRF-Token", &token)]);
        let outcome = csrf.validate_request(&headers, Some("sess-1"));
        assert!(outcome.is_valid);
        assert_eq!(outcome.token.as_deref(), Some(token.as_str()));
    }

    #[test]
    fn test_add_token_to_response() {
        let csrf = manager();
        let token = csrf.generate_token(None);

        let mut headers = HeaderMap::new();
        csrf.add_token_to_response(&mut headers, &token, Some("sess-9"));

        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with(&format!("csrf_token={}", token)));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=3600"));
        // Secure only when configured
        assert!(!cookie.contains("Secure"));

        assert_eq!(headers.get("X-CSRF-Token").unwrap().to_str().unwrap(), token);

        // Also stored server-side for the session
        assert!(csrf.validate_token(Some(&token), Some("sess-9")).is_valid);
    }

    #[test]
    fn test_secure_cookie_flag() {
        let config = CsrfConfig {
            secure: true,
            ..CsrfConfig::default()
        };
        let csrf = CsrfProtect::new(config).unwrap();
        let cookie = csrf.build_cookie("csrf_token", "abc");
        assert!(cookie.contains("; Secure"));
    }

    #[test]
    fn test_generate_form_token() {
        let csrf = manager();
        let form = csrf.generate_form_token(Some("sess-1"));
        assert_eq!(form.token.len(), 64);
        assert_eq!(form.field_name, "csrf_token");
        assert_eq!(form.header_name, "X-CSRF-Token");
        assert!(csrf.validate_token(Some(&form.token), Some("sess-1")).is_valid);
    }

    #[test]
    fn test_session_from_headers() {
        let csrf = manager();

        let headers = headers_with(&[("Cookie", "session_id=cookie-sess")]);
        assert_eq!(csrf.session_from_headers(&headers).as_deref(), Some("cookie-sess"));

        let headers = headers_with(&[("X-Session-ID", "header-sess")]);
        assert_eq!(csrf.session_from_headers(&headers).as_deref(), Some("header-sess"));

        // Cookie wins when both are present
        let headers = headers_with(&[
            ("Cookie", "session_id=cookie-sess"),
            ("X-Session-ID", "header-sess"),
        ]);
        assert_eq!(csrf.session_from_headers(&headers).as_deref(), Some("cookie-sess"));

        assert!(csrf.session_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_validation_timestamp_is_clock_reading() {
        let csrf = manager();
        let before = now_ms();
        let outcome = csrf.validate_token(None, None);
        assert!(outcome.timestamp_ms >= before);
        assert!(outcome.timestamp_ms <= now_ms());
    }

    #[test]
    fn test_error_messages_do_not_leak_tokens() {
        let csrf = manager();
        let token = csrf.generate_token(Some("sess-1"));
        let outcome = csrf.validate_token(Some("wrong"), Some("sess-1"));
        let message = outcome.error.unwrap().to_string();
        assert!(!message.contains(&token));
    }

    #[tokio::test]
    async fn test_sweeper_start_stop() {
        let config = CsrfConfig {
            sweep_interval_secs: 1,
            ..CsrfConfig::default()
        };
        let csrf = Arc::new(CsrfProtect::new(config).unwrap());
        csrf.start_sweeper();
        // Idempotent
        csrf.start_sweeper();
        csrf.stop();
        assert!(csrf.sweeper.lock().is_none());
    }

    #[tokio::test]
    async fn test_sweeper_runs_after_stop_then_start() {
        let config = CsrfConfig {
            sweep_interval_secs: 1,
            ..CsrfConfig::default()
        };
        let csrf = Arc::new(CsrfProtect::new(config).unwrap());

        // A stop with no sweeper running must not poison a later start
        csrf.stop();
        csrf.start_sweeper();

        csrf.store.insert(
            "stale",
            "deadbeef".to_string(),
            now_ms() - csrf.max_age_ms() - 1_000,
        );
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(
            csrf.store.get("stale").is_none(),
            "stale entry survived two sweep intervals"
        );
        csrf.stop();
    }

    #[test]
    fn test_huge_max_age_does_not_wrap() {
        let config = CsrfConfig {
            max_age_secs: u64::MAX,
            ..CsrfConfig::default()
        };
        let csrf = CsrfProtect::new(config).unwrap();
        assert!(csrf.max_age_ms() > 0);

        let token = csrf.generate_token(Some("sess-1"));
        assert!(csrf.validate_token(Some(&token), Some("sess-1")).is_valid);
    }
}
