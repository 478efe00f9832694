//! Configuration for the Bridge API server

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// CSRF protection configuration
    #[serde(default)]
    pub csrf: CsrfConfig,

    /// Maximum number of web-vitals reports retained in memory
    #[serde(default = "default_vitals_capacity")]
    pub vitals_capacity: usize,

    /// Log level filter string.
    /// Set via config file, BRIDGE_LOG_LEVEL env var. Overridden by RUST_LOG.
    /// Default: "bridge_api=debug,tower_http=debug"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// CSRF protection configuration.
///
/// Invariants checked by [`CsrfConfig::validate`]: `token_length` and
/// `max_age_secs` must be positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfConfig {
    /// Random token length in bytes (hex encoding doubles this on the wire)
    #[serde(default = "default_token_length")]
    pub token_length: usize,

    /// Cookie carrying the CSRF token
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Request/response header carrying the CSRF token
    #[serde(default = "default_header_name")]
    pub header_name: String,

    /// Form field name for server-rendered forms
    #[serde(default = "default_field_name")]
    pub field_name: String,

    /// Cookie consulted for the session identifier
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,

    /// Header consulted for the session identifier
    #[serde(default = "default_session_header")]
    pub session_header: String,

    /// Set the Secure attribute on the token cookie (production deployments)
    #[serde(default)]
    pub secure: bool,

    /// SameSite attribute on the token cookie
    #[serde(default = "default_same_site")]
    pub same_site: SameSite,

    /// Token lifetime in seconds
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,

    /// Interval between expired-entry sweeps of the token table, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

/// Cookie SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

// Default value functions for serde
fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_vitals_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "bridge_api=debug,tower_http=debug".to_string()
}

fn default_token_length() -> usize {
    32
}

fn default_cookie_name() -> String {
    "csrf_token".to_string()
}

fn default_header_name() -> String {
    "X-CSRF-Token".to_string()
}

fn default_field_name() -> String {
    "csrf_token".to_string()
}

fn default_session_cookie() -> String {
    "session_id".to_string()
}

fn default_session_header() -> String {
    "X-Session-ID".to_string()
}

fn default_same_site() -> SameSite {
    SameSite::Strict
}

fn default_max_age() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            token_length: default_token_length(),
            cookie_name: default_cookie_name(),
            header_name: default_header_name(),
            field_name: default_field_name(),
            session_cookie: default_session_cookie(),
            session_header: default_session_header(),
            secure: false,
            same_site: default_same_site(),
            max_age_secs: default_max_age(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl CsrfConfig {
    /// Check construction-time invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_length == 0 {
            return Err(ConfigError::Invalid(
                "csrf.token_length must be positive".to_string(),
            ));
        }
        if self.max_age_secs == 0 {
            return Err(ConfigError::Invalid(
                "csrf.max_age_secs must be positive".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "csrf.sweep_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            csrf: CsrfConfig::default(),
            vitals_capacity: default_vitals_capacity(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.csrf.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BRIDGE_LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse() {
                config.listen_addr = parsed;
            }
        }

        if let Ok(len) = std::env::var("BRIDGE_CSRF_TOKEN_LENGTH") {
            if let Ok(parsed) = len.parse() {
                config.csrf.token_length = parsed;
            }
        }

        if let Ok(age) = std::env::var("BRIDGE_CSRF_MAX_AGE") {
            if let Ok(parsed) = age.parse() {
                config.csrf.max_age_secs = parsed;
            }
        }

        if let Ok(secure) = std::env::var("BRIDGE_CSRF_SECURE") {
            config.csrf.secure = secure == "true" || secure == "1";
        }

        if let Ok(capacity) = std::env::var("BRIDGE_VITALS_CAPACITY") {
            if let Ok(parsed) = capacity.parse() {
                config.vitals_capacity = parsed;
            }
        }

        // Log level (runtime operational)
        if let Ok(level) = std::env::var("BRIDGE_LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Load configuration from file if it exists, otherwise from environment
    pub fn load() -> Self {
        // Try config file first
        if let Ok(path) = std::env::var("BRIDGE_CONFIG") {
            if let Ok(config) = Self::from_file(&path) {
                return config;
            }
        }

        // Try default config file locations
        for path in &["bridge_api.toml", "/etc/bridge_api/config.toml"] {
            if std::path::Path::new(path).exists() {
                if let Ok(config) = Self::from_file(path) {
                    return config;
                }
            }
        }

        // Fall back to environment variables
        Self::from_env()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
