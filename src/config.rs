//! Client configuration

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ClientError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/token/refresh";
pub const DEFAULT_LOGIN_PATH: &str = "/api/auth/login";
pub const DEFAULT_LOGOUT_PATH: &str = "/api/auth/logout";
pub const DEFAULT_SESSION_HEADER: &str = "X-Session-ID";
pub const DEFAULT_SESSION_KEY: &str = "sessionId";

/// Settings for [`crate::HttpClient`]
///
/// Deserializable so it can be loaded from a config file; missing fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per-request timeout applied when the caller sets none
    pub timeout_ms: u64,
    /// Development switch: never attach credentials and never refresh
    pub bypass_auth: bool,
    pub refresh_path: String,
    pub login_path: String,
    pub logout_path: String,
    /// Header carrying the session id when one is stored
    pub session_header: String,
    /// Storage key the session id is read from
    pub session_key: String,
    /// Merge identical concurrent GETs into one network call
    pub deduplicate_gets: bool,
    /// Headers added to every request
    pub default_headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            bypass_auth: false,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            logout_path: DEFAULT_LOGOUT_PATH.to_string(),
            session_header: DEFAULT_SESSION_HEADER.to_string(),
            session_key: DEFAULT_SESSION_KEY.to_string(),
            deduplicate_gets: true,
            default_headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn with_bypass_auth(mut self, bypass: bool) -> Self {
        self.bypass_auth = bypass;
        self
    }

    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_deduplication(mut self, enabled: bool) -> Self {
        self.deduplicate_gets = enabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(ClientError::Configuration("base_url is empty".to_string()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ClientError::Configuration(format!(
                "base_url must start with http:// or https://, got {base}"
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::Configuration("timeout_ms must be positive".to_string()));
        }
        for (name, path) in [
            ("refresh_path", &self.refresh_path),
            ("login_path", &self.login_path),
            ("logout_path", &self.logout_path),
        ] {
            if !path.starts_with('/') {
                return Err(ClientError::Configuration(format!(
                    "{name} must start with '/', got {path:?}"
                )));
            }
        }
        Ok(())
    }
}
