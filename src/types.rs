//! Type definitions for credentials, requests and auth payloads

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Access/refresh credentials as held by the token store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at_ms: Option<i64>,
}

impl Credentials {
    /// Build credentials from a token response received at `now_ms`
    pub fn from_tokens(tokens: &AuthTokens, now_ms: i64) -> Self {
        Self {
            access_token: Some(tokens.access_token.clone()),
            refresh_token: tokens.refresh_token.clone(),
            expires_at_ms: tokens.expires_in.map(|secs| expires_at(now_ms, secs)),
        }
    }

    /// An access token is present and not past its recorded expiry
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        match (&self.access_token, self.expires_at_ms) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(expires_at)) => now_ms < expires_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.expires_at_ms.is_none()
    }
}

/// Epoch milliseconds `expires_in_secs` after `now_ms`
pub fn expires_at(now_ms: i64, expires_in_secs: u64) -> i64 {
    now_ms.saturating_add(i64::try_from(expires_in_secs).unwrap_or(i64::MAX).saturating_mul(1000))
}

/// A single outgoing request as it moves through the pipeline
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Fully resolved URL
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub requires_auth: bool,
    /// 0 for the original call, 1 for its single replay
    pub retry_count: u8,
    /// Epoch ms stamped by the request interceptor
    pub started_at_ms: Option<i64>,
    pub timeout: Option<Duration>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            requires_auth: true,
            retry_count: 0,
            started_at_ms: None,
            timeout: None,
        }
    }

    /// Bearer token currently attached, if any
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
    }

    /// Copy for the single replay after a refresh: bumps `retry_count` and
    /// drops the stale `Authorization` header.
    pub fn for_replay(&self) -> Self {
        let mut replay = self.clone();
        replay.retry_count = self.retry_count.saturating_add(1);
        replay.headers.remove(AUTHORIZATION);
        replay.started_at_ms = None;
        replay
    }
}

/// Caller-facing options for [`crate::HttpClient::request`]
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub requires_auth: bool,
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
    pub path_params: Vec<(String, String)>,
    /// Merge with identical in-flight GETs; `None` defers to the client config
    pub deduplicate: Option<bool>,
    /// Unwrap `{status|success, data, metadata}` envelopes
    pub unwrap_envelope: bool,
    pub cancel: Option<CancellationToken>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            requires_auth: true,
            timeout: None,
            headers: Vec::new(),
            path_params: Vec::new(),
            deduplicate: None,
            unwrap_envelope: true,
            cancel: None,
        }
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post(body: Value) -> Self {
        Self::new(Method::POST).body(body)
    }

    pub fn put(body: Value) -> Self {
        Self::new(Method::PUT).body(body)
    }

    pub fn patch(body: Value) -> Self {
        Self::new(Method::PATCH).body(body)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send without credentials
    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace `:name` in the endpoint with the URL-encoded value
    pub fn path_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.path_params.push((name.into(), value.to_string()));
        self
    }

    pub fn deduplicate(mut self, enabled: bool) -> Self {
        self.deduplicate = Some(enabled);
        self
    }

    /// Return the body as received, without envelope unwrapping
    pub fn raw(mut self) -> Self {
        self.unwrap_envelope = false;
        self
    }

    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Extra headers as a map; entries that are not valid header names or
    /// values are skipped.
    pub(crate) fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                map.insert(name, value);
            }
        }
        map
    }
}

/// Body of `POST /api/auth/token/refresh`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Successful refresh response; any other shape is a refresh failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Login credentials posted to the auth server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email_address: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember_me: Option<bool>,
}

impl LoginRequest {
    pub fn new(email_address: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            password: password.into(),
            remember_me: None,
        }
    }
}

/// Tokens issued by login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl From<RefreshResponse> for AuthTokens {
    fn from(response: RefreshResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
            token_type: None,
        }
    }
}
