//! Calls against the remote auth server: refresh, login, logout

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::config::ClientConfig;
use crate::endpoint::resolve_url;
use crate::envelope::unwrap_envelope;
use crate::error::{ApiError, ErrorDetails, Result};
use crate::transport::{send_with_timeout, RawResponse, Transport};
use crate::types::{AuthTokens, LoginRequest, RefreshRequest, RefreshResponse, RequestDescriptor};

/// Macro to classify a non-2xx response and return it as an error
macro_rules! check_response {
    ($response:expr) => {
        if !$response.is_success() {
            return Err(classify($response.into_failure()));
        }
    };
}

/// Exchanges a refresh token for new credentials
pub trait TokenRefresher: Send + Sync + 'static {
    /// Call the refresh endpoint once. Any failure, including a response of
    /// the wrong shape, is an error.
    fn refresh(&self, refresh_token: &str) -> impl Future<Output = Result<AuthTokens>> + Send;
}

/// Auth endpoints over a [`Transport`]
pub struct HttpAuthApi<T: Transport> {
    transport: Arc<T>,
    base_url: String,
    refresh_path: String,
    login_path: String,
    logout_path: String,
    timeout: Duration,
}

impl<T: Transport> HttpAuthApi<T> {
    pub fn new(transport: Arc<T>, config: &ClientConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            refresh_path: config.refresh_path.clone(),
            login_path: config.login_path.clone(),
            logout_path: config.logout_path.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn refresh_url(&self) -> String {
        resolve_url(&self.base_url, &self.refresh_path)
    }

    /// Post credentials to the login endpoint. Accepts the tokens enveloped
    /// or bare.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthTokens> {
        let body = to_body(request)?;
        let url = resolve_url(&self.base_url, &self.login_path);
        let response = self.post(url, Some(body), None).await?;
        check_response!(response);

        let body = response.body.unwrap_or(Value::Null);
        let tokens = unwrap_envelope(body)
            .decode::<AuthTokens>()
            .map_err(|e| {
                ApiError::authentication(
                    ErrorDetails::new("Login response did not contain tokens")
                        .with_original(e.message().to_string()),
                )
            })?
            .data;

        if tokens.access_token.is_empty() {
            return Err(ApiError::authentication(ErrorDetails::new(
                "Login response did not contain tokens",
            )));
        }
        info!(email = %request.email_address, "Logged in");
        Ok(tokens)
    }

    /// Tell the server the session is over
    pub async fn logout(&self, access_token: Option<&str>) -> Result<()> {
        let url = resolve_url(&self.base_url, &self.logout_path);
        let response = self.post(url, None, access_token).await?;
        check_response!(response);
        debug!("Logout acknowledged");
        Ok(())
    }

    async fn post(&self, url: String, body: Option<Value>, bearer: Option<&str>) -> Result<RawResponse> {
        let mut request = RequestDescriptor::new(Method::POST, url);
        request.requires_auth = false;
        request.body = body;
        request.headers = json_headers();
        if let Some(token) = bearer {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                request.headers.insert(AUTHORIZATION, value);
            }
        }

        send_with_timeout(self.transport.as_ref(), &request, self.timeout)
            .await
            .map_err(classify)
    }
}

impl<T: Transport> TokenRefresher for HttpAuthApi<T> {
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens> {
        let body = to_body(&RefreshRequest {
            refresh_token: refresh_token.to_string(),
        })?;
        let response = self.post(self.refresh_url(), Some(body), None).await?;
        check_response!(response);

        let parsed = response
            .body
            .map(serde_json::from_value::<RefreshResponse>)
            .and_then(|parsed| parsed.ok())
            .filter(|parsed| !parsed.access_token.is_empty());

        match parsed {
            Some(parsed) => Ok(parsed.into()),
            None => {
                warn!("Refresh response did not contain an access token");
                Err(ApiError::authentication(ErrorDetails::new(
                    "Authentication failed - token refresh did not return a new token",
                )))
            }
        }
    }
}

pub(crate) fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

pub(crate) fn to_body<B: serde::Serialize>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| {
        ApiError::unknown(ErrorDetails::new("Failed to encode request body").with_original(e.to_string()))
    })
}

/// Refresh failure surfaced to callers without a usable refresh token
pub(crate) fn missing_refresh_token() -> ApiError {
    ApiError::authentication(ErrorDetails::new(
        "Authentication failed - no refresh token available",
    ))
}
