//! Request and response interceptors
//!
//! [`RequestInterceptor`] runs once per outgoing request (original or
//! replay). It never fails: a missing credential or a broken session store
//! just means the header is not added. [`ResponseInterceptor`] turns a
//! received response into a payload or a classified error.

use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tracing::{debug, warn};

use crate::classifier::{classify, RawFailure};
use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::envelope::{unwrap_envelope, Payload};
use crate::error::ApiError;
use crate::token_store::{KeyValueStorage, TokenStore};
use crate::transport::RawResponse;
use crate::types::RequestDescriptor;

#[derive(Clone)]
pub struct RequestInterceptor {
    tokens: TokenStore,
    session_storage: Option<Arc<dyn KeyValueStorage>>,
    clock: Arc<dyn Clock>,
    bypass_auth: bool,
    session_header: Option<HeaderName>,
    session_key: String,
}

impl RequestInterceptor {
    pub fn new(tokens: TokenStore, config: &ClientConfig) -> Self {
        let session_header = match HeaderName::from_bytes(config.session_header.as_bytes()) {
            Ok(name) => Some(name),
            Err(_) => {
                warn!(header = %config.session_header, "Invalid session header name, session id disabled");
                None
            }
        };

        Self {
            clock: Arc::clone(tokens.clock()),
            tokens,
            session_storage: None,
            bypass_auth: config.bypass_auth,
            session_header,
            session_key: config.session_key.clone(),
        }
    }

    /// Storage the session id is read from
    pub fn with_session_storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.session_storage = Some(storage);
        self
    }

    /// Stamp the start time, attach the bearer token and the session id
    pub fn apply(&self, mut request: RequestDescriptor) -> RequestDescriptor {
        request.started_at_ms = Some(self.clock.now_millis());

        if request.requires_auth && !self.bypass_auth {
            self.attach_bearer(&mut request);
        }

        if let Some(session_id) = self.session_id() {
            if let (Some(name), Ok(value)) = (&self.session_header, HeaderValue::from_str(&session_id)) {
                request.headers.insert(name.clone(), value);
            }
        }

        request
    }

    fn attach_bearer(&self, request: &mut RequestDescriptor) {
        if !self.tokens.is_valid() {
            debug!(url = %request.url, "No valid access token, sending without credentials");
            return;
        }
        let Some(token) = self.tokens.access_token() else {
            return;
        };
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                request.headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("Stored access token is not a valid header value"),
        }
    }

    fn session_id(&self) -> Option<String> {
        let storage = self.session_storage.as_ref()?;
        match storage.get_item(&self.session_key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = %self.session_key, error = %e, "Failed to read session id");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseInterceptor;

impl ResponseInterceptor {
    /// Payload of a 2xx response, unwrapped from its envelope when asked
    pub fn on_success(&self, response: RawResponse, unwrap: bool) -> Payload<Value> {
        let body = response.body.unwrap_or(Value::Null);
        if unwrap {
            unwrap_envelope(body)
        } else {
            Payload::new(body)
        }
    }

    pub fn on_failure(&self, failure: RawFailure) -> ApiError {
        classify(failure)
    }
}
