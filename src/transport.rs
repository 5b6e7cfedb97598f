//! Wire transport
//!
//! A [`Transport`] sends one [`RequestDescriptor`] and reports either the
//! response (any status) or a [`RawFailure`] when no response arrived.

use std::future::Future;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::Value;
use tracing::trace;

use crate::classifier::RawFailure;
use crate::error::ClientError;
use crate::types::RequestDescriptor;

/// A response as received, before success/failure handling
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Parsed JSON body; non-JSON text is kept as a JSON string, an empty body is `None`
    pub body: Option<Value>,
}

impl RawResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn into_failure(self) -> RawFailure {
        RawFailure::Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: &RequestDescriptor) -> impl Future<Output = Result<RawResponse, RawFailure>> + Send;
}

/// [`Transport`] over a shared `reqwest::Client`
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ClientError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, RawFailure> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(transport_failure)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(transport_failure)?;
        trace!(status, bytes = text.len(), "Response received");

        Ok(RawResponse {
            status,
            headers,
            body: parse_body(&text),
        })
    }
}

/// Send with an upper bound on wall time; expiry maps to `ECONNABORTED`
pub(crate) async fn send_with_timeout<T: Transport>(
    transport: &T,
    request: &RequestDescriptor,
    timeout: Duration,
) -> Result<RawResponse, RawFailure> {
    match tokio::time::timeout(timeout, transport.send(request)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(RawFailure::Transport {
            code: Some("ECONNABORTED".to_string()),
            message: format!("timeout of {}ms exceeded", timeout.as_millis()),
        }),
    }
}

fn transport_failure(e: reqwest::Error) -> RawFailure {
    let code = if e.is_timeout() {
        "ECONNABORTED"
    } else if e.is_connect() && is_connection_refused(&e) {
        "ECONNREFUSED"
    } else {
        "ERR_NETWORK"
    };
    RawFailure::Transport {
        code: Some(code.to_string()),
        message: e.to_string(),
    }
}

/// Whether an `io::ErrorKind::ConnectionRefused` sits anywhere in the source chain
fn is_connection_refused(e: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(e);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        current = err.source();
    }
    false
}

pub(crate) fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for pipeline tests

    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    type Handler = dyn Fn(&RequestDescriptor) -> Result<RawResponse, RawFailure> + Send + Sync;

    pub struct ScriptedTransport {
        handler: Box<Handler>,
        delay: Option<Duration>,
        calls: Mutex<Vec<RequestDescriptor>>,
    }

    impl ScriptedTransport {
        pub fn new(
            handler: impl Fn(&RequestDescriptor) -> Result<RawResponse, RawFailure> + Send + Sync + 'static,
        ) -> Self {
            Self {
                handler: Box::new(handler),
                delay: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> Vec<RequestDescriptor> {
            self.calls.lock().clone()
        }

        pub fn calls_to(&self, path: &str) -> usize {
            self.calls.lock().iter().filter(|r| r.url.ends_with(path)).count()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, RawFailure> {
            self.calls.lock().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.handler)(request)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), None);
        assert_eq!(parse_body("  \n"), None);
        assert_eq!(parse_body(r#"{"a":1}"#), Some(json!({"a": 1})));
        assert_eq!(parse_body("Bad Gateway"), Some(json!("Bad Gateway")));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("error trying to connect")]
    struct ConnectError(#[source] std::io::Error);

    #[test]
    fn test_connection_refused_detection() {
        let refused = ConnectError(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert!(is_connection_refused(&refused));

        let dns = ConnectError(std::io::Error::new(std::io::ErrorKind::Other, "dns error: no such host"));
        assert!(!is_connection_refused(&dns));
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_not_refused() {
        let transport = ReqwestTransport::new().unwrap();
        let request = RequestDescriptor::new(reqwest::Method::GET, "http://nonexistent.invalid/items");
        match transport.send(&request).await {
            Err(RawFailure::Transport { code, .. }) => assert_ne!(code.as_deref(), Some("ECONNREFUSED")),
            other => panic!("expected transport failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closed_port_is_refused() {
        let transport = ReqwestTransport::new().unwrap();
        let request = RequestDescriptor::new(reqwest::Method::GET, "http://127.0.0.1:1/items");
        match transport.send(&request).await {
            Err(RawFailure::Transport { code, .. }) => assert_eq!(code.as_deref(), Some("ECONNREFUSED")),
            other => panic!("expected transport failure, got {other:?}"),
        }
    }

    #[test]
    fn test_raw_response_success_range() {
        assert!(RawResponse::new(204, None).is_success());
        assert!(!RawResponse::new(304, None).is_success());
        assert!(matches!(
            RawResponse::new(401, None).into_failure(),
            RawFailure::Response { status: 401, .. }
        ));
    }
}
