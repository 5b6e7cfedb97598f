//! Authenticated HTTP client
//!
//! Every request runs the same pipeline: request interceptor, transport,
//! response interceptor. An authentication failure on a first attempt is
//! handed to the [`RefreshCoordinator`], which either yields a descriptor to
//! replay once or the terminal error.

use std::sync::Arc;

use async_singleflight::Group;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth_client::{json_headers, to_body, HttpAuthApi};
use crate::classifier::RawFailure;
use crate::config::ClientConfig;
use crate::endpoint::{replace_path_params, resolve_url};
use crate::envelope::Payload;
use crate::error::{ApiError, ClientError, Result};
use crate::interceptor::{RequestInterceptor, ResponseInterceptor};
use crate::refresh::RefreshCoordinator;
use crate::token_store::{KeyValueStorage, TokenStore};
use crate::transport::{send_with_timeout, RawResponse, ReqwestTransport, Transport};
use crate::types::{AuthTokens, Credentials, LoginRequest, RequestDescriptor, RequestOptions};

pub struct HttpClient<T: Transport = ReqwestTransport> {
    config: ClientConfig,
    transport: Arc<T>,
    tokens: TokenStore,
    default_headers: HeaderMap,
    request_interceptor: RequestInterceptor,
    response_interceptor: ResponseInterceptor,
    auth_api: Arc<HttpAuthApi<T>>,
    refresh: RefreshCoordinator<HttpAuthApi<T>>,
    /// Singleflight group merging identical concurrent GETs
    in_flight: Group<Payload<Value>, ApiError>,
}

impl HttpClient<ReqwestTransport> {
    /// Create a client over a fresh `reqwest` transport
    pub fn new(config: ClientConfig, tokens: TokenStore) -> std::result::Result<Self, ClientError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Self::with_transport(config, tokens, transport)
    }
}

impl<T: Transport> HttpClient<T> {
    pub fn with_transport(
        config: ClientConfig,
        tokens: TokenStore,
        transport: Arc<T>,
    ) -> std::result::Result<Self, ClientError> {
        config.validate()?;
        let default_headers = build_default_headers(&config)?;

        let auth_api = Arc::new(HttpAuthApi::new(Arc::clone(&transport), &config));
        let refresh = RefreshCoordinator::new(Arc::clone(&auth_api), tokens.clone(), config.refresh_path.clone());
        let request_interceptor = RequestInterceptor::new(tokens.clone(), &config);

        if config.bypass_auth {
            warn!("Authentication bypass enabled, requests are sent without credentials");
        }
        info!(
            base_url = %config.base_url,
            timeout_ms = config.timeout_ms,
            deduplicate_gets = config.deduplicate_gets,
            "HTTP client created"
        );

        Ok(Self {
            config,
            transport,
            tokens,
            default_headers,
            request_interceptor,
            response_interceptor: ResponseInterceptor,
            auth_api,
            refresh,
            in_flight: Group::new(),
        })
    }

    /// Read the session id header value from `storage`
    pub fn with_session_storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.request_interceptor = self.request_interceptor.with_session_storage(storage);
        self
    }

    /// Register a callback for when a refresh fails and credentials are cleared
    pub fn on_session_expired(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.refresh.set_session_expired_hook(Arc::new(hook));
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the token store (for advanced usage)
    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_valid()
    }

    /// Send a request and decode the (unwrapped) payload into `R`
    pub async fn request<R: DeserializeOwned>(&self, endpoint: &str, options: RequestOptions) -> Result<R> {
        Ok(self.request_with_metadata(endpoint, options).await?.data)
    }

    /// Like [`Self::request`], keeping the envelope metadata
    pub async fn request_with_metadata<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Payload<R>> {
        self.request_raw(endpoint, options).await?.decode()
    }

    /// Send a request and return the payload as JSON
    pub async fn request_raw(&self, endpoint: &str, options: RequestOptions) -> Result<Payload<Value>> {
        let endpoint = replace_path_params(endpoint, &options.path_params);
        let url = resolve_url(&self.config.base_url, &endpoint);
        let request = self.build_descriptor(url, &options);
        let deduplicate = self.should_deduplicate(&options);
        let unwrap = options.unwrap_envelope;

        let pipeline = async move {
            if deduplicate {
                self.execute_deduplicated(request, unwrap).await
            } else {
                self.execute(request, unwrap).await
            }
        };

        match options.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(endpoint = %endpoint, "Request canceled by caller");
                        Err(self.response_interceptor.on_failure(RawFailure::Canceled {
                            reason: Some("canceled by caller".to_string()),
                        }))
                    }
                    result = pipeline => result,
                }
            }
            None => pipeline.await,
        }
    }

    pub async fn get<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R> {
        self.request(endpoint, RequestOptions::get()).await
    }

    pub async fn post<B: Serialize, R: DeserializeOwned>(&self, endpoint: &str, body: &B) -> Result<R> {
        self.request(endpoint, RequestOptions::post(to_body(body)?)).await
    }

    pub async fn put<B: Serialize, R: DeserializeOwned>(&self, endpoint: &str, body: &B) -> Result<R> {
        self.request(endpoint, RequestOptions::put(to_body(body)?)).await
    }

    pub async fn patch<B: Serialize, R: DeserializeOwned>(&self, endpoint: &str, body: &B) -> Result<R> {
        self.request(endpoint, RequestOptions::patch(to_body(body)?)).await
    }

    pub async fn delete<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R> {
        self.request(endpoint, RequestOptions::delete()).await
    }

    /// Log in and store the issued credentials
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthTokens> {
        let tokens = self.auth_api.login(request).await?;
        let credentials = Credentials::from_tokens(&tokens, self.tokens.clock().now_millis());
        self.tokens.store_credentials(&credentials);
        Ok(tokens)
    }

    /// Notify the server and clear credentials. Credentials are cleared even
    /// when the server call fails.
    pub async fn logout(&self) {
        let access_token = self.tokens.access_token();
        if let Err(e) = self.auth_api.logout(access_token.as_deref()).await {
            warn!(error = %e, "Logout request failed, clearing credentials anyway");
        }
        self.tokens.clear_all();
    }

    fn build_descriptor(&self, url: String, options: &RequestOptions) -> RequestDescriptor {
        let mut request = RequestDescriptor::new(options.method.clone(), url);
        request.headers = self.default_headers.clone();
        for (name, value) in options.header_map() {
            if let Some(name) = name {
                request.headers.insert(name, value);
            }
        }
        request.body = options.body.clone();
        request.requires_auth = options.requires_auth;
        request.timeout = options.timeout;
        request
    }

    fn should_deduplicate(&self, options: &RequestOptions) -> bool {
        options.method == Method::GET
            && options.cancel.is_none()
            && options.deduplicate.unwrap_or(self.config.deduplicate_gets)
    }

    async fn execute_deduplicated(&self, request: RequestDescriptor, unwrap: bool) -> Result<Payload<Value>> {
        let key = dedup_key(&request, unwrap);
        let (value, error, leader) = self.in_flight.work(&key, self.execute(request.clone(), unwrap)).await;
        match (value, error) {
            (Some(payload), _) => {
                if !leader {
                    debug!(key = %key, "Shared in-flight response");
                }
                Ok(payload)
            }
            (None, Some(e)) => Err(e),
            // the leader failed without sharing its error
            (None, None) => self.execute(request, unwrap).await,
        }
    }

    /// Run one request through the pipeline, replaying it at most once after
    /// a successful refresh.
    async fn execute(&self, request: RequestDescriptor, unwrap: bool) -> Result<Payload<Value>> {
        let (sent, outcome) = self.attempt(request).await;
        let error = match outcome {
            Ok(response) => return Ok(self.response_interceptor.on_success(response, unwrap)),
            Err(error) => error,
        };

        if self.config.bypass_auth {
            return Err(error);
        }
        let replay = self.refresh.recover(&sent, error).await?;

        let (_, outcome) = self.attempt(replay).await;
        outcome.map(|response| self.response_interceptor.on_success(response, unwrap))
    }

    async fn attempt(&self, request: RequestDescriptor) -> (RequestDescriptor, Result<RawResponse>) {
        let request = self.request_interceptor.apply(request);
        let timeout = request.timeout.unwrap_or_else(|| self.config.timeout());

        let outcome = send_with_timeout(self.transport.as_ref(), &request, timeout).await;
        let elapsed_ms = request
            .started_at_ms
            .map_or(0, |started| self.tokens.clock().now_millis() - started);

        let outcome = match outcome {
            Ok(response) if response.is_success() => {
                debug!(
                    method = %request.method,
                    url = %request.url,
                    status = response.status,
                    elapsed_ms,
                    retry_count = request.retry_count,
                    "Request completed"
                );
                Ok(response)
            }
            Ok(response) => Err(self.response_interceptor.on_failure(response.into_failure())),
            Err(failure) => Err(self.response_interceptor.on_failure(failure)),
        };

        if let Err(e) = &outcome {
            warn!(
                method = %request.method,
                url = %request.url,
                status = e.status().unwrap_or_default(),
                code = e.code().unwrap_or_default(),
                elapsed_ms,
                retry_count = request.retry_count,
                "Request failed"
            );
        }
        (request, outcome)
    }
}

/// Requests share a response only when they would be sent identically
fn dedup_key(request: &RequestDescriptor, unwrap: bool) -> String {
    let mut headers: Vec<String> = request
        .headers
        .iter()
        .map(|(name, value)| format!("{}={}", name, String::from_utf8_lossy(value.as_bytes())))
        .collect();
    headers.sort();
    format!(
        "{}:{}:{}:auth={}:{}",
        request.method,
        request.url,
        unwrap,
        request.requires_auth,
        headers.join("&")
    )
}

fn build_default_headers(config: &ClientConfig) -> std::result::Result<HeaderMap, ClientError> {
    let mut headers = json_headers();
    for (name, value) in &config.default_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClientError::Configuration(format!("invalid default header name {name:?}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ClientError::Configuration(format!("invalid value for default header {name}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use reqwest::header::AUTHORIZATION;
    use serde::Deserialize;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::clock::MockClock;
    use crate::error::ApiErrorKind;
    use crate::token_store::{MemoryStorage, TokenKind};
    use crate::transport::testing::ScriptedTransport;

    const REFRESH: &str = "/api/auth/token/refresh";
    const NOW: i64 = 1_700_000_000_000;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    fn client_with(
        config: ClientConfig,
        transport: ScriptedTransport,
    ) -> (HttpClient<ScriptedTransport>, Arc<ScriptedTransport>, TokenStore) {
        let tokens = TokenStore::new(Arc::new(MemoryStorage::new()), Arc::new(MockClock::new(NOW)));
        let transport = Arc::new(transport);
        let client = HttpClient::with_transport(config, tokens.clone(), Arc::clone(&transport)).unwrap();
        (client, transport, tokens)
    }

    fn client(transport: ScriptedTransport) -> (HttpClient<ScriptedTransport>, Arc<ScriptedTransport>, TokenStore) {
        client_with(ClientConfig::new("http://api"), transport)
    }

    fn expired_session(tokens: &TokenStore) {
        tokens.set(TokenKind::AccessToken, "expired-token");
        tokens.set(TokenKind::RefreshToken, "refresh-1");
        tokens.set_expires_at_ms(NOW - 1);
    }

    /// Accepts only `new-token`; the refresh endpoint issues it
    fn rotating_server(request: &RequestDescriptor) -> std::result::Result<RawResponse, RawFailure> {
        if request.url.ends_with(REFRESH) {
            return Ok(RawResponse::new(
                200,
                Some(json!({"accessToken": "new-token", "expiresIn": 3600})),
            ));
        }
        match request.bearer_token() {
            Some("new-token") => Ok(RawResponse::new(200, Some(json!({"status": 200, "data": {"id": 1}})))),
            _ => Ok(RawResponse::new(401, Some(json!({"message": "Token expired"})))),
        }
    }

    #[tokio::test]
    async fn test_concurrent_401s_refresh_once_and_replay() {
        let (client, transport, tokens) =
            client(ScriptedTransport::new(rotating_server).with_delay(Duration::from_millis(20)));
        expired_session(&tokens);

        let (a, b) = tokio::join!(client.get::<Item>("/items/a"), client.get::<Item>("/items/b"));

        assert_eq!(a.unwrap(), Item { id: 1 });
        assert_eq!(b.unwrap(), Item { id: 1 });
        assert_eq!(transport.calls_to(REFRESH), 1);
        assert_eq!(transport.calls_to("/items/a"), 2);
        assert_eq!(transport.calls_to("/items/b"), 2);
        assert_eq!(tokens.access_token().as_deref(), Some("new-token"));
        assert_eq!(tokens.expires_at_ms(), Some(NOW + 3_600_000));
    }

    #[tokio::test]
    async fn test_replayed_401_is_terminal() {
        let (client, transport, tokens) = client(ScriptedTransport::new(|request| {
            if request.url.ends_with(REFRESH) {
                Ok(RawResponse::new(200, Some(json!({"accessToken": "new-token"}))))
            } else {
                Ok(RawResponse::new(401, None))
            }
        }));
        expired_session(&tokens);

        let err = client.get::<Value>("/items").await.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::Authentication);
        assert_eq!(transport.calls_to(REFRESH), 1);
        assert_eq!(transport.calls_to("/items"), 2);

        let replay = &transport.calls()[2];
        assert_eq!(replay.retry_count, 1);
        assert_eq!(replay.bearer_token(), Some("new-token"));
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_session() {
        let (client, transport, tokens) = client(
            ScriptedTransport::new(|request| {
                if request.url.ends_with(REFRESH) {
                    Ok(RawResponse::new(500, None))
                } else {
                    Ok(RawResponse::new(401, None))
                }
            })
            .with_delay(Duration::from_millis(10)),
        );
        expired_session(&tokens);
        let ended = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ended);
        client.on_session_expired(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let (a, b) = tokio::join!(client.get::<Value>("/a"), client.get::<Value>("/b"));

        for result in [a, b] {
            assert_eq!(result.unwrap_err().kind(), ApiErrorKind::Authentication);
        }
        assert_eq!(transport.calls_to(REFRESH), 1);
        assert_eq!(ended.load(Ordering::SeqCst), 1);
        assert!(tokens.credentials().is_empty());
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_non_401_errors_skip_refresh() {
        let (client, transport, tokens) = client(ScriptedTransport::new(|request| {
            let status = if request.url.ends_with("/forbidden") { 403 } else { 503 };
            Ok(RawResponse::new(status, Some(json!({"error": "nope"}))))
        }));
        expired_session(&tokens);

        let err = client.get::<Value>("/forbidden").await.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::Authorization);
        assert_eq!(err.message(), "nope");

        let err = client.get::<Value>("/down").await.unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 503, .. }));
        assert_eq!(transport.calls_to(REFRESH), 0);
    }

    #[tokio::test]
    async fn test_valid_token_is_attached() {
        let (client, transport, tokens) = client(ScriptedTransport::new(rotating_server));
        tokens.set(TokenKind::AccessToken, "new-token");
        assert!(client.is_authenticated());

        let item: Item = client.get("/items/1").await.unwrap();
        assert_eq!(item, Item { id: 1 });

        let sent = &transport.calls()[0];
        assert_eq!(sent.headers.get(AUTHORIZATION).unwrap(), "Bearer new-token");
        assert_eq!(sent.headers.get("accept").unwrap(), "application/json");
        assert_eq!(sent.started_at_ms, Some(NOW));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let (client, transport, _) =
            client(ScriptedTransport::new(rotating_server).with_delay(Duration::from_millis(500)));

        let options = RequestOptions::get().timeout(Duration::from_millis(20));
        let err = client.request::<Value>("/slow", options).await.unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::Network);
        assert_eq!(err.message(), "Request timed out");
        assert_eq!(transport.calls_to(REFRESH), 0);
    }

    #[tokio::test]
    async fn test_cancel_is_canceled_error() {
        let (client, _, _) = client(ScriptedTransport::new(rotating_server).with_delay(Duration::from_millis(500)));

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = client
            .request::<Value>("/slow", RequestOptions::get().cancel_with(token))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::Canceled);
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_identical_gets_are_deduplicated() {
        let (client, transport, _) = client(
            ScriptedTransport::new(|_| Ok(RawResponse::new(200, Some(json!({"id": 3})))))
                .with_delay(Duration::from_millis(20)),
        );

        let (a, b) = tokio::join!(client.get::<Item>("/items/3"), client.get::<Item>("/items/3"));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(transport.calls().len(), 1);

        let body = json!({"id": 3});
        let (a, b) = tokio::join!(
            client.post::<_, Item>("/items", &body),
            client.post::<_, Item>("/items", &body)
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_public_and_authenticated_gets_are_not_merged() {
        let (client, transport, tokens) = client(
            ScriptedTransport::new(|request| match request.bearer_token() {
                Some("new-token") => Ok(RawResponse::new(200, Some(json!({"authed": true})))),
                _ => Ok(RawResponse::new(200, Some(json!({"authed": false})))),
            })
            .with_delay(Duration::from_millis(20)),
        );
        tokens.set(TokenKind::AccessToken, "new-token");

        let (authed, public) = tokio::join!(
            client.request::<Value>("/profile", RequestOptions::get()),
            client.request::<Value>("/profile", RequestOptions::get().public())
        );
        assert_eq!(authed.unwrap(), json!({"authed": true}));
        assert_eq!(public.unwrap(), json!({"authed": false}));
        assert_eq!(transport.calls_to("/profile"), 2);
    }

    #[tokio::test]
    async fn test_gets_with_different_headers_are_not_merged() {
        let (client, transport, _) = client(
            ScriptedTransport::new(|_| Ok(RawResponse::new(200, Some(json!({"id": 3})))))
                .with_delay(Duration::from_millis(20)),
        );

        let (a, b, c) = tokio::join!(
            client.request::<Item>("/items/3", RequestOptions::get().header("X-Tenant", "one")),
            client.request::<Item>("/items/3", RequestOptions::get().header("X-Tenant", "other")),
            client.request::<Item>("/items/3", RequestOptions::get().header("X-Tenant", "one"))
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_deduplication_can_be_disabled() {
        let (client, transport, _) = client_with(
            ClientConfig::new("http://api").with_deduplication(false),
            ScriptedTransport::new(|_| Ok(RawResponse::new(200, Some(json!({"id": 3})))))
                .with_delay(Duration::from_millis(20)),
        );

        let (a, b) = tokio::join!(client.get::<Item>("/items/3"), client.get::<Item>("/items/3"));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_metadata_raw_and_path_params() {
        let (client, transport, _) = client(ScriptedTransport::new(|_| {
            Ok(RawResponse::new(
                200,
                Some(json!({"success": true, "data": [1, 2], "metadata": {"total": 2}})),
            ))
        }));

        let page = client
            .request_with_metadata::<Vec<u32>>("/exams/:examId/questions", RequestOptions::get().path_param("examId", "a b"))
            .await
            .unwrap();
        assert_eq!(page.data, vec![1, 2]);
        assert_eq!(page.metadata, Some(json!({"total": 2})));
        assert_eq!(transport.calls()[0].url, "http://api/exams/a%20b/questions");

        let raw: Value = client.request("/exams", RequestOptions::get().raw()).await.unwrap();
        assert_eq!(raw["metadata"]["total"], 2);
    }

    #[tokio::test]
    async fn test_bypass_auth_surfaces_401() {
        let (client, transport, tokens) = client_with(
            ClientConfig::new("http://api").with_bypass_auth(true),
            ScriptedTransport::new(rotating_server),
        );
        tokens.set(TokenKind::AccessToken, "new-token");
        tokens.set(TokenKind::RefreshToken, "refresh-1");

        let err = client.get::<Value>("/items").await.unwrap_err();
        assert_eq!(err.kind(), ApiErrorKind::Authentication);
        assert!(transport.calls()[0].bearer_token().is_none());
        assert_eq!(transport.calls_to(REFRESH), 0);
    }

    #[tokio::test]
    async fn test_default_and_extra_headers() {
        let (client, transport, _) = client_with(
            ClientConfig::new("http://api").with_default_header("X-Client", "authflow"),
            ScriptedTransport::new(|_| Ok(RawResponse::new(204, None))),
        );

        let options = RequestOptions::delete().header("X-Request-ID", "r-1").public();
        let value: Value = client.request("/items/1", options).await.unwrap();
        assert_eq!(value, Value::Null);

        let sent = &transport.calls()[0];
        assert_eq!(sent.headers.get("x-client").unwrap(), "authflow");
        assert_eq!(sent.headers.get("x-request-id").unwrap(), "r-1");
        assert_eq!(sent.method, Method::DELETE);
    }

    #[tokio::test]
    async fn test_invalid_default_header_is_rejected() {
        let tokens = TokenStore::in_memory();
        let transport = Arc::new(ScriptedTransport::new(rotating_server));
        let config = ClientConfig::new("http://api").with_default_header("bad header", "x");
        assert!(matches!(
            HttpClient::with_transport(config, tokens, transport),
            Err(ClientError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let (client, transport, tokens) = client(ScriptedTransport::new(|request| {
            if request.url.ends_with("/api/auth/login") {
                Ok(RawResponse::new(
                    200,
                    Some(json!({"accessToken": "a", "refreshToken": "r", "expiresIn": 60, "tokenType": "Bearer"})),
                ))
            } else {
                Ok(RawResponse::new(500, None))
            }
        }));

        client.login(&LoginRequest::new("a@b.c", "pw")).await.unwrap();
        assert!(client.is_authenticated());
        assert_eq!(tokens.expires_at_ms(), Some(NOW + 60_000));
        assert!(transport.calls()[0].bearer_token().is_none());

        client.logout().await;
        assert_eq!(transport.calls()[1].bearer_token(), Some("a"));
        assert!(tokens.credentials().is_empty());
    }

    #[tokio::test]
    async fn test_validation_error_fields() {
        let (client, _, _) = client(ScriptedTransport::new(|_| {
            Ok(RawResponse::new(
                400,
                Some(json!({"errors": [{"field": "email", "message": "required"}]})),
            ))
        }));

        let err = client
            .post::<_, Value>("/users", &json!({"email": ""}))
            .await
            .unwrap_err();
        assert_eq!(err.field_errors().unwrap()["email"], vec!["required"]);
    }
}
