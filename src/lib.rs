//! Authflow Rust Client
//!
//! An authenticated HTTP client with durable token storage, typed error
//! classification, envelope unwrapping and single-flight token refresh with
//! retry-once replay.

pub mod auth_client;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod http_client;
pub mod interceptor;
pub mod refresh;
pub mod token_store;
pub mod transport;
pub mod types;

pub use auth_client::{HttpAuthApi, TokenRefresher};
pub use classifier::{classify, RawFailure};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::ClientConfig;
pub use envelope::Payload;
pub use error::{ApiError, ApiErrorKind, ClientError, ErrorDetails, FieldErrors, Result, StorageError};
pub use http_client::HttpClient;
pub use interceptor::{RequestInterceptor, ResponseInterceptor};
pub use refresh::{RefreshCoordinator, SessionExpiredHook};
pub use token_store::{FileStorage, KeyValueStorage, MemoryStorage, TokenKind, TokenStore};
pub use transport::{RawResponse, ReqwestTransport, Transport};
pub use types::{AuthTokens, Credentials, LoginRequest, RequestDescriptor, RequestOptions};
