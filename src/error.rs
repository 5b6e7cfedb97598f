//! Error types for the authenticated client
//!
//! [`ApiError`] is the closed taxonomy every request resolves to on failure.
//! Callers match on the variant, never on raw status codes.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

/// Validation messages grouped by field name
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Fields shared by every [`ApiError`] variant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorDetails {
    pub message: String,
    pub status: Option<u16>,
    /// Stable machine code, e.g. `AUTHENTICATION_ERROR`
    pub code: Option<String>,
    /// Response body that produced the error, if any
    pub data: Option<Value>,
    /// Description of the underlying transport or refresh failure
    pub original_error: Option<String>,
}

impl ErrorDetails {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_data(mut self, data: Option<Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_original(mut self, original: impl Into<String>) -> Self {
        self.original_error = Some(original.into());
        self
    }

    fn with_code(mut self, code: &str) -> Self {
        self.code.get_or_insert_with(|| code.to_string());
        self
    }
}

/// Request failure taxonomy
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Network error: {}", .0.message)]
    Network(ErrorDetails),

    #[error("Authentication failed: {}", .0.message)]
    Authentication(ErrorDetails),

    #[error("Not authorized: {}", .0.message)]
    Authorization(ErrorDetails),

    #[error("Not found: {}", .0.message)]
    NotFound(ErrorDetails),

    #[error("Validation failed: {}", .details.message)]
    Validation {
        details: ErrorDetails,
        field_errors: FieldErrors,
    },

    #[error("Server error ({status}): {}", .details.message)]
    Server { details: ErrorDetails, status: u16 },

    #[error("Rate limit exceeded: {}", .details.message)]
    RateLimit {
        details: ErrorDetails,
        retry_after_seconds: Option<u64>,
    },

    #[error("Request canceled: {}", .0.message)]
    Canceled(ErrorDetails),

    /// Any 4xx without a dedicated variant
    #[error("Request failed ({status}): {}", .details.message)]
    Http { details: ErrorDetails, status: u16 },

    #[error("Unknown error: {}", .0.message)]
    Unknown(ErrorDetails),
}

/// Fieldless mirror of [`ApiError`] for switching and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    Network,
    Authentication,
    Authorization,
    NotFound,
    Validation,
    Server,
    RateLimit,
    Canceled,
    Http,
    Unknown,
}

impl ApiErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Authentication => "AUTHENTICATION_ERROR",
            Self::Authorization => "AUTHORIZATION_ERROR",
            Self::NotFound => "NOT_FOUND_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Server => "SERVER_ERROR",
            Self::RateLimit => "RATE_LIMIT_ERROR",
            Self::Canceled => "CANCELED_ERROR",
            Self::Http => "API_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }
}

impl ApiError {
    pub fn network(details: ErrorDetails) -> Self {
        Self::Network(details.with_code(ApiErrorKind::Network.code()))
    }

    pub fn authentication(details: ErrorDetails) -> Self {
        let details = ErrorDetails {
            status: details.status.or(Some(401)),
            ..details
        };
        Self::Authentication(details.with_code(ApiErrorKind::Authentication.code()))
    }

    pub fn authorization(details: ErrorDetails) -> Self {
        let details = ErrorDetails {
            status: details.status.or(Some(403)),
            ..details
        };
        Self::Authorization(details.with_code(ApiErrorKind::Authorization.code()))
    }

    pub fn not_found(details: ErrorDetails) -> Self {
        let details = ErrorDetails {
            status: details.status.or(Some(404)),
            ..details
        };
        Self::NotFound(details.with_code(ApiErrorKind::NotFound.code()))
    }

    pub fn validation(details: ErrorDetails, field_errors: FieldErrors) -> Self {
        let details = ErrorDetails {
            status: details.status.or(Some(400)),
            ..details
        };
        Self::Validation {
            details: details.with_code(ApiErrorKind::Validation.code()),
            field_errors,
        }
    }

    pub fn server(details: ErrorDetails, status: u16) -> Self {
        Self::Server {
            details: details.with_status(status).with_code(ApiErrorKind::Server.code()),
            status,
        }
    }

    pub fn rate_limit(details: ErrorDetails, retry_after_seconds: Option<u64>) -> Self {
        Self::RateLimit {
            details: details.with_status(429).with_code(ApiErrorKind::RateLimit.code()),
            retry_after_seconds,
        }
    }

    pub fn canceled(details: ErrorDetails) -> Self {
        Self::Canceled(details.with_code(ApiErrorKind::Canceled.code()))
    }

    pub fn http(details: ErrorDetails, status: u16) -> Self {
        Self::Http {
            details: details.with_status(status).with_code(ApiErrorKind::Http.code()),
            status,
        }
    }

    pub fn unknown(details: ErrorDetails) -> Self {
        Self::Unknown(details.with_code(ApiErrorKind::Unknown.code()))
    }

    pub fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Network(_) => ApiErrorKind::Network,
            Self::Authentication(_) => ApiErrorKind::Authentication,
            Self::Authorization(_) => ApiErrorKind::Authorization,
            Self::NotFound(_) => ApiErrorKind::NotFound,
            Self::Validation { .. } => ApiErrorKind::Validation,
            Self::Server { .. } => ApiErrorKind::Server,
            Self::RateLimit { .. } => ApiErrorKind::RateLimit,
            Self::Canceled(_) => ApiErrorKind::Canceled,
            Self::Http { .. } => ApiErrorKind::Http,
            Self::Unknown(_) => ApiErrorKind::Unknown,
        }
    }

    pub fn details(&self) -> &ErrorDetails {
        match self {
            Self::Network(d)
            | Self::Authentication(d)
            | Self::Authorization(d)
            | Self::NotFound(d)
            | Self::Canceled(d)
            | Self::Unknown(d) => d,
            Self::Validation { details, .. }
            | Self::Server { details, .. }
            | Self::RateLimit { details, .. }
            | Self::Http { details, .. } => details,
        }
    }

    pub fn message(&self) -> &str {
        &self.details().message
    }

    pub fn status(&self) -> Option<u16> {
        self.details().status
    }

    pub fn code(&self) -> Option<&str> {
        self.details().code.as_deref()
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Field-level messages for validation failures, empty otherwise
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { field_errors, .. } => Some(field_errors),
            _ => None,
        }
    }
}

/// Errors raised while constructing a client
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP client build failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Failures of the persistence medium behind the token store
///
/// These never reach request callers; the token store logs and drops them.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage contents are not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage quota exceeded")]
    QuotaExceeded,
}

pub type Result<T> = std::result::Result<T, ApiError>;
