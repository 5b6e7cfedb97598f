//! Failure classification
//!
//! [`classify`] maps a raw transport outcome into exactly one [`ApiError`]
//! variant. It is pure: no I/O, no logging, no access to shared state.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;

use crate::error::{ApiError, ErrorDetails, FieldErrors};

/// Message used when the response body carries none
pub const FALLBACK_MESSAGE: &str = "Unknown error occurred";

/// Raw failure as observed by the transport layer
#[derive(Debug, Clone, PartialEq)]
pub enum RawFailure {
    /// The request was aborted by its caller
    Canceled { reason: Option<String> },

    /// No response was received (timeout, refused connection, DNS fault)
    Transport {
        /// Transport fault code such as `ECONNABORTED` or `ECONNREFUSED`
        code: Option<String>,
        message: String,
    },

    /// A response arrived with a non-success status
    Response {
        status: u16,
        headers: HeaderMap,
        body: Option<Value>,
    },

    /// Anything that does not fit the shapes above
    Other(String),
}

impl RawFailure {
    pub fn status(status: u16, body: Option<Value>) -> Self {
        Self::Response {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }
}

/// Classify a raw failure. Precedence: cancellation, missing response,
/// status dispatch, then unknown.
pub fn classify(failure: RawFailure) -> ApiError {
    match failure {
        RawFailure::Canceled { reason } => {
            let details = ErrorDetails::new("Request canceled");
            let details = match reason {
                Some(reason) => details.with_original(reason),
                None => details,
            };
            ApiError::canceled(details)
        }
        RawFailure::Transport { code, message } => classify_transport(code.as_deref(), &message),
        RawFailure::Response {
            status,
            headers,
            body,
        } => classify_response(status, &headers, body),
        RawFailure::Other(message) => {
            let text = if message.is_empty() {
                FALLBACK_MESSAGE.to_string()
            } else {
                message
            };
            ApiError::unknown(ErrorDetails::new(text))
        }
    }
}

fn classify_transport(code: Option<&str>, message: &str) -> ApiError {
    let reason = match code {
        Some("ECONNABORTED") => "Request timed out".to_string(),
        _ if message.to_ascii_lowercase().contains("timeout")
            || message.to_ascii_lowercase().contains("timed out") =>
        {
            "Request timed out".to_string()
        }
        Some("ECONNREFUSED") => "Connection refused".to_string(),
        Some("ERR_NETWORK") => "Network error".to_string(),
        _ if message.is_empty() => "Network error".to_string(),
        _ => format!("Network error: {message}"),
    };

    let original = match code {
        Some(code) if message.is_empty() => code.to_string(),
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    };

    ApiError::network(ErrorDetails::new(reason).with_original(original))
}

fn classify_response(status: u16, headers: &HeaderMap, body: Option<Value>) -> ApiError {
    let message = extract_message(body.as_ref()).unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
    let details = ErrorDetails::new(message)
        .with_status(status)
        .with_original(format!("HTTP {status}"));

    match status {
        400 => {
            let field_errors = extract_field_errors(body.as_ref());
            ApiError::validation(details.with_data(body), field_errors)
        }
        401 => ApiError::authentication(details.with_data(body)),
        403 => ApiError::authorization(details.with_data(body)),
        404 => ApiError::not_found(details.with_data(body)),
        429 => ApiError::rate_limit(details.with_data(body), parse_retry_after(headers)),
        500..=599 => ApiError::server(details.with_data(body), status),
        400..=499 => ApiError::http(details.with_data(body), status),
        _ => ApiError::unknown(details.with_data(body)),
    }
}

/// Pull a human-readable message out of an error body.
///
/// First match wins: `message`, `error`, `errors[0].message`.
pub fn extract_message(body: Option<&Value>) -> Option<String> {
    let body = body?;
    if let Some(text) = body.as_str() {
        return non_empty(text);
    }

    body.get("message")
        .and_then(Value::as_str)
        .and_then(non_empty)
        .or_else(|| body.get("error").and_then(Value::as_str).and_then(non_empty))
        .or_else(|| {
            body.get("errors")
                .and_then(Value::as_array)
                .and_then(|errors| errors.first())
                .and_then(|first| first.get("message"))
                .and_then(Value::as_str)
                .and_then(non_empty)
        })
}

/// Group `errors: [{field, message}]` entries by field. Falls back to a
/// `validationErrors: {field: [messages]}` map when the array is absent.
pub fn extract_field_errors(body: Option<&Value>) -> FieldErrors {
    let mut grouped = FieldErrors::new();
    let Some(body) = body else {
        return grouped;
    };

    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        for entry in errors {
            let field = entry.get("field").and_then(Value::as_str);
            let message = entry.get("message").and_then(Value::as_str);
            if let (Some(field), Some(message)) = (field, message) {
                if field.is_empty() || message.is_empty() {
                    continue;
                }
                grouped
                    .entry(field.to_string())
                    .or_default()
                    .push(message.to_string());
            }
        }
        return grouped;
    }

    if let Some(map) = body.get("validationErrors").and_then(Value::as_object) {
        for (field, messages) in map {
            let messages: Vec<String> = match messages {
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                Value::String(single) => vec![single.clone()],
                _ => Vec::new(),
            };
            if !messages.is_empty() {
                grouped.insert(field.clone(), messages);
            }
        }
    }

    grouped
}

/// Seconds from a `Retry-After` header given as a delay in seconds
pub fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}
