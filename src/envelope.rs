//! Response envelope unwrapping
//!
//! Servers wrap payloads as `{ "status"|"success": .., "data": .., "metadata": .. }`.
//! An envelope is recognised structurally: an object that has `data` plus a
//! `status` or `success` marker. Everything else is returned as-is.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, ErrorDetails};

/// Response data with optional envelope metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Payload<T> {
    pub data: T,
    pub metadata: Option<Value>,
}

impl<T> Payload<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            metadata: None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Payload<U> {
        Payload {
            data: f(self.data),
            metadata: self.metadata,
        }
    }
}

impl Payload<Value> {
    /// Decode `data` into a concrete type
    pub fn decode<T: DeserializeOwned>(self) -> Result<Payload<T>, ApiError> {
        let data = serde_json::from_value(self.data).map_err(|e| {
            ApiError::unknown(
                ErrorDetails::new("Failed to decode response body").with_original(e.to_string()),
            )
        })?;
        Ok(Payload {
            data,
            metadata: self.metadata,
        })
    }
}

pub fn is_envelope(body: &Value) -> bool {
    match body.as_object() {
        Some(map) => map.contains_key("data") && (map.contains_key("status") || map.contains_key("success")),
        None => false,
    }
}

/// Unwrap an envelope into its `data` and `metadata`; non-envelopes pass through
pub fn unwrap_envelope(body: Value) -> Payload<Value> {
    if !is_envelope(&body) {
        return Payload::new(body);
    }
    match body {
        Value::Object(mut map) => {
            let data = map.remove("data").unwrap_or(Value::Null);
            let metadata = map.remove("metadata").filter(|m| !m.is_null());
            Payload { data, metadata }
        }
        other => Payload::new(other),
    }
}
