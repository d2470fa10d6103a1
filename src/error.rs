//! Error types for the visitor fingerprint collector
//!
//! Errors never escape the aggregation coordinator: probes convert them into
//! their fallback values. The taxonomy still matters for logging (a missing
//! capability is routine, a JS exception is not) and for the outer JS
//! surfaces that submit the visit.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, CollectorError>;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Capability errors (1xx)
    Unavailable = 100,
    PermissionDenied = 101,

    // Timing errors (2xx)
    Timeout = 200,

    // Network errors (3xx)
    NetworkFailed = 300,
    HttpStatus = 301,

    // Data errors (4xx)
    ParseError = 400,
    ConfigError = 401,

    // Internal errors (9xx)
    JsException = 900,
    InternalError = 901,
}

/// Main error type for the collector
#[derive(Error, Debug, Clone)]
pub enum CollectorError {
    #[error("Capability unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JS exception: {0}")]
    Js(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CollectorError {
    /// Get the error code for programmatic handling
    pub fn code(&self) -> ErrorCode {
        match self {
            CollectorError::Unavailable(_) => ErrorCode::Unavailable,
            CollectorError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            CollectorError::Timeout => ErrorCode::Timeout,
            CollectorError::Network(_) => ErrorCode::NetworkFailed,
            CollectorError::HttpStatus { .. } => ErrorCode::HttpStatus,
            CollectorError::Parse(_) => ErrorCode::ParseError,
            CollectorError::Config(_) => ErrorCode::ConfigError,
            CollectorError::Js(_) => ErrorCode::JsException,
            CollectorError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// The runtime simply lacks the capability, or the visitor refused it.
    ///
    /// Both are routine outcomes for a probe and are logged quietly.
    pub fn is_capability_gap(&self) -> bool {
        matches!(
            self,
            CollectorError::Unavailable(_) | CollectorError::PermissionDenied(_)
        )
    }

    /// Whether trying again (or trying the next endpoint) can help
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CollectorError::Timeout
                | CollectorError::Network(_)
                | CollectorError::HttpStatus { .. }
        )
    }

    /// Build an error from a thrown JS value.
    ///
    /// `NotAllowedError` / `SecurityError` DOMExceptions are what browsers
    /// throw for refused prompts and blocked features, so they map to
    /// `PermissionDenied`.
    pub fn from_js(context: &str, value: &JsValue) -> Self {
        let name = js_sys::Reflect::get(value, &JsValue::from_str("name"))
            .ok()
            .and_then(|n| n.as_string());
        let message = js_sys::Reflect::get(value, &JsValue::from_str("message"))
            .ok()
            .and_then(|m| m.as_string())
            .or_else(|| value.as_string())
            .unwrap_or_else(|| format!("{:?}", value));

        match name.as_deref() {
            Some("NotAllowedError") | Some("SecurityError") => {
                CollectorError::PermissionDenied(format!("{}: {}", context, message))
            }
            Some("NotSupportedError") | Some("NotFoundError") => {
                CollectorError::Unavailable(format!("{}: {}", context, message))
            }
            _ => CollectorError::Js(format!("{}: {}", context, message)),
        }
    }
}

impl From<CollectorError> for JsValue {
    fn from(err: CollectorError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

impl From<serde_json::Error> for CollectorError {
    fn from(err: serde_json::Error) -> Self {
        CollectorError::Parse(err.to_string())
    }
}

/// Error information for JavaScript consumption
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: u32,
    pub message: String,
    pub is_retryable: bool,
}

impl From<&CollectorError> for ErrorInfo {
    fn from(err: &CollectorError) -> Self {
        ErrorInfo {
            code: err.code() as u32,
            message: err.to_string(),
            is_retryable: err.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_gaps() {
        assert!(CollectorError::Unavailable("battery".into()).is_capability_gap());
        assert!(CollectorError::PermissionDenied("camera".into()).is_capability_gap());

        assert!(!CollectorError::Timeout.is_capability_gap());
        assert!(!CollectorError::Js("boom".into()).is_capability_gap());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(CollectorError::Timeout.is_retryable());
        assert!(CollectorError::Network("offline".into()).is_retryable());
        assert!(CollectorError::HttpStatus {
            status: 503,
            url: "https://api.ipify.org".into()
        }
        .is_retryable());

        assert!(!CollectorError::Parse("bad json".into()).is_retryable());
        assert!(!CollectorError::Unavailable("webgl".into()).is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CollectorError::Timeout.code(), ErrorCode::Timeout);
        assert_eq!(
            CollectorError::PermissionDenied("mic".into()).code(),
            ErrorCode::PermissionDenied
        );
        assert_eq!(ErrorCode::Unavailable as u32, 100);
    }

    #[test]
    fn test_error_info() {
        let err = CollectorError::HttpStatus {
            status: 404,
            url: "https://ipapi.co/json/".into(),
        };
        let info = ErrorInfo::from(&err);
        assert_eq!(info.code, 301);
        assert!(info.is_retryable);
        assert_eq!(info.message, "HTTP 404 from https://ipapi.co/json/");
    }
}
