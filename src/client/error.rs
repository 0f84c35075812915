//! Client error types
//!
//! One normalized error for every failed backend call.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when talking to the triage backend
#[derive(Error, Debug)]
pub enum ApiError {
    /// Server unreachable
    #[error("Unable to connect to server: {0}")]
    Connection(String),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// HTTP 401; the session has already been ended
    #[error("{message}")]
    Unauthorized { message: String },

    /// Any other non-2xx response, carrying the backend message verbatim
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    Parse(String),

    /// Request failed before reaching the server
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl ApiError {
    /// Classify a transport-level reqwest error
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_connect() {
            ApiError::Connection(err.to_string())
        } else if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Request(err)
        }
    }

    /// Build the error for a non-2xx response body
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = error_message(status, body);
        if status == StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized { message }
        } else {
            ApiError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }

    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// Result type for client operations
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

/// Prefer the body's `message`, then `detail`, then the status line
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    [parsed.message, parsed.detail]
        .into_iter()
        .flatten()
        .find_map(|value| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_field_preferred() {
        let body = r#"{"message": "Email already registered", "detail": "ignored"}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "Email already registered"
        );
    }

    #[test]
    fn test_detail_fallback() {
        let body = r#"{"detail": "Invalid credentials"}"#;
        assert_eq!(
            error_message(StatusCode::UNAUTHORIZED, body),
            "Invalid credentials"
        );

        // Structured validation details are kept as JSON text
        let body = r#"{"detail": [{"loc": ["body", "email"], "msg": "field required"}]}"#;
        let message = error_message(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert!(message.contains("field required"));
    }

    #[test]
    fn test_status_line_fallback() {
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>"),
            "HTTP 500: Internal Server Error"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, r#"{"message": ""}"#),
            "HTTP 502: Bad Gateway"
        );
    }

    #[test]
    fn test_from_response_classifies_401() {
        let err = ApiError::from_response(StatusCode::UNAUTHORIZED, "");
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "HTTP 401: Unauthorized");

        let err = ApiError::from_response(StatusCode::NOT_FOUND, r#"{"detail":"Not Found"}"#);
        assert!(!err.is_unauthorized());
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "Not Found");
    }
}
