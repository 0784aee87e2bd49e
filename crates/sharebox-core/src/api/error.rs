use std::sync::Arc;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced by every API operation.
///
/// Cloneable so a single refresh outcome can be handed to every request
/// waiting on it.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Authentication failed: {message}")]
    Auth { status: u16, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(Arc<reqwest::Error>),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(Arc::new(err))
        }
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error payload shapes the server uses: `{"error": ..}`, `{"detail": ..}`
/// or `{"message": ..}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<String>,
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Reduce a response body to a human-readable message.
    pub(crate) fn message_from_body(body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            if let Some(msg) = parsed.error.or(parsed.detail).or(parsed.message) {
                return Self::truncate_body(&msg);
            }
        }
        Self::truncate_body(body.trim())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::message_from_body(body);
        match status.as_u16() {
            400 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::Server {
                status: status.as_u16(),
                message,
            },
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// Reclassify a rejection from a login, OTP or enrollment endpoint.
    pub(crate) fn into_auth_failure(self) -> Self {
        match self {
            ApiError::Unauthorized(message) => ApiError::Auth {
                status: 401,
                message,
            },
            ApiError::Forbidden(message) => ApiError::Auth {
                status: 403,
                message,
            },
            other => other,
        }
    }

    /// HTTP status behind this error, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. } | ApiError::Server { status, .. } => Some(*status),
            ApiError::Unauthorized(_) | ApiError::SessionExpired => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::BadRequest(_) => Some(400),
            ApiError::RateLimited => Some(429),
            _ => None,
        }
    }

    /// Whether the caller has to log in again to continue.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::SessionExpired | ApiError::Unauthorized(_))
    }
}
