//! Shared primitives for all Rust crates in Matchdesk.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type used across Matchdesk crates.
pub type AppResult<T> = Result<T, AppError>;

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// The backend answered with an authorization failure (HTTP 401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend answered but refused the request.
    #[error(
        "rejected by backend (status {}): {}",
        status.map_or_else(|| "unknown".to_owned(), |value| value.to_string()),
        message.as_deref().unwrap_or("no message")
    )]
    Rejected {
        /// HTTP status code, when one was received.
        status: Option<u16>,
        /// Human-readable message supplied by the backend, if any.
        message: Option<String>,
    },

    /// The backend could not be reached or timed out.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// A response or persisted payload could not be decoded.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Durable client storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the message supplied by the backend for rejected requests.
    #[must_use]
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => message
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty()),
            _ => None,
        }
    }

    /// Returns whether the error means the current session is no longer valid.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn backend_message_ignores_blank_text() {
        let error = AppError::Rejected {
            status: Some(400),
            message: Some("  ".to_owned()),
        };
        assert_eq!(error.backend_message(), None);

        let error = AppError::Rejected {
            status: Some(400),
            message: Some("bad password".to_owned()),
        };
        assert_eq!(error.backend_message(), Some("bad password"));
    }

    #[test]
    fn rejected_error_formats_missing_status() {
        let error = AppError::Rejected {
            status: None,
            message: None,
        };
        assert_eq!(
            error.to_string(),
            "rejected by backend (status unknown): no message"
        );
    }
}
