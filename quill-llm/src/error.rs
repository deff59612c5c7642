//! Generator error types.

use thiserror::Error;

/// Whether a failed call may succeed if repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Timeouts, 5xx, throttling, transient network failures.
    Retryable,
    /// Bad requests, auth failures, misconfiguration, unreadable responses.
    NonRetryable,
}

/// Errors returned by a [`TextGenerator`](crate::TextGenerator).
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The provider refused the request (4xx other than 408/429).
    #[error("generator rejected the request (HTTP {status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The provider failed on its side or asked us to slow down.
    #[error("generator server error (HTTP {status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// A single call exceeded its timeout.
    #[error("generator call timed out after {0}ms")]
    Timeout(u64),

    /// The provider could not be reached.
    #[error("generator unavailable: {0}")]
    Unavailable(String),

    /// The response body did not have the expected shape.
    #[error("failed to parse generator response: {0}")]
    Parse(String),

    /// Every attempt in the provider's retry budget failed.
    #[error("all generator attempts exhausted after {attempts} tries: {last_error}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },

    /// Client or prompt configuration error.
    #[error("generator configuration error: {0}")]
    Config(String),
}

impl GeneratorError {
    /// Classify the error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Server { .. }
            | Self::Timeout(_)
            | Self::Unavailable(_)
            | Self::RetriesExhausted { .. } => ErrorClass::Retryable,
            Self::Rejected { .. } | Self::Parse(_) | Self::Config(_) => ErrorClass::NonRetryable,
        }
    }

    /// Shorthand for `class() == ErrorClass::Retryable`.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Map an HTTP error status to the matching variant.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            408 | 429 | 500..=599 => Self::Server { status, message },
            _ => Self::Rejected { status, message },
        }
    }
}

impl From<reqwest::Error> for GeneratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GeneratorError::Timeout(0)
        } else if let Some(status) = err.status() {
            GeneratorError::from_status(status.as_u16(), err.to_string())
        } else {
            GeneratorError::Unavailable(err.to_string())
        }
    }
}
