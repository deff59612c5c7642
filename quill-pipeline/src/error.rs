//! Pipeline error types.
//!
//! [`RequestError`] is the only error [`execute`](crate::GenerationPipeline::execute)
//! returns; everything after validation is reported inside the
//! [`GenerationResult`](crate::GenerationResult). [`PipelineFailure`] is the
//! internal reason a run stopped early.

use quill_core::QuillError;
use quill_llm::GeneratorError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A malformed or incomplete request, rejected before any side effect.
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    /// `project_id` is missing.
    #[error("request has no project_id")]
    MissingProject,

    /// `content_type` is missing.
    #[error("request has no content_type")]
    MissingContentType,

    /// `character_ids` is empty.
    #[error("request names no characters")]
    NoCharacters,

    /// A field is out of range.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Why a run ended without completing.
#[derive(Debug, Error)]
pub enum PipelineFailure {
    /// Context could not be assembled or a collaborator failed.
    #[error("context error: {0}")]
    Context(#[from] QuillError),

    /// The text generator failed after its own retries.
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),

    /// The caller cancelled the run.
    #[error("generation cancelled")]
    Cancelled,

    /// The run's deadline passed.
    #[error("generation deadline exceeded")]
    DeadlineExceeded,
}

impl PipelineFailure {
    /// Serializable classification for the result.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Context(_) => FailureKind::Context,
            Self::Generator(e) => FailureKind::Generator {
                retryable: e.is_retryable(),
            },
            Self::Cancelled => FailureKind::Cancelled,
            Self::DeadlineExceeded => FailureKind::DeadlineExceeded,
        }
    }
}

/// Failure classification carried by a failed
/// [`GenerationResult`](crate::GenerationResult).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Missing entity or repository failure.
    Context,
    /// Generator failure; `retryable` reflects the provider's classification.
    Generator {
        /// Whether the last provider error was transient.
        retryable: bool,
    },
    /// Cancelled by the caller.
    Cancelled,
    /// Deadline passed.
    DeadlineExceeded,
}
