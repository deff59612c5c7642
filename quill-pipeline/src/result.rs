//! What a pipeline run returns.

use chrono::{DateTime, Utc};
use quill_core::{CharacterId, ConsistencyResult, MemoryId};
use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// A timestamped progress line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the line was written.
    pub at: DateTime<Utc>,
    /// What happened.
    pub message: String,
}

/// Bookkeeping for one generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Zero-based attempt number.
    pub attempt: u32,
    /// Characters of generated text.
    pub content_length: usize,
    /// Generator call plus validation, in milliseconds.
    pub duration_ms: u64,
    /// Whether every check passed (always true with checks disabled).
    pub passed: bool,
    /// Lowest score across the checks, if any ran.
    pub lowest_score: Option<f64>,
    /// Violations found in this attempt, prefixed by subject name.
    pub violations: Vec<String>,
}

/// Consistency result for one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterCheck {
    /// Character checked.
    pub character_id: CharacterId,
    /// Character name, for readers of the JSON.
    pub character_name: String,
    /// Outcome.
    pub result: ConsistencyResult,
}

/// Final output of [`GenerationPipeline::execute`](crate::GenerationPipeline::execute).
///
/// Validation, check and memory fields describe the last attempt. Partial
/// content and logs are kept when the run fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// False only when the run stopped on an unrecoverable error.
    pub success: bool,
    /// Text of the last attempt.
    pub generated_content: Option<String>,
    /// Human-readable failure reason.
    pub error_message: Option<String>,
    /// Failure classification.
    pub failure: Option<FailureKind>,
    /// Attempts executed minus one.
    pub retry_count: u32,
    /// Memories placed in the context.
    pub memories_used: usize,
    /// Memories stored by extraction.
    pub new_memory_ids: Vec<MemoryId>,
    /// Whether extraction fell back to generic memories.
    pub used_fallback_memories: bool,
    /// Whether the last attempt passed validation.
    pub passed_all_validation: bool,
    /// Lowest score of the last attempt.
    pub lowest_score: Option<f64>,
    /// Violations of the last attempt.
    pub violations: Vec<String>,
    /// Per-character checks of the last attempt.
    pub character_results: Vec<CharacterCheck>,
    /// Worldview check of the last attempt.
    pub worldview_result: Option<ConsistencyResult>,
    /// Every attempt, in order.
    pub attempts: Vec<AttemptRecord>,
    /// Wall time of the whole run.
    pub duration_ms: u64,
    /// When the run finished.
    pub generated_at: DateTime<Utc>,
    /// Progress lines, in order.
    pub logs: Vec<LogEntry>,
}

impl GenerationResult {
    pub(crate) fn started() -> Self {
        Self {
            success: true,
            generated_content: None,
            error_message: None,
            failure: None,
            retry_count: 0,
            memories_used: 0,
            new_memory_ids: Vec::new(),
            used_fallback_memories: false,
            passed_all_validation: false,
            lowest_score: None,
            violations: Vec::new(),
            character_results: Vec::new(),
            worldview_result: None,
            attempts: Vec::new(),
            duration_ms: 0,
            generated_at: Utc::now(),
            logs: Vec::new(),
        }
    }

    pub(crate) fn log(&mut self, message: impl Into<String>) {
        self.logs.push(LogEntry {
            at: Utc::now(),
            message: message.into(),
        });
    }

    /// Number of consistency results produced by the last attempt.
    #[must_use]
    pub fn check_count(&self) -> usize {
        self.character_results.len() + usize::from(self.worldview_result.is_some())
    }
}
