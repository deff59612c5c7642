//! [`DeepReviewer`] backed by a [`TextGenerator`].

use std::sync::Arc;

use async_trait::async_trait;
use quill_core::consistency::{ConsistencyResult, DeepReviewer, ReviewSubject};
use quill_core::{ContentType, QuillError};
use quill_llm::prompt::{self, PromptId};
use quill_llm::{GenerationParams, TextGenerator};
use tracing::debug;

const REVIEW_TEMPERATURE: f32 = 0.3;
const NOT_SPECIFIED: &str = "no special requirements";

/// Asks the generator for a short critique when a passage scores poorly.
pub struct GeneratorReviewer {
    generator: Arc<dyn TextGenerator>,
    max_tokens: u32,
    timeout_ms: Option<u64>,
}

impl std::fmt::Debug for GeneratorReviewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorReviewer")
            .field("generator", &self.generator.name())
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl GeneratorReviewer {
    /// Critiques capped at `max_tokens`.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, max_tokens: u32) -> Self {
        Self {
            generator,
            max_tokens,
            timeout_ms: None,
        }
    }

    /// Builder: per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    fn render(subject: ReviewSubject<'_>, text: &str) -> Result<String, QuillError> {
        let rendered = match subject {
            ReviewSubject::Character(c) => {
                let traits = c.personality_traits.join(", ");
                let habits = c.behavioral_habits.join("; ");
                prompt::render(
                    PromptId::CharacterReview,
                    &[
                        ("name", c.name.as_str()),
                        ("traits", or_unspecified(&traits)),
                        ("speech_pattern", c.speech_pattern.as_deref().unwrap_or(NOT_SPECIFIED)),
                        ("habits", or_unspecified(&habits)),
                        ("content", text),
                    ],
                )
            }
            ReviewSubject::Worldview(w) => {
                let rules = w.rules.join("; ");
                let constraints = w.constraints.join("; ");
                prompt::render(
                    PromptId::WorldviewReview,
                    &[
                        ("name", w.name.as_str()),
                        ("summary", w.summary.as_deref().unwrap_or("no summary")),
                        ("rules", if rules.is_empty() { "no rules" } else { rules.as_str() }),
                        (
                            "constraints",
                            if constraints.is_empty() { "no constraints" } else { constraints.as_str() },
                        ),
                        ("content", text),
                    ],
                )
            }
        };
        rendered.map_err(|e| QuillError::DeepReview(e.to_string()))
    }
}

fn or_unspecified(s: &str) -> &str {
    if s.is_empty() { NOT_SPECIFIED } else { s }
}

#[async_trait]
impl DeepReviewer for GeneratorReviewer {
    async fn review(
        &self,
        subject: ReviewSubject<'_>,
        text: &str,
        content_type: ContentType,
        result: &ConsistencyResult,
    ) -> Result<String, QuillError> {
        let review_prompt = Self::render(subject, text)?;
        debug!(
            content_type = %content_type,
            score = result.overall_score,
            violations = result.violations.len(),
            "Requesting deep review"
        );
        let params = GenerationParams {
            temperature: REVIEW_TEMPERATURE,
            max_tokens: self.max_tokens,
            timeout_ms: self.timeout_ms,
        };
        self.generator
            .generate(&review_prompt, &params)
            .await
            .map_err(|e| QuillError::DeepReview(e.to_string()))
    }
}
