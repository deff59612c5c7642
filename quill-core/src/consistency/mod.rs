//! Consistency scoring for generated text.
//!
//! Two subject kinds share one result shape: characters (personality,
//! speech, habits, traits) and worldviews (rules, constraints, physics).
//! `passed` is `score >= threshold && violations.is_empty()`. When a
//! result does not pass, an optional [`DeepReviewer`] may attach an
//! advisory critique; it never changes `passed`.

pub mod character;
pub mod lexicon;
pub mod worldview;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ConsistencyConfig;
use crate::entities::{Character, Worldview};
use crate::error::{QuillError, Result};
use crate::repository::{CharacterRepository, WorldviewRepository};
use crate::types::{CharacterId, ContentType, WorldviewId};

/// Outcome of one validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyResult {
    /// Overall score in `[0, 1]`.
    pub overall_score: f64,
    /// Human-readable violations, in discovery order.
    pub violations: Vec<String>,
    /// `overall_score >= threshold && violations.is_empty()`.
    pub passed: bool,
    /// Advisory critique from the deep reviewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_review_notes: Option<String>,
    /// Personality-vector plausibility (characters only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f64>,
    /// Speech pattern conformance (characters only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_pattern_valid: Option<bool>,
    /// Behavioural habit conformance (characters only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_pattern_valid: Option<bool>,
}

impl ConsistencyResult {
    /// Build a result, clamping the score and deriving `passed`.
    #[must_use]
    pub fn new(score: f64, violations: Vec<String>, pass_threshold: f64) -> Self {
        let overall_score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        let passed = overall_score >= pass_threshold && violations.is_empty();
        Self {
            overall_score,
            violations,
            passed,
            deep_review_notes: None,
            vector_score: None,
            speech_pattern_valid: None,
            behavior_pattern_valid: None,
        }
    }

    /// Whether a deep review is warranted: low score or any violation.
    #[must_use]
    pub fn needs_deep_validation(&self, pass_threshold: f64) -> bool {
        self.overall_score < pass_threshold || !self.violations.is_empty()
    }

    /// Coarse quality band.
    #[must_use]
    pub fn validation_level(&self) -> ValidationLevel {
        ValidationLevel::from_score(self.overall_score)
    }
}

/// Quality bands for a consistency score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    /// `>= 0.9`
    Excellent,
    /// `>= 0.7`
    Good,
    /// `>= 0.5`
    Fair,
    /// Below 0.5.
    Poor,
}

impl ValidationLevel {
    /// Band for a score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.7 {
            Self::Good
        } else if score >= 0.5 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        })
    }
}

/// What to validate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Subject {
    /// A character's declared traits.
    Character(CharacterId),
    /// A worldview's rules and laws.
    Worldview(WorldviewId),
}

/// The loaded subject handed to a [`DeepReviewer`].
#[derive(Debug, Clone, Copy)]
pub enum ReviewSubject<'a> {
    /// Character under review.
    Character(&'a Character),
    /// Worldview under review.
    Worldview(&'a Worldview),
}

/// Produces a free-text critique of generated text.
#[async_trait]
pub trait DeepReviewer: Send + Sync {
    /// Critique `text` for `subject`, given the lexical result so far.
    ///
    /// # Errors
    ///
    /// [`QuillError::DeepReview`] when no critique could be produced.
    async fn review(
        &self,
        subject: ReviewSubject<'_>,
        text: &str,
        content_type: ContentType,
        result: &ConsistencyResult,
    ) -> Result<String>;
}

/// Scores generated text against characters and worldviews.
pub struct ConsistencyEngine {
    characters: Arc<dyn CharacterRepository>,
    worldviews: Arc<dyn WorldviewRepository>,
    config: ConsistencyConfig,
    reviewer: Option<Arc<dyn DeepReviewer>>,
}

impl fmt::Debug for ConsistencyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsistencyEngine")
            .field("config", &self.config)
            .field("deep_review", &self.reviewer.is_some())
            .finish_non_exhaustive()
    }
}

impl ConsistencyEngine {
    /// Create an engine without a deep reviewer.
    #[must_use]
    pub fn new(
        characters: Arc<dyn CharacterRepository>,
        worldviews: Arc<dyn WorldviewRepository>,
        config: ConsistencyConfig,
    ) -> Self {
        Self {
            characters,
            worldviews,
            config,
            reviewer: None,
        }
    }

    /// Attach a deep reviewer.
    #[must_use]
    pub fn with_reviewer(mut self, reviewer: Arc<dyn DeepReviewer>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    /// Scoring configuration.
    #[must_use]
    pub fn config(&self) -> &ConsistencyConfig {
        &self.config
    }

    /// Validate `text` against `subject`.
    ///
    /// # Errors
    ///
    /// Not-found errors for unknown subjects, or repository failures.
    pub async fn validate(&self, subject: Subject, text: &str, content_type: ContentType) -> Result<ConsistencyResult> {
        match subject {
            Subject::Character(id) => self.validate_character(id, text, content_type).await,
            Subject::Worldview(id) => self.validate_worldview(id, text, content_type).await,
        }
    }

    /// Validate `text` against one character.
    ///
    /// # Errors
    ///
    /// [`QuillError::CharacterNotFound`], or repository failures.
    pub async fn validate_character(
        &self,
        id: CharacterId,
        text: &str,
        content_type: ContentType,
    ) -> Result<ConsistencyResult> {
        let character = self
            .characters
            .character(id)?
            .ok_or(QuillError::CharacterNotFound(id))?;
        let mut result = character::score(&character, text, content_type, &self.config);
        self.deep_review(ReviewSubject::Character(&character), text, content_type, &mut result)
            .await;
        Ok(result)
    }

    /// Validate `text` against one worldview.
    ///
    /// # Errors
    ///
    /// [`QuillError::WorldviewNotFound`], or repository failures.
    pub async fn validate_worldview(
        &self,
        id: WorldviewId,
        text: &str,
        content_type: ContentType,
    ) -> Result<ConsistencyResult> {
        let worldview = self
            .worldviews
            .worldview(id)?
            .ok_or(QuillError::WorldviewNotFound(id))?;
        let mut result = worldview::score(&worldview, text, &self.config);
        self.deep_review(ReviewSubject::Worldview(&worldview), text, content_type, &mut result)
            .await;
        Ok(result)
    }

    /// Rules and constraints only, no scoring and no deep review.
    ///
    /// # Errors
    ///
    /// [`QuillError::WorldviewNotFound`], or repository failures.
    pub fn quick_validate_worldview(&self, id: WorldviewId, text: &str) -> Result<bool> {
        let worldview = self
            .worldviews
            .worldview(id)?
            .ok_or(QuillError::WorldviewNotFound(id))?;
        Ok(worldview::quick_check(&worldview, text))
    }

    async fn deep_review(
        &self,
        subject: ReviewSubject<'_>,
        text: &str,
        content_type: ContentType,
        result: &mut ConsistencyResult,
    ) {
        let Some(reviewer) = self.reviewer.as_ref() else {
            return;
        };
        if !self.config.deep_review_enabled || !result.needs_deep_validation(self.config.pass_threshold) {
            return;
        }
        match reviewer.review(subject, text, content_type, result).await {
            Ok(notes) if !notes.trim().is_empty() => {
                debug!(chars = notes.len(), "Deep review attached");
                result.deep_review_notes = Some(notes.trim().to_string());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Deep review failed; continuing without notes"),
        }
    }
}
