//! The inbound generation request.

use quill_core::{CharacterId, ContentType, ProjectId, TimelineId, WorldviewId};
use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// Everything one pipeline run needs to know.
///
/// Deserializes from JSON with the usual defaults: memory on (5 per
/// character), consistency checks on with 2 retries, temperature 0.8,
/// 2000 tokens, extraction on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Owning project.
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Worldview to honour, if any.
    #[serde(default)]
    pub worldview_id: Option<WorldviewId>,
    /// Participating characters, in prompt order.
    #[serde(default)]
    pub character_ids: Vec<CharacterId>,
    /// What to write.
    #[serde(default)]
    pub content_type: Option<ContentType>,
    /// Scene description; also the memory retrieval query.
    #[serde(default)]
    pub scene_context: String,
    /// Desired emotional tone.
    #[serde(default)]
    pub emotional_tone: Option<String>,
    /// Extra instructions for the writer.
    #[serde(default)]
    pub generation_goal: Option<String>,
    /// Text that precedes this passage.
    #[serde(default)]
    pub previous_content: Option<String>,
    /// Timeline that extracted memories are pinned to.
    #[serde(default)]
    pub timeline_id: Option<TimelineId>,
    /// Chapter number, informational.
    #[serde(default)]
    pub chapter_number: Option<u32>,
    /// Retrieve memories into the context.
    #[serde(default = "default_true")]
    pub enable_memory: bool,
    /// Memories per character.
    #[serde(default = "default_memory_count")]
    pub memory_count: usize,
    /// Score each attempt and retry on failure.
    #[serde(default = "default_true")]
    pub enable_consistency_check: bool,
    /// Validation retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Output cap per attempt.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Extract memories from the accepted text.
    #[serde(default = "default_true")]
    pub auto_create_memory: bool,
    /// Per-call generator timeout; overrides `pipeline.generator_timeout_ms`.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// The fields [`GenerationRequest::validate`] guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validated {
    /// Owning project.
    pub project_id: ProjectId,
    /// What to write.
    pub content_type: ContentType,
}

impl GenerationRequest {
    /// A request with defaults for everything but the required fields.
    #[must_use]
    pub fn new(
        project_id: ProjectId,
        character_ids: Vec<CharacterId>,
        content_type: ContentType,
        scene_context: impl Into<String>,
    ) -> Self {
        Self {
            project_id: Some(project_id),
            worldview_id: None,
            character_ids,
            content_type: Some(content_type),
            scene_context: scene_context.into(),
            emotional_tone: None,
            generation_goal: None,
            previous_content: None,
            timeline_id: None,
            chapter_number: None,
            enable_memory: true,
            memory_count: default_memory_count(),
            enable_consistency_check: true,
            max_retries: default_max_retries(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            auto_create_memory: true,
            timeout_ms: None,
        }
    }

    /// Builder: set the worldview.
    #[must_use]
    pub fn with_worldview(mut self, id: WorldviewId) -> Self {
        self.worldview_id = Some(id);
        self
    }

    /// Builder: set the validation retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Builder: set the generation goal.
    #[must_use]
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.generation_goal = Some(goal.into());
        self
    }

    /// Check the request shape.
    ///
    /// # Errors
    ///
    /// The first problem found, as a [`RequestError`].
    pub fn validate(&self) -> Result<Validated, RequestError> {
        let project_id = self.project_id.ok_or(RequestError::MissingProject)?;
        let content_type = self.content_type.ok_or(RequestError::MissingContentType)?;
        if self.character_ids.is_empty() {
            return Err(RequestError::NoCharacters);
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(RequestError::InvalidField {
                field: "temperature",
                reason: format!("{} is outside [0, 2]", self.temperature),
            });
        }
        if self.max_tokens == 0 {
            return Err(RequestError::InvalidField {
                field: "max_tokens",
                reason: "must be positive".into(),
            });
        }
        if self.enable_memory && self.memory_count == 0 {
            return Err(RequestError::InvalidField {
                field: "memory_count",
                reason: "must be positive when memory is enabled".into(),
            });
        }
        if self.timeout_ms == Some(0) {
            return Err(RequestError::InvalidField {
                field: "timeout_ms",
                reason: "must be positive".into(),
            });
        }
        Ok(Validated {
            project_id,
            content_type,
        })
    }
}

fn default_true() -> bool {
    true
}
fn default_memory_count() -> usize {
    5
}
fn default_max_retries() -> u32 {
    2
}
fn default_temperature() -> f32 {
    0.8
}
fn default_max_tokens() -> u32 {
    2000
}
