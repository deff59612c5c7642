//! Generation context: the story material one run writes against.
//!
//! [`GenerationContext`] is assembled once per run and never mutated
//! afterwards. The part that changes between attempts, the writer's goal
//! plus injected feedback, is a separate [`GenerationGoal`] value: each retry
//! derives a new goal from the previous one and the violations it produced.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use quill_core::{
    Character, CharacterId, CharacterRepository, MemoryRecord, Project, ProjectRepository,
    QuillError, RelevanceEngine, Worldview, WorldviewRepository,
};
use tracing::{debug, info, warn};

use crate::request::{GenerationRequest, Validated};

/// The writer's goal for the next attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationGoal {
    text: String,
}

impl GenerationGoal {
    /// Start from the request's goal, if any.
    #[must_use]
    pub fn new(goal: Option<&str>) -> Self {
        Self {
            text: goal.map(str::trim).unwrap_or_default().to_string(),
        }
    }

    /// A new goal with `violations` appended as a numbered list.
    ///
    /// An empty list returns the goal unchanged.
    #[must_use]
    pub fn with_feedback(&self, violations: &[String]) -> Self {
        if violations.is_empty() {
            return self.clone();
        }
        let mut text = self.text.clone();
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str("## Problems in the previous attempt\nAvoid the following:\n");
        for (i, v) in violations.iter().enumerate() {
            let _ = writeln!(text, "{}. {v}", i + 1);
        }
        Self {
            text: text.trim_end().to_string(),
        }
    }

    /// Goal text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether there is nothing to ask for.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Story material for one run.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    /// Owning project.
    pub project: Project,
    /// Worldview, when requested and found.
    pub worldview: Option<Worldview>,
    /// Participants, in request order.
    pub characters: Vec<Character>,
    /// Ranked memories per participant; empty when retrieval is off.
    pub memories: BTreeMap<CharacterId, Vec<MemoryRecord>>,
    /// Scene description.
    pub scene_context: String,
    /// Emotional tone.
    pub emotional_tone: Option<String>,
    /// Preceding text.
    pub previous_content: Option<String>,
}

impl GenerationContext {
    /// Load entities and retrieve memories for `request`.
    ///
    /// A worldview that cannot be found is skipped with a warning; a missing
    /// project or character is an error.
    ///
    /// # Errors
    ///
    /// Not-found errors for the project or a character, repository and
    /// retrieval failures.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        request: &GenerationRequest,
        validated: Validated,
        projects: &dyn ProjectRepository,
        characters: &dyn CharacterRepository,
        worldviews: &dyn WorldviewRepository,
        relevance: &RelevanceEngine,
        now: DateTime<Utc>,
    ) -> Result<Self, QuillError> {
        let project = projects
            .project(validated.project_id)?
            .ok_or(QuillError::ProjectNotFound(validated.project_id))?;

        let worldview = match request.worldview_id {
            Some(id) => {
                let found = worldviews.worldview(id)?;
                if found.is_none() {
                    warn!(worldview = %id, "Requested worldview not found; continuing without it");
                }
                found
            }
            None => None,
        };

        let participants = request
            .character_ids
            .iter()
            .map(|&id| characters.character(id)?.ok_or(QuillError::CharacterNotFound(id)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut memories = BTreeMap::new();
        if request.enable_memory {
            for c in &participants {
                let ranked = relevance.retrieve(
                    c.id,
                    &request.scene_context,
                    request.emotional_tone.as_deref(),
                    request.memory_count,
                    now,
                )?;
                debug!(character = %c.name, retrieved = ranked.len(), "Memories retrieved");
                memories.insert(c.id, ranked);
            }
        }

        let context = Self {
            project,
            worldview,
            characters: participants,
            memories,
            scene_context: request.scene_context.clone(),
            emotional_tone: request.emotional_tone.clone(),
            previous_content: request.previous_content.clone(),
        };
        info!(
            project = %context.project.name,
            characters = context.characters.len(),
            memories = context.memory_count(),
            worldview = context.worldview.as_ref().map_or("none", |w| w.name.as_str()),
            "Generation context assembled"
        );
        Ok(context)
    }

    /// Total memories across participants.
    #[must_use]
    pub fn memory_count(&self) -> usize {
        self.memories.values().map(Vec::len).sum()
    }

    /// Whether memory retrieval ran.
    #[must_use]
    pub fn has_memories(&self) -> bool {
        !self.memories.is_empty()
    }

    /// Numbered memory list for one character.
    #[must_use]
    pub fn memory_block(&self, character: CharacterId) -> String {
        let Some(list) = self.memories.get(&character).filter(|l| !l.is_empty()) else {
            return "No relevant memories.\n".to_string();
        };
        let mut out = String::from("Relevant memories:\n");
        for (i, m) in list.iter().enumerate() {
            let _ = writeln!(out, "{}. [{}] {}", i + 1, m.memory_type, m.content);
        }
        out
    }

    /// The full prompt: base instructions, world, characters with their
    /// memories, scene, tone, the tail of the previous content, and the goal.
    #[must_use]
    pub fn enhanced_prompt(&self, base: &str, goal: &GenerationGoal, previous_chars: usize) -> String {
        let mut p = String::from(base);

        if let Some(w) = &self.worldview {
            p.push_str("\n\n## World\n");
            let _ = writeln!(p, "- Name: {}", w.name);
            if let Some(summary) = &w.summary {
                let _ = writeln!(p, "- Summary: {summary}");
            }
            if !w.rules.is_empty() {
                let _ = writeln!(p, "- Core rules: {}", w.rules.join("; "));
            }
        }

        if !self.characters.is_empty() {
            p.push_str("\n## Characters\n");
            for c in &self.characters {
                let _ = writeln!(p, "\n### {}", c.name);
                if let Some(summary) = &c.summary {
                    let _ = writeln!(p, "Summary: {summary}");
                } else {
                    if let Some(age) = c.age {
                        let _ = writeln!(p, "Age: {age}");
                    }
                    let traits = if c.personality_traits.is_empty() {
                        "none".to_string()
                    } else {
                        c.personality_traits.join(", ")
                    };
                    let _ = writeln!(p, "Personality: {traits}");
                }
                if let Some(speech) = &c.speech_pattern {
                    let _ = writeln!(p, "Speech pattern: {speech}");
                }
                if self.has_memories() {
                    p.push('\n');
                    p.push_str(&self.memory_block(c.id));
                }
            }
        }

        if !self.scene_context.trim().is_empty() {
            let _ = writeln!(p, "\n## Scene\n{}", self.scene_context.trim());
        }
        if let Some(tone) = self.emotional_tone.as_deref().filter(|t| !t.trim().is_empty()) {
            let _ = writeln!(p, "\n## Emotional tone\n{}", tone.trim());
        }
        if let Some(prev) = self.previous_content.as_deref().filter(|t| !t.is_empty()) {
            let _ = writeln!(p, "\n## Previous content\n{}", tail(prev, previous_chars));
        }
        if !goal.is_empty() {
            let _ = writeln!(p, "\n## Requirements\n{}", goal.as_str());
        }
        p
    }
}

/// Last `max_chars` characters of `text`, prefixed by `...` when cut.
#[must_use]
pub fn tail(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let start = text
        .char_indices()
        .nth(total - max_chars)
        .map_or(text.len(), |(i, _)| i);
    format!("...{}", &text[start..])
}
