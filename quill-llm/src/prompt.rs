//! Prompt templates for quill's auxiliary generator calls.
//!
//! Prose prompts are assembled by the pipeline from the story context. The
//! templates here cover the fixed-shape calls: character and worldview
//! review, and memory extraction. Placeholders are `{name}`; literal braces
//! are not used in any template.

use std::fmt;
use std::str::FromStr;

use crate::error::GeneratorError;

/// Critique of a passage against a character sheet.
pub const CHARACTER_REVIEW: &str = r"Review whether the following passage is consistent with the character.

## Character
- Name: {name}
- Personality traits: {traits}
- Speech pattern: {speech_pattern}
- Behavioral habits: {habits}

## Passage
{content}

## Review
1. Does the passage match the character's personality?
2. Is the voice consistent with the speech pattern?
3. Is the behavior plausible for this character?
4. If there are problems, suggest concise fixes (at most 200 words).

Answer briefly with your verdict and suggestions.";

/// Critique of a passage against a worldview.
pub const WORLDVIEW_REVIEW: &str = r"Review whether the following passage is consistent with the world setting.

## World
- Name: {name}
- Summary: {summary}
- Core rules: {rules}
- Constraints: {constraints}

## Passage
{content}

## Review
1. Does the passage break any world rule?
2. Are there logical contradictions?
3. Is the setting used consistently?
4. If there are problems, suggest concise fixes (at most 200 words).

Answer briefly with your verdict and suggestions.";

/// Extraction of per-character memories from accepted prose.
pub const MEMORY_EXTRACTION: &str = r"Analyse the story passage below and extract the key events as character memories.

Characters: {characters}

Passage:
{content}

Write one memory per line in exactly this format:
name|type|content|emotional weight (0.0-1.0)|comma-separated keywords

Memory types: core, emotional, skill, episodic, semantic

Example:
Alex|emotional|Lost a close friend in the battle and grieved deeply|0.9|battle,friend,grief,loss

Output only the lines, without explanation.";

/// Identifies a built-in template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// [`CHARACTER_REVIEW`]
    CharacterReview,
    /// [`WORLDVIEW_REVIEW`]
    WorldviewReview,
    /// [`MEMORY_EXTRACTION`]
    MemoryExtraction,
}

impl PromptId {
    /// All built-in templates.
    pub const ALL: [PromptId; 3] = [
        PromptId::CharacterReview,
        PromptId::WorldviewReview,
        PromptId::MemoryExtraction,
    ];

    /// Stable identifier.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CharacterReview => "character_review",
            Self::WorldviewReview => "worldview_review",
            Self::MemoryExtraction => "memory_extraction",
        }
    }

    /// Template text.
    #[must_use]
    pub fn template(self) -> &'static str {
        match self {
            Self::CharacterReview => CHARACTER_REVIEW,
            Self::WorldviewReview => WORLDVIEW_REVIEW,
            Self::MemoryExtraction => MEMORY_EXTRACTION,
        }
    }

    /// Placeholders the template expects.
    #[must_use]
    pub fn variables(self) -> &'static [&'static str] {
        match self {
            Self::CharacterReview => &["name", "traits", "speech_pattern", "habits", "content"],
            Self::WorldviewReview => &["name", "summary", "rules", "constraints", "content"],
            Self::MemoryExtraction => &["characters", "content"],
        }
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PromptId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.name() == s)
            .ok_or_else(|| format!("unknown prompt template '{s}'"))
    }
}

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value. Unknown placeholders are
/// left as they are.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

/// Render a built-in template, requiring every placeholder it declares.
///
/// # Errors
///
/// Returns [`GeneratorError::Config`] naming the first missing variable.
pub fn render(id: PromptId, vars: &[(&str, &str)]) -> Result<String, GeneratorError> {
    if let Some(missing) = id
        .variables()
        .iter()
        .find(|name| !vars.iter().any(|(k, _)| k == *name))
    {
        return Err(GeneratorError::Config(format!(
            "template '{id}' is missing variable '{missing}'"
        )));
    }
    Ok(render_template(id.template(), vars))
}
