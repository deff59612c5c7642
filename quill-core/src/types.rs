//! Core type definitions shared across quill.
//!
//! Identity newtypes, the closed memory and content taxonomies, and the
//! ephemeral relevance score used while ranking memories.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_type!(
    /// Unique identifier for a memory record.
    MemoryId
);
id_type!(
    /// Unique identifier for a character.
    CharacterId
);
id_type!(
    /// Unique identifier for a worldview.
    WorldviewId
);
id_type!(
    /// Unique identifier for a writing project.
    ProjectId
);
id_type!(
    /// Unique identifier for a story timeline.
    TimelineId
);

// ---------------------------------------------------------------------------
// Memory taxonomy
// ---------------------------------------------------------------------------

/// The five-layer character memory taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Defines who the character is: formative events, core beliefs.
    Core,
    /// Strongly emotional events and relationships.
    Emotional,
    /// Learned abilities and experience.
    Skill,
    /// Specific things that happened.
    Episodic,
    /// General knowledge about the world.
    Semantic,
}

impl MemoryType {
    /// All memory types, most important first.
    pub const ALL: [Self; 5] = [
        Self::Core,
        Self::Emotional,
        Self::Skill,
        Self::Episodic,
        Self::Semantic,
    ];

    /// Stable machine code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Emotional => "emotional",
            Self::Skill => "skill",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
        }
    }

    /// Human-readable label used in prompts.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Core => "Core memory",
            Self::Emotional => "Emotional memory",
            Self::Skill => "Skill memory",
            Self::Episodic => "Episodic memory",
            Self::Semantic => "Semantic memory",
        }
    }

    /// Fixed importance lookup used by importance ranking.
    #[must_use]
    pub fn type_weight(self) -> f64 {
        match self {
            Self::Core => 1.0,
            Self::Emotional => 0.9,
            Self::Skill => 0.7,
            Self::Episodic => 0.6,
            Self::Semantic => 0.5,
        }
    }

    fn localized_label(self) -> &'static str {
        match self {
            Self::Core => "核心记忆",
            Self::Emotional => "情感记忆",
            Self::Skill => "技能记忆",
            Self::Episodic => "情节记忆",
            Self::Semantic => "语义记忆",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when a memory or content type label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} label: {label}")]
pub struct UnknownLabel {
    /// Which taxonomy was being parsed.
    pub kind: &'static str,
    /// The offending input.
    pub label: String,
}

impl FromStr for MemoryType {
    type Err = UnknownLabel;

    /// Accepts codes (`core`), labels (`Core memory`) and the localized
    /// labels, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| {
                needle.eq_ignore_ascii_case(t.code())
                    || needle.eq_ignore_ascii_case(t.label())
                    || needle == t.localized_label()
            })
            .ok_or_else(|| UnknownLabel {
                kind: "memory type",
                label: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Content taxonomy
// ---------------------------------------------------------------------------

/// Kinds of content the pipeline can generate and the scorer can check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// A full character sheet.
    Character,
    /// Conversation between characters.
    Dialogue,
    /// Description of a setting and its atmosphere.
    Scene,
    /// Third-person narration.
    Narrative,
    /// A character's physical actions.
    Action,
    /// A character's inner voice.
    InnerMonologue,
    /// A complete story chapter.
    Chapter,
    /// Worldview setting material.
    Worldview,
}

impl ContentType {
    /// All content types.
    pub const ALL: [Self; 8] = [
        Self::Character,
        Self::Dialogue,
        Self::Scene,
        Self::Narrative,
        Self::Action,
        Self::InnerMonologue,
        Self::Chapter,
        Self::Worldview,
    ];

    /// Stable machine code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Dialogue => "dialogue",
            Self::Scene => "scene",
            Self::Narrative => "narrative",
            Self::Action => "action",
            Self::InnerMonologue => "inner_monologue",
            Self::Chapter => "chapter",
            Self::Worldview => "worldview",
        }
    }

    /// Whether the text is spoken or thought in a character's own voice,
    /// so speech-pattern rules apply.
    #[must_use]
    pub fn is_voiced(self) -> bool {
        matches!(self, Self::Dialogue | Self::InnerMonologue)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ContentType {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| needle.eq_ignore_ascii_case(t.code()))
            .ok_or_else(|| UnknownLabel {
                kind: "content type",
                label: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Relevance Score
// ---------------------------------------------------------------------------

/// Composite score used to rank memories against a scene query.
/// Always within `[0, 1]`; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct RelevanceScore(pub OrderedFloat<f64>);

impl RelevanceScore {
    /// Create a relevance score, clamping into `[0, 1]`.
    #[must_use]
    pub fn new(score: f64) -> Self {
        let clamped = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self(OrderedFloat(clamped))
    }

    /// Get the raw score value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0.into_inner()
    }
}
