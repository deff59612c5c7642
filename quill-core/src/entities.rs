//! Story entities the engines read but never own.
//!
//! Characters and worldviews are the rule sources for consistency scoring;
//! projects and timelines are looked up only to anchor a generation run.
//! Their CRUD lives outside quill.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{CharacterId, ProjectId, TimelineId, WorldviewId};

/// A writing project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier.
    pub id: ProjectId,
    /// Project title.
    pub name: String,
    /// Optional pitch or synopsis.
    #[serde(default)]
    pub description: Option<String>,
}

/// A named timeline inside a project that new memories can be pinned to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    /// Unique identifier.
    pub id: TimelineId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Timeline title.
    pub title: String,
}

/// A character sheet: the declared traits that generated prose must honour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    /// Unique identifier.
    pub id: CharacterId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Display name, also used to attribute extracted memories.
    pub name: String,
    /// One-paragraph summary; replaces age/traits in prompts when present.
    #[serde(default)]
    pub summary: Option<String>,
    /// Age, if relevant.
    #[serde(default)]
    pub age: Option<u32>,
    /// Declared personality traits ("brave", "cautious", ...).
    #[serde(default)]
    pub personality_traits: Vec<String>,
    /// Coarse personality vector, each component in `[0, 1]`.
    #[serde(default)]
    pub personality_vector: Vec<f32>,
    /// How the character speaks ("formal", "rough and crude", ...).
    #[serde(default)]
    pub speech_pattern: Option<String>,
    /// Behavioural habits, possibly negated ("never lies to a friend").
    #[serde(default)]
    pub behavioral_habits: Vec<String>,
}

impl Character {
    /// Create a character with only a name.
    #[must_use]
    pub fn new(project_id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            id: CharacterId::new(),
            project_id,
            name: name.into(),
            summary: None,
            age: None,
            personality_traits: Vec::new(),
            personality_vector: Vec::new(),
            speech_pattern: None,
            behavioral_habits: Vec::new(),
        }
    }

    /// Builder: set personality traits.
    #[must_use]
    pub fn with_traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.personality_traits = traits.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the speech pattern.
    #[must_use]
    pub fn with_speech_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.speech_pattern = Some(pattern.into());
        self
    }

    /// Builder: set behavioural habits.
    #[must_use]
    pub fn with_habits<I, S>(mut self, habits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.behavioral_habits = habits.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the personality vector.
    #[must_use]
    pub fn with_personality_vector(mut self, vector: Vec<f32>) -> Self {
        self.personality_vector = vector;
        self
    }
}

/// Worldview: rules, constraints and laws that all prose in a project obeys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worldview {
    /// Unique identifier.
    pub id: WorldviewId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Display name.
    pub name: String,
    /// Setting summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// Core rules ("Magic is forbidden in the capital").
    #[serde(default)]
    pub rules: Vec<String>,
    /// Additional constraints, usually prohibitions.
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Universe laws keyed by domain; `physics` is checked.
    #[serde(default)]
    pub universe_laws: BTreeMap<String, String>,
    /// Glossary of defined proper nouns.
    #[serde(default)]
    pub terminology: BTreeMap<String, String>,
}

impl Worldview {
    /// Create an empty worldview.
    #[must_use]
    pub fn new(project_id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            id: WorldviewId::new(),
            project_id,
            name: name.into(),
            summary: None,
            rules: Vec::new(),
            constraints: Vec::new(),
            universe_laws: BTreeMap::new(),
            terminology: BTreeMap::new(),
        }
    }

    /// Builder: set rules.
    #[must_use]
    pub fn with_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules = rules.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set constraints.
    #[must_use]
    pub fn with_constraints<I, S>(mut self, constraints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints = constraints.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set one universe law.
    #[must_use]
    pub fn with_law(mut self, domain: impl Into<String>, law: impl Into<String>) -> Self {
        self.universe_laws.insert(domain.into(), law.into());
        self
    }

    /// The physics law, if declared.
    #[must_use]
    pub fn physics(&self) -> Option<&str> {
        self.universe_laws.get("physics").map(String::as_str)
    }
}
