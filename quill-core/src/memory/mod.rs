//! Character memory records and the stores that hold them.
//!
//! A [`MemoryRecord`] is one thing a character remembers. Its
//! `accessibility` fades with time since the last access (see
//! [`crate::decay`]) and is refreshed whenever retrieval hands it to a
//! generation run.

pub mod store;

pub use store::{InMemoryMemoryStore, MemoryRepository};

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AccessBoost;
use crate::decay;
use crate::types::{CharacterId, MemoryId, MemoryType, TimelineId};

/// A single memory owned by one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier for this memory.
    pub id: MemoryId,
    /// The character who remembers this.
    pub character_id: CharacterId,
    /// Position in the five-layer taxonomy.
    pub memory_type: MemoryType,
    /// Natural language content.
    pub content: String,
    /// Emotional charge (0.0 to 1.0); doubles as an importance proxy.
    pub emotional_weight: f32,
    /// Keywords matched against scene queries.
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    /// Other characters this memory is about.
    #[serde(default)]
    pub related_character_ids: BTreeSet<CharacterId>,
    /// Current retrievability (0.0 to 1.0).
    pub accessibility: f32,
    /// Accessibility right after the last access; decay is measured from here.
    pub accessibility_at_access: f32,
    /// Last time retrieval returned this memory.
    #[serde(default)]
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// How many times retrieval returned this memory.
    #[serde(default)]
    pub access_count: u32,
    /// Story timeline this memory is pinned to.
    #[serde(default)]
    pub timeline_id: Option<TimelineId>,
    /// When the memory was formed.
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create a fresh, never-accessed memory with accessibility 1.0.
    #[must_use]
    pub fn new(
        character_id: CharacterId,
        memory_type: MemoryType,
        content: impl Into<String>,
        emotional_weight: f32,
    ) -> Self {
        Self {
            id: MemoryId::new(),
            character_id,
            memory_type,
            content: content.into(),
            emotional_weight: clamp_unit(emotional_weight),
            keywords: BTreeSet::new(),
            related_character_ids: BTreeSet::new(),
            accessibility: 1.0,
            accessibility_at_access: 1.0,
            last_accessed_at: None,
            access_count: 0,
            timeline_id: None,
            created_at: Utc::now(),
        }
    }

    /// Builder: add keywords (trimmed, empty ones dropped).
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords.extend(
            keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_string())
                .filter(|k| !k.is_empty()),
        );
        self
    }

    /// Builder: link the memory to other characters.
    #[must_use]
    pub fn with_related<I: IntoIterator<Item = CharacterId>>(mut self, ids: I) -> Self {
        self.related_character_ids.extend(ids);
        self
    }

    /// Builder: pin the memory to a timeline.
    #[must_use]
    pub fn with_timeline(mut self, timeline_id: TimelineId) -> Self {
        self.timeline_id = Some(timeline_id);
        self
    }

    /// Builder: override the formation time.
    #[must_use]
    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Builder: pretend the memory was last accessed at `at` with the given
    /// accessibility. Mostly for loading fixtures and tests.
    #[must_use]
    pub fn accessed(mut self, at: DateTime<Utc>, accessibility: f32, access_count: u32) -> Self {
        let accessibility = clamp_unit(accessibility);
        self.last_accessed_at = Some(at);
        self.accessibility = accessibility;
        self.accessibility_at_access = accessibility;
        self.access_count = access_count;
        self
    }

    /// Record a retrieval: bump the access count, stamp the time and boost
    /// accessibility. Accessibility never goes down here.
    pub fn record_access(&mut self, now: DateTime<Utc>, boost: AccessBoost) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = Some(now);
        self.accessibility = decay::boosted(self.accessibility, self.access_count, boost);
        self.accessibility_at_access = self.accessibility;
    }

    /// Importance used by "top important" ranking:
    /// `0.4 * type_weight + 0.3 * emotional_weight + 0.3 * accessibility`.
    #[must_use]
    pub fn importance(&self) -> f64 {
        0.4 * self.memory_type.type_weight()
            + 0.3 * f64::from(self.emotional_weight)
            + 0.3 * f64::from(self.accessibility)
    }

    /// Whether any keyword or the content mentions `needle`, case-insensitively.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        self.keywords
            .iter()
            .any(|k| k.to_lowercase().contains(&needle))
            || self.content.to_lowercase().contains(&needle)
    }
}

/// Clamp into `[0, 1]`, mapping NaN to 0.
pub(crate) fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_memory_starts_fully_accessible() {
        let m = MemoryRecord::new(CharacterId::new(), MemoryType::Episodic, "met the bard", 1.4);
        assert!((m.accessibility - 1.0).abs() < f32::EPSILON);
        assert!((m.emotional_weight - 1.0).abs() < f32::EPSILON);
        assert_eq!(m.access_count, 0);
        assert!(m.last_accessed_at.is_none());
    }

    #[test]
    fn record_access_bumps_count_and_resets() {
        let now = Utc::now();
        let mut m = MemoryRecord::new(CharacterId::new(), MemoryType::Core, "x", 0.5)
            .accessed(now, 0.4, 3);
        m.record_access(now, AccessBoost::Reset);
        assert_eq!(m.access_count, 4);
        assert!((m.accessibility - 1.0).abs() < f32::EPSILON);
        assert_eq!(m.last_accessed_at, Some(now));
    }

    #[test]
    fn importance_follows_type_weight() {
        let c = CharacterId::new();
        let core = MemoryRecord::new(c, MemoryType::Core, "a", 0.5);
        let semantic = MemoryRecord::new(c, MemoryType::Semantic, "b", 0.5);
        assert!(core.importance() > semantic.importance());
        assert!((core.importance() - (0.4 + 0.15 + 0.3)).abs() < 1e-6);
    }

    #[test]
    fn mentions_checks_keywords_and_content() {
        let m = MemoryRecord::new(CharacterId::new(), MemoryType::Episodic, "Lost the Silver Key", 0.2)
            .with_keywords(["harbor", " "]);
        assert_eq!(m.keywords.len(), 1);
        assert!(m.mentions("HARBOR"));
        assert!(m.mentions("silver key"));
        assert!(!m.mentions("dragon"));
        assert!(!m.mentions(""));
    }
}
