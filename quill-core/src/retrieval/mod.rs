//! Memory retrieval: decay, multi-factor scoring and access bookkeeping.
//!
//! [`RelevanceEngine::retrieve`] runs in four steps:
//! 1. decay every candidate to `now` and persist it,
//! 2. drop memories at or below the accessibility floor,
//! 3. score and rank (score, then accessibility, then most recent access),
//! 4. record an access on each returned memory.
//!
//! Steps 1 and 4 go through [`MemoryRepository::modify`], so concurrent
//! retrievals of the same memory never lose an update.

pub mod scoring;

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{DecayConfig, QuillConfig, RetrievalConfig};
use crate::consistency::lexicon::Text;
use crate::decay;
use crate::error::{QuillError, Result};
use crate::memory::{MemoryRecord, MemoryRepository};
use crate::types::{CharacterId, MemoryId, RelevanceScore};

/// A scored retrieval result.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// The retrieved memory, after its access was recorded.
    pub memory: MemoryRecord,
    /// Combined relevance score in `[0, 1]`.
    pub score: RelevanceScore,
    /// Per-factor breakdown (weighted contributions).
    pub breakdown: ScoreBreakdown,
}

/// Breakdown of a relevance score into its weighted factors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBreakdown {
    /// Keyword overlap contribution.
    pub keyword: f64,
    /// Emotional resonance contribution.
    pub emotional: f64,
    /// Accessibility contribution.
    pub accessibility: f64,
    /// Importance (emotional weight) contribution.
    pub importance: f64,
}

/// Finds the memories a character would bring to a scene.
pub struct RelevanceEngine {
    store: Arc<dyn MemoryRepository>,
    decay: DecayConfig,
    retrieval: RetrievalConfig,
}

impl std::fmt::Debug for RelevanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelevanceEngine")
            .field("decay", &self.decay)
            .field("retrieval", &self.retrieval)
            .finish_non_exhaustive()
    }
}

impl RelevanceEngine {
    /// Create an engine over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn MemoryRepository>, decay: DecayConfig, retrieval: RetrievalConfig) -> Self {
        Self {
            store,
            decay,
            retrieval,
        }
    }

    /// Create an engine from the `[decay]` and `[retrieval]` sections.
    #[must_use]
    pub fn from_config(store: Arc<dyn MemoryRepository>, config: &QuillConfig) -> Self {
        Self::new(store, config.decay.clone(), config.retrieval.clone())
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn MemoryRepository> {
        &self.store
    }

    /// Retrieve up to `limit` memories of `character` relevant to `scene`.
    ///
    /// Every returned memory has had its access recorded.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn retrieve(
        &self,
        character: CharacterId,
        scene: &str,
        emotion: Option<&str>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<MemoryRecord>> {
        Ok(self
            .retrieve_scored(character, scene, emotion, limit, now)?
            .into_iter()
            .map(|r| r.memory)
            .collect())
    }

    /// Same as [`Self::retrieve`], keeping the score breakdown of each result.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn retrieve_scored(
        &self,
        character: CharacterId,
        scene: &str,
        emotion: Option<&str>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RetrievalResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let candidates = self.decay_all(character, now)?;
        let floor = self.retrieval.min_accessibility;
        let scene = Text::new(scene);

        let mut ranked: Vec<(MemoryRecord, ScoreBreakdown, RelevanceScore)> = candidates
            .into_iter()
            .filter(|m| m.accessibility > floor)
            .map(|m| {
                let breakdown =
                    scoring::compute_breakdown(&m, &scene, emotion, &self.retrieval.weights);
                let score = scoring::total(&breakdown);
                (m, breakdown, score)
            })
            .collect();

        ranked.sort_by(|(a, _, sa), (b, _, sb)| {
            sb.cmp(sa)
                .then_with(|| b.accessibility.partial_cmp(&a.accessibility).unwrap_or(Ordering::Equal))
                .then_with(|| b.last_accessed_at.cmp(&a.last_accessed_at))
        });
        ranked.truncate(limit);

        let boost = self.decay.boost;
        let mut results = Vec::with_capacity(ranked.len());
        for (memory, breakdown, score) in ranked {
            let touched = self.store.modify(memory.id, &mut |m| {
                decay::apply(m, now, &self.decay);
                m.record_access(now, boost);
            });
            match touched {
                Ok(memory) => results.push(RetrievalResult {
                    memory,
                    score,
                    breakdown,
                }),
                // Deleted between ranking and access.
                Err(QuillError::MemoryNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        debug!(
            character = %character,
            returned = results.len(),
            limit,
            "Retrieved memories"
        );
        Ok(results)
    }

    /// The `limit` most important memories, by
    /// `0.4 * type_weight + 0.3 * emotional_weight + 0.3 * accessibility`.
    /// Read-only: nothing is decayed or accessed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn top_important(&self, character: CharacterId, limit: usize) -> Result<Vec<MemoryRecord>> {
        let mut memories = self.store.list_for_character(character)?;
        memories.sort_by(|a, b| {
            b.importance()
                .partial_cmp(&a.importance())
                .unwrap_or(Ordering::Equal)
        });
        memories.truncate(limit);
        Ok(memories)
    }

    /// Decay every memory of `character` to `now` and persist the results.
    /// Returns how many memories changed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn refresh_accessibility(&self, character: CharacterId, now: DateTime<Utc>) -> Result<usize> {
        let mut changed = 0;
        for id in self.store.ids_for_character(character)? {
            let mut did_change = false;
            match self.store.modify(id, &mut |m| did_change = decay::apply(m, now, &self.decay)) {
                Ok(_) => {}
                Err(QuillError::MemoryNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
            if did_change {
                changed += 1;
            }
        }
        debug!(character = %character, changed, "Refreshed accessibility");
        Ok(changed)
    }

    /// Memories of `character` that concern `related`, most accessible first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn memories_about(&self, character: CharacterId, related: CharacterId) -> Result<Vec<MemoryRecord>> {
        let mut memories: Vec<MemoryRecord> = self
            .store
            .list_for_character(character)?
            .into_iter()
            .filter(|m| m.related_character_ids.contains(&related))
            .collect();
        sort_by_accessibility(&mut memories);
        Ok(memories)
    }

    /// Memories of `character` whose keywords or content mention `keyword`.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn find_by_keyword(&self, character: CharacterId, keyword: &str) -> Result<Vec<MemoryRecord>> {
        let mut memories: Vec<MemoryRecord> = self
            .store
            .list_for_character(character)?
            .into_iter()
            .filter(|m| m.mentions(keyword))
            .collect();
        sort_by_accessibility(&mut memories);
        Ok(memories)
    }

    fn decay_all(&self, character: CharacterId, now: DateTime<Utc>) -> Result<Vec<MemoryRecord>> {
        let ids: Vec<MemoryId> = self.store.ids_for_character(character)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.modify(id, &mut |m| {
                decay::apply(m, now, &self.decay);
            }) {
                Ok(m) => out.push(m),
                Err(QuillError::MemoryNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

fn sort_by_accessibility(memories: &mut [MemoryRecord]) {
    memories.sort_by(|a, b| {
        b.accessibility
            .partial_cmp(&a.accessibility)
            .unwrap_or(Ordering::Equal)
    });
}
