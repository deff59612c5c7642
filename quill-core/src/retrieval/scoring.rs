//! Per-factor scoring functions for memory retrieval.
//!
//! Score = w₁·Keyword(m) + w₂·Emotional(m) + w₃·Accessibility(m) + w₄·Importance(m)
//!
//! Where:
//!   Keyword(m)       = matched keywords / total keywords (whole words of the scene text)
//!   Emotional(m)     = emotional_weight for emotional memories when an emotion is given
//!   Accessibility(m) = current (decayed) accessibility
//!   Importance(m)    = emotional_weight
//!
//! Every factor is clamped to [0, 1] before weighting and the sum is capped at 1.

use crate::config::RelevanceWeights;
use crate::consistency::lexicon::Text;
use crate::memory::MemoryRecord;
use crate::retrieval::ScoreBreakdown;
use crate::types::{MemoryType, RelevanceScore};

/// Compute the full score breakdown for a single memory.
#[must_use]
pub fn compute_breakdown(
    memory: &MemoryRecord,
    scene: &Text,
    emotion: Option<&str>,
    weights: &RelevanceWeights,
) -> ScoreBreakdown {
    ScoreBreakdown {
        keyword: weights.keyword * keyword_score(memory, scene),
        emotional: weights.emotional_resonance * emotional_score(memory, emotion),
        accessibility: weights.accessibility * unit(f64::from(memory.accessibility)),
        importance: weights.importance * unit(f64::from(memory.emotional_weight)),
    }
}

/// Total of a breakdown as a bounded relevance score.
#[must_use]
pub fn total(breakdown: &ScoreBreakdown) -> RelevanceScore {
    RelevanceScore::new(
        breakdown.keyword + breakdown.emotional + breakdown.accessibility + breakdown.importance,
    )
}

/// Fraction of the memory's keywords that occur as words of the scene text.
fn keyword_score(memory: &MemoryRecord, scene: &Text) -> f64 {
    if memory.keywords.is_empty() || scene.is_empty() {
        return 0.0;
    }
    let matched = memory.keywords.iter().filter(|k| scene.has_term(k)).count();
    unit(matched as f64 / memory.keywords.len() as f64)
}

/// Emotional resonance: only emotional memories resonate, and only when the
/// scene carries an emotion.
fn emotional_score(memory: &MemoryRecord, emotion: Option<&str>) -> f64 {
    let has_emotion = emotion.is_some_and(|e| !e.trim().is_empty());
    if has_emotion && memory.memory_type == MemoryType::Emotional {
        unit(f64::from(memory.emotional_weight))
    } else {
        0.0
    }
}

fn unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CharacterId;

    fn memory(kind: MemoryType, weight: f32, keywords: &[&str]) -> MemoryRecord {
        MemoryRecord::new(CharacterId::new(), kind, "content", weight).with_keywords(keywords)
    }

    #[test]
    fn keyword_ratio_counts_case_insensitive_matches() {
        let m = memory(MemoryType::Episodic, 0.0, &["Harbor", "storm", "lantern", "gull"]);
        let score = keyword_score(&m, &Text::new("a storm rolls over the harbor at dusk"));
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        let m = memory(MemoryType::Episodic, 0.0, &["art", "oath"]);
        assert!(keyword_score(&m, &Text::new("her heart sank at the loathsome sight")).abs() < f64::EPSILON);
        let score = keyword_score(&m, &Text::new("She swore an oath over the art of the guild"));
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn emotional_term_requires_type_and_emotion() {
        let emotional = memory(MemoryType::Emotional, 0.8, &[]);
        let episodic = memory(MemoryType::Episodic, 0.8, &[]);
        assert!((emotional_score(&emotional, Some("grief")) - 0.8).abs() < 1e-6);
        assert!(emotional_score(&emotional, None).abs() < f64::EPSILON);
        assert!(emotional_score(&emotional, Some("  ")).abs() < f64::EPSILON);
        assert!(emotional_score(&episodic, Some("grief")).abs() < f64::EPSILON);
    }

    #[test]
    fn all_zero_inputs_score_exactly_zero() {
        let mut m = memory(MemoryType::Semantic, 0.0, &["unrelated"]);
        m.accessibility = 0.0;
        let b = compute_breakdown(&m, &Text::new("the market square"), Some("joy"), &RelevanceWeights::default());
        assert!(total(&b).value().abs() < f64::EPSILON);
    }

    #[test]
    fn full_match_is_capped_at_one() {
        let m = memory(MemoryType::Emotional, 1.0, &["duel"]);
        let weights = RelevanceWeights {
            keyword: 1.0,
            emotional_resonance: 1.0,
            accessibility: 1.0,
            importance: 1.0,
        };
        let b = compute_breakdown(&m, &Text::new("the duel"), Some("rage"), &weights);
        assert!((total(&b).value() - 1.0).abs() < f64::EPSILON);
    }
}
