//! Property-Based Tests for Quill Core
//!
//! Uses `proptest` to check the memory and scoring invariants under random
//! inputs: decay never raises accessibility, retrieval counts every access
//! exactly once, relevance stays in [0, 1], and `passed` is exactly
//! "score over threshold and no violations".

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use quill_core::config::{AccessBoost, DecayConfig, RelevanceWeights, RetrievalConfig};
use quill_core::consistency::ConsistencyResult;
use quill_core::consistency::lexicon::Text;
use quill_core::decay;
use quill_core::retrieval::scoring;
use quill_core::{
    CharacterId, InMemoryMemoryStore, MemoryRecord, MemoryRepository, MemoryType, RelevanceEngine,
};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default()
}

fn arb_type() -> impl Strategy<Value = MemoryType> {
    prop::sample::select(MemoryType::ALL.to_vec())
}

fn arb_boost() -> impl Strategy<Value = AccessBoost> {
    prop_oneof![
        Just(AccessBoost::Reset),
        (0.0..1.0f32).prop_map(|fraction| AccessBoost::Recover { fraction }),
    ]
}

prop_compose! {
    fn arb_memory()(
        kind in arb_type(),
        weight in -0.5..1.5f32,
        accessibility in 0.0..1.0f32,
        count in 0u32..500,
        hours_ago in 0i64..24 * 120,
        keywords in prop::collection::vec("[a-z]{3,8}", 0..5),
    ) -> MemoryRecord {
        let now = epoch();
        MemoryRecord::new(CharacterId::new(), kind, "memory", weight)
            .with_keywords(keywords)
            .accessed(now - Duration::hours(hours_ago), accessibility, count)
    }
}

// ---------------------------------------------------------------------------
// Property: decay is monotonic non-increasing without an access
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn decay_never_increases_accessibility(
        mut memory in arb_memory(),
        steps in prop::collection::vec(0i64..24 * 30, 1..6),
        strength in 0.5..30.0f64,
        rehearsal in 0.0..10.0f64,
    ) {
        let config = DecayConfig {
            base_strength_days: strength,
            rehearsal_factor: rehearsal,
            boost: AccessBoost::Reset,
        };
        let mut now = epoch();
        let mut previous = memory.accessibility;
        for hours in steps {
            now += Duration::hours(hours);
            decay::apply(&mut memory, now, &config);
            prop_assert!(memory.accessibility <= previous);
            prop_assert!(memory.accessibility >= 0.0);
            previous = memory.accessibility;
        }
    }

    #[test]
    fn relevance_score_is_bounded(
        memory in arb_memory(),
        scene in "[a-z ]{0,60}",
        emotion in prop::option::of("[a-z]{0,8}"),
        w in (0.0..2.0f64, 0.0..2.0f64, 0.0..2.0f64, 0.0..2.0f64),
    ) {
        let weights = RelevanceWeights {
            keyword: w.0,
            emotional_resonance: w.1,
            accessibility: w.2,
            importance: w.3,
        };
        let b = scoring::compute_breakdown(&memory, &Text::new(&scene), emotion.as_deref(), &weights);
        let score = scoring::total(&b).value();
        prop_assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn retrieval_counts_each_access_once_and_never_lowers_accessibility(
        memories in prop::collection::vec(arb_memory(), 1..12),
        boost in arb_boost(),
        limit in 1usize..6,
    ) {
        let store = Arc::new(InMemoryMemoryStore::new());
        let alex = CharacterId::new();
        let now = epoch();
        let decay_config = DecayConfig { boost, ..DecayConfig::default() };
        let mut before = std::collections::HashMap::new();
        for mut m in memories {
            m.character_id = alex;
            // Reference value: what the memory is worth at retrieval time.
            let decayed = decay::decayed_accessibility(&m, now, &decay_config);
            before.insert(m.id, (m.access_count, decayed));
            store.save(m).expect("save");
        }

        let engine = RelevanceEngine::new(store.clone(), decay_config, RetrievalConfig::default());
        let got = engine.retrieve(alex, "scene", None, limit, now).expect("retrieve");
        prop_assert!(got.len() <= limit);

        for m in &got {
            let (count, decayed) = before[&m.id];
            prop_assert_eq!(m.access_count, count + 1);
            prop_assert!(m.accessibility >= decayed);
            prop_assert!(decayed > 0.3);
        }
        for m in store.list_for_character(alex).expect("list") {
            if !got.iter().any(|g| g.id == m.id) {
                prop_assert_eq!(m.access_count, before[&m.id].0);
            }
        }
    }

    #[test]
    fn passed_iff_threshold_met_and_no_violations(
        score in -0.5..1.5f64,
        violations in prop::collection::vec("[a-z]{1,10}", 0..3),
        threshold in 0.0..1.0f64,
    ) {
        let r = ConsistencyResult::new(score, violations.clone(), threshold);
        prop_assert!((0.0..=1.0).contains(&r.overall_score));
        prop_assert_eq!(r.passed, r.overall_score >= threshold && violations.is_empty());
        prop_assert_eq!(r.needs_deep_validation(threshold), !r.passed);
    }
}
