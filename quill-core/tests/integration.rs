//! Integration Tests: End-to-End Memory and Consistency Flows
//!
//! These tests drive the public API the way the generation pipeline does:
//! seed a store, retrieve against scenes over simulated time, persist to
//! SQLite, and score text against characters and worldviews.

use std::sync::Arc;

use chrono::{Duration, Utc};

use quill_core::config::{AccessBoost, DecayConfig, PersistenceConfig, QuillConfig, RetrievalConfig};
use quill_core::consistency::Subject;
use quill_core::{
    Character, CharacterId, ConsistencyEngine, ContentType, InMemoryCatalog, InMemoryMemoryStore,
    MemoryRecord, MemoryRepository, MemoryType, ProjectId, RelevanceEngine, SqliteMemoryStore,
    Worldview,
};

fn seed(store: &dyn MemoryRepository, character: CharacterId) {
    let now = Utc::now();
    let memories = [
        MemoryRecord::new(character, MemoryType::Core, "Swore to protect the harbor town", 0.9)
            .with_keywords(["harbor", "oath"]),
        MemoryRecord::new(character, MemoryType::Emotional, "Lost a brother to the storm", 1.0)
            .with_keywords(["storm", "brother"]),
        MemoryRecord::new(character, MemoryType::Skill, "Can sail through fog", 0.3)
            .with_keywords(["fog", "sail"]),
        MemoryRecord::new(character, MemoryType::Semantic, "The lighthouse keeper owes a debt", 0.2)
            .with_keywords(["lighthouse"])
            .accessed(now - Duration::days(40), 1.0, 0),
    ];
    for m in memories {
        store.save(m).expect("save");
    }
}

// ---------------------------------------------------------------------------
// Full memory lifecycle: seed → retrieve → decay → persist → restore
// ---------------------------------------------------------------------------

#[test]
fn full_memory_lifecycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("story.db");
    let alex = CharacterId::new();

    let store: Arc<dyn MemoryRepository> =
        Arc::new(SqliteMemoryStore::open(&path, &PersistenceConfig::default()).expect("open"));
    seed(store.as_ref(), alex);
    let engine = RelevanceEngine::from_config(store.clone(), &QuillConfig::default());

    let now = Utc::now();
    let got = engine
        .retrieve(alex, "A storm gathers over the harbor", Some("dread"), 2, now)
        .expect("retrieve");
    assert_eq!(got.len(), 2);
    assert!(got.iter().all(|m| m.access_count == 1));
    assert_eq!(got[0].memory_type, MemoryType::Emotional, "emotional resonance should win");

    // The 40-day-old lighthouse memory fell below the floor but is kept.
    let faded = engine.find_by_keyword(alex, "lighthouse").expect("find");
    assert_eq!(faded.len(), 1);
    assert!(faded[0].accessibility <= 0.3);

    drop(engine);
    drop(store);
    let reopened = SqliteMemoryStore::open(&path, &PersistenceConfig::default()).expect("reopen");
    let restored = reopened.list_for_character(alex).expect("list");
    assert_eq!(restored.len(), 4);
    assert_eq!(restored.iter().map(|m| m.access_count).sum::<u32>(), 2);
}

#[test]
fn retrieval_over_simulated_weeks_decays_unused_memories() {
    let store = Arc::new(InMemoryMemoryStore::new());
    let alex = CharacterId::new();
    let start = Utc::now();
    let used = store
        .save(
            MemoryRecord::new(alex, MemoryType::Episodic, "Daily drills at dawn", 0.4)
                .with_keywords(["drill"])
                .accessed(start, 1.0, 0),
        )
        .expect("save");
    let unused = store
        .save(
            MemoryRecord::new(alex, MemoryType::Episodic, "A festival long ago", 0.4)
                .with_keywords(["festival"])
                .accessed(start, 1.0, 0),
        )
        .expect("save");

    let engine = RelevanceEngine::new(store.clone(), DecayConfig::default(), RetrievalConfig::default());
    for day in 1..=10 {
        engine
            .retrieve(alex, "morning drill", None, 1, start + Duration::days(day))
            .expect("retrieve");
    }
    engine
        .refresh_accessibility(alex, start + Duration::days(10))
        .expect("refresh");

    let used = store.get(used).expect("get").expect("present");
    let unused = store.get(unused).expect("get").expect("present");
    assert_eq!(used.access_count, 10);
    assert!((used.accessibility - 1.0).abs() < f32::EPSILON);
    assert!(unused.accessibility < 0.3, "ten idle days should push it under the floor");
}

#[test]
fn recover_boost_moves_toward_one_without_reaching_it() {
    let store = Arc::new(InMemoryMemoryStore::new());
    let alex = CharacterId::new();
    let now = Utc::now();
    let id = store
        .save(
            MemoryRecord::new(alex, MemoryType::Skill, "Knows the old tongue", 0.5)
                .with_keywords(["tongue"])
                .accessed(now - Duration::days(3), 0.6, 2),
        )
        .expect("save");
    let decay = DecayConfig {
        boost: AccessBoost::Recover { fraction: 0.3 },
        ..DecayConfig::default()
    };
    let engine = RelevanceEngine::new(store.clone(), decay, RetrievalConfig::default());
    let got = engine.retrieve(alex, "the old tongue", None, 1, now).expect("retrieve");
    assert_eq!(got[0].id, id);
    assert!(got[0].accessibility > 0.6 && got[0].accessibility < 1.0);
}

// ---------------------------------------------------------------------------
// Consistency scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn brave_character_and_forbidden_magic() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let project = ProjectId::new();
    let alex = Character::new(project, "Alex").with_traits(["brave"]);
    let world = Worldview::new(project, "Aldmere").with_rules(["Magic is forbidden in the capital"]);
    let (alex_id, world_id) = (alex.id, world.id);
    catalog.put_character(alex);
    catalog.put_worldview(world);

    let engine = ConsistencyEngine::new(catalog.clone(), catalog, QuillConfig::default().consistency);

    let r = engine
        .validate(Subject::Character(alex_id), "Alex was terrified and refused to move", ContentType::Narrative)
        .await
        .expect("validate");
    assert!(!r.passed);
    assert!(r.violations.iter().any(|v| v.starts_with("Trait contradiction")));

    let r = engine
        .validate(Subject::Worldview(world_id), "she cast a spell inside the capital", ContentType::Scene)
        .await
        .expect("validate");
    assert!(!r.passed);
    assert_eq!(r.violations.len(), 1);
    assert!(!engine
        .quick_validate_worldview(world_id, "she cast a spell inside the capital")
        .expect("quick"));
}
