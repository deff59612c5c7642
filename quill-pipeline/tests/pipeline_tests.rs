//! End-to-end pipeline runs against a scripted generator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_core::config::PersistenceConfig;
use quill_core::{
    Character, CharacterId, ConsistencyResult, ContentType, DeepReviewer, InMemoryCatalog,
    InMemoryMemoryStore, MemoryRecord, MemoryRepository, MemoryType, Project, ProjectId, QuillConfig,
    QuillError, ReviewSubject, SqliteMemoryStore, Timeline, TimelineId, Worldview, WorldviewId,
};
use quill_llm::GeneratorError;
use quill_llm::testing::{ScriptedGenerator, Step};
use quill_pipeline::{
    CancelToken, Collaborators, FailureKind, GenerationPipeline, GenerationRequest, RequestError,
    WorldFile,
};

const COWARDLY: &str = "Alex was terrified and refused to move.";
const STEADY: &str = "Alex stepped forward and held the line while the tide came in.";

struct Fixture {
    catalog: Arc<InMemoryCatalog>,
    store: Arc<InMemoryMemoryStore>,
    project: ProjectId,
    alex: Character,
    mira: Character,
    world: Worldview,
}

fn fixture() -> Fixture {
    let catalog = Arc::new(InMemoryCatalog::new());
    let project = Project {
        id: ProjectId::new(),
        name: "Tides".into(),
        description: None,
    };
    let alex = Character::new(project.id, "Alex").with_traits(["brave"]);
    let mira = Character::new(project.id, "Mira");
    let world = Worldview::new(project.id, "Aldmere").with_rules(["Magic is forbidden in the capital"]);
    catalog.put_character(alex.clone());
    catalog.put_character(mira.clone());
    catalog.put_worldview(world.clone());
    let project_id = project.id;
    catalog.put_project(project);
    Fixture {
        catalog,
        store: Arc::new(InMemoryMemoryStore::new()),
        project: project_id,
        alex,
        mira,
        world,
    }
}

fn config() -> QuillConfig {
    let mut config = QuillConfig::default();
    config.consistency.deep_review_enabled = false;
    config
}

fn pipeline_with(f: &Fixture, config: &QuillConfig, generator: Arc<ScriptedGenerator>) -> GenerationPipeline {
    GenerationPipeline::new(
        config,
        Collaborators::from_catalog(f.catalog.clone(), f.store.clone()),
        generator,
    )
}

fn pipeline(f: &Fixture, generator: Arc<ScriptedGenerator>) -> GenerationPipeline {
    pipeline_with(f, &config(), generator)
}

fn request(f: &Fixture, characters: Vec<CharacterId>) -> GenerationRequest {
    let mut request = GenerationRequest::new(f.project, characters, ContentType::Scene, "A storm over the harbor");
    request.auto_create_memory = false;
    request
}

#[tokio::test]
async fn zero_retries_means_exactly_one_attempt() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([COWARDLY]));
    let result = pipeline(&f, generator.clone())
        .execute(request(&f, vec![f.alex.id]).with_max_retries(0))
        .await
        .expect("valid request");

    assert!(result.success);
    assert_eq!(generator.call_count(), 1);
    assert_eq!(result.retry_count, 0);
    assert_eq!(result.attempts.len(), 1);
    assert!(!result.passed_all_validation);
    assert!(result.violations.iter().any(|v| v.starts_with("Alex: ")));
    assert_eq!(result.generated_content.as_deref(), Some(COWARDLY));
}

#[tokio::test]
async fn retries_stop_at_the_budget_and_carry_feedback() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([COWARDLY, COWARDLY, COWARDLY, COWARDLY]));
    let result = pipeline(&f, generator.clone())
        .execute(request(&f, vec![f.alex.id]).with_max_retries(2).with_goal("End at dawn"))
        .await
        .expect("valid request");

    assert_eq!(generator.call_count(), 3);
    assert_eq!(result.retry_count, 2);
    assert_eq!(result.attempts.len(), 3);
    assert!(result.attempts.iter().all(|a| !a.passed));
    assert!(!result.passed_all_validation);

    let prompts = generator.prompts();
    assert!(!prompts[0].contains("Problems in the previous attempt"));
    assert!(prompts[0].contains("End at dawn"));
    assert!(prompts[1].contains("End at dawn"));
    assert!(prompts[1].contains("## Problems in the previous attempt"));
    assert!(prompts[1].contains("1. Alex: "));
    assert!(prompts[2].contains("## Problems in the previous attempt"));
}

#[tokio::test]
async fn a_passing_attempt_ends_the_loop() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([COWARDLY, STEADY]));
    let result = pipeline(&f, generator.clone())
        .execute(request(&f, vec![f.alex.id]).with_max_retries(3))
        .await
        .expect("valid request");

    assert!(result.success);
    assert_eq!(generator.call_count(), 2);
    assert_eq!(result.retry_count, 1);
    assert!(result.passed_all_validation);
    assert!(result.violations.is_empty());
    assert_eq!(result.generated_content.as_deref(), Some(STEADY));
    assert_eq!(result.character_results.len(), 1);
    assert!(result.character_results[0].result.passed);
    assert!(!result.attempts[0].passed && result.attempts[1].passed);
}

#[tokio::test]
async fn disabled_checks_accept_the_first_attempt() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([COWARDLY, STEADY]));
    let mut req = request(&f, vec![f.alex.id]).with_worldview(f.world.id);
    req.enable_consistency_check = false;
    let result = pipeline(&f, generator.clone()).execute(req).await.expect("valid request");

    assert!(result.passed_all_validation);
    assert_eq!(generator.call_count(), 1);
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(result.check_count(), 0);
    assert!(result.lowest_score.is_none());
}

#[tokio::test]
async fn worldview_rule_violation_is_reported() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts(["She cast a spell inside the capital."]));
    let result = pipeline(&f, generator)
        .execute(
            request(&f, vec![f.mira.id])
                .with_worldview(f.world.id)
                .with_max_retries(0),
        )
        .await
        .expect("valid request");

    let world = result.worldview_result.as_ref().expect("worldview checked");
    assert!(!world.passed);
    assert!(!world.violations.is_empty());
    assert!(result.violations.iter().any(|v| v.starts_with("Aldmere: ")));
    assert!(!result.passed_all_validation);
    assert_eq!(result.check_count(), 2);
}

#[tokio::test]
async fn brave_character_written_as_terrified_fails() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([COWARDLY]));
    let result = pipeline(&f, generator)
        .execute(request(&f, vec![f.alex.id]).with_max_retries(0))
        .await
        .expect("valid request");

    let check = &result.character_results[0];
    assert_eq!(check.character_id, f.alex.id);
    assert!(!check.result.passed);
    assert!(!check.result.violations.is_empty());
    assert!(result.lowest_score.is_some_and(|s| s <= check.result.overall_score));
}

#[tokio::test]
async fn unknown_worldview_is_skipped() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([STEADY]));
    let result = pipeline(&f, generator)
        .execute(request(&f, vec![f.alex.id]).with_worldview(WorldviewId::new()))
        .await
        .expect("valid request");

    assert!(result.success);
    assert!(result.worldview_result.is_none());
    assert!(result.passed_all_validation);
}

#[tokio::test]
async fn malformed_extraction_falls_back_to_one_memory_per_character() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([
        "Alex and Mira walked the quay in silence.",
        "nothing useful here, no delimiters at all",
    ]));
    let mut req = request(&f, vec![f.alex.id, f.mira.id]);
    req.auto_create_memory = true;
    req.enable_consistency_check = false;
    let result = pipeline(&f, generator.clone()).execute(req).await.expect("valid request");

    assert!(result.success);
    assert!(result.used_fallback_memories);
    assert_eq!(result.new_memory_ids.len(), 2);
    for id in &result.new_memory_ids {
        let memory = f.store.get(*id).expect("lookup").expect("stored");
        assert!((memory.emotional_weight - 0.5).abs() < f32::EPSILON);
        assert_eq!(memory.memory_type, MemoryType::Episodic);
        assert_eq!(memory.content, "participated in scene: A storm over the harbor");
    }
    let owners: Vec<_> = result
        .new_memory_ids
        .iter()
        .map(|id| f.store.get(*id).expect("lookup").expect("stored").character_id)
        .collect();
    assert!(owners.contains(&f.alex.id) && owners.contains(&f.mira.id));
}

#[tokio::test]
async fn extracted_memories_are_parsed_and_pinned_to_the_timeline() {
    let f = fixture();
    let timeline = Timeline {
        id: TimelineId::new(),
        project_id: f.project,
        title: "Book one".into(),
    };
    f.catalog.put_timeline(timeline.clone());

    let prose = "x".repeat(800);
    let generator = Arc::new(ScriptedGenerator::with_texts([
        prose.as_str(),
        "ALEX|emotional|Saw the harbor burn|0.9|harbor, fire\nMira|unknown|Kept watch|0.4",
    ]));
    let mut req = request(&f, vec![f.alex.id, f.mira.id]);
    req.auto_create_memory = true;
    req.enable_consistency_check = false;
    req.timeline_id = Some(timeline.id);
    let result = pipeline(&f, generator.clone()).execute(req).await.expect("valid request");

    assert!(!result.used_fallback_memories);
    assert_eq!(result.new_memory_ids.len(), 2);
    let first = f.store.get(result.new_memory_ids[0]).expect("lookup").expect("stored");
    assert_eq!(first.character_id, f.alex.id);
    assert_eq!(first.memory_type, MemoryType::Emotional);
    assert_eq!(first.timeline_id, Some(timeline.id));
    assert!(first.keywords.contains("fire"));
    let second = f.store.get(result.new_memory_ids[1]).expect("lookup").expect("stored");
    assert_eq!(second.memory_type, MemoryType::Episodic);

    let extraction = &generator.calls()[1];
    assert!((extraction.params.temperature - 0.3).abs() < f32::EPSILON);
    assert_eq!(extraction.params.max_tokens, 500);
    assert!(extraction.prompt.contains(&format!("{}...", "x".repeat(500))));
    assert!(!extraction.prompt.contains(&"x".repeat(501)));
}

#[tokio::test]
async fn retrieved_memories_reach_the_prompt_and_are_touched() {
    let f = fixture();
    let memory = MemoryRecord::new(f.alex.id, MemoryType::Emotional, "Lost a brother to the harbor storm", 0.9)
        .with_keywords(["harbor", "storm"]);
    let memory_id = f.store.save(memory).expect("save");

    let generator = Arc::new(ScriptedGenerator::with_texts([STEADY]));
    let result = pipeline(&f, generator.clone())
        .execute(request(&f, vec![f.alex.id, f.mira.id]))
        .await
        .expect("valid request");

    assert_eq!(result.memories_used, 1);
    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("1. [emotional] Lost a brother to the harbor storm"));
    assert!(prompt.contains("No relevant memories."));

    let touched = f.store.get(memory_id).expect("lookup").expect("stored");
    assert_eq!(touched.access_count, 1);
    assert!(touched.last_accessed_at.is_some());
}

#[tokio::test]
async fn disabled_memory_skips_retrieval() {
    let f = fixture();
    let memory_id = f
        .store
        .save(MemoryRecord::new(f.alex.id, MemoryType::Core, "Born on the harbor", 1.0).with_keywords(["harbor"]))
        .expect("save");
    let generator = Arc::new(ScriptedGenerator::with_texts([STEADY]));
    let mut req = request(&f, vec![f.alex.id]);
    req.enable_memory = false;
    let result = pipeline(&f, generator.clone()).execute(req).await.expect("valid request");

    assert_eq!(result.memories_used, 0);
    assert!(!generator.prompts()[0].contains("Born on the harbor"));
    assert_eq!(f.store.get(memory_id).expect("lookup").expect("stored").access_count, 0);
}

#[tokio::test]
async fn generation_parameters_follow_the_request() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([STEADY, STEADY]));
    let p = pipeline(&f, generator.clone());

    let mut req = request(&f, vec![f.alex.id]);
    req.temperature = 1.1;
    req.max_tokens = 640;
    p.execute(req.clone()).await.expect("valid request");
    req.timeout_ms = Some(1234);
    p.execute(req).await.expect("valid request");

    let calls = generator.calls();
    assert!((calls[0].params.temperature - 1.1).abs() < f32::EPSILON);
    assert_eq!(calls[0].params.max_tokens, 640);
    assert_eq!(calls[0].params.timeout_ms, Some(60_000));
    assert_eq!(calls[1].params.timeout_ms, Some(1234));
}

#[tokio::test]
async fn non_retryable_generator_error_fails_the_run() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push_error(GeneratorError::from_status(401, "bad key"));
    let mut req = request(&f, vec![f.alex.id]);
    req.auto_create_memory = true;
    let result = pipeline(&f, generator.clone()).execute(req).await.expect("valid request");

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Generator { retryable: false }));
    assert!(result.error_message.as_deref().is_some_and(|m| m.contains("401")));
    assert_eq!(generator.call_count(), 1);
    assert!(result.generated_content.is_none());
    assert!(result.new_memory_ids.is_empty());
    assert_eq!(f.store.count().expect("count"), 0);
}

#[tokio::test]
async fn generator_failure_after_a_failed_attempt_keeps_partial_content() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([COWARDLY]));
    generator.push_error(GeneratorError::RetriesExhausted {
        attempts: 3,
        last_error: "server error 503".into(),
    });
    let result = pipeline(&f, generator.clone())
        .execute(request(&f, vec![f.alex.id]).with_max_retries(2))
        .await
        .expect("valid request");

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Generator { retryable: true }));
    assert_eq!(generator.call_count(), 2);
    assert_eq!(result.generated_content.as_deref(), Some(COWARDLY));
    assert_eq!(result.attempts.len(), 1);
    assert!(!result.logs.is_empty());
}

#[tokio::test]
async fn malformed_requests_are_rejected_before_any_call() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([STEADY]));
    let p = pipeline(&f, generator.clone());

    let err = p.execute(request(&f, vec![])).await.expect_err("no characters");
    assert_eq!(err, RequestError::NoCharacters);

    let mut req = request(&f, vec![f.alex.id]);
    req.project_id = None;
    assert_eq!(p.execute(req).await.expect_err("no project"), RequestError::MissingProject);

    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn unknown_character_is_a_context_failure() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([STEADY]));
    let result = pipeline(&f, generator.clone())
        .execute(request(&f, vec![f.alex.id, CharacterId::new()]))
        .await
        .expect("shape is valid");

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Context));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn unknown_project_is_a_context_failure() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([STEADY]));
    let mut req = request(&f, vec![f.alex.id]);
    req.project_id = Some(ProjectId::new());
    let result = pipeline(&f, generator).execute(req).await.expect("shape is valid");
    assert_eq!(result.failure, Some(FailureKind::Context));
}

#[tokio::test]
async fn cancelled_run_makes_no_calls_and_no_memories() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([STEADY]));
    let (handle, token) = CancelToken::pair();
    handle.cancel();
    let mut req = request(&f, vec![f.alex.id]);
    req.auto_create_memory = true;
    let result = pipeline(&f, generator.clone())
        .execute_with(req, &token)
        .await
        .expect("valid request");

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Cancelled));
    assert_eq!(generator.call_count(), 0);
    assert_eq!(f.store.count().expect("count"), 0);
}

#[tokio::test]
async fn cancelling_an_in_flight_call_stops_the_run() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::new());
    generator.push(Step::Hang);
    let p = Arc::new(pipeline(&f, generator.clone()));
    let (handle, token) = CancelToken::pair();
    let mut req = request(&f, vec![f.alex.id]);
    req.auto_create_memory = true;

    let task = tokio::spawn({
        let p = Arc::clone(&p);
        async move { p.execute_with(req, &token).await }
    });
    while generator.call_count() == 0 {
        tokio::task::yield_now().await;
    }
    handle.cancel();

    let result = task.await.expect("join").expect("valid request");
    assert_eq!(result.failure, Some(FailureKind::Cancelled));
    assert!(result.generated_content.is_none());
    assert_eq!(f.store.count().expect("count"), 0);
}

#[tokio::test(start_paused = true)]
async fn deadline_during_extraction_writes_nothing() {
    let f = fixture();
    let generator = Arc::new(ScriptedGenerator::with_texts([STEADY]));
    generator.push(Step::Hang);
    let mut req = request(&f, vec![f.alex.id]);
    req.auto_create_memory = true;
    req.enable_consistency_check = false;
    let token = CancelToken::never().with_timeout(Duration::from_secs(30));

    let result = pipeline(&f, generator.clone())
        .execute_with(req, &token)
        .await
        .expect("valid request");

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::DeadlineExceeded));
    assert_eq!(generator.call_count(), 2, "generation then extraction");
    assert_eq!(result.generated_content.as_deref(), Some(STEADY));
    assert!(result.new_memory_ids.is_empty());
    assert_eq!(f.store.count().expect("count"), 0);
}

struct FixedReviewer;

#[async_trait]
impl DeepReviewer for FixedReviewer {
    async fn review(
        &self,
        subject: ReviewSubject<'_>,
        _text: &str,
        _content_type: ContentType,
        _result: &ConsistencyResult,
    ) -> Result<String, QuillError> {
        Ok(match subject {
            ReviewSubject::Character(c) => format!("{} should face the danger.", c.name),
            ReviewSubject::Worldview(w) => format!("{} forbids this.", w.name),
        })
    }
}

#[tokio::test]
async fn deep_review_notes_are_attached_without_changing_the_verdict() {
    let f = fixture();
    let mut config = config();
    config.consistency.deep_review_enabled = true;
    let generator = Arc::new(ScriptedGenerator::with_texts([COWARDLY]));
    let p = pipeline_with(&f, &config, generator.clone()).with_reviewer(Arc::new(FixedReviewer));

    let result = p
        .execute(request(&f, vec![f.alex.id]).with_max_retries(0))
        .await
        .expect("valid request");

    let check = &result.character_results[0].result;
    assert_eq!(check.deep_review_notes.as_deref(), Some("Alex should face the danger."));
    assert!(!check.passed);
    assert_eq!(generator.call_count(), 1, "the stub reviewer never calls the generator");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_runs_do_not_lose_access_updates() {
    let f = fixture();
    let memory_id = f
        .store
        .save(MemoryRecord::new(f.alex.id, MemoryType::Core, "Grew up on the harbor", 0.8).with_keywords(["harbor"]))
        .expect("save");
    let generator = Arc::new(ScriptedGenerator::new().with_fallback(STEADY));
    let p = Arc::new(pipeline(&f, generator));

    let runs = (0..8).map(|_| {
        let p = Arc::clone(&p);
        let req = request(&f, vec![f.alex.id]);
        tokio::spawn(async move { p.execute(req).await })
    });
    for run in runs.collect::<Vec<_>>() {
        let result = run.await.expect("join").expect("valid request");
        assert!(result.success);
    }

    let memory = f.store.get(memory_id).expect("lookup").expect("stored");
    assert_eq!(memory.access_count, 8);
}

#[tokio::test]
async fn world_file_and_sqlite_store_survive_a_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("memories.db");
    let persistence = PersistenceConfig::default();

    let project = Project {
        id: ProjectId::new(),
        name: "Tides".into(),
        description: None,
    };
    let alex = Character::new(project.id, "Alex").with_traits(["brave"]);
    let world = WorldFile {
        projects: vec![project.clone()],
        characters: vec![alex.clone()],
        memories: vec![MemoryRecord::new(alex.id, MemoryType::Core, "Keeper of the harbor light", 0.9)
            .with_keywords(["harbor"])],
        ..WorldFile::default()
    };
    let world = WorldFile::from_json(&serde_json::to_string(&world).expect("json")).expect("parse");

    let new_ids = {
        let store = Arc::new(SqliteMemoryStore::open(&db, &persistence).expect("open"));
        let catalog = Arc::new(InMemoryCatalog::new());
        world.install(&catalog, store.as_ref()).expect("install");

        let generator = Arc::new(ScriptedGenerator::with_texts([
            STEADY,
            "Alex|core|Held the harbor wall through the storm|0.8|harbor, storm",
        ]));
        let pipeline = GenerationPipeline::new(&config(), Collaborators::from_catalog(catalog, store), generator.clone());
        let mut req = GenerationRequest::new(project.id, vec![alex.id], ContentType::Scene, "Storm at the harbor");
        req.auto_create_memory = true;
        let result = pipeline.execute(req).await.expect("valid request");

        assert!(result.success);
        assert_eq!(result.memories_used, 1);
        assert!(generator.prompts()[0].contains("[core] Keeper of the harbor light"));
        result.new_memory_ids
    };

    let reopened = SqliteMemoryStore::open(&db, &persistence).expect("reopen");
    assert_eq!(reopened.count().expect("count"), 2);
    let stored = reopened.get(new_ids[0]).expect("lookup").expect("persisted");
    assert_eq!(stored.content, "Held the harbor wall through the storm");
    let original = reopened
        .list_for_character(alex.id)
        .expect("list")
        .into_iter()
        .find(|m| m.content == "Keeper of the harbor light")
        .expect("seeded memory");
    assert_eq!(original.access_count, 1);
}
