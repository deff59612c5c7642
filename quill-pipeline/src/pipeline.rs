//! The generation pipeline.
//!
//! One run walks a fixed sequence of stages:
//!
//! 1. validate the request (the only stage that can return `Err`)
//! 2. assemble the [`GenerationContext`]
//! 3. generate, score, and retry with feedback up to `max_retries` times
//! 4. extract memories from the last attempt's text
//!
//! Everything after step 1 reports into the [`GenerationResult`]. A generator
//! failure stops the run; a failed consistency check only drives the retry
//! loop; extraction problems degrade to fallback memories.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use quill_core::config::{ConsistencyConfig, PipelineConfig};
use quill_core::{
    CharacterRepository, ConsistencyEngine, ConsistencyResult, ContentType, DeepReviewer,
    InMemoryCatalog, MemoryRepository, ProjectRepository, QuillConfig, RelevanceEngine,
    TimelineRepository, WorldviewRepository,
};
use quill_llm::{GenerationParams, TextGenerator};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::cancel::CancelToken;
use crate::content::PromptRegistry;
use crate::context::{GenerationContext, GenerationGoal};
use crate::error::{PipelineFailure, RequestError};
use crate::extraction::MemoryExtractor;
use crate::request::{GenerationRequest, Validated};
use crate::result::{AttemptRecord, CharacterCheck, GenerationResult};
use crate::reviewer::GeneratorReviewer;

/// Stores the pipeline reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    /// Project lookup.
    pub projects: Arc<dyn ProjectRepository>,
    /// Character lookup.
    pub characters: Arc<dyn CharacterRepository>,
    /// Worldview lookup.
    pub worldviews: Arc<dyn WorldviewRepository>,
    /// Timeline lookup.
    pub timelines: Arc<dyn TimelineRepository>,
    /// Memory store.
    pub memories: Arc<dyn MemoryRepository>,
}

impl Collaborators {
    /// Serve every entity lookup from one catalog.
    #[must_use]
    pub fn from_catalog(catalog: Arc<InMemoryCatalog>, memories: Arc<dyn MemoryRepository>) -> Self {
        Self {
            projects: catalog.clone(),
            characters: catalog.clone(),
            worldviews: catalog.clone(),
            timelines: catalog,
            memories,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Outcome of scoring one attempt.
#[derive(Debug, Default)]
struct Checks {
    characters: Vec<CharacterCheck>,
    worldview: Option<ConsistencyResult>,
    violations: Vec<String>,
    lowest_score: Option<f64>,
    passed: bool,
}

impl Checks {
    fn record(&mut self, subject: &str, result: &ConsistencyResult) {
        self.violations
            .extend(result.violations.iter().map(|v| format!("{subject}: {v}")));
        self.lowest_score = Some(
            self.lowest_score
                .map_or(result.overall_score, |s| s.min(result.overall_score)),
        );
        self.passed &= result.passed;
    }
}

/// Generates character- and world-consistent text.
pub struct GenerationPipeline {
    collaborators: Collaborators,
    generator: Arc<dyn TextGenerator>,
    relevance: RelevanceEngine,
    consistency: ConsistencyEngine,
    consistency_config: ConsistencyConfig,
    extractor: MemoryExtractor,
    prompts: PromptRegistry,
    config: PipelineConfig,
}

impl std::fmt::Debug for GenerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationPipeline")
            .field("generator", &self.generator.name())
            .field("consistency", &self.consistency)
            .field("prompts", &self.prompts)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GenerationPipeline {
    /// Wire a pipeline from configuration.
    ///
    /// Deep review goes through `generator` unless replaced with
    /// [`with_reviewer`](Self::with_reviewer).
    #[must_use]
    pub fn new(config: &QuillConfig, collaborators: Collaborators, generator: Arc<dyn TextGenerator>) -> Self {
        let reviewer = GeneratorReviewer::new(Arc::clone(&generator), config.consistency.deep_review_max_tokens)
            .with_timeout(config.pipeline.generator_timeout_ms);
        let consistency = ConsistencyEngine::new(
            Arc::clone(&collaborators.characters),
            Arc::clone(&collaborators.worldviews),
            config.consistency.clone(),
        )
        .with_reviewer(Arc::new(reviewer));
        let relevance = RelevanceEngine::from_config(Arc::clone(&collaborators.memories), config);
        let extractor = MemoryExtractor::new(
            Arc::clone(&generator),
            Arc::clone(&collaborators.memories),
            Arc::clone(&collaborators.timelines),
            config.pipeline.clone(),
        );

        Self {
            collaborators,
            generator,
            relevance,
            consistency,
            consistency_config: config.consistency.clone(),
            extractor,
            prompts: PromptRegistry::builtin(),
            config: config.pipeline.clone(),
        }
    }

    /// Builder: replace the deep reviewer.
    #[must_use]
    pub fn with_reviewer(mut self, reviewer: Arc<dyn DeepReviewer>) -> Self {
        self.consistency = ConsistencyEngine::new(
            Arc::clone(&self.collaborators.characters),
            Arc::clone(&self.collaborators.worldviews),
            self.consistency_config.clone(),
        )
        .with_reviewer(reviewer);
        self
    }

    /// Builder: replace the base prompt registry.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptRegistry) -> Self {
        self.prompts = prompts;
        self
    }

    /// The relevance engine used for context assembly.
    #[must_use]
    pub fn relevance(&self) -> &RelevanceEngine {
        &self.relevance
    }

    /// Run the pipeline to completion.
    ///
    /// # Errors
    ///
    /// [`RequestError`] when the request is malformed; nothing has been read
    /// or written in that case. Every later failure is reported inside the
    /// returned [`GenerationResult`].
    pub async fn execute(&self, request: GenerationRequest) -> Result<GenerationResult, RequestError> {
        self.execute_with(request, &CancelToken::never()).await
    }

    /// Run the pipeline, stopping early when `cancel` fires or its deadline
    /// passes.
    ///
    /// # Errors
    ///
    /// [`RequestError`] when the request is malformed.
    pub async fn execute_with(
        &self,
        request: GenerationRequest,
        cancel: &CancelToken,
    ) -> Result<GenerationResult, RequestError> {
        let validated = request.validate()?;
        let started = Instant::now();
        let mut result = GenerationResult::started();

        let span = info_span!(
            "generate",
            project = %validated.project_id,
            content_type = %validated.content_type,
            characters = request.character_ids.len(),
        );
        info!(parent: &span, max_retries = request.max_retries, "Generation started");
        result.log(format!(
            "Generating {} for {} character(s)",
            validated.content_type,
            request.character_ids.len()
        ));

        let outcome = self
            .run(&request, validated, cancel, &mut result)
            .instrument(span.clone())
            .await;
        if let Err(failure) = outcome {
            error!(parent: &span, error = %failure, "Generation failed");
            result.success = false;
            result.failure = Some(failure.kind());
            result.log(format!("Generation failed: {failure}"));
            result.error_message = Some(failure.to_string());
        }

        result.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        result.generated_at = Utc::now();
        info!(
            parent: &span,
            success = result.success,
            retries = result.retry_count,
            passed = result.passed_all_validation,
            new_memories = result.new_memory_ids.len(),
            duration_ms = result.duration_ms,
            "Generation finished"
        );
        Ok(result)
    }

    async fn run(
        &self,
        request: &GenerationRequest,
        validated: Validated,
        cancel: &CancelToken,
        result: &mut GenerationResult,
    ) -> Result<(), PipelineFailure> {
        cancel.check()?;
        let context = GenerationContext::assemble(
            request,
            validated,
            self.collaborators.projects.as_ref(),
            self.collaborators.characters.as_ref(),
            self.collaborators.worldviews.as_ref(),
            &self.relevance,
            Utc::now(),
        )?;
        result.memories_used = context.memory_count();
        result.log(format!(
            "Context assembled: {} character(s), {} memories",
            context.characters.len(),
            result.memories_used
        ));

        let base = self.prompts.build(validated.content_type, request);
        let params = GenerationParams {
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            timeout_ms: Some(request.timeout_ms.unwrap_or(self.config.generator_timeout_ms)),
        };

        let mut goal = GenerationGoal::new(request.generation_goal.as_deref());
        let mut attempt = 0;
        let passed = loop {
            cancel.check()?;
            let attempt_started = Instant::now();
            let prompt = context.enhanced_prompt(&base, &goal, self.config.previous_content_chars);
            debug!(attempt, prompt_chars = prompt.len(), "Calling generator");
            result.log(format!("Attempt {}: generating", attempt + 1));

            let text = match cancel.run(self.generator.generate(&prompt, &params)).await? {
                Ok(text) => text,
                Err(e) => {
                    error!(attempt, error = %e, retryable = e.is_retryable(), "Generator call failed");
                    return Err(e.into());
                }
            };
            result.generated_content = Some(text.clone());

            let checks = if request.enable_consistency_check {
                self.check(&context, &text, validated.content_type, cancel).await?
            } else {
                Checks {
                    passed: true,
                    ..Checks::default()
                }
            };

            let duration_ms = u64::try_from(attempt_started.elapsed().as_millis()).unwrap_or(u64::MAX);
            debug!(
                attempt,
                chars = text.chars().count(),
                duration_ms,
                passed = checks.passed,
                lowest_score = ?checks.lowest_score,
                "Attempt scored"
            );
            result.attempts.push(AttemptRecord {
                attempt,
                content_length: text.chars().count(),
                duration_ms,
                passed: checks.passed,
                lowest_score: checks.lowest_score,
                violations: checks.violations.clone(),
            });
            result.lowest_score = checks.lowest_score;
            result.violations.clone_from(&checks.violations);
            result.character_results = checks.characters;
            result.worldview_result = checks.worldview;

            if checks.passed {
                result.log(format!("Attempt {}: passed", attempt + 1));
                break true;
            }
            result.log(format!(
                "Attempt {}: {} violation(s)",
                attempt + 1,
                checks.violations.len()
            ));
            if attempt >= request.max_retries {
                warn!(attempt, violations = checks.violations.len(), "Validation failed; retry budget spent");
                break false;
            }
            warn!(attempt, violations = checks.violations.len(), "Validation failed; retrying with feedback");
            goal = goal.with_feedback(&checks.violations);
            attempt += 1;
        };
        result.retry_count = attempt;
        result.passed_all_validation = passed;

        if request.auto_create_memory {
            let text = result.generated_content.clone().unwrap_or_default();
            if !text.trim().is_empty() {
                result.log("Extracting memories");
                let outcome = self
                    .extractor
                    .extract(&text, &context, request.timeline_id, cancel)
                    .await?;
                result.log(format!(
                    "Stored {} new memor{}{}",
                    outcome.memory_ids.len(),
                    if outcome.memory_ids.len() == 1 { "y" } else { "ies" },
                    if outcome.used_fallback { " (fallback)" } else { "" }
                ));
                result.new_memory_ids = outcome.memory_ids;
                result.used_fallback_memories = outcome.used_fallback;
            }
        }
        Ok(())
    }

    async fn check(
        &self,
        context: &GenerationContext,
        text: &str,
        content_type: ContentType,
        cancel: &CancelToken,
    ) -> Result<Checks, PipelineFailure> {
        let mut checks = Checks {
            passed: true,
            ..Checks::default()
        };
        for character in &context.characters {
            let result = cancel
                .run(self.consistency.validate_character(character.id, text, content_type))
                .await??;
            checks.record(&character.name, &result);
            checks.characters.push(CharacterCheck {
                character_id: character.id,
                character_name: character.name.clone(),
                result,
            });
        }
        if let Some(worldview) = &context.worldview {
            let result = cancel
                .run(self.consistency.validate_worldview(worldview.id, text, content_type))
                .await??;
            checks.record(&worldview.name, &result);
            checks.worldview = Some(result);
        }
        Ok(checks)
    }
}
