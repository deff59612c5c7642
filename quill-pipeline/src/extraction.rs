//! Memory extraction from accepted prose.
//!
//! The generator is asked for one `name|type|content|weight|keywords` line
//! per memory. Parsing is lenient: lines that do not fit are skipped. When
//! the call fails or nothing usable comes back, every participant gets one
//! generic "participated in scene" memory instead. Extraction never fails a
//! run, except through cancellation, which also prevents any write.

use std::sync::Arc;

use quill_core::config::PipelineConfig;
use quill_core::{
    Character, MemoryId, MemoryRecord, MemoryRepository, MemoryType, TimelineId, TimelineRepository,
};
use quill_llm::prompt::{self, PromptId};
use quill_llm::{GenerationParams, TextGenerator};
use tracing::{debug, error, info, warn};

use crate::cancel::{CancelToken, Interrupted};
use crate::context::GenerationContext;

/// What extraction stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionOutcome {
    /// IDs of the stored memories.
    pub memory_ids: Vec<MemoryId>,
    /// Whether the generic fallback was used.
    pub used_fallback: bool,
}

/// Parse extractor output into memories for `characters`.
///
/// Names match case-insensitively. Unknown memory types become episodic,
/// weights are clamped to `[0, 1]`, and malformed lines are skipped.
#[must_use]
pub fn parse_memories(
    output: &str,
    characters: &[Character],
    timeline: Option<TimelineId>,
) -> Vec<MemoryRecord> {
    let mut memories = Vec::new();
    for raw in output.lines() {
        let line = raw.trim().trim_start_matches(['-', '*', '•']).trim();
        if line.is_empty() || !line.contains('|') {
            continue;
        }
        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        if parts.len() < 4 {
            debug!(line, "Skipping extraction line with too few fields");
            continue;
        }

        let Some(character) = characters
            .iter()
            .find(|c| c.name.trim().to_lowercase() == parts[0].to_lowercase())
        else {
            warn!(name = parts[0], "Extraction named an unknown character");
            continue;
        };
        let memory_type = parts[1].parse::<MemoryType>().unwrap_or(MemoryType::Episodic);
        let content = parts[2];
        if content.is_empty() {
            continue;
        }
        let Ok(weight) = parts[3].parse::<f32>() else {
            debug!(line, "Skipping extraction line with a bad weight");
            continue;
        };
        if !weight.is_finite() {
            continue;
        }
        let keywords = parts
            .get(4)
            .map(|k| k.split([',', '，', '、']).map(str::trim).collect::<Vec<_>>())
            .unwrap_or_default();

        let mut memory =
            MemoryRecord::new(character.id, memory_type, content, weight).with_keywords(keywords);
        if let Some(t) = timeline {
            memory = memory.with_timeline(t);
        }
        memories.push(memory);
    }
    memories
}

/// One generic episodic memory per character.
#[must_use]
pub fn fallback_memories(
    characters: &[Character],
    scene: &str,
    weight: f32,
    timeline: Option<TimelineId>,
) -> Vec<MemoryRecord> {
    let scene = scene.trim();
    let scene = if scene.is_empty() { "untitled scene" } else { scene };
    characters
        .iter()
        .map(|c| {
            let memory = MemoryRecord::new(
                c.id,
                MemoryType::Episodic,
                format!("participated in scene: {scene}"),
                weight,
            );
            match timeline {
                Some(t) => memory.with_timeline(t),
                None => memory,
            }
        })
        .collect()
}

/// First `max_chars` characters of `text`, suffixed by `...` when cut.
#[must_use]
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((i, _)) => format!("{}...", &text[..i]),
        None => text.to_string(),
    }
}

/// Runs extraction and stores the result.
pub struct MemoryExtractor {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn MemoryRepository>,
    timelines: Arc<dyn TimelineRepository>,
    config: PipelineConfig,
}

impl std::fmt::Debug for MemoryExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryExtractor")
            .field("generator", &self.generator.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MemoryExtractor {
    /// Create an extractor.
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn MemoryRepository>,
        timelines: Arc<dyn TimelineRepository>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            generator,
            store,
            timelines,
            config,
        }
    }

    /// Extract memories from `content` and store them.
    ///
    /// The timeline is attached only if it exists.
    ///
    /// # Errors
    ///
    /// Only [`Interrupted`]; nothing is stored in that case.
    pub async fn extract(
        &self,
        content: &str,
        context: &GenerationContext,
        timeline: Option<TimelineId>,
        cancel: &CancelToken,
    ) -> Result<ExtractionOutcome, Interrupted> {
        if content.trim().is_empty() || context.characters.is_empty() {
            return Ok(ExtractionOutcome::default());
        }
        let timeline = timeline.filter(|&id| match self.timelines.timeline(id) {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(timeline = %id, error = %e, "Timeline lookup failed; memories stay unpinned");
                false
            }
        });

        let names: Vec<&str> = context.characters.iter().map(|c| c.name.as_str()).collect();
        let characters = names.join(", ");
        let snippet = excerpt(content, self.config.extraction_excerpt_chars);
        let parsed = match prompt::render(
            PromptId::MemoryExtraction,
            &[("characters", characters.as_str()), ("content", snippet.as_str())],
        ) {
            Ok(extraction_prompt) => {
                let params = GenerationParams {
                    temperature: self.config.extraction_temperature,
                    max_tokens: self.config.extraction_max_tokens,
                    timeout_ms: Some(self.config.generator_timeout_ms),
                };
                match cancel.run(self.generator.generate(&extraction_prompt, &params)).await? {
                    Ok(output) => {
                        debug!(chars = output.len(), "Extraction output received");
                        parse_memories(&output, &context.characters, timeline)
                    }
                    Err(e) => {
                        warn!(error = %e, "Memory extraction call failed");
                        Vec::new()
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Extraction prompt could not be rendered");
                Vec::new()
            }
        };
        cancel.check()?;

        let (memories, used_fallback) = if parsed.is_empty() {
            info!("No memories parsed; creating fallback memories");
            let fallback = fallback_memories(
                &context.characters,
                &context.scene_context,
                self.config.fallback_emotional_weight,
                timeline,
            );
            (fallback, true)
        } else {
            (parsed, false)
        };

        let mut memory_ids = Vec::with_capacity(memories.len());
        for memory in memories {
            let character = memory.character_id;
            let kind = memory.memory_type;
            match self.store.save(memory) {
                Ok(id) => {
                    debug!(memory = %id, character = %character, kind = %kind, "Stored extracted memory");
                    memory_ids.push(id);
                }
                Err(e) => error!(character = %character, error = %e, "Failed to store memory"),
            }
        }
        info!(created = memory_ids.len(), used_fallback, "Memory extraction finished");
        Ok(ExtractionOutcome {
            memory_ids,
            used_fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::ProjectId;

    fn cast() -> Vec<Character> {
        let project = ProjectId::new();
        vec![Character::new(project, "Alex"), Character::new(project, "Mira")]
    }

    #[test]
    fn well_formed_lines_parse() {
        let cast = cast();
        let out = "Alex|emotional|Watched the harbor burn|0.9|harbor, fire\n\
                   mira|skill|Learned to read the tide tables|0.4";
        let parsed = parse_memories(out, &cast, None);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].character_id, cast[0].id);
        assert_eq!(parsed[0].memory_type, MemoryType::Emotional);
        assert!(parsed[0].keywords.contains("harbor") && parsed[0].keywords.contains("fire"));
        assert_eq!(parsed[1].character_id, cast[1].id, "names match case-insensitively");
        assert!(parsed[1].keywords.is_empty());
    }

    #[test]
    fn lenient_parsing_skips_and_defaults() {
        let cast = cast();
        let out = "Here are the memories:\n\
                   - Alex|核心记忆|Swore to guard the lighthouse|1.7|oath\n\
                   Alex|dream|Saw a white ship|0.3|ship\n\
                   Nobody|core|Not in this scene|0.5|x\n\
                   Mira|core|Bad weight|heavy|x\n\
                   Mira|core||0.5|x\n\
                   Alex|core";
        let parsed = parse_memories(out, &cast, None);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].memory_type, MemoryType::Core);
        assert!((parsed[0].emotional_weight - 1.0).abs() < f32::EPSILON, "clamped");
        assert_eq!(parsed[1].memory_type, MemoryType::Episodic, "unknown type defaults");
    }

    #[test]
    fn fallback_is_one_generic_memory_per_character() {
        let cast = cast();
        let timeline = TimelineId::new();
        let memories = fallback_memories(&cast, "  ", 0.5, Some(timeline));
        assert_eq!(memories.len(), 2);
        for (m, c) in memories.iter().zip(&cast) {
            assert_eq!(m.character_id, c.id);
            assert_eq!(m.content, "participated in scene: untitled scene");
            assert!((m.emotional_weight - 0.5).abs() < f32::EPSILON);
            assert_eq!(m.timeline_id, Some(timeline));
        }
    }

    #[test]
    fn excerpt_cuts_on_char_boundaries() {
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("abc", 3), "abc");
        assert_eq!(excerpt("潮水涨起来了", 2), "潮水...");
    }
}
