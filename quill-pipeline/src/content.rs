//! Base prompts per content type.
//!
//! Each content type that needs its own framing implements [`BasePrompt`];
//! the [`PromptRegistry`] maps content types to implementations and falls
//! back to a general prompt for the rest. Supporting a new content type is a
//! `register` call.

use std::collections::HashMap;
use std::sync::Arc;

use quill_core::ContentType;

use crate::request::GenerationRequest;

/// Builds the opening instructions for one kind of content.
pub trait BasePrompt: Send + Sync {
    /// Content types this prompt serves.
    fn content_types(&self) -> &[ContentType];

    /// Opening instructions for `request`.
    fn build(&self, request: &GenerationRequest) -> String;
}

/// Story chapters; asks for roughly half the token budget in words.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChapterPrompt;

impl BasePrompt for ChapterPrompt {
    fn content_types(&self) -> &[ContentType] {
        &[ContentType::Chapter]
    }

    fn build(&self, request: &GenerationRequest) -> String {
        let words = request.max_tokens / 2;
        let chapter = request
            .chapter_number
            .map(|n| format!(" (chapter {n})"))
            .unwrap_or_default();
        format!(
            "# Story chapter{chapter}\n\n\
             Write a compelling story chapter from the information below.\n\n\
             ## Guidelines\n\
             1. Keep every character true to their personality\n\
             2. Respect the world setting\n\
             3. Vivid language, tight plotting\n\
             4. Length: about {words} words\n\n\
             Output the chapter text only, without a chapter title."
        )
    }
}

/// Dialogue between characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguePrompt;

impl BasePrompt for DialoguePrompt {
    fn content_types(&self) -> &[ContentType] {
        &[ContentType::Dialogue]
    }

    fn build(&self, _request: &GenerationRequest) -> String {
        "# Dialogue\n\n\
         Write dialogue that fits each character's personality in this scene.\n\n\
         ## Guidelines\n\
         1. Every character speaks in their declared manner\n\
         2. The conversation moves the plot forward\n\
         3. Include brief action beats and inner reactions\n\
         4. Keep the exchange natural\n\n\
         Format:\n\
         Name: \"line\"\n\
         [action or thought]\n\n\
         Output the dialogue only."
            .to_string()
    }
}

/// Scene description.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScenePrompt;

impl BasePrompt for ScenePrompt {
    fn content_types(&self) -> &[ContentType] {
        &[ContentType::Scene]
    }

    fn build(&self, _request: &GenerationRequest) -> String {
        "# Scene\n\n\
         Describe the scene from the information below.\n\n\
         ## Guidelines\n\
         1. Rich sensory detail: sight, sound, smell\n\
         2. Respect the world setting\n\
         3. Build the right atmosphere\n\
         4. Bring out what makes this place distinctive\n\n\
         Output the scene description only."
            .to_string()
    }
}

/// A character's inner voice.
#[derive(Debug, Default, Clone, Copy)]
pub struct InnerMonologuePrompt;

impl BasePrompt for InnerMonologuePrompt {
    fn content_types(&self) -> &[ContentType] {
        &[ContentType::InnerMonologue]
    }

    fn build(&self, _request: &GenerationRequest) -> String {
        "# Inner monologue\n\n\
         Write the character's inner monologue for the current situation.\n\n\
         ## Guidelines\n\
         1. Go deep into the character's inner world\n\
         2. Match their personality and present mood\n\
         3. Memories, reasoning and shifting feelings are welcome\n\
         4. Use language that suits the character\n\n\
         Write in the first person."
            .to_string()
    }
}

/// Everything without a dedicated prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneralPrompt;

impl BasePrompt for GeneralPrompt {
    fn content_types(&self) -> &[ContentType] {
        &[]
    }

    fn build(&self, request: &GenerationRequest) -> String {
        let kind = request
            .content_type
            .map_or_else(|| "content".to_string(), |t| t.code().replace('_', " "));
        format!(
            "# Generate {kind}\n\n\
             Write the requested {kind} from the information below.\n\n\
             ## Guidelines\n\
             1. Stay true to the characters\n\
             2. Respect the world setting\n\
             3. Keep it coherent and plausible\n\n\
             Output the generated text only."
        )
    }
}

/// Content type → base prompt lookup.
pub struct PromptRegistry {
    prompts: HashMap<ContentType, Arc<dyn BasePrompt>>,
    fallback: Arc<dyn BasePrompt>,
}

impl std::fmt::Debug for PromptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.prompts.keys().map(|t| t.code()).collect();
        types.sort_unstable();
        f.debug_struct("PromptRegistry").field("types", &types).finish_non_exhaustive()
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptRegistry {
    /// An empty registry that uses `fallback` for everything.
    #[must_use]
    pub fn empty(fallback: Arc<dyn BasePrompt>) -> Self {
        Self {
            prompts: HashMap::new(),
            fallback,
        }
    }

    /// Chapter, dialogue, scene and inner-monologue prompts over a general
    /// fallback.
    #[must_use]
    pub fn builtin() -> Self {
        Self::empty(Arc::new(GeneralPrompt))
            .register(Arc::new(ChapterPrompt))
            .register(Arc::new(DialoguePrompt))
            .register(Arc::new(ScenePrompt))
            .register(Arc::new(InnerMonologuePrompt))
    }

    /// Serve `prompt`'s content types with it, replacing earlier entries.
    #[must_use]
    pub fn register(mut self, prompt: Arc<dyn BasePrompt>) -> Self {
        for content_type in prompt.content_types() {
            self.prompts.insert(*content_type, Arc::clone(&prompt));
        }
        self
    }

    /// Prompt for `content_type`.
    #[must_use]
    pub fn get(&self, content_type: ContentType) -> &dyn BasePrompt {
        self.prompts
            .get(&content_type)
            .unwrap_or(&self.fallback)
            .as_ref()
    }

    /// Build the base prompt for `request` as `content_type`.
    #[must_use]
    pub fn build(&self, content_type: ContentType, request: &GenerationRequest) -> String {
        self.get(content_type).build(request)
    }
}
