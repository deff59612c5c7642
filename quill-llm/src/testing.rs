//! Test utilities: a scripted [`TextGenerator`].
//!
//! [`ScriptedGenerator`] replays a queue of canned outcomes and records every
//! prompt it receives, so pipeline tests can assert on attempt counts and on
//! the feedback injected into retry prompts without a network.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::GeneratorError;
use crate::types::{GenerationParams, TextGenerator};

/// One scripted outcome.
#[derive(Debug)]
pub enum Step {
    /// Return this text.
    Text(String),
    /// Fail with this error.
    Fail(GeneratorError),
    /// Never complete. Useful for cancellation and deadline tests.
    Hang,
}

/// A recorded call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Prompt as received.
    pub prompt: String,
    /// Parameters as received.
    pub params: GenerationParams,
}

/// Generator that replays [`Step`]s in order.
///
/// When the script runs dry it returns the fallback text if one is set,
/// otherwise [`GeneratorError::Unavailable`].
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Step>>,
    fallback: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    /// Empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script that returns each text once, in order.
    #[must_use]
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let generator = Self::new();
        for t in texts {
            generator.push(Step::Text(t.into()));
        }
        generator
    }

    /// Text returned once the script is exhausted.
    #[must_use]
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Append a step.
    pub fn push(&self, step: Step) {
        self.script.lock().push_back(step);
    }

    /// Append a text step.
    pub fn push_text(&self, text: impl Into<String>) {
        self.push(Step::Text(text.into()));
    }

    /// Append a failing step.
    pub fn push_error(&self, error: GeneratorError) {
        self.push(Step::Fail(error));
    }

    /// Every call so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Prompts received, in order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.prompt.clone()).collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GeneratorError> {
        self.calls.lock().push(RecordedCall {
            prompt: prompt.to_string(),
            params: params.clone(),
        });
        let step = self.script.lock().pop_front();
        match step {
            Some(Step::Text(text)) => Ok(text),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => std::future::pending().await,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| GeneratorError::Unavailable("script exhausted".into())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
