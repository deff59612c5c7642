//! Core types for generation requests and responses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GeneratorError;

/// Sampling parameters for one generator call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Temperature (0.0 = deterministic, 1.0+ = creative).
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Per-call timeout. `None` uses the generator's own default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl GenerationParams {
    /// Parameters with no timeout override.
    #[must_use]
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
            timeout_ms: None,
        }
    }

    /// Override the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// A completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text.
    pub text: String,
    /// Tokens generated, when the provider reports it.
    pub tokens_generated: u32,
    /// Latency of the successful attempt in milliseconds.
    pub latency_ms: u64,
    /// Model that produced the text.
    pub model: String,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Something that turns a prompt into text.
///
/// Implementations own their transport retries: by the time an error
/// reaches the caller, the implementation's retry budget is spent.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `prompt`.
    async fn generate(&self, prompt: &str, params: &GenerationParams)
        -> Result<String, GeneratorError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "generator"
    }
}
