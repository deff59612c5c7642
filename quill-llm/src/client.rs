//! LLM Client: unified interface for Ollama and OpenAI-compatible backends.
//!
//! Each call makes up to `max_retries + 1` attempts. Every attempt is bounded
//! by its own timeout. Retryable failures (timeouts, 5xx, 408/429, connection
//! errors) are retried after a linear backoff; anything else is returned at
//! once.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::GeneratorError;
use crate::types::{GenerationParams, LlmResponse, TextGenerator};

const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

/// Provider backend for text generation.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally.
    Ollama {
        /// e.g. `http://localhost:11434`
        base_url: String,
    },
    /// OpenAI-compatible chat completions API.
    OpenAiCompatible {
        /// API root without the `/v1` suffix.
        base_url: String,
        /// Bearer token.
        api_key: String,
    },
    /// No backend. Every call fails with [`GeneratorError::Config`].
    None,
}

impl LlmProvider {
    /// Build a provider from its configured name (`ollama`, `openai`, `none`).
    ///
    /// A missing OpenAI key falls back to the `QUILL_API_KEY` environment
    /// variable.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Config`] for an unknown name or a missing key.
    pub fn from_name(
        name: &str,
        base_url: &str,
        api_key: Option<String>,
    ) -> Result<Self, GeneratorError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        match name.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama { base_url }),
            "openai" | "openai_compatible" | "openai-compatible" => {
                let api_key = api_key
                    .or_else(|| std::env::var("QUILL_API_KEY").ok())
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| {
                        GeneratorError::Config(
                            "openai provider needs llm.api_key or QUILL_API_KEY".into(),
                        )
                    })?;
                Ok(Self::OpenAiCompatible { base_url, api_key })
            }
            "none" => Ok(Self::None),
            other => Err(GeneratorError::Config(format!("unknown llm provider '{other}'"))),
        }
    }
}

/// HTTP text generator with its own retry budget.
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    max_retries: u32,
    default_timeout_ms: u64,
    backoff: Duration,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .field("default_timeout_ms", &self.default_timeout_ms)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Create a new client.
    #[must_use]
    pub fn new(provider: LlmProvider, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            max_retries,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Create a client with no backend.
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, "", 0)
    }

    /// Timeout used when a call does not supply one.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    /// Base delay between attempts; attempt `n` waits `n * backoff`.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }

    /// Model name sent to the provider.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one generation, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Non-retryable failures are returned from the attempt that hit them.
    /// When every attempt fails transiently the result is
    /// [`GeneratorError::RetriesExhausted`].
    pub async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<LlmResponse, GeneratorError> {
        let (url, body, api_key) = match &self.provider {
            LlmProvider::None => {
                return Err(GeneratorError::Config("no llm provider configured".into()));
            }
            LlmProvider::Ollama { base_url } => (
                format!("{base_url}/api/generate"),
                json!({
                    "model": self.model,
                    "prompt": prompt,
                    "stream": false,
                    "options": {
                        "temperature": params.temperature,
                        "num_predict": params.max_tokens,
                    }
                }),
                None,
            ),
            LlmProvider::OpenAiCompatible { base_url, api_key } => (
                format!("{base_url}/v1/chat/completions"),
                json!({
                    "model": self.model,
                    "messages": [{ "role": "user", "content": prompt }],
                    "max_tokens": params.max_tokens,
                    "temperature": params.temperature,
                }),
                Some(api_key.as_str()),
            ),
        };
        let timeout_ms = params.timeout_ms.unwrap_or(self.default_timeout_ms);

        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(
                    attempt = attempt + 1,
                    of = self.max_retries + 1,
                    "Retrying generator call"
                );
                tokio::time::sleep(self.backoff * attempt).await;
            }

            let start = Instant::now();
            let outcome = tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                self.send_once(&url, &body, api_key),
            )
            .await
            .unwrap_or(Err(GeneratorError::Timeout(timeout_ms)));
            let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            match outcome {
                Ok(json) => {
                    let (text, tokens_generated) = self.extract_text(&json)?;
                    return Ok(LlmResponse {
                        text,
                        tokens_generated,
                        latency_ms,
                        model: self.model.clone(),
                        attempts: attempt + 1,
                    });
                }
                Err(e) if !e.is_retryable() => {
                    warn!(error = %e, "Generator call rejected, not retrying");
                    return Err(e);
                }
                Err(e) => {
                    let e = match e {
                        GeneratorError::Timeout(0) => GeneratorError::Timeout(timeout_ms),
                        other => other,
                    };
                    warn!(attempt = attempt + 1, latency_ms, error = %e, "Generator call failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(GeneratorError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }

    async fn send_once(
        &self,
        url: &str,
        body: &Value,
        api_key: Option<&str>,
    ) -> Result<Value, GeneratorError> {
        let mut request = self.http.post(url).json(body);
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GeneratorError::from_status(status.as_u16(), message));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| GeneratorError::Parse(e.to_string()))
    }

    fn extract_text(&self, json: &Value) -> Result<(String, u32), GeneratorError> {
        let (text, tokens) = match self.provider {
            LlmProvider::Ollama { .. } => (json["response"].as_str(), json["eval_count"].as_u64()),
            _ => (
                json["choices"][0]["message"]["content"].as_str(),
                json["usage"]["completion_tokens"].as_u64(),
            ),
        };
        let text = text.ok_or_else(|| {
            GeneratorError::Parse(format!("no completion text in response: {json}"))
        })?;
        let tokens = tokens.map_or(0, |t| u32::try_from(t).unwrap_or(u32::MAX));
        Ok((text.to_string(), tokens))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GeneratorError> {
        self.complete(prompt, params).await.map(|r| r.text)
    }

    fn name(&self) -> &str {
        match self.provider {
            LlmProvider::Ollama { .. } => "ollama",
            LlmProvider::OpenAiCompatible { .. } => "openai",
            LlmProvider::None => "none",
        }
    }
}
