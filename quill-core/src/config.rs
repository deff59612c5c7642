//! Configuration for quill.
//!
//! Maps directly to `quill.toml`. Every field carries a serde default so a
//! partial file (or an empty one) loads into a usable configuration.

use serde::{Deserialize, Serialize};

/// Top-level quill configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuillConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Accessibility decay and access boost.
    #[serde(default)]
    pub decay: DecayConfig,
    /// Relevance ranking.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Consistency scoring thresholds and penalties.
    #[serde(default)]
    pub consistency: ConsistencyConfig,
    /// Text generation provider.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Generation pipeline tuning.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Memory store persistence.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl QuillConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `QuillError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::QuillError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Render the configuration back to TOML.
    ///
    /// # Errors
    /// Returns `QuillError::Serialization` if encoding fails.
    pub fn to_toml(&self) -> crate::error::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::QuillError::Serialization(e.to_string()))
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    /// Returns `QuillError::Config` naming the first out-of-range field.
    pub fn validate(&self) -> crate::error::Result<()> {
        let bad = |field: &str, why: &str| Err(crate::QuillError::Config(format!("{field} {why}")));

        if self.decay.base_strength_days.is_nan() || self.decay.base_strength_days <= 0.0 {
            return bad("decay.base_strength_days", "must be positive");
        }
        if self.decay.rehearsal_factor < 0.0 {
            return bad("decay.rehearsal_factor", "must not be negative");
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_accessibility) {
            return bad("retrieval.min_accessibility", "must be within [0, 1]");
        }
        let w = &self.retrieval.weights;
        if [w.keyword, w.emotional_resonance, w.accessibility, w.importance]
            .iter()
            .any(|v| *v < 0.0 || !v.is_finite())
        {
            return bad("retrieval.weights", "must be finite and non-negative");
        }
        if !(0.0..=1.0).contains(&self.consistency.pass_threshold) {
            return bad("consistency.pass_threshold", "must be within [0, 1]");
        }
        if self.pipeline.generator_timeout_ms == 0 {
            return bad("pipeline.generator_timeout_ms", "must be positive");
        }
        if !(0.0..=1.0).contains(&self.pipeline.fallback_emotional_weight) {
            return bad("pipeline.fallback_emotional_weight", "must be within [0, 1]");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// How a memory's accessibility is restored when it is retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AccessBoost {
    /// Reset accessibility to 1.0 (spaced-repetition refresh).
    Reset,
    /// Recover a fraction of the way toward 1.0; the recovery shrinks as
    /// the memory is accessed more often.
    Recover {
        /// Maximum recovery per access.
        fraction: f32,
    },
}

impl Default for AccessBoost {
    fn default() -> Self {
        Self::Reset
    }
}

/// Accessibility decay configuration.
///
/// Retention follows `exp(-elapsed_days / strength)` with
/// `strength = base_strength_days + ln(1 + access_count) * rehearsal_factor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Memory strength in days for a never-rehearsed memory.
    #[serde(default = "default_base_strength")]
    pub base_strength_days: f64,
    /// Extra strength (days) per natural-log unit of access count.
    #[serde(default = "default_rehearsal_factor")]
    pub rehearsal_factor: f64,
    /// Boost applied on retrieval.
    #[serde(default)]
    pub boost: AccessBoost,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            base_strength_days: 7.0,
            rehearsal_factor: 3.0,
            boost: AccessBoost::Reset,
        }
    }
}

/// Memory retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Memories at or below this accessibility are unreachable.
    #[serde(default = "default_min_accessibility")]
    pub min_accessibility: f32,
    /// Relevance weight tuning.
    #[serde(default)]
    pub weights: RelevanceWeights,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_accessibility: 0.3,
            weights: RelevanceWeights::default(),
        }
    }
}

/// Relevance scoring weights: must sum to ~1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceWeights {
    /// Keyword overlap with the scene query.
    #[serde(default = "default_0_3")]
    pub keyword: f64,
    /// Emotional resonance with the current emotion.
    #[serde(default = "default_0_2")]
    pub emotional_resonance: f64,
    /// Current accessibility.
    #[serde(default = "default_0_3")]
    pub accessibility: f64,
    /// Emotional weight as an importance proxy.
    #[serde(default = "default_0_2")]
    pub importance: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            keyword: 0.30,
            emotional_resonance: 0.20,
            accessibility: 0.30,
            importance: 0.20,
        }
    }
}

/// Consistency scoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyConfig {
    /// Minimum overall score for a pass.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    /// Score lost per character violation.
    #[serde(default = "default_0_1")]
    pub character_violation_penalty: f64,
    /// Cap on the total character violation penalty.
    #[serde(default = "default_0_3")]
    pub character_penalty_cap: f64,
    /// Score lost per worldview violation.
    #[serde(default = "default_0_15")]
    pub worldview_violation_penalty: f64,
    /// Cap on the total worldview violation penalty.
    #[serde(default = "default_0_6")]
    pub worldview_penalty_cap: f64,
    /// Extra penalty when the physics laws are broken.
    #[serde(default = "default_0_2")]
    pub physics_penalty: f64,
    /// Whether low scores trigger an LLM critique.
    #[serde(default = "default_true")]
    pub deep_review_enabled: bool,
    /// Output cap for the critique.
    #[serde(default = "default_500_u32")]
    pub deep_review_max_tokens: u32,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 0.7,
            character_violation_penalty: 0.1,
            character_penalty_cap: 0.3,
            worldview_violation_penalty: 0.15,
            worldview_penalty_cap: 0.6,
            physics_penalty: 0.2,
            deep_review_enabled: true,
            deep_review_max_tokens: 500,
        }
    }
}

/// Text generation provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "ollama", "openai", "none".
    #[serde(default = "default_ollama")]
    pub provider: String,
    /// Base URL for the provider API.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Model used for prose generation.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (OpenAI-compatible providers). Falls back to `QUILL_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Provider-level retries for transient failures.
    #[serde(default = "default_2")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
            api_key: None,
            max_retries: 2,
        }
    }
}

/// Generation pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-call generator timeout in milliseconds.
    #[serde(default = "default_generator_timeout")]
    pub generator_timeout_ms: u64,
    /// Temperature for memory extraction.
    #[serde(default = "default_0_3_f32")]
    pub extraction_temperature: f32,
    /// Output cap for memory extraction.
    #[serde(default = "default_500_u32")]
    pub extraction_max_tokens: u32,
    /// Characters of generated text shown to the extractor.
    #[serde(default = "default_500_usize")]
    pub extraction_excerpt_chars: usize,
    /// Trailing characters of previous content carried into the prompt.
    #[serde(default = "default_1000_usize")]
    pub previous_content_chars: usize,
    /// Emotional weight of fallback "participated in scene" memories.
    #[serde(default = "default_0_5_f32")]
    pub fallback_emotional_weight: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generator_timeout_ms: 60_000,
            extraction_temperature: 0.3,
            extraction_max_tokens: 500,
            extraction_excerpt_chars: 500,
            previous_content_chars: 1000,
            fallback_emotional_weight: 0.5,
        }
    }
}

/// Memory store persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite file; `None` keeps memories in process memory.
    #[serde(default)]
    pub db_path: Option<String>,
    /// Enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            wal_mode: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_base_strength() -> f64 {
    7.0
}
fn default_rehearsal_factor() -> f64 {
    3.0
}
fn default_min_accessibility() -> f32 {
    0.3
}
fn default_pass_threshold() -> f64 {
    0.7
}
fn default_0_1() -> f64 {
    0.1
}
fn default_0_15() -> f64 {
    0.15
}
fn default_0_2() -> f64 {
    0.2
}
fn default_0_3() -> f64 {
    0.3
}
fn default_0_6() -> f64 {
    0.6
}
fn default_0_3_f32() -> f32 {
    0.3
}
fn default_0_5_f32() -> f32 {
    0.5
}
fn default_2() -> u32 {
    2
}
fn default_500_u32() -> u32 {
    500
}
fn default_500_usize() -> usize {
    500
}
fn default_1000_usize() -> usize {
    1000
}
fn default_generator_timeout() -> u64 {
    60_000
}
fn default_ollama() -> String {
    "ollama".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "qwen2.5:7b-instruct".to_string()
}
