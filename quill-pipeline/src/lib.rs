//! # quill-pipeline
//!
//! Drives a text generator to produce character- and world-consistent
//! prose, using `quill-core` for memory and scoring and `quill-llm` for the
//! generator itself.
//!
//! ## Architecture
//!
//! ```text
//! GenerationRequest
//!        │ validate
//!        ▼
//! ┌──────────────────┐   RelevanceEngine (quill-core)
//! │ GenerationContext│◄── characters, worldview, memories
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐   TextGenerator (quill-llm)
//! │  attempt loop    │◄── enhanced prompt + feedback
//! │  generate/score  │──► ConsistencyEngine (quill-core)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ MemoryExtractor  │──► MemoryRepository
//! └────────┬─────────┘
//!          ▼
//!   GenerationResult
//! ```
//!
//! ## Modules
//!
//! - `pipeline`: the [`GenerationPipeline`] and its stages
//! - `request` / `result`: inbound and outbound types
//! - `context`: context assembly and the feedback-carrying goal
//! - `content`: base prompts per content type
//! - `extraction`: memory extraction with lenient parsing and fallback
//! - `reviewer`: deep review through the generator
//! - `cancel`: cancellation and deadlines
//! - `world`: JSON world files for the `quill` binary

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod content;
pub mod context;
pub mod error;
pub mod extraction;
pub mod pipeline;
pub mod request;
pub mod result;
pub mod reviewer;
pub mod world;

pub use cancel::{CancelHandle, CancelToken, Interrupted};
pub use content::{BasePrompt, PromptRegistry};
pub use context::{GenerationContext, GenerationGoal};
pub use error::{FailureKind, PipelineFailure, RequestError};
pub use extraction::{ExtractionOutcome, MemoryExtractor};
pub use pipeline::{Collaborators, GenerationPipeline};
pub use request::GenerationRequest;
pub use result::{AttemptRecord, CharacterCheck, GenerationResult, LogEntry};
pub use reviewer::GeneratorReviewer;
pub use world::WorldFile;
