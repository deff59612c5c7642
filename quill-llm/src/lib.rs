//! # quill-llm
//!
//! Provides a unified interface for text generation across backends:
//!   - **Ollama** (local, default)
//!   - **OpenAI-compatible API**
//!
//! Everything in quill that needs prose goes through [`TextGenerator`]. The
//! HTTP [`LlmClient`] owns transport concerns:
//!   - Per-attempt timeout
//!   - Retry of transient failures with backoff
//!   - Classification of failures as retryable or not ([`ErrorClass`])
//!
//! Callers above this crate never retry transport errors themselves.
//!
//! The `testing` feature adds `testing::ScriptedGenerator`, a canned
//! generator for tests of downstream crates.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod prompt;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use client::{LlmClient, LlmProvider};
pub use error::{ErrorClass, GeneratorError};
pub use prompt::PromptId;
pub use types::{GenerationParams, LlmResponse, TextGenerator};
