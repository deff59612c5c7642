//! # Quill Core Library
//!
//! Character memory and consistency scoring for long-form narrative
//! generation.
//!
//! Every character owns [`MemoryRecord`]s in a five-layer taxonomy:
//!
//! - **Core**: who the character is
//! - **Emotional**: what moved them
//! - **Skill**: what they can do
//! - **Episodic**: what happened
//! - **Semantic**: what they know
//!
//! The [`RelevanceEngine`] decays memories along an Ebbinghaus curve and
//! ranks them against a scene; the [`ConsistencyEngine`] scores generated
//! text against character sheets and worldview rules.

#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod consistency;
pub mod decay;
pub mod entities;
pub mod error;
pub mod memory;
pub mod persistence;
pub mod repository;
pub mod retrieval;
pub mod types;

pub use config::QuillConfig;
pub use consistency::{ConsistencyEngine, ConsistencyResult, DeepReviewer, ReviewSubject, Subject};
pub use entities::{Character, Project, Timeline, Worldview};
pub use error::QuillError;
pub use memory::{InMemoryMemoryStore, MemoryRecord, MemoryRepository};
pub use persistence::SqliteMemoryStore;
pub use repository::{
    CharacterRepository, InMemoryCatalog, ProjectRepository, TimelineRepository, WorldviewRepository,
};
pub use retrieval::{RelevanceEngine, RetrievalResult, ScoreBreakdown};
pub use types::*;
