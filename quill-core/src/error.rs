//! Error types for the quill core library.

use thiserror::Error;

use crate::types::{CharacterId, MemoryId, ProjectId, TimelineId, WorldviewId};

/// Top-level error type for all quill core operations.
#[derive(Error, Debug)]
pub enum QuillError {
    /// A memory with the given ID was not found.
    #[error("Memory not found: {0}")]
    MemoryNotFound(MemoryId),

    /// A character with the given ID was not found.
    #[error("Character not found: {0}")]
    CharacterNotFound(CharacterId),

    /// A worldview with the given ID was not found.
    #[error("Worldview not found: {0}")]
    WorldviewNotFound(WorldviewId),

    /// A project with the given ID was not found.
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// A timeline with the given ID was not found.
    #[error("Timeline not found: {0}")]
    TimelineNotFound(TimelineId),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The deep reviewer could not produce a critique.
    #[error("Deep review failed: {0}")]
    DeepReview(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, QuillError>;
