//! JSON world files for the command line.
//!
//! A world file seeds the catalog and memory store before a run:
//!
//! ```json
//! {
//!   "projects":   [{ "id": "...", "name": "Tides" }],
//!   "worldviews": [{ "id": "...", "project_id": "...", "name": "Aldmere", "rules": ["..."] }],
//!   "characters": [{ "id": "...", "project_id": "...", "name": "Alex", "personality_traits": ["brave"] }],
//!   "timelines":  [],
//!   "memories":   []
//! }
//! ```

use std::path::Path;

use quill_core::{
    Character, InMemoryCatalog, MemoryRecord, MemoryRepository, Project, QuillError, Timeline, Worldview,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Entities and memories to load before a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldFile {
    /// Projects.
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Worldviews.
    #[serde(default)]
    pub worldviews: Vec<Worldview>,
    /// Characters.
    #[serde(default)]
    pub characters: Vec<Character>,
    /// Timelines.
    #[serde(default)]
    pub timelines: Vec<Timeline>,
    /// Existing memories.
    #[serde(default)]
    pub memories: Vec<MemoryRecord>,
}

impl WorldFile {
    /// Parse a world file from JSON.
    ///
    /// # Errors
    ///
    /// [`QuillError::Serialization`] on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, QuillError> {
        serde_json::from_str(json).map_err(|e| QuillError::Serialization(e.to_string()))
    }

    /// Read and parse a world file.
    ///
    /// # Errors
    ///
    /// I/O or parse failures.
    pub fn from_file(path: &Path) -> Result<Self, QuillError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load everything into `catalog` and `store`.
    ///
    /// # Errors
    ///
    /// The first memory store failure.
    pub fn install(self, catalog: &InMemoryCatalog, store: &dyn MemoryRepository) -> Result<(), QuillError> {
        let counts = (
            self.projects.len(),
            self.worldviews.len(),
            self.characters.len(),
            self.memories.len(),
        );
        self.projects.into_iter().for_each(|p| catalog.put_project(p));
        self.timelines.into_iter().for_each(|t| catalog.put_timeline(t));
        self.worldviews.into_iter().for_each(|w| catalog.put_worldview(w));
        self.characters.into_iter().for_each(|c| catalog.put_character(c));
        for memory in self.memories {
            store.save(memory)?;
        }
        info!(
            projects = counts.0,
            worldviews = counts.1,
            characters = counts.2,
            memories = counts.3,
            "World loaded"
        );
        Ok(())
    }
}
