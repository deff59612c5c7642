//! Lookup seams for the story entities, plus an in-process catalog.
//!
//! The engines only read these; creating and editing entities is somebody
//! else's job.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::entities::{Character, Project, Timeline, Worldview};
use crate::error::Result;
use crate::types::{CharacterId, ProjectId, TimelineId, WorldviewId};

/// Keyed character lookup.
pub trait CharacterRepository: Send + Sync {
    /// Fetch a character.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn character(&self, id: CharacterId) -> Result<Option<Character>>;
}

/// Keyed worldview lookup.
pub trait WorldviewRepository: Send + Sync {
    /// Fetch a worldview.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn worldview(&self, id: WorldviewId) -> Result<Option<Worldview>>;
}

/// Keyed project lookup.
pub trait ProjectRepository: Send + Sync {
    /// Fetch a project.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn project(&self, id: ProjectId) -> Result<Option<Project>>;
}

/// Keyed timeline lookup.
pub trait TimelineRepository: Send + Sync {
    /// Fetch a timeline.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn timeline(&self, id: TimelineId) -> Result<Option<Timeline>>;
}

/// All four entity lookups behind `RwLock`ed maps.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    projects: RwLock<HashMap<ProjectId, Project>>,
    timelines: RwLock<HashMap<TimelineId, Timeline>>,
    characters: RwLock<HashMap<CharacterId, Character>>,
    worldviews: RwLock<HashMap<WorldviewId, Worldview>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a project.
    pub fn put_project(&self, project: Project) {
        self.projects.write().insert(project.id, project);
    }

    /// Insert or replace a timeline.
    pub fn put_timeline(&self, timeline: Timeline) {
        self.timelines.write().insert(timeline.id, timeline);
    }

    /// Insert or replace a character.
    pub fn put_character(&self, character: Character) {
        self.characters.write().insert(character.id, character);
    }

    /// Insert or replace a worldview.
    pub fn put_worldview(&self, worldview: Worldview) {
        self.worldviews.write().insert(worldview.id, worldview);
    }
}

impl CharacterRepository for InMemoryCatalog {
    fn character(&self, id: CharacterId) -> Result<Option<Character>> {
        Ok(self.characters.read().get(&id).cloned())
    }
}

impl WorldviewRepository for InMemoryCatalog {
    fn worldview(&self, id: WorldviewId) -> Result<Option<Worldview>> {
        Ok(self.worldviews.read().get(&id).cloned())
    }
}

impl ProjectRepository for InMemoryCatalog {
    fn project(&self, id: ProjectId) -> Result<Option<Project>> {
        Ok(self.projects.read().get(&id).cloned())
    }
}

impl TimelineRepository for InMemoryCatalog {
    fn timeline(&self, id: TimelineId) -> Result<Option<Timeline>> {
        Ok(self.timelines.read().get(&id).cloned())
    }
}
