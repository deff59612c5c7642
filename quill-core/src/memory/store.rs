//! The memory repository seam and its in-process implementation.
//!
//! Concurrent generations may retrieve the same memory at once, so every
//! read-modify-write of a record goes through [`MemoryRepository::modify`],
//! which implementations must serialize per record.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::MemoryRecord;
use crate::error::{QuillError, Result};
use crate::types::{CharacterId, MemoryId};

/// Keyed storage for [`MemoryRecord`]s.
pub trait MemoryRepository: Send + Sync {
    /// Insert or replace a record.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn save(&self, record: MemoryRecord) -> Result<MemoryId>;

    /// Fetch one record.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn get(&self, id: MemoryId) -> Result<Option<MemoryRecord>>;

    /// IDs of every memory owned by `character`.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn ids_for_character(&self, character: CharacterId) -> Result<Vec<MemoryId>>;

    /// Snapshot of every memory owned by `character`.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn list_for_character(&self, character: CharacterId) -> Result<Vec<MemoryRecord>>;

    /// Apply `f` to a record under that record's lock and persist the
    /// result. Returns the updated record.
    ///
    /// # Errors
    ///
    /// [`QuillError::MemoryNotFound`] if the record does not exist.
    fn modify(&self, id: MemoryId, f: &mut dyn FnMut(&mut MemoryRecord)) -> Result<MemoryRecord>;

    /// Remove a record. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn delete(&self, id: MemoryId) -> Result<bool>;

    /// Total number of stored records.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn count(&self) -> Result<usize>;
}

/// In-process store: one mutex per record plus a per-character index.
#[derive(Debug, Default)]
pub struct InMemoryMemoryStore {
    records: RwLock<HashMap<MemoryId, Arc<Mutex<MemoryRecord>>>>,
    by_character: RwLock<HashMap<CharacterId, HashSet<MemoryId>>>,
}

impl InMemoryMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: MemoryId) -> Option<Arc<Mutex<MemoryRecord>>> {
        self.records.read().get(&id).cloned()
    }
}

impl MemoryRepository for InMemoryMemoryStore {
    fn save(&self, record: MemoryRecord) -> Result<MemoryId> {
        let id = record.id;
        let character = record.character_id;

        // An existing slot is updated in place so holders of the Arc see it.
        if let Some(slot) = self.slot(id) {
            let mut current = slot.lock();
            if current.character_id != character {
                if let Some(ids) = self.by_character.write().get_mut(&current.character_id) {
                    ids.remove(&id);
                }
            }
            *current = record;
        } else {
            self.records.write().insert(id, Arc::new(Mutex::new(record)));
        }
        self.by_character.write().entry(character).or_default().insert(id);
        Ok(id)
    }

    fn get(&self, id: MemoryId) -> Result<Option<MemoryRecord>> {
        Ok(self.slot(id).map(|slot| slot.lock().clone()))
    }

    fn ids_for_character(&self, character: CharacterId) -> Result<Vec<MemoryId>> {
        let mut ids: Vec<MemoryId> = self
            .by_character
            .read()
            .get(&character)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        ids.sort();
        Ok(ids)
    }

    fn list_for_character(&self, character: CharacterId) -> Result<Vec<MemoryRecord>> {
        let ids = self.ids_for_character(character)?;
        Ok(ids
            .into_iter()
            .filter_map(|id| self.slot(id).map(|slot| slot.lock().clone()))
            .collect())
    }

    fn modify(&self, id: MemoryId, f: &mut dyn FnMut(&mut MemoryRecord)) -> Result<MemoryRecord> {
        let slot = self.slot(id).ok_or(QuillError::MemoryNotFound(id))?;
        let mut record = slot.lock();
        f(&mut record);
        Ok(record.clone())
    }

    fn delete(&self, id: MemoryId) -> Result<bool> {
        let Some(slot) = self.records.write().remove(&id) else {
            return Ok(false);
        };
        let character = slot.lock().character_id;
        if let Some(ids) = self.by_character.write().get_mut(&character) {
            ids.remove(&id);
        }
        Ok(true)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}
