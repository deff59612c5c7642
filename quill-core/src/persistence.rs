//! SQLite-backed [`MemoryRepository`].
//!
//! Each [`MemoryRecord`] is serialised to JSON and stored beside the columns
//! needed for lookup. The schema is intentionally simple:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS memories (
//!     memory_id    TEXT PRIMARY KEY,
//!     character_id TEXT NOT NULL,
//!     data         BLOB NOT NULL,
//!     updated_at   TEXT NOT NULL
//! );
//! ```
//!
//! - WAL mode for concurrent readers.
//! - JSON inside a BLOB keeps the schema stable as the record grows.
//! - [`MemoryRepository::modify`] runs read, update and write in one
//!   transaction under the connection lock, so updates to a record are
//!   serialized.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::error::{QuillError, Result};
use crate::memory::{MemoryRecord, MemoryRepository};
use crate::types::{CharacterId, MemoryId};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS memories (
        memory_id    TEXT PRIMARY KEY,
        character_id TEXT NOT NULL,
        data         BLOB NOT NULL,
        updated_at   TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_memories_character ON memories(character_id);";

/// Handle to an SQLite database of memory records.
///
/// # Usage
///
/// ```no_run
/// # use quill_core::persistence::SqliteMemoryStore;
/// # use quill_core::config::PersistenceConfig;
/// # use quill_core::memory::{MemoryRecord, MemoryRepository};
/// # use quill_core::types::{CharacterId, MemoryType};
/// let store = SqliteMemoryStore::open("story.db", &PersistenceConfig::default())?;
/// let memory = MemoryRecord::new(CharacterId::new(), MemoryType::Core, "Swore an oath", 0.9);
/// let id = store.save(memory)?;
/// let loaded = store.get(id)?;
/// # Ok::<(), quill_core::error::QuillError>(())
/// ```
pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMemoryStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteMemoryStore {
    /// Open (or create) an SQLite database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;
        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Memory store opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Copy the database to `dest_path` using SQLite's online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Database`] on SQLite failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let conn = self.conn.lock();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;
        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Memory store backup completed"
        );
        Ok(())
    }

    /// Run `PRAGMA integrity_check`.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .lock()
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

fn encode(record: &MemoryRecord) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| QuillError::Serialization(e.to_string()))
}

fn decode(data: &[u8]) -> Result<MemoryRecord> {
    serde_json::from_slice(data).map_err(|e| QuillError::Serialization(e.to_string()))
}

fn upsert(conn: &Connection, record: &MemoryRecord) -> Result<()> {
    let json = encode(record)?;
    conn.execute(
        "INSERT INTO memories (memory_id, character_id, data, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(memory_id) DO UPDATE SET
            character_id = excluded.character_id,
            data = excluded.data,
            updated_at = excluded.updated_at",
        params![
            record.id.to_string(),
            record.character_id.to_string(),
            json,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

fn load(conn: &Connection, id: MemoryId) -> Result<Option<MemoryRecord>> {
    let data: Option<Vec<u8>> = conn
        .prepare_cached("SELECT data FROM memories WHERE memory_id = ?1")?
        .query_row(params![id.to_string()], |row| row.get(0))
        .optional()?;
    data.map(|d| decode(&d)).transpose()
}

impl MemoryRepository for SqliteMemoryStore {
    fn save(&self, record: MemoryRecord) -> Result<MemoryId> {
        upsert(&self.conn.lock(), &record)?;
        debug!(memory = %record.id, character = %record.character_id, "Saved memory");
        Ok(record.id)
    }

    fn get(&self, id: MemoryId) -> Result<Option<MemoryRecord>> {
        load(&self.conn.lock(), id)
    }

    fn ids_for_character(&self, character: CharacterId) -> Result<Vec<MemoryId>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT memory_id FROM memories WHERE character_id = ?1 ORDER BY memory_id",
        )?;
        let rows = stmt.query_map(params![character.to_string()], |row| row.get::<_, String>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            let id_str = row?;
            match id_str.parse::<MemoryId>() {
                Ok(id) => ids.push(id),
                Err(_) => warn!(id = %id_str, "Skipping row with invalid UUID"),
            }
        }
        Ok(ids)
    }

    fn list_for_character(&self, character: CharacterId) -> Result<Vec<MemoryRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT data FROM memories WHERE character_id = ?1 ORDER BY memory_id",
        )?;
        let rows = stmt.query_map(params![character.to_string()], |row| row.get::<_, Vec<u8>>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(decode(&row?)?);
        }
        Ok(out)
    }

    fn modify(&self, id: MemoryId, f: &mut dyn FnMut(&mut MemoryRecord)) -> Result<MemoryRecord> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut record = load(&tx, id)?.ok_or(QuillError::MemoryNotFound(id))?;
        f(&mut record);
        upsert(&tx, &record)?;
        tx.commit()?;
        Ok(record)
    }

    fn delete(&self, id: MemoryId) -> Result<bool> {
        let deleted = self
            .conn
            .lock()
            .execute("DELETE FROM memories WHERE memory_id = ?1", params![id.to_string()])?;
        Ok(deleted > 0)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
