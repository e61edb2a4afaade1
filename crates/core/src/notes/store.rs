//! # SQLite Notes Store
//!
//! Free-form notes users attach to characters, kept in a single SQLite file.
//! One connection is shared behind a mutex; every operation is a short
//! statement.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("invalid note: {0}")]
    Invalid(&'static str),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("lock error: {0}")]
    Lock(String),
    #[error("corrupt timestamp in notes table: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// A note as submitted by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNote {
    pub character_id: String,
    pub content: String,
}

/// A stored note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub character_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

pub struct NotesStore {
    conn: Arc<Mutex<Connection>>,
}

impl NotesStore {
    /// Open or create the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, NoteError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        Self::from_connection(Connection::open(path.as_ref())?)
    }

    /// Throwaway store, mostly for tests
    pub fn open_in_memory() -> Result<Self, NoteError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, NoteError> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, NoteError> {
        self.conn
            .lock()
            .map_err(|e| NoteError::Lock(e.to_string()))
    }

    fn run_migrations(&self) -> Result<(), NoteError> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < SCHEMA_VERSION {
            conn.execute(
                r#"
                CREATE TABLE IF NOT EXISTS notes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    character_id TEXT NOT NULL,
                    content TEXT NOT NULL,
                    timestamp TEXT NOT NULL
                )
                "#,
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_notes_character_id ON notes(character_id)",
                [],
            )?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
            tracing::debug!("Notes schema migrated to version {}", SCHEMA_VERSION);
        }

        Ok(())
    }

    /// Store a note, stamped with the current time
    pub fn add(&self, note: NewNote) -> Result<Note, NoteError> {
        if note.character_id.trim().is_empty() {
            return Err(NoteError::Invalid("character_id must not be empty"));
        }
        if note.content.trim().is_empty() {
            return Err(NoteError::Invalid("content must not be empty"));
        }

        // stored with microsecond precision
        let timestamp = Utc::now().trunc_subsecs(6);
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notes (character_id, content, timestamp) VALUES (?1, ?2, ?3)",
            params![
                note.character_id,
                note.content,
                timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
            ],
        )?;

        Ok(Note {
            id: conn.last_insert_rowid(),
            character_id: note.character_id,
            content: note.content,
            timestamp,
        })
    }

    /// Notes for one character, newest first
    pub fn get_by_owner(&self, character_id: &str) -> Result<Vec<Note>, NoteError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, character_id, content, timestamp
            FROM notes
            WHERE character_id = ?1
            ORDER BY timestamp DESC, id DESC
            "#,
        )?;

        let rows = stmt
            .query_map(params![character_id], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_note).collect()
    }

    /// Notes for many characters at once. Every requested id is present in
    /// the result, with an empty list when it has no notes.
    pub fn get_bulk_by_owners(
        &self,
        character_ids: &[String],
    ) -> Result<HashMap<String, Vec<Note>>, NoteError> {
        let mut grouped: HashMap<String, Vec<Note>> = character_ids
            .iter()
            .map(|id| (id.clone(), Vec::new()))
            .collect();
        if character_ids.is_empty() {
            return Ok(grouped);
        }

        let placeholders = vec!["?"; character_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, character_id, content, timestamp FROM notes \
             WHERE character_id IN ({}) ORDER BY timestamp DESC, id DESC",
            placeholders
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(character_ids.iter()), read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for row in rows {
            let note = into_note(row)?;
            if let Some(notes) = grouped.get_mut(&note.character_id) {
                notes.push(note);
            }
        }
        Ok(grouped)
    }

    /// Total number of notes
    pub fn count(&self) -> Result<i64, NoteError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
        Ok(count)
    }
}

type NoteRow = (i64, String, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_note((id, character_id, content, timestamp): NoteRow) -> Result<Note, NoteError> {
    Ok(Note {
        id,
        character_id,
        content,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)?.with_timezone(&Utc),
    })
}
