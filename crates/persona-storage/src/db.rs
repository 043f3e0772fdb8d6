//! SQLite handle for the conversation log.
//!
//! The chat loop and a concurrent `history` reader share one database file.
//! Opening it turns on WAL so a reader never blocks the appender, and sets
//! a busy timeout so a second process waits for the writer instead of
//! failing the turn. The schema is brought up to date before the handle is
//! returned.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use persona_core::error::PersonaError;

use crate::migrations;

const OPEN_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA busy_timeout = 5000;";

/// One migrated connection to the conversation log.
///
/// `rusqlite::Connection` is `Send` but not `Sync`; the store serializes
/// every statement through the mutex from inside `spawn_blocking`.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the conversation log at `path`, creating parent
    /// directories as needed.
    pub fn new(path: &Path) -> Result<Self, PersonaError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|e| {
            PersonaError::Storage(format!("cannot open {}: {}", path.display(), e))
        })?;
        conn.execute_batch(OPEN_PRAGMAS)
            .map_err(|e| PersonaError::Storage(format!("cannot configure database: {}", e)))?;

        let db = Self::migrated(conn)?;
        info!(path = %path.display(), "Conversation log opened");
        Ok(db)
    }

    /// A private, non-persistent conversation log.
    pub fn in_memory() -> Result<Self, PersonaError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PersonaError::Storage(format!("cannot open in-memory database: {}", e)))?;
        Self::migrated(conn)
    }

    fn migrated(conn: Connection) -> Result<Self, PersonaError> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, PersonaError>
    where
        F: FnOnce(&Connection) -> Result<T, PersonaError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| PersonaError::Storage("database mutex poisoned".into()))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
