//! Database schema migrations.
//!
//! Applies the initial schema: the append-only conversation_turns log,
//! the store_meta key/value table, and schema_migrations.

use rusqlite::Connection;
use tracing::info;

use persona_core::error::PersonaError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), PersonaError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| PersonaError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| PersonaError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: conversation_log");
    }

    Ok(())
}

/// Version 1: conversation log.
fn apply_v1(conn: &Connection) -> Result<(), PersonaError> {
    conn.execute_batch(
        "
        -- One row per completed turn. Rows are only ever inserted.
        CREATE TABLE IF NOT EXISTS conversation_turns (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_message    TEXT NOT NULL,
            bot_response    TEXT NOT NULL,
            embedding       BLOB,
            created_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_turns_created_at
            ON conversation_turns (created_at DESC, id DESC);

        CREATE INDEX IF NOT EXISTS idx_turns_embedded
            ON conversation_turns (id)
            WHERE embedding IS NOT NULL;

        -- Store-wide settings fixed at creation (embedding dimension).
        CREATE TABLE IF NOT EXISTS store_meta (
            key             TEXT PRIMARY KEY NOT NULL,
            value           TEXT NOT NULL
        );

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'conversation_log');
        ",
    )
    .map_err(|e| PersonaError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
