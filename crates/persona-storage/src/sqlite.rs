//! SQLite-backed conversation store.
//!
//! Embeddings are stored as little-endian `f32` blobs. Similarity search is
//! an exact scan over rows with a non-null embedding; no ANN index is built.
//! All rusqlite work runs on the blocking thread pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use persona_core::error::PersonaError;
use persona_core::types::{ConversationTurn, NewTurn, TurnId};

use crate::db::Database;
use crate::store::{as_persistence, as_retrieval, rank_by_distance, ConversationStore};

const DIMENSIONS_KEY: &str = "embedding_dimensions";

/// Conversation store persisting to a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteConversationStore {
    db: Arc<Database>,
    dimensions: usize,
}

impl SqliteConversationStore {
    /// Wrap an open database, fixing the embedding dimension for its lifetime.
    ///
    /// The first store opened on a database records `dimensions`; reopening
    /// it with a different value fails with `DimensionMismatch`.
    pub fn new(db: Arc<Database>, dimensions: usize) -> Result<Self, PersonaError> {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO store_meta (key, value) VALUES (?1, ?2)",
                rusqlite::params![DIMENSIONS_KEY, dimensions.to_string()],
            )
            .map_err(|e| PersonaError::Storage(format!("Failed to record dimensions: {}", e)))?;

            let recorded: String = conn
                .query_row(
                    "SELECT value FROM store_meta WHERE key = ?1",
                    rusqlite::params![DIMENSIONS_KEY],
                    |row| row.get(0),
                )
                .map_err(|e| PersonaError::Storage(e.to_string()))?;

            let recorded: usize = recorded.parse().map_err(|e| {
                PersonaError::Storage(format!("Invalid recorded dimensions '{}': {}", recorded, e))
            })?;

            if recorded != dimensions {
                return Err(PersonaError::DimensionMismatch {
                    expected: recorded,
                    actual: dimensions,
                });
            }
            Ok(())
        })?;

        info!(dimensions, "SQLite conversation store ready");
        Ok(Self { db, dimensions })
    }

    /// Embedding dimension enforced by this store.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Count all stored turns.
    pub fn count(&self) -> Result<u64, PersonaError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM conversation_turns", [], |row| {
                    row.get(0)
                })
                .map_err(|e| PersonaError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn append(&self, turn: NewTurn) -> Result<TurnId, PersonaError> {
        if let Some(ref embedding) = turn.embedding {
            if embedding.len() != self.dimensions {
                return Err(PersonaError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: embedding.len(),
                });
            }
        }

        let db = Arc::clone(&self.db);
        let id = tokio::task::spawn_blocking(move || db.with_conn(|conn| insert_turn(conn, &turn)))
            .await
            .map_err(|e| PersonaError::Persistence(format!("Append task panicked: {}", e)))?
            .map_err(as_persistence)?;

        debug!(turn_id = %id, "Turn appended");
        Ok(id)
    }

    async fn find_similar(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ConversationTurn>, PersonaError> {
        if query.len() != self.dimensions {
            return Err(PersonaError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let db = Arc::clone(&self.db);
        let query = query.to_vec();
        tokio::task::spawn_blocking(move || {
            db.with_conn(|conn| {
                let embedded = select_turns(
                    conn,
                    "SELECT id, user_message, bot_response, embedding, created_at
                     FROM conversation_turns
                     WHERE embedding IS NOT NULL",
                    [],
                )?;
                Ok(rank_by_distance(&query, embedded, k))
            })
        })
        .await
        .map_err(|e| PersonaError::Retrieval(format!("Similarity task panicked: {}", e)))?
        .map_err(as_retrieval)
    }

    async fn find_recent(&self, n: usize) -> Result<Vec<ConversationTurn>, PersonaError> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let db = Arc::clone(&self.db);
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        tokio::task::spawn_blocking(move || {
            db.with_conn(|conn| {
                select_turns(
                    conn,
                    "SELECT id, user_message, bot_response, embedding, created_at
                     FROM conversation_turns
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?1",
                    rusqlite::params![limit],
                )
            })
        })
        .await
        .map_err(|e| PersonaError::Storage(format!("Recency task panicked: {}", e)))?
    }
}

// ============================================================================
// Row helpers
// ============================================================================

/// Insert one turn inside a transaction and return its id.
///
/// `created_at` never goes below the newest existing row, so recency order
/// follows append order even if the wall clock steps backwards.
fn insert_turn(conn: &Connection, turn: &NewTurn) -> Result<TurnId, PersonaError> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| PersonaError::Storage(format!("Failed to begin transaction: {}", e)))?;

    tx.execute(
        "INSERT INTO conversation_turns (user_message, bot_response, embedding, created_at)
         VALUES (?1, ?2, ?3,
                 MAX(?4, COALESCE((SELECT MAX(created_at) FROM conversation_turns), 0)))",
        rusqlite::params![
            turn.user_message,
            turn.bot_response,
            turn.embedding.as_deref().map(encode_embedding),
            Utc::now().timestamp_millis(),
        ],
    )
    .map_err(|e| PersonaError::Storage(format!("Failed to save turn: {}", e)))?;

    let id = tx.last_insert_rowid();

    tx.commit()
        .map_err(|e| PersonaError::Storage(format!("Failed to commit turn: {}", e)))?;

    Ok(TurnId(id))
}

fn select_turns<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<ConversationTurn>, PersonaError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| PersonaError::Storage(e.to_string()))?;

    let rows = stmt
        .query_map(params, |row| Ok(row_to_turn(row)))
        .map_err(|e| PersonaError::Storage(e.to_string()))?;

    let mut turns = Vec::new();
    for row in rows {
        let turn = row.map_err(|e| PersonaError::Storage(e.to_string()))??;
        turns.push(turn);
    }
    Ok(turns)
}

fn row_to_turn(row: &rusqlite::Row<'_>) -> Result<ConversationTurn, PersonaError> {
    let id: i64 = row
        .get(0)
        .map_err(|e| PersonaError::Storage(e.to_string()))?;
    let user_message: String = row
        .get(1)
        .map_err(|e| PersonaError::Storage(e.to_string()))?;
    let bot_response: String = row
        .get(2)
        .map_err(|e| PersonaError::Storage(e.to_string()))?;
    let embedding: Option<Vec<u8>> = row
        .get(3)
        .map_err(|e| PersonaError::Storage(e.to_string()))?;
    let created_at: i64 = row
        .get(4)
        .map_err(|e| PersonaError::Storage(e.to_string()))?;

    Ok(ConversationTurn {
        id: TurnId(id),
        user_message,
        bot_response,
        embedding: embedding.as_deref().map(decode_embedding).transpose()?,
        timestamp: Utc
            .timestamp_millis_opt(created_at)
            .single()
            .unwrap_or_default(),
    })
}

fn encode_embedding(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, PersonaError> {
    if bytes.len() % 4 != 0 {
        return Err(PersonaError::Storage(format!(
            "Corrupt embedding blob of {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
