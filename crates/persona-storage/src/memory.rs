//! In-memory conversation store.
//!
//! Same contract as the SQLite store, nothing survives the process. Backs the
//! `memory` storage backend and the orchestrator tests.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use persona_core::error::PersonaError;
use persona_core::types::{ConversationTurn, NewTurn, TurnId};

use crate::store::{rank_by_distance, ConversationStore};

#[derive(Debug)]
struct Inner {
    turns: Vec<ConversationTurn>,
    next_id: i64,
}

/// Conversation store backed by a `Vec` behind a lock.
#[derive(Debug)]
pub struct InMemoryConversationStore {
    inner: RwLock<Inner>,
    dimensions: usize,
}

impl InMemoryConversationStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                turns: Vec::new(),
                next_id: 1,
            }),
            dimensions,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.turns.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_dimensions(&self, actual: usize) -> Result<(), PersonaError> {
        if actual != self.dimensions {
            return Err(PersonaError::DimensionMismatch {
                expected: self.dimensions,
                actual,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append(&self, turn: NewTurn) -> Result<TurnId, PersonaError> {
        if let Some(ref embedding) = turn.embedding {
            self.check_dimensions(embedding.len())?;
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|e| PersonaError::Persistence(format!("Store lock poisoned: {}", e)))?;

        let id = TurnId(inner.next_id);
        inner.next_id += 1;

        // Keep timestamps non-decreasing in append order.
        let now = Utc::now();
        let timestamp = inner
            .turns
            .last()
            .map_or(now, |last| last.timestamp.max(now));

        inner.turns.push(ConversationTurn {
            id,
            user_message: turn.user_message,
            bot_response: turn.bot_response,
            embedding: turn.embedding,
            timestamp,
        });
        Ok(id)
    }

    async fn find_similar(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ConversationTurn>, PersonaError> {
        self.check_dimensions(query.len())?;

        let inner = self
            .inner
            .read()
            .map_err(|e| PersonaError::Retrieval(format!("Store lock poisoned: {}", e)))?;

        Ok(rank_by_distance(
            query,
            inner.turns.iter().filter(|t| t.is_embedded()).cloned(),
            k,
        ))
    }

    async fn find_recent(&self, n: usize) -> Result<Vec<ConversationTurn>, PersonaError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| PersonaError::Storage(format!("Store lock poisoned: {}", e)))?;

        // Append order is recency order.
        Ok(inner.turns.iter().rev().take(n).cloned().collect())
    }
}
