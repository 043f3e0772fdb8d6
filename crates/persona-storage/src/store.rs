//! The conversation store contract.
//!
//! One write (`append`) and two reads (`find_similar`, `find_recent`) over an
//! append-only log of turns. Similarity is Euclidean distance (see
//! `persona_vector::euclidean_distance`), nearest first, over embedded turns
//! only. Recency is newest first by store-assigned timestamp.
//!
//! Error classes differ per operation so the orchestrator can apply its
//! failure policy without inspecting engine details:
//! - `append` fails with `PersonaError::Persistence` (or `DimensionMismatch`)
//! - `find_similar` fails with `PersonaError::Retrieval`
//! - `find_recent` fails with `PersonaError::Storage`

use async_trait::async_trait;

use persona_core::error::PersonaError;
use persona_core::types::{ConversationTurn, NewTurn, TurnId};

/// Append-only store of past conversation turns.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Atomically insert a new turn, assigning its id and timestamp.
    ///
    /// After this returns `Ok`, the turn is visible to both read queries.
    async fn append(&self, turn: NewTurn) -> Result<TurnId, PersonaError>;

    /// Return at most `k` embedded turns ordered by ascending distance to
    /// `query`. Returns every embedded turn when fewer than `k` exist.
    async fn find_similar(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ConversationTurn>, PersonaError>;

    /// Return the `n` most recent turns, newest first.
    async fn find_recent(&self, n: usize) -> Result<Vec<ConversationTurn>, PersonaError>;
}

/// Reclassify a generic storage failure as a retrieval failure.
pub(crate) fn as_retrieval(err: PersonaError) -> PersonaError {
    match err {
        PersonaError::Storage(msg) => PersonaError::Retrieval(msg),
        other => other,
    }
}

/// Reclassify a generic storage failure as a persistence failure.
pub(crate) fn as_persistence(err: PersonaError) -> PersonaError {
    match err {
        PersonaError::Storage(msg) => PersonaError::Persistence(msg),
        other => other,
    }
}

/// Rank embedded turns by distance to `query`, nearest first, keeping `k`.
///
/// Ties break on ascending id so results are deterministic.
pub(crate) fn rank_by_distance(
    query: &[f32],
    turns: impl IntoIterator<Item = ConversationTurn>,
    k: usize,
) -> Vec<ConversationTurn> {
    let mut scored: Vec<(f64, ConversationTurn)> = turns
        .into_iter()
        .filter_map(|turn| {
            let distance = persona_vector::euclidean_distance(query, turn.embedding.as_deref()?);
            Some((distance, turn))
        })
        .collect();

    scored.sort_by(|(da, ta), (db, tb)| da.total_cmp(db).then(ta.id.cmp(&tb.id)));
    scored.truncate(k);
    scored.into_iter().map(|(_, turn)| turn).collect()
}
