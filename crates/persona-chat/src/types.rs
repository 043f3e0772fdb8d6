//! Result types reported by the orchestrator.

use serde::Serialize;

use persona_core::types::TurnId;

/// A pipeline stage that failed and was recovered from locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "cause", rename_all = "snake_case")]
pub enum Degradation {
    /// Embedding failed or timed out; retrieval was skipped.
    EmbeddingUnavailable(String),
    /// Similarity query failed or timed out; context is empty.
    RetrievalUnavailable(String),
    /// Generation failed; the diagnostic became the response.
    GenerationFailure(String),
    /// Append failed or timed out; the turn was not recorded.
    PersistenceFailure(String),
}

impl Degradation {
    /// Stage name used in log events.
    pub fn stage(&self) -> &'static str {
        match self {
            Degradation::EmbeddingUnavailable(_) => "embed",
            Degradation::RetrievalUnavailable(_) => "retrieve",
            Degradation::GenerationFailure(_) => "generate",
            Degradation::PersistenceFailure(_) => "persist",
        }
    }

    pub fn cause(&self) -> &str {
        match self {
            Degradation::EmbeddingUnavailable(c)
            | Degradation::RetrievalUnavailable(c)
            | Degradation::GenerationFailure(c)
            | Degradation::PersistenceFailure(c) => c,
        }
    }
}

/// Everything known about one processed turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnOutcome {
    /// Text returned to the caller: generated reply or generation diagnostic.
    pub response: String,
    /// Id of the persisted turn, `None` if the append failed or timed out.
    ///
    /// After a timeout the outcome is unknown: the store may still commit
    /// the turn once the abandoned write completes.
    pub turn_id: Option<TurnId>,
    /// Whether the persisted turn carries an embedding.
    pub embedded: bool,
    /// Number of retrieved turns used as context.
    pub context_turns: usize,
    /// Stages that failed, in pipeline order.
    pub degradations: Vec<Degradation>,
}

impl TurnOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    pub fn generation_failed(&self) -> bool {
        self.degradations
            .iter()
            .any(|d| matches!(d, Degradation::GenerationFailure(_)))
    }
}
