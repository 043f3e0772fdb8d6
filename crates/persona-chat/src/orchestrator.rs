//! Chat orchestrator: runs one turn through embed, retrieve, assemble,
//! generate and persist.
//!
//! The orchestrator holds no per-conversation state; the store is the only
//! shared mutable resource. Each stage is bounded by a timeout, and a failed
//! or timed-out stage degrades the turn instead of aborting it:
//!
//! | Stage    | On failure                                          |
//! |----------|-----------------------------------------------------|
//! | embed    | skip retrieval, plain prompt, persist unembedded    |
//! | retrieve | empty context                                       |
//! | generate | diagnostic text becomes the response                |
//! | persist  | logged at error level, response still returned      |
//!
//! An append that times out is abandoned, not cancelled: the store may still
//! commit it, so the turn is reported without an id and logged as unknown.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use persona_core::config::PersonaConfig;
use persona_core::error::PersonaError;
use persona_core::types::{
    ConversationTurn, EmbeddingRequest, EmbeddingResult, GenerationRequest, GenerationResult,
    NewTurn, TurnId,
};
use persona_storage::ConversationStore;
use persona_vector::EmbeddingProvider;

use crate::context::ContextAssembler;
use crate::error::ChatError;
use crate::prompt::build_prompt;
use crate::response::ResponseGenerator;
use crate::types::{Degradation, TurnOutcome};

/// Tunables copied out of `PersonaConfig` at construction.
#[derive(Debug, Clone)]
struct Settings {
    k: usize,
    max_message_length: usize,
    index_failed_turns: bool,
    embed_timeout: Duration,
    retrieval_timeout: Duration,
    generation_timeout: Duration,
    append_timeout: Duration,
}

impl Settings {
    fn from_config(config: &PersonaConfig) -> Self {
        Self {
            k: config.retrieval.k,
            max_message_length: config.chat.max_message_length,
            index_failed_turns: config.retrieval.index_failed_turns,
            embed_timeout: config.embedding.timeout(),
            retrieval_timeout: config.retrieval.timeout(),
            generation_timeout: config.generation.timeout(),
            append_timeout: config.storage.append_timeout(),
        }
    }
}

/// Coordinates the embedding provider, conversation store and generator.
pub struct ChatOrchestrator {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn ConversationStore>,
    generator: Arc<dyn ResponseGenerator>,
    assembler: ContextAssembler,
    settings: Settings,
}

impl std::fmt::Debug for ChatOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOrchestrator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ChatOrchestrator {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn ConversationStore>,
        generator: Arc<dyn ResponseGenerator>,
        config: &PersonaConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            assembler: ContextAssembler,
            settings: Settings::from_config(config),
        }
    }

    /// Process one user message and return the text to send back.
    ///
    /// Only invalid input produces an error. Dependency outages are absorbed
    /// and, for generation, reported through the returned text itself.
    pub async fn process(&self, message: &str) -> Result<String, ChatError> {
        self.process_turn(message).await.map(|outcome| outcome.response)
    }

    /// Process one user message and report what happened at each stage.
    pub async fn process_turn(&self, message: &str) -> Result<TurnOutcome, ChatError> {
        self.validate(message)?;

        let request_id = Uuid::new_v4();
        let span = info_span!("chat_turn", %request_id);
        Ok(self.run_turn(message).instrument(span).await)
    }

    /// The `n` most recent turns, newest first.
    pub async fn history(&self, n: usize) -> Result<Vec<ConversationTurn>, ChatError> {
        match tokio::time::timeout(self.settings.retrieval_timeout, self.store.find_recent(n)).await
        {
            Ok(Ok(turns)) => Ok(turns),
            Ok(Err(e)) => {
                warn!(error = %e, "History query failed");
                Err(e.into())
            }
            Err(_) => {
                let e = timeout_error("history", self.settings.retrieval_timeout);
                warn!(error = %e, "History query failed");
                Err(e.into())
            }
        }
    }

    fn validate(&self, message: &str) -> Result<(), ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.settings.max_message_length {
            return Err(ChatError::MessageTooLong(self.settings.max_message_length));
        }
        Ok(())
    }

    async fn run_turn(&self, message: &str) -> TurnOutcome {
        let mut degradations = Vec::new();

        // 1. Embed
        let embedding = match self.embed(message).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                record(&mut degradations, Degradation::EmbeddingUnavailable(e.to_string()));
                None
            }
        };

        // 2. Retrieve, only with an embedding
        let retrieved = match embedding.as_deref() {
            Some(vector) => match self.retrieve(vector).await {
                Ok(turns) => turns,
                Err(e) => {
                    record(&mut degradations, Degradation::RetrievalUnavailable(e.to_string()));
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        // 3. Assemble context and 4. build the prompt
        let context = self.assembler.build(&retrieved);
        let prompt = build_prompt(&context, message);
        debug!(
            context_turns = retrieved.len(),
            persona_prompt = !context.is_empty(),
            "Prompt built"
        );

        // 5. Generate
        let generation = self.generate(prompt).await;
        if let GenerationResult::Failed { ref diagnostic } = generation {
            record(&mut degradations, Degradation::GenerationFailure(diagnostic.clone()));
        }

        // Failed turns stay out of the similarity corpus unless configured otherwise.
        let stored_embedding = if generation.is_failure() && !self.settings.index_failed_turns {
            None
        } else {
            embedding
        };
        let embedded = stored_embedding.is_some();
        let response = generation.into_text();

        // 6. Persist
        let mut turn = NewTurn::new(message, response.clone());
        turn.embedding = stored_embedding;
        let turn_id = match self.persist(turn).await {
            Ok(id) => Some(id),
            Err(e @ PersonaError::Timeout { .. }) => {
                warn!(stage = "persist", cause = %e, "Append outcome unknown");
                degradations.push(Degradation::PersistenceFailure(e.to_string()));
                None
            }
            Err(e) => {
                record(&mut degradations, Degradation::PersistenceFailure(e.to_string()));
                None
            }
        };

        info!(
            turn_id = ?turn_id.map(|id| id.0),
            context_turns = retrieved.len(),
            degraded = !degradations.is_empty(),
            "Turn processed"
        );

        TurnOutcome {
            response,
            turn_id,
            embedded: embedded && turn_id.is_some(),
            context_turns: retrieved.len(),
            degradations,
        }
    }

    async fn embed(&self, message: &str) -> Result<Vec<f32>, PersonaError> {
        let request = EmbeddingRequest::new(message);
        let result = tokio::time::timeout(self.settings.embed_timeout, self.embedder.embed(request))
            .await
            .map_err(|_| timeout_error("embedding", self.settings.embed_timeout))?;

        match result {
            EmbeddingResult::Vector(vector) => {
                let expected = self.embedder.dimensions();
                if vector.len() != expected {
                    return Err(PersonaError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                Ok(vector)
            }
            EmbeddingResult::Unavailable { reason } => Err(PersonaError::Embedding(reason)),
        }
    }

    async fn retrieve(&self, vector: &[f32]) -> Result<Vec<ConversationTurn>, PersonaError> {
        tokio::time::timeout(
            self.settings.retrieval_timeout,
            self.store.find_similar(vector, self.settings.k),
        )
        .await
        .map_err(|_| timeout_error("retrieval", self.settings.retrieval_timeout))?
    }

    async fn generate(&self, prompt: String) -> GenerationResult {
        let request = GenerationRequest::new(prompt);
        match tokio::time::timeout(
            self.settings.generation_timeout,
            self.generator.generate(request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => GenerationResult::failed(timeout_error(
                "generation",
                self.settings.generation_timeout,
            )),
        }
    }

    async fn persist(&self, turn: NewTurn) -> Result<TurnId, PersonaError> {
        tokio::time::timeout(self.settings.append_timeout, self.store.append(turn))
            .await
            .map_err(|_| timeout_error("append", self.settings.append_timeout))?
    }
}

fn timeout_error(stage: &'static str, budget: Duration) -> PersonaError {
    PersonaError::Timeout {
        stage,
        millis: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
    }
}

/// Log a degradation and add it to the outcome.
fn record(degradations: &mut Vec<Degradation>, degradation: Degradation) {
    match degradation {
        Degradation::PersistenceFailure(ref cause) => {
            error!(stage = degradation.stage(), cause = %cause, "Turn not persisted");
        }
        _ => {
            warn!(
                stage = degradation.stage(),
                cause = %degradation.cause(),
                "Stage degraded"
            );
        }
    }
    degradations.push(degradation);
}

// =============================================================================
// Tests
// =============================================================================
