use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Conversation turns
// =============================================================================

/// Store-assigned identifier of a conversation turn.
///
/// Ids are handed out in increasing order by the store and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub i64);

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One completed user-message/bot-response exchange.
///
/// Turns are immutable once appended; there is no update or delete path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Store-assigned identifier.
    pub id: TurnId,
    /// What the user said.
    pub user_message: String,
    /// What was sent back (generated text or a generation diagnostic).
    pub bot_response: String,
    /// Embedding of `user_message`, present only if embedding succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Store-assigned creation instant.
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Whether this turn takes part in similarity retrieval.
    pub fn is_embedded(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Input to `ConversationStore::append`. The store assigns id and timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct NewTurn {
    pub user_message: String,
    pub bot_response: String,
    pub embedding: Option<Vec<f32>>,
}

impl NewTurn {
    pub fn new(user_message: impl Into<String>, bot_response: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            bot_response: bot_response.into(),
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

// =============================================================================
// Provider request/result shapes
// =============================================================================

/// Request to an embedding provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddingRequest {
    pub text: String,
}

impl EmbeddingRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Outcome of an embedding call.
///
/// Transport errors, malformed payloads and missing fields all collapse
/// into `Unavailable`; the reason is kept for logging only.
#[derive(Clone, Debug, PartialEq)]
pub enum EmbeddingResult {
    Vector(Vec<f32>),
    Unavailable { reason: String },
}

impl EmbeddingResult {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        EmbeddingResult::Unavailable {
            reason: reason.into(),
        }
    }

    /// Consume the result, returning the vector if there is one.
    pub fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            EmbeddingResult::Vector(v) => Some(v),
            EmbeddingResult::Unavailable { .. } => None,
        }
    }
}

/// Request to a text-generation provider: a fully assembled prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Outcome of a generation call.
///
/// Both variants carry text that is safe to show the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationResult {
    Text(String),
    Failed { diagnostic: String },
}

/// Prefix of every user-visible generation diagnostic.
pub const GENERATION_DIAGNOSTIC_PREFIX: &str = "Error processing request: ";

impl GenerationResult {
    /// Build a failure whose diagnostic reads `Error processing request: <cause>`.
    pub fn failed(cause: impl std::fmt::Display) -> Self {
        GenerationResult::Failed {
            diagnostic: format!("{}{}", GENERATION_DIAGNOSTIC_PREFIX, cause),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, GenerationResult::Failed { .. })
    }

    /// The text to return to the caller and persist as the bot response.
    pub fn text(&self) -> &str {
        match self {
            GenerationResult::Text(t) => t,
            GenerationResult::Failed { diagnostic } => diagnostic,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            GenerationResult::Text(t) => t,
            GenerationResult::Failed { diagnostic } => diagnostic,
        }
    }
}
