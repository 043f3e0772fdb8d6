use thiserror::Error;

/// Top-level error type for the Persona system.
///
/// Stage-specific variants line up with the degradation taxonomy used by the
/// chat orchestrator: embedding, retrieval, generation and persistence each
/// get their own variant so callers can tell which boundary failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersonaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding unavailable: {0}")]
    Embedding(String),

    #[error("Retrieval unavailable: {0}")]
    Retrieval(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Generation failure: {0}")]
    Generation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{stage} timed out after {millis} ms")]
    Timeout { stage: &'static str, millis: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for PersonaError {
    fn from(err: toml::de::Error) -> Self {
        PersonaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PersonaError {
    fn from(err: toml::ser::Error) -> Self {
        PersonaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PersonaError {
    fn from(err: serde_json::Error) -> Self {
        PersonaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Persona operations.
pub type Result<T> = std::result::Result<T, PersonaError>;
