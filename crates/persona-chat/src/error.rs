//! Error types for the conversational interface.
//!
//! Only caller mistakes and the history read surface produce a `ChatError`.
//! Dependency outages during `process` degrade the turn instead.

use persona_core::error::PersonaError;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<PersonaError> for ChatError {
    fn from(err: PersonaError) -> Self {
        ChatError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::EmptyMessage;
        assert_eq!(err.to_string(), "message cannot be empty");

        let err = ChatError::MessageTooLong(8000);
        assert_eq!(
            err.to_string(),
            "message exceeds maximum length of 8000 characters"
        );

        let err = ChatError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn test_chat_error_from_persona_error() {
        let storage_err = PersonaError::Storage("connection lost".to_string());
        let chat_err: ChatError = storage_err.into();
        assert!(matches!(chat_err, ChatError::Storage(_)));
        assert!(chat_err.to_string().contains("connection lost"));
    }

    #[test]
    fn test_chat_error_from_timeout() {
        let err: ChatError = PersonaError::Timeout {
            stage: "history",
            millis: 5000,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "storage error: history timed out after 5000 ms"
        );
    }

    #[test]
    fn test_chat_error_unicode_inner_message() {
        let err = ChatError::Storage("verbindung getrennt: \u{00e9}\u{1f4a5}".to_string());
        assert!(err.to_string().contains("\u{1f4a5}"));
    }
}
