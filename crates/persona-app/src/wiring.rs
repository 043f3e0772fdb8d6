//! Builds the orchestrator's collaborators from configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use persona_chat::{ChatOrchestrator, EchoGenerator, GeminiGenerator, ResponseGenerator};
use persona_core::config::PersonaConfig;
use persona_core::error::PersonaError;
use persona_storage::{
    ConversationStore, Database, InMemoryConversationStore, SqliteConversationStore,
};
use persona_vector::{EmbeddingProvider, GeminiEmbeddingProvider, MockEmbedding};

/// Expand ~ to home directory in a path string.
pub fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

fn api_key(env_var: &str) -> Result<String, PersonaError> {
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(PersonaError::Config(format!(
            "{} is not set; export it or choose an offline provider in the config",
            env_var
        ))),
    }
}

pub fn build_embedder(config: &PersonaConfig) -> Result<Arc<dyn EmbeddingProvider>, PersonaError> {
    let section = &config.embedding;
    match section.provider.as_str() {
        "gemini" => {
            let key = api_key(&section.api_key_env)?;
            info!(model = %section.model, "Using Gemini embeddings");
            Ok(Arc::new(GeminiEmbeddingProvider::new(key, section)?))
        }
        "mock" => {
            info!(dimensions = section.dimensions, "Using mock embeddings");
            Ok(Arc::new(MockEmbedding::new(section.dimensions)))
        }
        other => Err(PersonaError::Config(format!(
            "unknown embedding provider '{}'",
            other
        ))),
    }
}

pub fn build_generator(
    config: &PersonaConfig,
) -> Result<Arc<dyn ResponseGenerator>, PersonaError> {
    let section = &config.generation;
    match section.provider.as_str() {
        "gemini" => {
            let key = api_key(&section.api_key_env)?;
            info!(model = %section.model, "Using Gemini generation");
            Ok(Arc::new(GeminiGenerator::new(key, section)?))
        }
        "echo" => {
            info!("Using offline echo generator");
            Ok(Arc::new(EchoGenerator))
        }
        other => Err(PersonaError::Config(format!(
            "unknown generation provider '{}'",
            other
        ))),
    }
}

pub fn build_store(
    config: &PersonaConfig,
    data_dir: &Path,
) -> Result<Arc<dyn ConversationStore>, PersonaError> {
    let dimensions = config.embedding.dimensions;
    match config.storage.backend.as_str() {
        "sqlite" => {
            let db_path = data_dir.join(&config.storage.db_file);
            let db = Arc::new(Database::new(&db_path)?);
            info!(path = %db_path.display(), "SQLite database opened");
            Ok(Arc::new(SqliteConversationStore::new(db, dimensions)?))
        }
        "memory" => {
            info!("Using in-memory conversation store; nothing will be saved");
            Ok(Arc::new(InMemoryConversationStore::new(dimensions)))
        }
        other => Err(PersonaError::Config(format!(
            "unknown storage backend '{}'",
            other
        ))),
    }
}

/// Wire every collaborator into a ready orchestrator.
pub fn build_orchestrator(
    config: &PersonaConfig,
    data_dir: &Path,
) -> Result<ChatOrchestrator, PersonaError> {
    let store = build_store(config, data_dir)?;
    let embedder = build_embedder(config)?;
    let generator = build_generator(config)?;
    Ok(ChatOrchestrator::new(embedder, store, generator, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_config() -> PersonaConfig {
        let mut config = PersonaConfig::default();
        config.embedding.provider = "mock".to_string();
        config.embedding.dimensions = 16;
        config.generation.provider = "echo".to_string();
        config
    }

    #[test]
    fn test_resolve_data_dir_plain() {
        assert_eq!(resolve_data_dir("/var/lib/persona"), PathBuf::from("/var/lib/persona"));
    }

    #[test]
    fn test_resolve_data_dir_expands_tilde() {
        let resolved = resolve_data_dir("~/.persona/data");
        assert!(resolved.ends_with(".persona/data"));
        assert!(!resolved.starts_with("~"));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let mut config = PersonaConfig::default();
        config.embedding.api_key_env = "PERSONA_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        config.generation.api_key_env = "PERSONA_TEST_KEY_THAT_IS_NEVER_SET".to_string();

        assert!(matches!(build_embedder(&config), Err(PersonaError::Config(_))));
        assert!(matches!(build_generator(&config), Err(PersonaError::Config(_))));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let mut config = offline_config();
        config.embedding.provider = "word2vec".to_string();
        assert!(build_embedder(&config).is_err());

        let mut config = offline_config();
        config.generation.provider = "gpt".to_string();
        assert!(build_generator(&config).is_err());

        let mut config = offline_config();
        config.storage.backend = "postgres".to_string();
        let dir = tempfile::tempdir().unwrap();
        assert!(build_store(&config, dir.path()).is_err());
    }

    #[test]
    fn test_sqlite_store_created_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = offline_config();
        build_store(&config, dir.path()).unwrap();
        assert!(dir.path().join("persona.db").exists());
    }

    #[tokio::test]
    async fn test_offline_orchestrator_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config();
        config.storage.backend = "memory".to_string();

        let orch = build_orchestrator(&config, dir.path()).unwrap();
        let reply = orch.process("ping").await.unwrap();
        assert_eq!(reply, "(offline) You said: ping");

        let history = orch.history(5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].bot_response, reply);
    }
}
