use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PersonaError, Result};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Top-level configuration for the Persona application.
///
/// Loaded from `~/.persona/config.toml` by default. Each section corresponds
/// to one stage of the chat pipeline or a cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl PersonaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PersonaConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PersonaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.persona/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider: "gemini" or "mock".
    pub provider: String,
    /// Provider API base URL.
    pub base_url: String,
    /// Embedding model name.
    pub model: String,
    /// Embedding dimension D. Every stored vector has exactly this length.
    pub dimensions: usize,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Upper bound on a single embedding call.
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: "text-embedding-004".to_string(),
            dimensions: 768,
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Text-generation provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Provider: "gemini" or "echo".
    pub provider: String,
    /// Provider API base URL.
    pub base_url: String,
    /// Generation model name.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Upper bound on a single generation call.
    pub timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Similarity retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest past turns injected as context.
    pub k: usize,
    /// Upper bound on a single similarity query.
    pub timeout_ms: u64,
    /// Keep the embedding on turns whose generation failed, making the
    /// diagnostic text retrievable as context for later turns.
    pub index_failed_turns: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 3,
            timeout_ms: 5_000,
            index_failed_turns: false,
        }
    }
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Conversation store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend: "sqlite" or "memory".
    pub backend: String,
    /// Database file name, relative to `general.data_dir`.
    pub db_file: String,
    /// Upper bound on a single append.
    pub append_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            db_file: "persona.db".to_string(),
            append_timeout_ms: 5_000,
        }
    }
}

impl StorageConfig {
    pub fn append_timeout(&self) -> Duration {
        Duration::from_millis(self.append_timeout_ms)
    }
}

/// Chat input limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum message length in characters.
    pub max_message_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: 8_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = PersonaConfig::default();
        assert_eq!(config.general.data_dir, "~/.persona/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.embedding.provider, "gemini");
        assert_eq!(config.embedding.model, "text-embedding-004");
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.generation.model, "gemini-1.5-flash");
        assert_eq!(config.retrieval.k, 3);
        assert!(!config.retrieval.index_failed_turns);
        assert_eq!(config.storage.backend, "sqlite");
        assert_eq!(config.storage.db_file, "persona.db");
        assert_eq!(config.chat.max_message_length, 8_000);
    }

    #[test]
    fn test_timeouts_as_durations() {
        let config = PersonaConfig::default();
        assert_eq!(config.embedding.timeout(), Duration::from_secs(10));
        assert_eq!(config.generation.timeout(), Duration::from_secs(30));
        assert_eq!(config.retrieval.timeout(), Duration::from_secs(5));
        assert_eq!(config.storage.append_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"

[embedding]
provider = "mock"
dimensions = 384
timeout_ms = 250

[retrieval]
k = 5
index_failed_turns = true

[storage]
backend = "memory"
"#;
        let file = create_temp_config(content);
        let config = PersonaConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.embedding.provider, "mock");
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.embedding.timeout_ms, 250);
        // Unset fields in a present section keep their defaults.
        assert_eq!(config.embedding.model, "text-embedding-004");
        assert_eq!(config.retrieval.k, 5);
        assert!(config.retrieval.index_failed_turns);
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.storage.db_file, "persona.db");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = PersonaConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.retrieval.k, 3);
        assert_eq!(config.generation.timeout_ms, 30_000);
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = PersonaConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "~/.persona/data");
        assert_eq!(config.embedding.dimensions, 768);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = PersonaConfig::load(file.path());
        assert!(matches!(result, Err(PersonaError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = PersonaConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.persona/data");
        assert_eq!(config.retrieval.k, 3);
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = PersonaConfig::default();
        config.retrieval.k = 7;
        config.generation.provider = "echo".to_string();
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = PersonaConfig::load(&path).unwrap();
        assert_eq!(reloaded.retrieval.k, 7);
        assert_eq!(reloaded.generation.provider, "echo");
        assert_eq!(reloaded.embedding.base_url, config.embedding.base_url);
    }
}
