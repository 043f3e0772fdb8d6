//! Embedding provider trait and implementations.
//!
//! - `GeminiEmbeddingProvider` calls the Gemini `embedContent` endpoint over
//!   HTTPS. This is the production embedding backend.
//! - `MockEmbedding` provides deterministic hash-based vectors for testing.
//!
//! Providers never return an error: every failure collapses into
//! `EmbeddingResult::Unavailable`, which the orchestrator treats as
//! "no context for this turn".

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use persona_core::config::EmbeddingConfig;
use persona_core::error::PersonaError;
use persona_core::types::{EmbeddingRequest, EmbeddingResult};

/// Header carrying the Gemini API key. Kept out of the URL so request
/// errors never echo the key.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Service turning text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed the request text. Failures are reported as `Unavailable`.
    async fn embed(&self, request: EmbeddingRequest) -> EmbeddingResult;

    /// Dimensionality D of every vector this provider returns.
    fn dimensions(&self) -> usize;
}

// ---------------------------------------------------------------------------
// GeminiEmbeddingProvider - remote embedContent call
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Option<Vec<f32>>,
}

/// Embedding provider backed by the Gemini `models/{model}:embedContent` API.
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl std::fmt::Debug for GeminiEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiEmbeddingProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl GeminiEmbeddingProvider {
    /// Build a provider from the `[embedding]` config section.
    ///
    /// The HTTP client is bounded by `timeout_ms`.
    pub fn new(api_key: impl Into<String>, config: &EmbeddingConfig) -> Result<Self, PersonaError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PersonaError::Config(format!("HTTP client for embeddings: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:embedContent", self.base_url, self.model)
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>, PersonaError> {
        let body = EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: [Part { text }],
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| PersonaError::Embedding(format!("request failed: {}", e.without_url())))?
            .error_for_status()
            .map_err(|e| {
                PersonaError::Embedding(format!("provider returned error: {}", e.without_url()))
            })?
            .json::<EmbedContentResponse>()
            .await
            .map_err(|e| PersonaError::Embedding(format!("malformed response: {}", e.without_url())))?;

        let values = response
            .embedding
            .and_then(|e| e.values)
            .ok_or_else(|| PersonaError::Embedding("response has no embedding.values".to_string()))?;

        if values.len() != self.dimensions {
            return Err(PersonaError::DimensionMismatch {
                expected: self.dimensions,
                actual: values.len(),
            });
        }

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, request: EmbeddingRequest) -> EmbeddingResult {
        if request.text.is_empty() {
            return EmbeddingResult::unavailable("cannot embed empty text");
        }

        match self.request_embedding(&request.text).await {
            Ok(values) => {
                debug!(dimensions = values.len(), "Embedding received");
                EmbeddingResult::Vector(values)
            }
            Err(e) => {
                warn!(error = %e, model = %self.model, "Embedding call failed");
                EmbeddingResult::unavailable(e.to_string())
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic hash-based vectors for testing
// ---------------------------------------------------------------------------

/// Mock embedding provider returning deterministic unit vectors.
///
/// The output is derived from a hash of the input text, so identical inputs
/// always produce identical outputs.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
}

impl MockEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }

        result
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new(768)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedding {
    async fn embed(&self, request: EmbeddingRequest) -> EmbeddingResult {
        if request.text.is_empty() {
            return EmbeddingResult::unavailable("cannot embed empty text");
        }
        EmbeddingResult::Vector(self.hash_to_vector(&request.text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
