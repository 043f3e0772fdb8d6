//! Persona Vector crate - embedding providers and the retrieval distance metric.
//!
//! Provides the `EmbeddingProvider` trait, an HTTP provider for the Gemini
//! `embedContent` endpoint, a deterministic mock for testing, and the
//! Euclidean distance used by every conversation store.

pub mod distance;
pub mod embedding;

pub use distance::euclidean_distance;
pub use embedding::{EmbeddingProvider, GeminiEmbeddingProvider, MockEmbedding};
