//! Response generation.
//!
//! - `GeminiGenerator` calls the Gemini `generateContent` endpoint.
//! - `EchoGenerator` answers offline with a fixed acknowledgement, for
//!   running the binary without credentials.
//!
//! Generators never return an error. A failure becomes
//! `GenerationResult::Failed`, whose diagnostic is shown to the user.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use persona_core::config::GenerationConfig;
use persona_core::error::PersonaError;
use persona_core::types::{GenerationRequest, GenerationResult};
use persona_vector::embedding::API_KEY_HEADER;

/// Service turning a fully assembled prompt into reply text.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> GenerationResult;
}

// =============================================================================
// GeminiGenerator
// =============================================================================

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    fn into_first_text(self) -> Option<String> {
        self.candidates?
            .into_iter()
            .next()?
            .content?
            .parts?
            .into_iter()
            .next()?
            .text
    }
}

/// Generator backed by the Gemini `models/{model}:generateContent` API.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for GeminiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGenerator")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl GeminiGenerator {
    /// Build a generator from the `[generation]` config section.
    pub fn new(api_key: impl Into<String>, config: &GenerationConfig) -> Result<Self, PersonaError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PersonaError::Config(format!("HTTP client for generation: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn request_text(&self, prompt: &str) -> Result<String, PersonaError> {
        let body = GenerateContentRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| PersonaError::Generation(format!("request failed: {}", e.without_url())))?
            .error_for_status()
            .map_err(|e| {
                PersonaError::Generation(format!("provider returned error: {}", e.without_url()))
            })?
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| PersonaError::Generation(format!("malformed response: {}", e.without_url())))?;

        response.into_first_text().ok_or_else(|| {
            PersonaError::Generation("response has no candidates[0].content.parts[0].text".into())
        })
    }
}

#[async_trait]
impl ResponseGenerator for GeminiGenerator {
    async fn generate(&self, request: GenerationRequest) -> GenerationResult {
        match self.request_text(&request.prompt).await {
            Ok(text) => {
                debug!(chars = text.chars().count(), "Generation received");
                GenerationResult::Text(text)
            }
            Err(e) => {
                warn!(error = %e, model = %self.model, "Generation call failed");
                GenerationResult::failed(e)
            }
        }
    }
}

// =============================================================================
// EchoGenerator
// =============================================================================

/// Offline generator that acknowledges the message it was asked about.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoGenerator;

impl EchoGenerator {
    /// The text after the last `Message: ` marker, without the response cue.
    fn extract_message(prompt: &str) -> &str {
        let tail = match prompt.rfind("Message: ") {
            Some(at) => &prompt[at + "Message: ".len()..],
            None => prompt,
        };
        tail.strip_suffix("\n\nResponse:").unwrap_or(tail)
    }
}

#[async_trait]
impl ResponseGenerator for EchoGenerator {
    async fn generate(&self, request: GenerationRequest) -> GenerationResult {
        let message = Self::extract_message(&request.prompt);
        GenerationResult::Text(format!("(offline) You said: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const GENERATE_PATH: &str = "/models/gemini-1.5-flash:generateContent";

    fn config_for(base_url: &str) -> GenerationConfig {
        GenerationConfig {
            base_url: base_url.to_string(),
            ..GenerationConfig::default()
        }
    }

    // ---- GeminiGenerator ----

    #[tokio::test]
    async fn test_gemini_generation_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", GENERATE_PATH)
            .match_header(API_KEY_HEADER, "test-key")
            .match_body(Matcher::Json(serde_json::json!({
                "contents": [{"parts": [{"text": "PROMPT"}]}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"Hi there!"}],"role":"model"}}]}"#,
            )
            .create_async()
            .await;

        let generator = GeminiGenerator::new("test-key", &config_for(&server.url())).unwrap();
        let result = generator.generate(GenerationRequest::new("PROMPT")).await;

        assert_eq!(result, GenerationResult::Text("Hi there!".to_string()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_gemini_generation_uses_first_candidate_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[
                    {"content":{"parts":[{"text":"  first\n"},{"text":"second part"}]}},
                    {"content":{"parts":[{"text":"other candidate"}]}}
                ]}"#,
            )
            .create_async()
            .await;

        let generator = GeminiGenerator::new("k", &config_for(&server.url())).unwrap();
        let result = generator.generate(GenerationRequest::new("p")).await;
        assert_eq!(result, GenerationResult::Text("  first\n".to_string()));
    }

    #[tokio::test]
    async fn test_gemini_generation_no_candidates_is_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let generator = GeminiGenerator::new("k", &config_for(&server.url())).unwrap();
        let result = generator.generate(GenerationRequest::new("p")).await;
        assert!(result.is_failure());
        assert!(result.text().starts_with("Error processing request: "));
    }

    #[tokio::test]
    async fn test_gemini_generation_malformed_body_is_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let generator = GeminiGenerator::new("k", &config_for(&server.url())).unwrap();
        let result = generator.generate(GenerationRequest::new("p")).await;
        assert!(result.is_failure());
    }

    #[tokio::test]
    async fn test_gemini_generation_http_error_is_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"error":{"message":"quota"}}"#)
            .create_async()
            .await;

        let generator = GeminiGenerator::new("k", &config_for(&server.url())).unwrap();
        match generator.generate(GenerationRequest::new("p")).await {
            GenerationResult::Failed { diagnostic } => {
                assert!(diagnostic.starts_with("Error processing request: "));
                assert!(diagnostic.contains("429"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gemini_generation_unreachable_is_failure() {
        let generator = GeminiGenerator::new("k", &config_for("http://127.0.0.1:1")).unwrap();
        let result = generator.generate(GenerationRequest::new("p")).await;
        assert!(result.is_failure());
    }

    #[tokio::test]
    async fn test_gemini_generation_diagnostic_never_contains_key() {
        const KEY: &str = "SUPER-SECRET-KEY";

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .match_header(API_KEY_HEADER, KEY)
            .with_status(429)
            .with_body(r#"{"error":{"message":"quota"}}"#)
            .create_async()
            .await;

        let generator = GeminiGenerator::new(KEY, &config_for(&server.url())).unwrap();
        let result = generator.generate(GenerationRequest::new("p")).await;
        assert!(result.is_failure());
        assert!(result.text().contains("429"));
        assert!(!result.text().contains(KEY));

        let unreachable = GeminiGenerator::new(KEY, &config_for("http://127.0.0.1:1")).unwrap();
        let result = unreachable.generate(GenerationRequest::new("p")).await;
        assert!(result.is_failure());
        assert!(!result.text().contains(KEY));
    }

    #[test]
    fn test_gemini_endpoint_and_debug() {
        let generator =
            GeminiGenerator::new("super-secret", &config_for("https://example.com/v1beta/"))
                .unwrap();
        assert_eq!(
            generator.endpoint(),
            "https://example.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert!(!format!("{:?}", generator).contains("super-secret"));
    }

    // ---- EchoGenerator ----

    #[tokio::test]
    async fn test_echo_acknowledges_message() {
        let prompt = crate::prompt::build_prompt("User: a\nYou: b", "see you at 6?");
        let result = EchoGenerator.generate(GenerationRequest::new(prompt)).await;
        assert_eq!(
            result,
            GenerationResult::Text("(offline) You said: see you at 6?".to_string())
        );
    }

    #[tokio::test]
    async fn test_echo_without_marker_echoes_prompt() {
        let result = EchoGenerator.generate(GenerationRequest::new("raw")).await;
        assert_eq!(result.text(), "(offline) You said: raw");
    }
}
