//! Conversational core for Persona.
//!
//! Turns a user message into a style-conditioned reply: embed the message,
//! retrieve similar past turns, assemble them into few-shot context, build
//! the prompt, generate, and append the finished turn to the log. Every
//! dependency failure degrades the turn instead of aborting it.

pub mod context;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod response;
pub mod types;

pub use context::ContextAssembler;
pub use error::ChatError;
pub use orchestrator::ChatOrchestrator;
pub use prompt::build_prompt;
pub use response::{EchoGenerator, GeminiGenerator, ResponseGenerator};
pub use types::{Degradation, TurnOutcome};
