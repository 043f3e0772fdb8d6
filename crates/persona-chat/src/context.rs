//! Few-shot context assembly from retrieved turns.

use persona_core::types::ConversationTurn;

/// Builds the style-conditioning block from retrieved past turns.
///
/// Each turn becomes a two-line block:
///
/// ```text
/// User: <user_message>
/// You: <bot_response>
/// ```
///
/// Blocks are separated by a blank line and keep the input order, which
/// for similarity results is nearest first.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextAssembler;

impl ContextAssembler {
    /// Render `turns` as a context block. Empty input gives an empty string.
    pub fn build(&self, turns: &[ConversationTurn]) -> String {
        turns
            .iter()
            .map(|turn| format!("User: {}\nYou: {}", turn.user_message, turn.bot_response))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
