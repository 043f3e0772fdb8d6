//! Prompt construction.
//!
//! Exactly two shapes: a persona-conditioning prompt when retrieved context
//! exists, and a plain conversational prompt when it does not.

const PERSONA_PREAMBLE: &str = "You are an AI that has learned to communicate exactly like a \
specific person based on their chat history. Analyze the conversation patterns, tone, \
vocabulary, interests, and communication style from the following past conversations, then \
respond to the current message EXACTLY as that person would respond.\n\n\
Past conversations showing this person's communication style:\n";

const PERSONA_INSTRUCTION: &str =
    "Based on the above conversations, respond to this message in the SAME style, tone, and manner:\n";

const PLAIN_PREAMBLE: &str =
    "You are having a casual conversation. Respond naturally and conversationally.\n\n";

/// Build the generation prompt for `message` given an assembled `context`.
///
/// An empty context selects the plain preamble.
pub fn build_prompt(context: &str, message: &str) -> String {
    let mut prompt = String::with_capacity(
        PERSONA_PREAMBLE.len() + context.len() + PERSONA_INSTRUCTION.len() + message.len() + 32,
    );

    if context.is_empty() {
        prompt.push_str(PLAIN_PREAMBLE);
    } else {
        prompt.push_str(PERSONA_PREAMBLE);
        prompt.push_str(context);
        prompt.push_str("\n\n");
        prompt.push_str(PERSONA_INSTRUCTION);
    }

    prompt.push_str("Message: ");
    prompt.push_str(message);
    prompt.push_str("\n\nResponse:");
    prompt
}
