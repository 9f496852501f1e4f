//! Response Assembler
//!
//! The assistant's answer is read aloud, so every failure is expressed as a
//! short sentence with `success = false` instead of an error value.

use serde::Serialize;

/// Spoken when the model call fails or produces nothing usable.
pub const APOLOGY: &str = "I'm having trouble thinking right now. Please try again in a moment.";

/// Spoken when no language model is configured at all.
pub const MODEL_UNAVAILABLE: &str =
    "I can't reach my language model right now. Please try again later.";

/// The final result of one conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantReply {
    pub response: String,
    pub success: bool,
}

impl AssistantReply {
    /// Wraps model text as a successful reply.
    ///
    /// The text is kept verbatim. Text that is empty or only whitespace
    /// cannot be spoken and is downgraded to the apology.
    pub fn assemble(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            return Self::degraded(APOLOGY);
        }
        Self {
            response: text,
            success: true,
        }
    }

    /// A caller-safe failure reply.
    pub fn degraded(message: &str) -> Self {
        Self {
            response: message.to_string(),
            success: false,
        }
    }
}
