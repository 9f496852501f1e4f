//! Conversation Inputs
//!
//! Per-request data supplied by the caller: the context used to render the
//! system prompt and the prior turns of the conversation. Neither is persisted
//! here; the caller owns both.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const DEFAULT_ASSISTANT_NAME: &str = "JARVIS";
const DEFAULT_USER_NAME: &str = "the user";
const UNKNOWN: &str = "unknown";

/// Who authored a turn sent to the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message of a model request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A history entry exactly as the caller sent it. The role is untrusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Keeps only `user` and `assistant` entries, in their original order.
///
/// Anything else, notably a caller-injected `system` entry, is dropped.
pub fn sanitize_history(history: &[HistoryEntry]) -> Vec<ChatTurn> {
    history
        .iter()
        .filter_map(|entry| match entry.role.as_str() {
            "user" => Some(ChatTurn::user(entry.content.clone())),
            "assistant" => Some(ChatTurn::assistant(entry.content.clone())),
            _ => None,
        })
        .collect()
}

/// Facts about the current request used to personalise the system prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub assistant_name: String,
    pub user_name: String,
    pub current_time: String,
    pub location: String,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            user_name: DEFAULT_USER_NAME.to_string(),
            current_time: UNKNOWN.to_string(),
            location: UNKNOWN.to_string(),
        }
    }
}

impl ConversationContext {
    /// Builds a context from the loosely-typed map a client sends.
    ///
    /// Keys are camelCase (`assistantName`, `userName`, `currentTime`,
    /// `location`). Missing or null keys fall back to defaults; non-string
    /// values are rendered as JSON text rather than rejected.
    pub fn from_value(value: Option<&Value>) -> Self {
        let defaults = Self::default();
        let Some(Value::Object(map)) = value else {
            return defaults;
        };
        let field = |key: &str, fallback: String| match map.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => fallback,
            Some(other) => other.to_string(),
        };
        Self {
            assistant_name: field("assistantName", defaults.assistant_name),
            user_name: field("userName", defaults.user_name),
            current_time: field("currentTime", defaults.current_time),
            location: field("location", defaults.location),
        }
    }
}
