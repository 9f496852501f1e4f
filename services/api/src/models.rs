//! API Models
//!
//! Request and response bodies for the HTTP surface, annotated with `utoipa`
//! so they appear in the generated OpenAPI document.

use chrono::{DateTime, Utc};
use jarvis_core::{AssistantReply, HistoryEntry};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One prior message the client sends back with each turn.
#[derive(Deserialize, ToSchema, Debug, Clone)]
pub struct HistoryMessage {
    #[serde(default)]
    #[schema(example = "user")]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl From<HistoryMessage> for HistoryEntry {
    fn from(message: HistoryMessage) -> Self {
        HistoryEntry::new(message.role, message.content)
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct ChatRequest {
    #[schema(example = "What's on my calendar today?")]
    pub message: String,
    /// Free-form client context, e.g. `{"userName": "Tony", "location": "Malibu"}`.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub context: Option<serde_json::Value>,
    #[serde(default)]
    pub history: Option<Vec<HistoryMessage>>,
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
    pub success: bool,
}

impl From<AssistantReply> for ChatResponse {
    fn from(reply: AssistantReply) -> Self {
        Self {
            response: reply.response,
            success: reply.success,
        }
    }
}

/// Multipart form accepted by the transcription endpoint.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct TranscriptionForm {
    #[schema(value_type = String, format = Binary)]
    pub audio: Vec<u8>,
    #[schema(example = "en")]
    pub language: Option<String>,
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionResponse {
    pub success: bool,
    pub transcription: String,
    pub language: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct SpeakPayload {
    #[schema(example = "Good evening. All systems are online.")]
    pub text: String,
    pub voice_id: Option<String>,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct PlayPayload {
    #[schema(example = "Back in Black")]
    pub query: String,
}

/// The spoken outcome of a Spotify playback command.
#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct SpotifyResult {
    pub result: String,
}

#[derive(Deserialize, Debug)]
pub struct SpotifyCallbackQuery {
    pub code: String,
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub status: String,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq, Eq)]
pub struct MeResponse {
    pub uid: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}
