//! Tool Adapter Errors
//!
//! Provider failures are typed inside an adapter and converted to a short,
//! speakable phrase before they leave it. Nothing in this enum carries a raw
//! provider response body.

use reqwest::StatusCode;

/// Failure kinds an external integration can produce.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Credentials are missing, or the user never connected the integration.
    #[error("provider is not configured")]
    ProviderUnavailable,
    /// The provider answered with a non-success status.
    #[error("provider request failed with status {status}")]
    ProviderRequestFailed { status: StatusCode },
    /// The access token was rejected and the one-shot refresh did not help.
    #[error("provider authorization expired and could not be refreshed")]
    AuthExpired,
    /// The request never produced a response (DNS, TLS, timeout...).
    #[error("provider transport error: {0}")]
    Transport(String),
    /// The provider answered 2xx but the body was not what we expected.
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
}

impl ToolError {
    /// A caller-safe phrase suitable for being read aloud.
    pub fn spoken(&self) -> &'static str {
        match self {
            ToolError::ProviderUnavailable => "That service isn't connected yet.",
            ToolError::ProviderRequestFailed { .. } => {
                "That service returned an error. Please try again later."
            }
            ToolError::AuthExpired => "My access to that service expired. Please reconnect it.",
            ToolError::Transport(_) => "I couldn't reach that service right now.",
            ToolError::Decode(_) => "That service sent back something I couldn't understand.",
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ToolError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ToolError::ProviderRequestFailed { status }
        } else {
            ToolError::Transport(err.to_string())
        }
    }
}
