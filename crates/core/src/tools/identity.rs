//! Identity lookup: resolves a client's bearer token to a stable user id.

use crate::error::ToolError;
use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const FIREBASE_LOOKUP_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:lookup";

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Returns the subject identifier the token was issued for.
    async fn verify(&self, id_token: &str) -> Result<String, ToolError>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
}

/// Verifies Firebase ID tokens with the Identity Toolkit REST API.
pub struct FirebaseIdentity {
    http: reqwest::Client,
    api_key: Option<SecretString>,
    lookup_url: String,
}

impl FirebaseIdentity {
    pub fn new(http: reqwest::Client, api_key: Option<SecretString>) -> Self {
        Self {
            http,
            api_key,
            lookup_url: FIREBASE_LOOKUP_URL.to_string(),
        }
    }

    pub fn with_lookup_url(mut self, lookup_url: impl Into<String>) -> Self {
        self.lookup_url = lookup_url.into();
        self
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseIdentity {
    async fn verify(&self, id_token: &str) -> Result<String, ToolError> {
        let api_key = self.api_key.as_ref().ok_or(ToolError::ProviderUnavailable)?;

        let response = self
            .http
            .post(&self.lookup_url)
            .query(&[("key", api_key.expose_secret())])
            .json(&json!({ "idToken": id_token }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            debug!(%status, "Identity provider rejected token");
            return Err(ToolError::AuthExpired);
        }
        if !status.is_success() {
            return Err(ToolError::ProviderRequestFailed { status });
        }

        let lookup: LookupResponse = response.json().await?;
        lookup
            .users
            .into_iter()
            .next()
            .map(|user| user.local_id)
            .ok_or(ToolError::AuthExpired)
    }
}
