//! Provider token persistence.
//!
//! Integrations that use OAuth keep an access/refresh token pair. Where the
//! pair lives is the deployment's choice; adapters only see [`TokenStore`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// An OAuth access token and the refresh token that renews it.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns the stored pair, or `None` when nothing usable is stored.
    async fn load(&self) -> Result<Option<TokenPair>>;
    async fn save(&self, tokens: &TokenPair) -> Result<()>;
}

/// Stores the pair as two lines of a text file: access token, then refresh token.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<TokenPair>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read token file {}", self.path.display()));
            }
        };

        let mut lines = contents.lines().map(str::trim);
        match (lines.next(), lines.next()) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Ok(Some(TokenPair {
                    access_token: access.to_string(),
                    refresh_token: refresh.to_string(),
                }))
            }
            _ => Ok(None),
        }
    }

    async fn save(&self, tokens: &TokenPair) -> Result<()> {
        tokio::fs::write(
            &self.path,
            format!("{}\n{}", tokens.access_token, tokens.refresh_token),
        )
        .await
        .with_context(|| format!("Failed to write token file {}", self.path.display()))
    }
}

/// Keeps the pair in process memory only.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<TokenPair>> {
        Ok(self.tokens.lock().await.clone())
    }

    async fn save(&self, tokens: &TokenPair) -> Result<()> {
        *self.tokens.lock().await = Some(tokens.clone());
        Ok(())
    }
}
