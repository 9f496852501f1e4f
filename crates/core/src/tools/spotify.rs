//! Spotify playback adapter.
//!
//! Covers the authorization-code login, token refresh, and the three
//! playback controls the assistant exposes: play a search match, pause, and
//! skip. Tokens live in an injected [`TokenStore`].

use crate::error::ToolError;
use crate::tools::token_store::{TokenPair, TokenStore};
use reqwest::{Method, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub const SPOTIFY_NOT_CONNECTED: &str = "Spotify is not connected. Please log in to Spotify first.";
pub const SPOTIFY_SESSION_EXPIRED: &str =
    "Your Spotify session expired. Please log in to Spotify again.";
pub const SPOTIFY_SEARCH_FAILED: &str = "Failed to search Spotify.";
pub const NO_ACTIVE_DEVICE: &str =
    "No active Spotify device found. Please open Spotify on your device.";
pub const PLAYBACK_FAILED: &str = "I couldn't start playback on Spotify right now.";
pub const PLAYBACK_PAUSED: &str = "Paused playback.";
pub const PAUSE_FAILED: &str = "Failed to pause or already paused.";
pub const TRACK_SKIPPED: &str = "Skipped to next track.";
pub const SKIP_FAILED: &str = "Failed to skip.";

const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SPOTIFY_API_BASE_URL: &str = "https://api.spotify.com/v1";
const SPOTIFY_SCOPE: &str = "user-modify-playback-state user-read-playback-state";

/// The phrase used when a search has no match.
pub fn no_tracks_found(query: &str) -> String {
    format!("No tracks found for {query}")
}

#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

/// Provider URLs; overridable so tests can point at a local server.
#[derive(Debug, Clone)]
pub struct SpotifyEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
}

impl Default for SpotifyEndpoints {
    fn default() -> Self {
        Self {
            auth_url: SPOTIFY_AUTH_URL.to_string(),
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            api_base: SPOTIFY_API_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: TrackPage,
}

#[derive(Debug, Default, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    name: String,
    uri: String,
}

pub struct SpotifyService {
    http: reqwest::Client,
    endpoints: SpotifyEndpoints,
    credentials: Option<SpotifyCredentials>,
    store: Arc<dyn TokenStore>,
    /// Current token pair. Concurrent refreshes race; the last write wins.
    tokens: RwLock<Option<TokenPair>>,
}

impl SpotifyService {
    /// Creates the adapter and loads any previously stored tokens.
    ///
    /// A store that cannot be read leaves the adapter "not connected".
    pub async fn load(
        http: reqwest::Client,
        credentials: Option<SpotifyCredentials>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        if credentials.is_none() {
            warn!("Spotify credentials missing; login and token refresh are disabled.");
        }
        let tokens = match store.load().await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = ?e, "Could not load Spotify tokens; treating as not connected");
                None
            }
        };
        Self {
            http,
            endpoints: SpotifyEndpoints::default(),
            credentials,
            store,
            tokens: RwLock::new(tokens),
        }
    }

    pub fn with_endpoints(mut self, endpoints: SpotifyEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub async fn is_connected(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    /// The provider authorization URL, or `None` when no client is configured.
    pub fn login_url(&self) -> Option<String> {
        let credentials = self.credentials.as_ref()?;
        let url = Url::parse_with_params(
            &self.endpoints.auth_url,
            &[
                ("client_id", credentials.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", credentials.redirect_uri.as_str()),
                ("scope", SPOTIFY_SCOPE),
                ("show_dialog", "true"),
            ],
        )
        .ok()?;
        Some(url.into())
    }

    /// Exchanges an authorization code for a token pair and stores it.
    pub async fn exchange_code(&self, code: &str) -> Result<(), ToolError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(ToolError::ProviderUnavailable)?;

        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", credentials.redirect_uri.as_str()),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.expose_secret()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ProviderRequestFailed { status });
        }

        let token: TokenResponse = response.json().await?;
        let refresh_token = token
            .refresh_token
            .ok_or_else(|| ToolError::Decode("token response without refresh_token".to_string()))?;
        self.replace_tokens(TokenPair {
            access_token: token.access_token,
            refresh_token,
        })
        .await;
        info!("Spotify account connected");
        Ok(())
    }

    async fn replace_tokens(&self, tokens: TokenPair) {
        if let Err(e) = self.store.save(&tokens).await {
            warn!(error = ?e, "Failed to persist Spotify tokens; keeping them in memory");
        }
        *self.tokens.write().await = Some(tokens);
    }

    /// Uses the refresh token once. Any failure means the session is over.
    async fn refresh_access_token(&self) -> Result<String, ToolError> {
        // Stored tokens without client credentials cannot be renewed.
        let Some(credentials) = self.credentials.as_ref() else {
            warn!("Spotify access token expired and client credentials are missing");
            return Err(ToolError::AuthExpired);
        };
        let refresh_token = self
            .tokens
            .read()
            .await
            .as_ref()
            .map(|tokens| tokens.refresh_token.clone())
            .ok_or(ToolError::ProviderUnavailable)?;

        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.expose_secret()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Spotify token refresh rejected");
            return Err(ToolError::AuthExpired);
        }

        let token: TokenResponse = response.json().await?;
        let access_token = token.access_token.clone();
        self.replace_tokens(TokenPair {
            access_token: token.access_token,
            refresh_token: token.refresh_token.unwrap_or(refresh_token),
        })
        .await;
        Ok(access_token)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, &str)],
        access_token: &str,
    ) -> Result<reqwest::Response, ToolError> {
        let mut builder = self
            .http
            .request(method, format!("{}/{}", self.endpoints.api_base, path))
            .bearer_auth(access_token)
            .query(query);
        builder = match body {
            Some(body) => builder.json(body),
            None => builder.header(reqwest::header::CONTENT_LENGTH, 0),
        };
        Ok(builder.send().await?)
    }

    /// Sends an authenticated API request, refreshing and retrying once on 401.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, ToolError> {
        let access_token = self
            .tokens
            .read()
            .await
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
            .ok_or(ToolError::ProviderUnavailable)?;

        let response = self
            .request(method.clone(), path, body, query, &access_token)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        info!(path, "Spotify access token rejected; refreshing once and retrying");
        let access_token = self.refresh_access_token().await?;
        let response = self
            .request(method, path, body, query, &access_token)
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ToolError::AuthExpired);
        }
        Ok(response)
    }

    fn failure_phrase(err: ToolError, fallback: &str) -> String {
        match err {
            ToolError::ProviderUnavailable => SPOTIFY_NOT_CONNECTED.to_string(),
            ToolError::AuthExpired => SPOTIFY_SESSION_EXPIRED.to_string(),
            other => {
                warn!(error = %other, "Spotify request failed");
                fallback.to_string()
            }
        }
    }

    async fn try_play(&self, query: &str) -> Result<String, ToolError> {
        let search = self
            .send(
                Method::GET,
                "search",
                None,
                &[("q", query), ("type", "track"), ("limit", "1")],
            )
            .await?;
        if !search.status().is_success() {
            warn!(status = %search.status(), "Spotify search failed");
            return Ok(SPOTIFY_SEARCH_FAILED.to_string());
        }

        let results: SearchResponse = search.json().await?;
        let Some(track) = results.tracks.items.into_iter().next() else {
            return Ok(no_tracks_found(query));
        };

        let body = json!({ "uris": [track.uri] });
        let play = self
            .send(Method::PUT, "me/player/play", Some(&body), &[])
            .await?;
        let status = play.status();
        if status.is_success() {
            info!(track = %track.name, "Started Spotify playback");
            Ok(format!("Playing {} on active device.", track.name))
        } else if status == StatusCode::NOT_FOUND {
            Ok(NO_ACTIVE_DEVICE.to_string())
        } else {
            warn!(%status, "Spotify refused to start playback");
            Ok(PLAYBACK_FAILED.to_string())
        }
    }

    /// Plays the single best search match for `query`.
    pub async fn play_track(&self, query: &str) -> String {
        match self.try_play(query).await {
            Ok(text) => text,
            Err(e) => Self::failure_phrase(e, PLAYBACK_FAILED),
        }
    }

    pub async fn pause_playback(&self) -> String {
        match self.send(Method::PUT, "me/player/pause", None, &[]).await {
            Ok(response) if response.status().is_success() => PLAYBACK_PAUSED.to_string(),
            Ok(_) => PAUSE_FAILED.to_string(),
            Err(e) => Self::failure_phrase(e, PAUSE_FAILED),
        }
    }

    pub async fn skip_track(&self) -> String {
        match self.send(Method::POST, "me/player/next", None, &[]).await {
            Ok(response) if response.status().is_success() => TRACK_SKIPPED.to_string(),
            Ok(_) => SKIP_FAILED.to_string(),
            Err(e) => Self::failure_phrase(e, SKIP_FAILED),
        }
    }
}
