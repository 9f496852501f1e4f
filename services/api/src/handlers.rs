//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests. It uses
//! `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Multipart, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Redirect, Response},
};
use chrono::Utc;
use jarvis_core::{ConversationContext, HistoryEntry};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    models::{
        ChatRequest, ChatResponse, ErrorResponse, HealthResponse, MeResponse, PlayPayload,
        ServiceInfo, SpeakPayload, SpotifyCallbackQuery, SpotifyResult, TranscriptionForm,
        TranscriptionResponse,
    },
    state::AppState,
};

const SPOTIFY_CONNECTED: &str = "Spotify Connected Successfully! You can close this tab.";
const SPOTIFY_CONNECT_FAILED: &str = "Failed to connect Spotify.";
const SPOTIFY_NOT_CONFIGURED: &str = "Spotify credentials not configured.";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    ServiceUnavailable(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(ErrorResponse { message })).into_response()
            }
            ApiError::ServiceUnavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Service banner.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service information", body = ServiceInfo))
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "JARVIS Backend API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
    })
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}

/// Run one conversation turn.
///
/// Provider failures never surface as HTTP errors: the reply carries a
/// spoken apology and `success = false` instead.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "The assistant's reply", body = ChatResponse),
        (status = 422, description = "Malformed request body")
    )
)]
#[instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let context = ConversationContext::from_value(payload.context.as_ref());
    let history: Vec<HistoryEntry> = payload
        .history
        .unwrap_or_default()
        .into_iter()
        .map(HistoryEntry::from)
        .collect();

    info!(history_len = history.len(), "Handling chat turn");
    let reply = state
        .orchestrator
        .handle_turn(&payload.message, &context, &history)
        .await;
    Json(ChatResponse::from(reply))
}

#[derive(Deserialize, Debug, Default)]
pub struct TranscribeQuery {
    pub language: Option<String>,
}

/// Transcribe an uploaded audio clip.
#[utoipa::path(
    post,
    path = "/api/transcribe",
    request_body(content = TranscriptionForm, content_type = "multipart/form-data"),
    params(
        ("language" = Option<String>, Query, description = "Spoken language, defaults to `en`")
    ),
    responses(
        (status = 200, description = "Transcribed text", body = TranscriptionResponse),
        (status = 400, description = "Missing or unreadable audio", body = ErrorResponse),
        (status = 503, description = "Transcription is not configured", body = ErrorResponse),
        (status = 500, description = "Transcription failed", body = ErrorResponse)
    )
)]
pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TranscribeQuery>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let mut audio = None;
    let mut language = query.language;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("audio") => {
                let file_name = field.file_name().unwrap_or("audio.webm").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                audio = Some((file_name, data.to_vec()));
            }
            Some("language") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                language = Some(text);
            }
            _ => {}
        }
    }

    let (file_name, data) = audio
        .filter(|(_, data)| !data.is_empty())
        .ok_or_else(|| ApiError::BadRequest("An `audio` file is required".to_string()))?;
    let language = language
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| "en".to_string());

    let transcriber = state.transcriber.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("Transcription service not configured".to_string())
    })?;

    let transcription = transcriber.transcribe(file_name, data, &language).await?;
    info!(chars = transcription.len(), "Transcription complete");

    Ok(Json(TranscriptionResponse {
        success: true,
        transcription,
        language,
    }))
}

/// Convert text to speech.
#[utoipa::path(
    post,
    path = "/api/tts/speak",
    request_body = SpeakPayload,
    responses(
        (status = 200, description = "MP3 audio", content_type = "audio/mpeg"),
        (status = 400, description = "Empty text", body = ErrorResponse),
        (status = 503, description = "Speech synthesis is not configured", body = ErrorResponse),
        (status = 500, description = "Failed to generate speech", body = ErrorResponse)
    )
)]
pub async fn speak(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SpeakPayload>,
) -> Result<Response, ApiError> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    let synthesizer = state.synthesizer.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("Speech synthesis not configured".to_string())
    })?;

    let audio = synthesizer
        .synthesize(&payload.text, payload.voice_id.as_deref())
        .await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

/// Start the Spotify authorization flow.
#[utoipa::path(
    get,
    path = "/api/spotify/login",
    responses(
        (status = 307, description = "Redirect to the Spotify consent page"),
        (status = 200, description = "Spotify is not configured")
    )
)]
pub async fn spotify_login(State(state): State<Arc<AppState>>) -> Response {
    match state.spotify.login_url() {
        Some(url) => Redirect::temporary(&url).into_response(),
        None => Json(serde_json::json!({ "error": SPOTIFY_NOT_CONFIGURED })).into_response(),
    }
}

/// Complete the Spotify authorization flow.
#[utoipa::path(
    get,
    path = "/api/spotify/callback",
    params(("code" = String, Query, description = "Authorization code from Spotify")),
    responses(
        (status = 200, description = "Spotify connected", body = String),
        (status = 400, description = "Code exchange failed", body = String)
    )
)]
pub async fn spotify_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SpotifyCallbackQuery>,
) -> Response {
    match state.spotify.exchange_code(&query.code).await {
        Ok(()) => SPOTIFY_CONNECTED.into_response(),
        Err(err) => {
            warn!(error = %err, "Spotify code exchange failed");
            (StatusCode::BAD_REQUEST, SPOTIFY_CONNECT_FAILED).into_response()
        }
    }
}

/// Search for a track and play it on the active device.
#[utoipa::path(
    post,
    path = "/api/spotify/play",
    request_body = PlayPayload,
    responses((status = 200, description = "Spoken outcome", body = SpotifyResult))
)]
pub async fn spotify_play(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PlayPayload>,
) -> Json<SpotifyResult> {
    Json(SpotifyResult {
        result: state.spotify.play_track(&payload.query).await,
    })
}

/// Pause playback.
#[utoipa::path(
    post,
    path = "/api/spotify/pause",
    responses((status = 200, description = "Spoken outcome", body = SpotifyResult))
)]
pub async fn spotify_pause(State(state): State<Arc<AppState>>) -> Json<SpotifyResult> {
    Json(SpotifyResult {
        result: state.spotify.pause_playback().await,
    })
}

/// Skip to the next track.
#[utoipa::path(
    post,
    path = "/api/spotify/next",
    responses((status = 200, description = "Spoken outcome", body = SpotifyResult))
)]
pub async fn spotify_next(State(state): State<Arc<AppState>>) -> Json<SpotifyResult> {
    Json(SpotifyResult {
        result: state.spotify.skip_track().await,
    })
}

/// The authenticated caller's user id.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Caller identity", body = MeResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    params(
        ("Authorization" = String, Header, description = "Bearer <Firebase ID token>")
    )
)]
pub async fn me(AuthenticatedUser(uid): AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse { uid })
}
