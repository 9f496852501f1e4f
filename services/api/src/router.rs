//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ChatRequest, ChatResponse, ErrorResponse, HealthResponse, HistoryMessage, MeResponse,
        PlayPayload, ServiceInfo, SpeakPayload, SpotifyResult, TranscriptionForm,
        TranscriptionResponse,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root,
        handlers::health,
        handlers::chat,
        handlers::transcribe,
        handlers::speak,
        handlers::spotify_login,
        handlers::spotify_callback,
        handlers::spotify_play,
        handlers::spotify_pause,
        handlers::spotify_next,
        handlers::me,
    ),
    components(
        schemas(ChatRequest, ChatResponse, HistoryMessage, TranscriptionForm, TranscriptionResponse, SpeakPayload, PlayPayload, SpotifyResult, ServiceInfo, HealthResponse, MeResponse, ErrorResponse)
    ),
    tags(
        (name = "JARVIS API", description = "Voice assistant backend: chat, speech and playback control")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health))
        .route("/api/chat", post(handlers::chat))
        .route("/api/transcribe", post(handlers::transcribe))
        .route("/api/tts/speak", post(handlers::speak))
        .route("/api/spotify/login", get(handlers::spotify_login))
        .route("/api/spotify/callback", get(handlers::spotify_callback))
        .route("/api/spotify/play", post(handlers::spotify_play))
        .route("/api/spotify/pause", post(handlers::spotify_pause))
        .route("/api/spotify/next", post(handlers::spotify_next))
        .route("/api/me", get(handlers::me))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/",
            "/api/health",
            "/api/chat",
            "/api/transcribe",
            "/api/tts/speak",
            "/api/spotify/login",
            "/api/spotify/callback",
            "/api/spotify/play",
            "/api/spotify/pause",
            "/api/spotify/next",
            "/api/me",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
