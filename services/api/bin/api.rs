//! Main Entrypoint for the JARVIS API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Constructing the model client, tool adapters and speech adapters.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use jarvis_api::{
    config::Config,
    router::create_router,
    speech::{ElevenLabsSynthesizer, SpeechSynthesizer, Transcriber, WhisperTranscriber},
    state::AppState,
};
use jarvis_core::{
    Orchestrator,
    llm_client::{LLMClient, OpenAICompatibleClient},
    tools::{FileTokenStore, FirebaseIdentity, GoogleCalendar, SpotifyService},
};
use secrecy::ExposeSecret;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");
    for warning in &config.warnings {
        warn!("{warning}");
    }

    // --- 3. Initialize Shared Services ---
    let http = reqwest::Client::new();

    let model_config = config.groq_api_key.as_ref().map(|key| {
        OpenAIConfig::new()
            .with_api_key(key.expose_secret())
            .with_api_base(&config.llm_api_base)
    });
    if model_config.is_none() {
        warn!("GROQ_API_KEY not set; chat and transcription are unavailable.");
    }

    let llm_client = model_config.clone().map(|openai_config| {
        Arc::new(OpenAICompatibleClient::new(
            openai_config,
            config.completion.clone(),
        )) as Arc<dyn LLMClient>
    });
    let transcriber = model_config.map(|openai_config| {
        Arc::new(WhisperTranscriber::new(
            openai_config,
            config.transcription_model.clone(),
        )) as Arc<dyn Transcriber>
    });

    let calendar = GoogleCalendar::new(http.clone(), config.google.clone());
    if !calendar.is_configured() {
        warn!("Google Calendar credentials not set; calendar lookups will report unavailable.");
    }
    let orchestrator = Orchestrator::new(llm_client, Arc::new(calendar));

    let spotify = SpotifyService::load(
        http.clone(),
        config.spotify.clone(),
        Arc::new(FileTokenStore::new(config.spotify_token_path.clone())),
    )
    .await;

    let synthesizer = match &config.elevenlabs_api_key {
        Some(key) => Some(Arc::new(ElevenLabsSynthesizer::new(
            http.clone(),
            key.clone(),
            config.elevenlabs_voice_id.clone(),
        )) as Arc<dyn SpeechSynthesizer>),
        None => {
            warn!("ELEVENLABS_API_KEY not set; text-to-speech is unavailable.");
            None
        }
    };

    if config.skip_auth {
        warn!("SKIP_AUTH is enabled; requests without a token run as the dev user.");
    }
    let identity = FirebaseIdentity::new(http, config.firebase_api_key.clone());

    let app_state = Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        spotify: Arc::new(spotify),
        identity: Arc::new(identity),
        synthesizer,
        transcriber,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        model = %config.completion.model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
