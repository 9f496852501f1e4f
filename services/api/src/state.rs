//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the orchestrator,
//! the provider adapters and the loaded configuration.

use crate::{
    config::Config,
    speech::{SpeechSynthesizer, Transcriber},
};
use jarvis_core::{
    Orchestrator,
    tools::{IdentityVerifier, SpotifyService},
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// Speech adapters are `None` when their provider key is not configured.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub spotify: Arc<SpotifyService>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub config: Arc<Config>,
}
