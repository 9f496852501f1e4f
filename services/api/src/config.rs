use jarvis_core::llm_client::CompletionSettings;
use jarvis_core::tools::{GoogleCredentials, SpotifyCredentials};
use secrecy::SecretString;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

const DEFAULT_LLM_API_BASE: &str = "https://api.groq.com/openai/v1";
const DEFAULT_SPOTIFY_REDIRECT_URI: &str = "http://localhost:8000/api/spotify/callback";
const DEFAULT_ELEVENLABS_VOICE_ID: &str = "JDbTsn84hlYSFan9luFg";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// Provider credentials are optional: a missing integration is reported at
/// request time rather than preventing startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub groq_api_key: Option<SecretString>,
    pub llm_api_base: String,
    pub completion: CompletionSettings,
    pub transcription_model: String,
    pub google: Option<GoogleCredentials>,
    pub spotify: Option<SpotifyCredentials>,
    pub spotify_token_path: PathBuf,
    pub elevenlabs_api_key: Option<SecretString>,
    pub elevenlabs_voice_id: String,
    pub firebase_api_key: Option<SecretString>,
    pub skip_auth: bool,
    /// Problems found while loading that did not stop startup. Logged once
    /// the subscriber is installed.
    pub warnings: Vec<String>,
}

/// Reads a variable, treating an empty value as unset.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn secret_var(name: &str) -> Option<SecretString> {
    optional_var(name).map(SecretString::from)
}

fn parsed_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            optional_var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = optional_var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let defaults = CompletionSettings::default();
        let completion = CompletionSettings {
            model: optional_var("CHAT_MODEL").unwrap_or(defaults.model),
            temperature: parsed_var("CHAT_TEMPERATURE", defaults.temperature)?,
            max_tokens: parsed_var("CHAT_MAX_TOKENS", defaults.max_tokens)?,
        };
        if !(0.0..=2.0).contains(&completion.temperature) {
            return Err(ConfigError::InvalidValue(
                "CHAT_TEMPERATURE".to_string(),
                format!("{} is outside 0.0..=2.0", completion.temperature),
            ));
        }

        let mut warnings = Vec::new();

        let google = match (
            optional_var("GOOGLE_CLIENT_ID"),
            secret_var("GOOGLE_CLIENT_SECRET"),
            secret_var("GOOGLE_REFRESH_TOKEN"),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Some(GoogleCredentials {
                client_id,
                client_secret,
                refresh_token,
            }),
            (None, None, None) => None,
            _ => {
                warnings.push(
                    "Google Calendar credentials are incomplete; calendar is disabled.".to_string(),
                );
                None
            }
        };

        let spotify = match (
            optional_var("SPOTIFY_CLIENT_ID"),
            secret_var("SPOTIFY_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
                redirect_uri: optional_var("SPOTIFY_REDIRECT_URI")
                    .unwrap_or_else(|| DEFAULT_SPOTIFY_REDIRECT_URI.to_string()),
            }),
            (None, None) => None,
            _ => {
                warnings.push(
                    "Spotify credentials are incomplete; Spotify login is disabled.".to_string(),
                );
                None
            }
        };

        Ok(Self {
            bind_address,
            log_level,
            groq_api_key: secret_var("GROQ_API_KEY"),
            llm_api_base: optional_var("LLM_API_BASE")
                .unwrap_or_else(|| DEFAULT_LLM_API_BASE.to_string()),
            completion,
            transcription_model: optional_var("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|| "whisper-large-v3".to_string()),
            google,
            spotify,
            spotify_token_path: optional_var("SPOTIFY_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("spotify_tokens.txt")),
            elevenlabs_api_key: secret_var("ELEVENLABS_API_KEY"),
            elevenlabs_voice_id: optional_var("ELEVENLABS_VOICE_ID")
                .unwrap_or_else(|| DEFAULT_ELEVENLABS_VOICE_ID.to_string()),
            firebase_api_key: secret_var("FIREBASE_API_KEY"),
            skip_auth: optional_var("SKIP_AUTH").as_deref() == Some("true"),
            warnings,
        })
    }
}
