//! Speech adapters: text-to-speech through ElevenLabs and transcription
//! through an OpenAI-compatible Whisper endpoint.

use anyhow::{Context, Result, bail};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs},
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io/v1";
const ELEVENLABS_MODEL: &str = "eleven_monolingual_v1";
const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Renders `text` as MP3 audio. `voice_id` overrides the default voice.
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<Bytes>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, file_name: String, audio: Vec<u8>, language: &str)
    -> Result<String>;
}

pub struct ElevenLabsSynthesizer {
    http: reqwest::Client,
    api_key: SecretString,
    default_voice_id: String,
    api_base: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(http: reqwest::Client, api_key: SecretString, default_voice_id: String) -> Self {
        Self {
            http,
            api_key,
            default_voice_id,
            api_base: ELEVENLABS_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<Bytes> {
        let voice_id = voice_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(&self.default_voice_id);
        let url = format!("{}/text-to-speech/{}", self.api_base, voice_id);

        let payload = json!({
            "text": text,
            "model_id": ELEVENLABS_MODEL,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75,
                "style": 0.0,
                "use_speaker_boost": true
            }
        });

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "audio/mpeg")
            .header("xi-api-key", self.api_key.expose_secret())
            .json(&payload)
            .timeout(SYNTHESIS_TIMEOUT)
            .send()
            .await
            .context("Failed to reach ElevenLabs")?
            .error_for_status()
            .context("ElevenLabs rejected the synthesis request")?;

        let audio = response.bytes().await?;
        if audio.is_empty() {
            bail!("ElevenLabs returned no audio");
        }
        debug!(bytes = audio.len(), "Synthesized speech");
        Ok(audio)
    }
}

/// Whisper transcription over the OpenAI audio API shape.
pub struct WhisperTranscriber {
    client: Client<OpenAIConfig>,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[instrument(skip(self, audio), fields(bytes = audio.len()))]
    async fn transcribe(
        &self,
        file_name: String,
        audio: Vec<u8>,
        language: &str,
    ) -> Result<String> {
        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8(file_name, audio))
            .model(&self.model)
            .language(language)
            .temperature(0.0)
            .response_format(AudioResponseFormat::Json)
            .build()?;

        let response = self.client.audio().transcribe(request).await?;
        debug!(transcription = %response.text, "Transcribed audio");
        Ok(response.text)
    }
}
