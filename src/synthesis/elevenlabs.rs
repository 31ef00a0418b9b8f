//! ElevenLabs timestamped text-to-speech.
//!
//! Calls `POST /v1/text-to-speech/{voice_id}/with-timestamps`, which returns
//! base64 audio together with character-level alignment.
//!
//! # Examples
//!
//! ```rust,no_run
//! use lipsync::synthesis::{AlignedSynthesizer, ElevenLabsClient, ElevenLabsSettings};
//!
//! # async fn example() -> lipsync::error::Result<()> {
//! let settings = ElevenLabsSettings::new("xi-...", "zGjIP4SZlMnY9m93k97r");
//! let client = ElevenLabsClient::new(settings)?;
//! let speech = client.synthesize("Hello there").await?;
//! println!("{} bytes, {} aligned chars", speech.audio.len(), speech.alignment.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    AlignedSpeech, AlignedSynthesizer, CharacterAlignment, DEFAULT_ELEVENLABS_MODEL,
    SpeechProvider,
};
use crate::config::SynthesisConfig;
use crate::error::{LipSyncError, Result};

/// Connection and voice settings for [`ElevenLabsClient`].
#[derive(Clone)]
pub struct ElevenLabsSettings {
    pub api_key: String,
    /// Base URL (defaults to `https://api.elevenlabs.io`).
    pub base_url: String,
    pub voice_id: String,
    pub model_id: String,
    pub language_code: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ElevenLabsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsSettings")
            .field("base_url", &self.base_url)
            .field("voice_id", &self.voice_id)
            .field("model_id", &self.model_id)
            .field("language_code", &self.language_code)
            .finish()
    }
}

impl ElevenLabsSettings {
    pub fn new(api_key: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.elevenlabs.io".into(),
            voice_id: voice_id.into(),
            model_id: DEFAULT_ELEVENLABS_MODEL.into(),
            language_code: "en".into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_language_code(mut self, language_code: impl Into<String>) -> Self {
        self.language_code = language_code.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build settings from the `[synthesis]` section.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Config`] if the provider is not ElevenLabs or
    /// no API key is configured.
    pub fn from_config(config: &SynthesisConfig) -> Result<Self> {
        let SpeechProvider::ElevenLabs {
            voice_id,
            model_id,
            language_code,
            ..
        } = &config.provider
        else {
            return Err(LipSyncError::Config(
                "synthesis provider is not elevenlabs".to_owned(),
            ));
        };
        let api_key = config.elevenlabs.resolve_api_key().ok_or_else(|| {
            LipSyncError::Config(format!(
                "no ElevenLabs API key (set synthesis.elevenlabs.api_key or {})",
                crate::config::ELEVENLABS_API_KEY_ENV
            ))
        })?;
        Ok(Self::new(api_key, voice_id.clone())
            .with_base_url(config.elevenlabs.base_url.clone())
            .with_model_id(model_id.clone())
            .with_language_code(language_code.clone())
            .with_timeout(Duration::from_secs(config.elevenlabs.timeout_secs)))
    }
}

#[derive(Debug, Serialize)]
struct TimestampedRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    language_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct TimestampedResponse {
    audio_base64: String,
    #[serde(default)]
    alignment: Option<WireAlignment>,
}

#[derive(Debug, Default, Deserialize)]
struct WireAlignment {
    #[serde(default)]
    characters: Vec<String>,
    #[serde(default)]
    character_start_times_seconds: Vec<f64>,
    #[serde(default)]
    character_end_times_seconds: Vec<f64>,
}

impl From<WireAlignment> for CharacterAlignment {
    fn from(wire: WireAlignment) -> Self {
        Self {
            characters: wire.characters,
            start_seconds: wire.character_start_times_seconds,
            end_seconds: wire.character_end_times_seconds,
        }
    }
}

/// HTTP client for ElevenLabs timestamped TTS.
pub struct ElevenLabsClient {
    settings: ElevenLabsSettings,
    client: reqwest::Client,
}

impl std::fmt::Debug for ElevenLabsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsClient")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ElevenLabsClient {
    /// # Errors
    ///
    /// Returns [`LipSyncError::Synthesis`] if the HTTP client cannot be built.
    pub fn new(settings: ElevenLabsSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LipSyncError::Synthesis(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ElevenLabsSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}/with-timestamps",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.voice_id
        )
    }

    /// Map an HTTP error status to a synthesis error.
    fn map_http_error(status: reqwest::StatusCode, body: &str) -> LipSyncError {
        let message = extract_error_message(body);
        match status.as_u16() {
            401 => LipSyncError::Synthesis(format!("ElevenLabs authentication failed: {message}")),
            429 => LipSyncError::Synthesis(format!("ElevenLabs rate limited: {message}")),
            code => LipSyncError::Synthesis(format!("ElevenLabs HTTP {code}: {message}")),
        }
    }
}

/// Extract an error message from an ElevenLabs error body.
///
/// The API reports errors as `{"detail": {"message": ...}}` or
/// `{"detail": "..."}`.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let detail = v.get("detail")?;
            detail
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| detail.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl AlignedSynthesizer for ElevenLabsClient {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str) -> Result<AlignedSpeech> {
        let body = TimestampedRequest {
            text,
            model_id: &self.settings.model_id,
            language_code: &self.settings.language_code,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LipSyncError::Timeout(format!("ElevenLabs request: {e}"))
                } else {
                    LipSyncError::Synthesis(format!("ElevenLabs request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Self::map_http_error(status, &body_text));
        }

        let parsed: TimestampedResponse = response
            .json()
            .await
            .map_err(|e| LipSyncError::Synthesis(format!("malformed ElevenLabs response: {e}")))?;

        let audio = base64::engine::general_purpose::STANDARD
            .decode(parsed.audio_base64.as_bytes())
            .map_err(|e| LipSyncError::Synthesis(format!("invalid audio_base64: {e}")))?;

        let alignment: CharacterAlignment = match parsed.alignment {
            Some(wire) => wire.into(),
            None => {
                warn!("ElevenLabs response has no alignment; mouth will stay neutral");
                CharacterAlignment::default()
            }
        };
        debug!(
            voice_id = %self.settings.voice_id,
            audio_bytes = audio.len(),
            aligned_chars = alignment.len(),
            "ElevenLabs synthesis complete"
        );

        Ok(AlignedSpeech {
            audio: Bytes::from(audio),
            alignment,
        })
    }
}
