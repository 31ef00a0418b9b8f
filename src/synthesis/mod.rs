//! Speech synthesis providers.
//!
//! Two kinds of provider feed the lip-sync pipeline:
//!
//! - **Aligned** providers ([`AlignedSynthesizer`]) return audio plus the
//!   start/end time of every character of the input text. Visemes are then
//!   derived by the local or remote sequencer.
//! - **Vendor-event** providers ([`VendorEventSynthesizer`]) return audio
//!   plus their own viseme events, which only need normalizing.
//!
//! The active provider is selected by [`SpeechProvider`] in the
//! `[synthesis]` config section.

pub mod elevenlabs;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::viseme::VendorVisemeEvent;

pub use elevenlabs::{ElevenLabsClient, ElevenLabsSettings};

/// Default ElevenLabs model.
pub const DEFAULT_ELEVENLABS_MODEL: &str = "eleven_turbo_v2_5";

/// Preset ElevenLabs voices as `(display name, voice id)`.
pub const ELEVENLABS_PRESET_VOICES: &[(&str, &str)] = &[
    ("Hope", "zGjIP4SZlMnY9m93k97r"),
    ("Ivy", "i4CzbCVWoqvD0P1QJCUL"),
    ("Jon", "MFZUKuGQUsGJPQjTS4wC"),
    ("Cinnamon", "kNie5n4lYl7TrvqBZ4iG"),
    ("Flint", "qAZH0aMXY8tw1QufPN0D"),
    ("Angela", "FUfBrNit0NNZAwb58KWH"),
    ("Monster of Rock", "mtrellq69YZsNwzUSyXh"),
    ("Blondie", "st7NwhTPEzqo2riw7qWC"),
];

/// Neural voices known to emit viseme events, as `(language, voice)`.
pub const VENDOR_EVENT_LANGUAGE_VOICES: &[(&str, &str)] = &[
    ("en", "en-US-JennyNeural"),
    ("ko", "ko-KR-SunHiNeural"),
    ("ja", "ja-JP-NanamiNeural"),
    ("zh", "zh-CN-XiaoxiaoNeural"),
];

/// Look up a preset ElevenLabs voice id by display name (case-insensitive).
pub fn preset_voice_id(name: &str) -> Option<&'static str> {
    ELEVENLABS_PRESET_VOICES
        .iter()
        .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
        .map(|(_, id)| *id)
}

/// The vendor-event voice for a language code.
///
/// Accepts a bare language (`ko`) or a locale (`ko-KR`, `ko_kr`); only the
/// primary subtag is matched.
pub fn vendor_voice_for_language(language: &str) -> Option<&'static str> {
    let primary = language.split(['-', '_']).next().unwrap_or_default();
    VENDOR_EVENT_LANGUAGE_VOICES
        .iter()
        .find(|(lang, _)| lang.eq_ignore_ascii_case(primary))
        .map(|(_, voice)| *voice)
}

fn default_voice_id() -> String {
    ELEVENLABS_PRESET_VOICES[0].1.to_owned()
}

fn default_model_id() -> String {
    DEFAULT_ELEVENLABS_MODEL.to_owned()
}

fn default_language_code() -> String {
    "en".to_owned()
}

fn default_vendor_voice() -> String {
    VENDOR_EVENT_LANGUAGE_VOICES[0].1.to_owned()
}

fn default_remote_version() -> u32 {
    1
}

/// Where alignment-path visemes are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Sequencing {
    /// In-process, via the pronunciation dictionary.
    #[default]
    Local,
    /// On the remote sequencing endpoint (`[remote]` section).
    Remote {
        #[serde(default = "default_remote_version")]
        version: u32,
    },
}

/// The active speech synthesis provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpeechProvider {
    /// ElevenLabs timestamped TTS (alignment path).
    #[serde(rename = "elevenlabs")]
    ElevenLabs {
        #[serde(default = "default_voice_id")]
        voice_id: String,
        #[serde(default = "default_model_id")]
        model_id: String,
        #[serde(default = "default_language_code")]
        language_code: String,
        #[serde(default)]
        sequencing: Sequencing,
    },
    /// A provider that emits its own viseme events (vendor path).
    VendorEvents {
        #[serde(default = "default_vendor_voice")]
        voice: String,
    },
}

impl Default for SpeechProvider {
    fn default() -> Self {
        Self::ElevenLabs {
            voice_id: default_voice_id(),
            model_id: default_model_id(),
            language_code: default_language_code(),
            sequencing: Sequencing::default(),
        }
    }
}

/// Per-character timing of synthesized speech, positionally aligned with
/// the input text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterAlignment {
    pub characters: Vec<String>,
    pub start_seconds: Vec<f64>,
    pub end_seconds: Vec<f64>,
}

impl CharacterAlignment {
    pub fn len(&self) -> usize {
        self.start_seconds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start_seconds.is_empty()
    }

    /// The text the provider actually aligned.
    pub fn text(&self) -> String {
        self.characters.concat()
    }
}

/// Output of an aligned synthesizer.
#[derive(Debug, Clone)]
pub struct AlignedSpeech {
    /// Encoded audio (mp3 for ElevenLabs).
    pub audio: Bytes,
    pub alignment: CharacterAlignment,
}

/// Output of a vendor-event synthesizer.
#[derive(Debug, Clone)]
pub struct VendorSpeech {
    /// Encoded audio.
    pub audio: Bytes,
    /// Viseme events in emission order.
    pub events: Vec<VendorVisemeEvent>,
}

/// A synthesizer returning audio with per-character alignment.
#[async_trait]
pub trait AlignedSynthesizer: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Synthesize `text`.
    async fn synthesize(&self, text: &str) -> Result<AlignedSpeech>;
}

/// A synthesizer returning audio with native viseme events.
#[async_trait]
pub trait VendorEventSynthesizer: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Synthesize `text`.
    async fn synthesize(&self, text: &str) -> Result<VendorSpeech>;
}
