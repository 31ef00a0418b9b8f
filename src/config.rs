//! Configuration types for lip-sync sequencing and playback.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::animation::CharacterRig;
use crate::error::{LipSyncError, Result};
use crate::synthesis::{Sequencing, SpeechProvider};
use crate::viseme::SequencingRevision;
use crate::viseme::vendor::LEAD_CORRECTION_MS;

/// Environment variable consulted when `[synthesis.elevenlabs] api_key` is unset.
pub const ELEVENLABS_API_KEY_ENV: &str = "ELEVENLABS_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LipSyncConfig {
    /// Pronunciation dictionary settings.
    pub dictionary: DictionaryConfig,
    /// Remote sequencing endpoint (client side).
    pub remote: RemoteConfig,
    /// Vendor viseme event settings.
    pub vendor: VendorConfig,
    /// Playback scheduling settings.
    pub playback: PlaybackConfig,
    /// Speech synthesis provider.
    pub synthesis: SynthesisConfig,
    /// Animated character settings.
    pub character: CharacterConfig,
    /// Viseme server (`lipsync-server`) settings.
    pub server: ServerConfig,
    /// Idle blink/head movement.
    pub idle: IdleConfig,
}

/// Pronunciation dictionary configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// `cmudict.dict`-format file. `None` uses the default dictionary.
    pub path: Option<PathBuf>,
    /// Layer the file over the default dictionary instead of replacing it.
    pub merge_bundled: bool,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            path: None,
            merge_bundled: true,
        }
    }
}

/// Remote viseme endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL; requests go to `{base_url}/viseme/elevenlabs`.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_owned(),
            timeout_secs: 10,
        }
    }
}

/// Vendor viseme event configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    /// Lead (ms) subtracted from vendor offsets so the mouth moves slightly
    /// before the sound.
    pub lead_ms: u64,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            lead_ms: LEAD_CORRECTION_MS,
        }
    }
}

/// How utterance audio is played.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioOutputKind {
    /// No sound; wait for the decoded clip's duration.
    #[default]
    Timed,
    /// Default output device (requires the `speaker` feature).
    Speaker,
}

/// Playback scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Audio output backend.
    pub output: AudioOutputKind,
    /// Output device name for `speaker` output (None = system default).
    pub device: Option<String>,
    /// Capacity of the runtime event broadcast channel.
    pub event_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            output: AudioOutputKind::default(),
            device: None,
            event_capacity: 64,
        }
    }
}

/// Speech synthesis configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Active provider and its per-utterance parameters.
    pub provider: SpeechProvider,
    /// ElevenLabs API access.
    pub elevenlabs: ElevenLabsConfig,
}

/// ElevenLabs API access configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevenLabsConfig {
    /// API key. Falls back to `ELEVENLABS_API_KEY` when unset.
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.elevenlabs.io".to_owned(),
            timeout_secs: 30,
        }
    }
}

impl ElevenLabsConfig {
    /// The configured key, or the one from the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(ELEVENLABS_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Animated character configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    /// Rig preset name (`thanos`, `pico`, `pico-v2`, `eggni`).
    pub rig: String,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            rig: "thanos".to_owned(),
        }
    }
}

/// Viseme server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port (0 = auto-assign).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
        }
    }
}

/// Idle animation timing. Intervals are drawn uniformly from `[min, max]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Run idle blink/head movement while the character is on screen.
    pub enabled: bool,
    pub blink_min_ms: u64,
    pub blink_max_ms: u64,
    /// How long the blink input stays raised.
    pub blink_hold_ms: u64,
    pub head_down_min_ms: u64,
    pub head_down_max_ms: u64,
    /// How long the head-down input stays raised.
    pub head_down_hold_ms: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blink_min_ms: 2_000,
            blink_max_ms: 5_000,
            blink_hold_ms: 100,
            head_down_min_ms: 3_000,
            head_down_max_ms: 6_000,
            head_down_hold_ms: 300,
        }
    }
}

impl LipSyncConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| LipSyncError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| LipSyncError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/lipsync/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("lipsync").join("config.toml")
        } else if let Some(config) = dirs::config_dir() {
            config.join("lipsync").join("config.toml")
        } else {
            PathBuf::from("/tmp/lipsync-config/config.toml")
        }
    }

    /// Load from the default path if it exists, otherwise use defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.remote.timeout_secs == 0 {
            return Err(LipSyncError::Config(
                "remote.timeout_secs must be greater than zero".to_owned(),
            ));
        }
        if self.synthesis.elevenlabs.timeout_secs == 0 {
            return Err(LipSyncError::Config(
                "synthesis.elevenlabs.timeout_secs must be greater than zero".to_owned(),
            ));
        }
        if self.playback.event_capacity == 0 {
            return Err(LipSyncError::Config(
                "playback.event_capacity must be greater than zero".to_owned(),
            ));
        }
        if let SpeechProvider::ElevenLabs {
            voice_id,
            sequencing,
            ..
        } = &self.synthesis.provider
        {
            if voice_id.trim().is_empty() {
                return Err(LipSyncError::Config(
                    "synthesis.provider.voice_id must not be empty".to_owned(),
                ));
            }
            if let Sequencing::Remote { version } = sequencing {
                if SequencingRevision::from_version(*version).is_none() {
                    return Err(LipSyncError::Config(format!(
                        "unsupported remote sequencing version {version}"
                    )));
                }
                if self.remote.base_url.trim().is_empty() {
                    return Err(LipSyncError::Config(
                        "remote.base_url is required for remote sequencing".to_owned(),
                    ));
                }
            }
        }
        if CharacterRig::preset(&self.character.rig).is_none() {
            return Err(LipSyncError::Config(format!(
                "unknown character rig '{}'",
                self.character.rig
            )));
        }
        let idle = &self.idle;
        if idle.blink_min_ms > idle.blink_max_ms || idle.head_down_min_ms > idle.head_down_max_ms
        {
            return Err(LipSyncError::Config(
                "idle intervals must satisfy min <= max".to_owned(),
            ));
        }
        if self.server.host.trim().is_empty() {
            return Err(LipSyncError::Config("server.host must not be empty".to_owned()));
        }
        Ok(())
    }
}
