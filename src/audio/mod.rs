//! Audio decoding and playback.
//!
//! Providers return compressed clips (mp3 for ElevenLabs). The clip is
//! decoded once to PCM; its duration bounds the utterance and an
//! [`AudioOutput`] plays it.

pub mod decode;
pub mod output;
#[cfg(feature = "speaker")]
pub mod speaker;

use std::sync::Arc;

use crate::config::{AudioOutputKind, PlaybackConfig};
use crate::error::Result;

pub use decode::{DecodedAudio, decode_audio, decode_audio_with_hint};
pub use output::{AudioOutput, TimedOutput};
#[cfg(feature = "speaker")]
pub use speaker::CpalOutput;

/// Build the configured output backend.
///
/// # Errors
///
/// Returns [`LipSyncError::Config`](crate::error::LipSyncError::Config) if `Speaker` is requested in a build
/// without the `speaker` feature.
pub fn output_for(config: &PlaybackConfig) -> Result<Arc<dyn AudioOutput>> {
    match config.output {
        AudioOutputKind::Timed => Ok(Arc::new(TimedOutput)),
        #[cfg(feature = "speaker")]
        AudioOutputKind::Speaker => Ok(Arc::new(CpalOutput::new(config.device.clone()))),
        #[cfg(not(feature = "speaker"))]
        AudioOutputKind::Speaker => Err(crate::error::LipSyncError::Config(
            "speaker output requires the `speaker` feature".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_output_needs_no_device() {
        let config = PlaybackConfig {
            device: Some("USB Headset".to_owned()),
            ..PlaybackConfig::default()
        };
        assert!(output_for(&config).is_ok());
    }

    #[cfg(not(feature = "speaker"))]
    #[test]
    fn speaker_without_feature_is_config_error() {
        let config = PlaybackConfig {
            output: AudioOutputKind::Speaker,
            ..PlaybackConfig::default()
        };
        assert!(matches!(
            output_for(&config),
            Err(crate::error::LipSyncError::Config(_))
        ));
    }
}
