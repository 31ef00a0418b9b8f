//! Audio output backends.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::DecodedAudio;
use crate::error::Result;

/// Plays decoded clips.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play `audio`, resolving when playback ends or `cancel` fires.
    async fn play(&self, audio: &DecodedAudio, cancel: &CancellationToken) -> Result<()>;
}

/// Headless output: produces no sound, just waits for the clip's duration.
///
/// Keeps viseme timing identical to real playback on machines without an
/// output device.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimedOutput;

#[async_trait]
impl AudioOutput for TimedOutput {
    async fn play(&self, audio: &DecodedAudio, cancel: &CancellationToken) -> Result<()> {
        let duration = audio.duration();
        debug!(?duration, "timed playback");
        tokio::select! {
            _ = cancel.cancelled() => debug!("timed playback cancelled"),
            _ = tokio::time::sleep(duration) => {}
        }
        Ok(())
    }
}
