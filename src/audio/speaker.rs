//! Audio playback to system speakers via cpal.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{AudioOutput, DecodedAudio};
use crate::error::{LipSyncError, Result};

/// Plays clips on an output device.
///
/// The cpal stream lives on a blocking thread for the duration of each clip.
#[derive(Debug, Clone, Default)]
pub struct CpalOutput {
    /// Output device name (None = system default).
    device_name: Option<String>,
}

impl CpalOutput {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    /// List available output devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| LipSyncError::Audio(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

fn open_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    let device = if let Some(name) = name {
        host.output_devices()
            .map_err(|e| LipSyncError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                let available = CpalOutput::list_output_devices().unwrap_or_default();
                LipSyncError::Audio(format!(
                    "output device '{name}' not found (available: {})",
                    available.join(", ")
                ))
            })?
    } else {
        host.default_output_device()
            .ok_or_else(|| LipSyncError::Audio("no default output device".into()))?
    };
    let device_name = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());
    info!("using output device: {device_name}");
    Ok(device)
}

struct PlaybackBuffer {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
}

fn play_blocking(
    device_name: Option<&str>,
    audio: DecodedAudio,
    cancel: &CancellationToken,
) -> Result<()> {
    let device = open_device(device_name)?;
    let stream_config = StreamConfig {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let buffer = Arc::new(Mutex::new(PlaybackBuffer {
        samples: audio.samples,
        position: 0,
        finished: false,
    }));
    let buffer_clone = Arc::clone(&buffer);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut buf = match buffer_clone.lock() {
                    Ok(b) => b,
                    Err(_) => return,
                };
                for sample in data.iter_mut() {
                    if buf.position < buf.samples.len() {
                        *sample = buf.samples[buf.position];
                        buf.position += 1;
                    } else {
                        *sample = 0.0;
                        buf.finished = true;
                    }
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
            },
            None,
        )
        .map_err(|e| LipSyncError::Audio(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| LipSyncError::Audio(format!("failed to start output stream: {e}")))?;

    while !cancel.is_cancelled() {
        std::thread::sleep(Duration::from_millis(10));
        let buf = buffer
            .lock()
            .map_err(|e| LipSyncError::Audio(format!("playback buffer lock poisoned: {e}")))?;
        if buf.finished {
            break;
        }
    }

    drop(stream);
    Ok(())
}

#[async_trait]
impl AudioOutput for CpalOutput {
    async fn play(&self, audio: &DecodedAudio, cancel: &CancellationToken) -> Result<()> {
        let device_name = self.device_name.clone();
        let audio = audio.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || play_blocking(device_name.as_deref(), audio, &cancel))
            .await
            .map_err(|e| LipSyncError::Audio(format!("playback task failed: {e}")))?
    }
}
