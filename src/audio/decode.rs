//! Compressed audio decoding via symphonia.

use std::io::Cursor;
use std::time::Duration;

use bytes::Bytes;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{LipSyncError, Result};

/// Interleaved PCM samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved `f32` samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Playback length of the clip.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode an in-memory clip, letting symphonia probe the container.
///
/// # Errors
///
/// Returns [`LipSyncError::Audio`] if the format is unrecognised or the
/// stream cannot be decoded.
pub fn decode_audio(bytes: Bytes) -> Result<DecodedAudio> {
    decode_audio_with_hint(bytes, None)
}

/// Decode an in-memory clip with a file-extension hint (`"mp3"`, `"wav"`).
///
/// # Errors
///
/// Returns [`LipSyncError::Audio`] if the format is unrecognised or the
/// stream cannot be decoded.
pub fn decode_audio_with_hint(bytes: Bytes, extension: Option<&str>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| LipSyncError::Audio(format!("failed to probe audio: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| LipSyncError::Audio("no default audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params
        .channels
        .and_then(|c| u16::try_from(c.count()).ok());

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| LipSyncError::Audio(format!("failed to create decoder: {e}")))?;

    let mut out: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(LipSyncError::Audio(format!("audio read error: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Corrupt frames are skipped.
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(LipSyncError::Audio(format!("audio decode error: {e}"))),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert_with(|| u16::try_from(spec.channels.count()).unwrap_or(1));

        let frames = decoded.frames() as u64;
        let required = usize::try_from(frames)
            .unwrap_or(usize::MAX)
            .saturating_mul(spec.channels.count());
        match sample_buf.as_mut() {
            Some(b) if b.capacity() >= required => b.clear(),
            _ => sample_buf = Some(SampleBuffer::<f32>::new(frames, spec)),
        }
        if let Some(b) = sample_buf.as_mut() {
            b.copy_interleaved_ref(decoded);
            out.extend_from_slice(b.samples());
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| LipSyncError::Audio("unknown sample rate".into()))?;
    Ok(DecodedAudio {
        samples: out,
        sample_rate,
        channels: channels.unwrap_or(1),
    })
}
