//! lipsync: speech-driven mouth animation for characters.
//!
//! This crate turns synthesized speech into a timed sequence of visemes
//! (mouth shapes) and plays it back in sync with the audio:
//! Text → TTS provider → alignment / viseme events → sequence → scheduler → character
//!
//! # Architecture
//!
//! - **Lexicon**: word → ARPABET phonemes (`lipsync-lexicon` crate)
//! - **Viseme**: phoneme and vendor tables, local and remote sequencers,
//!   vendor event normalization, and the sequencing HTTP server
//! - **Synthesis**: ElevenLabs timestamped TTS and vendor-event providers
//! - **Playback**: per-utterance timers with cancellation
//! - **Animation**: state-machine inputs, character rigs, idle movement
//! - **Audio**: symphonia decoding, timed or `cpal` output
//! - **Pipeline**: one utterance end to end

pub mod animation;
pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod runtime;
pub mod synthesis;
pub mod viseme;

pub use config::LipSyncConfig;
pub use error::{LipSyncError, Result};
pub use pipeline::{LipSyncPipeline, SpeakOutcome};
pub use runtime::LipSyncEvent;
pub use viseme::{Viseme, VisemeSequence};
