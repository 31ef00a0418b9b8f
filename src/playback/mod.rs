//! Viseme playback.
//!
//! Turns a [`VisemeSequence`](crate::viseme::VisemeSequence) into timed
//! writes on a [`VisemeSink`], one utterance at a time.

pub mod scheduler;

use tracing::warn;

use crate::animation::SharedVisemeInput;

pub use scheduler::{PlaybackScheduler, UtteranceHandle};

/// Receives viseme ids as they come due.
///
/// Each call is a single last-write-wins assignment.
pub trait VisemeSink: Send + Sync {
    fn apply(&self, viseme_id: u8);
}

impl VisemeSink for SharedVisemeInput {
    fn apply(&self, viseme_id: u8) {
        if let Err(e) = self.set(viseme_id) {
            warn!(viseme_id, "viseme write rejected: {e}");
        }
    }
}
