//! Runtime events emitted while an utterance is spoken, for UI and
//! observability.
//!
//! Events carry no audio so they can be broadcast from timer tasks without
//! blocking. Sends are best effort: with no subscribers they are dropped.

use uuid::Uuid;

/// What the lip-sync runtime is doing "right now".
#[derive(Debug, Clone, PartialEq)]
pub enum LipSyncEvent {
    /// Synthesis for a new utterance has begun.
    UtteranceStarted { utterance_id: Uuid, text: String },
    /// The viseme sequence is known and about to be scheduled.
    SequenceReady {
        utterance_id: Uuid,
        /// Number of viseme changes.
        visemes: usize,
        /// Offset at which the mouth returns to neutral.
        end_ms: u64,
        /// Length of the synthesized audio.
        audio_ms: u64,
    },
    /// A scheduled viseme was written to the character.
    VisemeApplied {
        utterance_id: Uuid,
        viseme_id: u8,
        start_ms: u64,
    },
    /// Audio ended (or was superseded) and the mouth was reset.
    UtteranceFinished {
        utterance_id: Uuid,
        /// False if a newer utterance cancelled this one.
        completed: bool,
    },
    /// The utterance failed before or during playback.
    UtteranceFailed {
        utterance_id: Uuid,
        /// Stable error code (see [`crate::error::error_codes`]).
        code: &'static str,
        message: String,
    },
}

impl LipSyncEvent {
    /// The utterance this event belongs to.
    pub fn utterance_id(&self) -> Uuid {
        match self {
            Self::UtteranceStarted { utterance_id, .. }
            | Self::SequenceReady { utterance_id, .. }
            | Self::VisemeApplied { utterance_id, .. }
            | Self::UtteranceFinished { utterance_id, .. }
            | Self::UtteranceFailed { utterance_id, .. } => *utterance_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utterance_id_is_reported_for_every_variant() {
        let id = Uuid::new_v4();
        let events = [
            LipSyncEvent::UtteranceStarted {
                utterance_id: id,
                text: "hi".into(),
            },
            LipSyncEvent::SequenceReady {
                utterance_id: id,
                visemes: 3,
                end_ms: 200,
                audio_ms: 250,
            },
            LipSyncEvent::VisemeApplied {
                utterance_id: id,
                viseme_id: 11,
                start_ms: 0,
            },
            LipSyncEvent::UtteranceFinished {
                utterance_id: id,
                completed: true,
            },
            LipSyncEvent::UtteranceFailed {
                utterance_id: id,
                code: "REMOTE_FAILED",
                message: "boom".into(),
            },
        ];
        for event in &events {
            assert_eq!(event.utterance_id(), id);
        }
    }
}
