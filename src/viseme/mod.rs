//! Viseme sequencing for lip-sync animation.
//!
//! A viseme is a visual mouth shape that corresponds to a speech sound. This
//! module turns synthesized-speech timing metadata into time-ordered
//! [`VisemeSequence`]s that a renderer plays back:
//!
//! - [`local`]: text + per-character start times, via the pronunciation
//!   dictionary and the phoneme table.
//! - [`remote`]: the same computation delegated to a backend endpoint.
//! - [`vendor`]: provider-native viseme events, normalized to the shared
//!   alphabet.
//! - [`server`]: the backend endpoint itself, serving the local sequencer.
//! - [`stdio`]: the same requests as newline-delimited JSON.

pub mod local;
pub mod remote;
pub mod sequence;
pub mod server;
pub mod stdio;
pub mod table;
pub mod vendor;

use serde::{Deserialize, Serialize};

pub use local::{LocalSequencer, SequencingRevision};
pub use remote::RemoteSequencer;
pub use sequence::{SequenceBuilder, SequenceViolation, VisemeSequence};
pub use stdio::run_sequence_stdio;
pub use vendor::{VendorVisemeEvent, VendorVisemeStream, normalize};

/// Viseme id of the neutral, closed mouth.
pub const NEUTRAL_VISEME: u8 = 0;

/// One mouth-shape change: switch to `viseme_id` at `start_ms` after the
/// utterance starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viseme {
    /// Shape id in the shared alphabet ([`VisemeShape`]).
    pub viseme_id: u8,
    /// Offset from utterance start in milliseconds.
    pub start_ms: u64,
}

impl Viseme {
    pub fn new(viseme_id: u8, start_ms: u64) -> Self {
        Self {
            viseme_id,
            start_ms,
        }
    }

    /// The closed-mouth viseme at `start_ms`.
    pub fn neutral(start_ms: u64) -> Self {
        Self::new(NEUTRAL_VISEME, start_ms)
    }

    pub fn is_neutral(&self) -> bool {
        self.viseme_id == NEUTRAL_VISEME
    }

    /// The shape for this id, if it is inside the shared alphabet.
    pub fn shape(&self) -> Option<VisemeShape> {
        VisemeShape::from_id(self.viseme_id)
    }
}

/// The shared viseme alphabet (Oculus viseme set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VisemeShape {
    /// Silence (default mouth closed)
    Sil = 0,
    /// /p/, /b/, /m/ (lips pressed together)
    PP = 1,
    /// /f/, /v/ (teeth on lip)
    FF = 2,
    /// /θ/, /ð/ (tongue between teeth)
    TH = 3,
    /// /t/, /d/ (tongue at roof)
    DD = 4,
    /// /k/, /g/, /ŋ/ (back of tongue up)
    KK = 5,
    /// /tʃ/, /dʒ/, /ʃ/, /ʒ/ (tongue curved)
    CH = 6,
    /// /s/, /z/ (teeth together, tongue forward)
    SS = 7,
    /// /n/, /l/ (tongue at roof, mouth slightly open)
    NN = 8,
    /// /r/ (tongue curled)
    RR = 9,
    /// /a/ (mouth open wide)
    AA = 10,
    /// /e/ (mouth medium)
    E = 11,
    /// /i/ (mouth wide, teeth apart)
    I = 12,
    /// /o/ (rounded, medium)
    O = 13,
    /// /u/ (rounded, small)
    U = 14,
}

impl VisemeShape {
    /// Every shape, in id order.
    pub const ALL: [VisemeShape; 15] = [
        Self::Sil,
        Self::PP,
        Self::FF,
        Self::TH,
        Self::DD,
        Self::KK,
        Self::CH,
        Self::SS,
        Self::NN,
        Self::RR,
        Self::AA,
        Self::E,
        Self::I,
        Self::O,
        Self::U,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }
}
