//! The lip-sync pipeline: text in, synchronized mouth movement out.

pub mod coordinator;

pub use coordinator::{AlignmentSequencer, LipSyncPipeline, SpeakOutcome};
