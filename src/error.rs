//! Error types for lipsync.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) accessible
//! via [`LipSyncError::code()`], for hosts that map failures to UI messages.

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    /// Pronunciation dictionary could not be loaded.
    pub const LEXICON_FAILED: &str = "LEXICON_FAILED";
    /// Vendor emitted a viseme id missing from the mapping table.
    pub const UNMAPPED_VISEME: &str = "UNMAPPED_VISEME";
    /// Remote sequencing request failed.
    pub const REMOTE_FAILED: &str = "REMOTE_FAILED";
    /// Request or operation timed out.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
    /// Speech synthesis provider failed.
    pub const SYNTHESIS_FAILED: &str = "SYNTHESIS_FAILED";
    /// Audio decode or output failed.
    pub const AUDIO_FAILED: &str = "AUDIO_FAILED";
    /// Animation target rejected an input write.
    pub const ANIMATION_FAILED: &str = "ANIMATION_FAILED";
    /// Caller supplied unusable input.
    pub const INVALID_INPUT: &str = "INVALID_INPUT";
    /// Internal channel closed.
    pub const CHANNEL_CLOSED: &str = "CHANNEL_CLOSED";
    /// Filesystem error.
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Top-level error type for viseme sequencing and playback.
#[derive(Debug, thiserror::Error)]
pub enum LipSyncError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Pronunciation dictionary load error.
    #[error("lexicon error: {0}")]
    Lexicon(#[from] lipsync_lexicon::LexiconError),

    /// The vendor viseme table has no entry for this id.
    ///
    /// This is a configuration error: the table must list every id the
    /// vendor can emit.
    #[error("vendor viseme id {0} has no entry in the viseme table")]
    UnmappedVendorViseme(u32),

    /// Remote sequencing endpoint failed (network, HTTP status, bad body).
    #[error("remote sequencing error: {0}")]
    Remote(String),

    /// Operation exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Speech synthesis error.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Audio decode or output error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Animation target error.
    #[error("animation error: {0}")]
    Animation(String),

    /// Unusable caller input (e.g. blank text).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LipSyncError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Lexicon(_) => error_codes::LEXICON_FAILED,
            Self::UnmappedVendorViseme(_) => error_codes::UNMAPPED_VISEME,
            Self::Remote(_) => error_codes::REMOTE_FAILED,
            Self::Timeout(_) => error_codes::TIMEOUT_ERROR,
            Self::Synthesis(_) => error_codes::SYNTHESIS_FAILED,
            Self::Audio(_) => error_codes::AUDIO_FAILED,
            Self::Animation(_) => error_codes::ANIMATION_FAILED,
            Self::InvalidInput(_) => error_codes::INVALID_INPUT,
            Self::Channel(_) => error_codes::CHANNEL_CLOSED,
            Self::Io(_) => error_codes::IO_ERROR,
        }
    }

    /// Returns true if this failure aborts the current utterance only.
    ///
    /// Configuration problems (bad table, bad config, missing dictionary)
    /// will fail every utterance until fixed.
    pub fn is_per_utterance(&self) -> bool {
        !matches!(
            self,
            Self::Config(_) | Self::Lexicon(_) | Self::UnmappedVendorViseme(_)
        )
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, LipSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_viseme_code() {
        let err = LipSyncError::UnmappedVendorViseme(42);
        assert_eq!(err.code(), "UNMAPPED_VISEME");
        assert!(err.to_string().contains("42"));
        assert!(!err.is_per_utterance());
    }

    #[test]
    fn remote_error_is_per_utterance() {
        let err = LipSyncError::Remote("HTTP 502".into());
        assert_eq!(err.code(), "REMOTE_FAILED");
        assert!(err.is_per_utterance());
    }

    #[test]
    fn timeout_error_code() {
        let err = LipSyncError::Timeout("10s elapsed".into());
        assert_eq!(err.code(), "TIMEOUT_ERROR");
        assert_eq!(err.to_string(), "timed out: 10s elapsed");
    }

    #[test]
    fn lexicon_error_converts() {
        let inner = lipsync_lexicon::LexiconError::Parse {
            line: 3,
            message: "bad".into(),
        };
        let err: LipSyncError = inner.into();
        assert_eq!(err.code(), "LEXICON_FAILED");
        assert_eq!(err.to_string(), "lexicon error: line 3: bad");
    }

    #[test]
    fn io_error_converts() {
        let err: LipSyncError = std::io::Error::other("disk").into();
        assert_eq!(err.code(), "IO_ERROR");
    }
}
