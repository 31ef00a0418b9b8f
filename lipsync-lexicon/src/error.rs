//! Error types for the lipsync-lexicon crate.

/// Errors that can occur while loading a pronunciation dictionary.
///
/// Lookups never fail: an unknown word simply has no pronunciation.
#[derive(Debug, thiserror::Error)]
pub enum LexiconError {
    /// The dictionary file could not be read.
    #[error("failed to read dictionary: {0}")]
    Io(#[from] std::io::Error),

    /// A dictionary line could not be parsed.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number in the dictionary source.
        line: usize,
        /// What was wrong with the line.
        message: String,
    },

    /// `cmudict-fast` rejected a full dictionary file.
    #[error("failed to load CMU dictionary {}: {message}", path.display())]
    Cmudict {
        /// The file that was being loaded.
        path: std::path::PathBuf,
        /// The loader's error message.
        message: String,
    },
}

/// Convenience type alias for lexicon results.
pub type Result<T> = std::result::Result<T, LexiconError>;
