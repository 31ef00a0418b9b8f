//! # lipsync-lexicon
//!
//! Pronunciation lookup for viseme sequencing.
//!
//! Maps a word to its ordered ARPABET phonemes using the CMU Pronouncing
//! Dictionary. A core English lexicon is compiled in. The full
//! `cmudict.dict` (~134k words) is read with `cmudict-fast` from
//! `$LIPSYNC_CMUDICT`, the user data directory or the system package
//! location, and any other dictionary file can be layered on top.
//!
//! Unknown words are not an error: [`PronunciationDictionary::lookup`]
//! returns an empty list and the word contributes no visemes.

pub mod dictionary;
pub mod error;
pub mod phoneme;

pub use dictionary::{CMUDICT_ENV, PronunciationDictionary, cmudict_candidates, locate_cmudict};
pub use error::{LexiconError, Result};
pub use phoneme::strip_stress;

/// Look up `word` in the default dictionary ([`PronunciationDictionary::bundled`]).
///
/// # Examples
///
/// ```
/// assert_eq!(lipsync_lexicon::lookup("hello"), ["HH", "AH", "L", "OW"]);
/// assert!(lipsync_lexicon::lookup("qwxyz").is_empty());
/// ```
pub fn lookup(word: &str) -> Vec<String> {
    PronunciationDictionary::bundled().lookup(word)
}
