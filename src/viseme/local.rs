//! Local viseme sequencing from text + per-character timestamps.
//!
//! Used with synthesizers that return character-level alignment (start time
//! of every character of the input text). Each word is looked up in the
//! pronunciation dictionary, its phonemes are mapped to visemes, and each
//! viseme is timed from the alignment array.
//!
//! # Revisions
//!
//! - [`SequencingRevision::Positional`] (version 1): phoneme `i` of a word
//!   takes the start time of character `word_start + i`. This is a known
//!   approximation when a word's phoneme count differs from its letter
//!   count, kept as the default because existing fixtures depend on it.
//! - [`SequencingRevision::Proportional`] (version 2): the word's time span
//!   is divided evenly across its phonemes.

use std::sync::Arc;

use lipsync_lexicon::PronunciationDictionary;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::sequence::{SequenceBuilder, VisemeSequence};
use super::table::phoneme_to_viseme;
use super::{NEUTRAL_VISEME, Viseme};
use crate::config::DictionaryConfig;
use crate::error::Result;

/// Which sequencing algorithm revision to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequencingRevision {
    /// Phoneme index aligned to character index (version 1).
    #[default]
    Positional,
    /// Word span split evenly across phonemes (version 2).
    Proportional,
}

impl SequencingRevision {
    /// Map a wire `version` number to a revision.
    pub fn from_version(version: u32) -> Option<Self> {
        match version {
            1 => Some(Self::Positional),
            2 => Some(Self::Proportional),
            _ => None,
        }
    }

    /// The wire `version` number for this revision.
    pub fn version(self) -> u32 {
        match self {
            Self::Positional => 1,
            Self::Proportional => 2,
        }
    }
}

/// A word found in the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordToken {
    /// Lowercased word.
    pub word: String,
    /// Character index of the first letter.
    pub start: usize,
    /// Length in characters.
    pub len: usize,
}

impl WordToken {
    /// Character index just past the word.
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Split `text` into word tokens: maximal runs of ASCII letters, digits and
/// `_`, in order. Indices count characters, not bytes, to line up with
/// per-character alignment arrays. Non-ASCII letters (e.g. Hangul) act as
/// separators, so mixed-script text still yields its English words.
pub fn word_tokens(text: &str) -> Vec<WordToken> {
    let mut tokens = Vec::new();
    let mut current: Option<WordToken> = None;

    for (idx, ch) in text.chars().enumerate() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            match current.as_mut() {
                Some(token) => {
                    token.word.push(ch.to_ascii_lowercase());
                    token.len += 1;
                }
                None => {
                    current = Some(WordToken {
                        word: ch.to_ascii_lowercase().to_string(),
                        start: idx,
                        len: 1,
                    });
                }
            }
        } else if let Some(token) = current.take() {
            tokens.push(token);
        }
    }
    if let Some(token) = current {
        tokens.push(token);
    }
    tokens
}

/// Convert a seconds timestamp to whole milliseconds (floored).
///
/// Non-finite values yield `None`; negative values clamp to zero.
/// Slack added before flooring so a value one ULP under a whole millisecond
/// (e.g. `1.005 * 1000.0 == 1004.9999999999999`) floors to that millisecond.
const FLOOR_SLACK_MS: f64 = 1e-6;

pub(crate) fn seconds_to_ms(seconds: f64) -> Option<u64> {
    if !seconds.is_finite() {
        return None;
    }
    // Saturating float → int cast; negatives become 0.
    Some((seconds * 1000.0 + FLOOR_SLACK_MS).floor().max(0.0) as u64)
}

fn ms_at(times: &[f64], idx: usize) -> Option<u64> {
    times.get(idx).copied().and_then(seconds_to_ms)
}

#[derive(Debug, Clone)]
enum Lexicon {
    Bundled,
    Shared(Arc<PronunciationDictionary>),
}

/// Derives viseme sequences locally from dictionary phonemes and character
/// alignment.
#[derive(Debug, Clone)]
pub struct LocalSequencer {
    lexicon: Lexicon,
    revision: SequencingRevision,
}

impl Default for LocalSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSequencer {
    /// Sequencer over the default dictionary, positional revision.
    pub fn new() -> Self {
        Self {
            lexicon: Lexicon::Bundled,
            revision: SequencingRevision::default(),
        }
    }

    /// Use a caller-supplied dictionary instead of the bundled one.
    pub fn with_dictionary(mut self, dictionary: Arc<PronunciationDictionary>) -> Self {
        self.lexicon = Lexicon::Shared(dictionary);
        self
    }

    /// Select the algorithm revision.
    pub fn with_revision(mut self, revision: SequencingRevision) -> Self {
        self.revision = revision;
        self
    }

    /// Build from the `[dictionary]` config section.
    ///
    /// With no `path`, the default dictionary is used. With a `path`, the
    /// `cmudict.dict`-format file is loaded and (if `merge_bundled`) layered
    /// over the default dictionary.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Lexicon`](crate::error::LipSyncError::Lexicon)
    /// if the dictionary file cannot be read or parsed.
    pub fn from_config(config: &DictionaryConfig) -> Result<Self> {
        let Some(path) = config.path.as_ref() else {
            return Ok(Self::new());
        };
        let loaded = PronunciationDictionary::from_file(path)?;
        let dictionary = if config.merge_bundled {
            let mut merged = PronunciationDictionary::bundled().clone();
            merged.extend(loaded);
            merged
        } else {
            loaded
        };
        debug!(
            path = %path.display(),
            entries = dictionary.len(),
            "using dictionary from config"
        );
        Ok(Self::new().with_dictionary(Arc::new(dictionary)))
    }

    pub fn revision(&self) -> SequencingRevision {
        self.revision
    }

    /// The dictionary in use.
    pub fn dictionary(&self) -> &PronunciationDictionary {
        match &self.lexicon {
            Lexicon::Bundled => PronunciationDictionary::bundled(),
            Lexicon::Shared(dict) => dict,
        }
    }

    /// Derive the viseme sequence for `text` from per-character start times
    /// (seconds).
    ///
    /// Unknown words contribute nothing; an utterance with no known word
    /// yields an empty sequence. Timestamps missing from `start_seconds`
    /// (length mismatch) skip the affected event.
    pub fn sequence(&self, text: &str, start_seconds: &[f64]) -> VisemeSequence {
        self.sequence_with_end_times(text, start_seconds, &[])
    }

    /// Like [`sequence`](Self::sequence), with per-character end times for
    /// revisions that use them. `end_seconds` may be empty.
    pub fn sequence_with_end_times(
        &self,
        text: &str,
        start_seconds: &[f64],
        end_seconds: &[f64],
    ) -> VisemeSequence {
        let chars: Vec<char> = text.chars().collect();
        let dictionary = self.dictionary();
        let mut builder = SequenceBuilder::new();

        for token in word_tokens(text) {
            let phonemes = dictionary.lookup(&token.word);
            if phonemes.is_empty() {
                debug!(word = %token.word, "no dictionary entry; skipping word");
                continue;
            }

            let timing = WordTiming::new(
                self.revision,
                &token,
                phonemes.len(),
                start_seconds,
                end_seconds,
            );
            let mut prev: Option<u8> = None;
            for (i, phoneme) in phonemes.iter().enumerate() {
                let Some(shape) = phoneme_to_viseme(phoneme) else {
                    debug!(word = %token.word, %phoneme, "phoneme has no viseme; skipping");
                    continue;
                };
                let id = shape.id();
                if prev == Some(id) {
                    continue;
                }
                let Some(start_ms) = timing.phoneme_start_ms(i) else {
                    warn!(
                        word = %token.word,
                        index = token.start + i,
                        alignment_len = start_seconds.len(),
                        "no alignment timestamp for phoneme; skipping event"
                    );
                    continue;
                };
                builder.push(Viseme::new(id, start_ms));
                prev = Some(id);
            }

            // Close the mouth at clause boundaries (punctuation or end of text).
            let after = token.end();
            if after < start_seconds.len()
                && chars.get(after) != Some(&' ')
                && let Some(at) = ms_at(start_seconds, after)
            {
                builder.push(Viseme::new(NEUTRAL_VISEME, at));
            }
        }

        let tail_ms = start_seconds.last().copied().and_then(seconds_to_ms);
        builder.finish(tail_ms)
    }
}

/// Per-word timing strategy.
struct WordTiming<'a> {
    revision: SequencingRevision,
    word_start: usize,
    phoneme_count: usize,
    start_seconds: &'a [f64],
    span: Option<(f64, f64)>,
}

impl<'a> WordTiming<'a> {
    fn new(
        revision: SequencingRevision,
        token: &WordToken,
        phoneme_count: usize,
        start_seconds: &'a [f64],
        end_seconds: &[f64],
    ) -> Self {
        let span = match revision {
            SequencingRevision::Positional => None,
            SequencingRevision::Proportional => {
                word_span(token, start_seconds, end_seconds)
            }
        };
        Self {
            revision,
            word_start: token.start,
            phoneme_count,
            start_seconds,
            span,
        }
    }

    fn phoneme_start_ms(&self, index: usize) -> Option<u64> {
        match (self.revision, self.span) {
            (SequencingRevision::Proportional, Some((start, end))) => {
                let fraction = index as f64 / self.phoneme_count.max(1) as f64;
                seconds_to_ms(start + (end - start) * fraction)
            }
            // Without a usable span, fall back to positional timing.
            _ => ms_at(self.start_seconds, self.word_start + index),
        }
    }
}

/// Start and end (seconds) of a word, from end times when available,
/// otherwise from the next character's start or the last timestamp.
fn word_span(token: &WordToken, start_seconds: &[f64], end_seconds: &[f64]) -> Option<(f64, f64)> {
    let start = *start_seconds.get(token.start)?;
    let end = end_seconds
        .get(token.end().saturating_sub(1))
        .or_else(|| start_seconds.get(token.end()))
        .or_else(|| start_seconds.last())
        .copied()?;
    (start.is_finite() && end.is_finite() && end >= start).then_some((start, end))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn per_char_times(text: &str, step_secs: f64) -> Vec<f64> {
        (0..text.chars().count()).map(|i| i as f64 * step_secs).collect()
    }

    #[test]
    fn tokens_record_character_indices() {
        let tokens = word_tokens("Hi, you_2!");
        assert_eq!(
            tokens,
            vec![
                WordToken { word: "hi".into(), start: 0, len: 2 },
                WordToken { word: "you_2".into(), start: 4, len: 5 },
            ]
        );
    }

    #[test]
    fn tokens_use_char_not_byte_indices() {
        let tokens = word_tokens("안녕 hello");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].start, 3);
    }

    #[test]
    fn hangul_adjacent_to_english_separates_words() {
        let tokens = word_tokens("'coding'을");
        assert_eq!(tokens[0].word, "coding");
        assert_eq!(tokens[0].start, 1);
    }

    #[test]
    fn hello_produces_small_run_ending_neutral() {
        let seq = LocalSequencer::new().sequence("hello", &[0.0, 0.05, 0.1, 0.15, 0.2]);
        let expected = vec![
            Viseme::new(11, 0),
            Viseme::new(8, 100),
            Viseme::new(13, 150),
            Viseme::neutral(200),
        ];
        assert_eq!(seq.into_vec(), expected);
    }

    #[test]
    fn punctuation_after_word_closes_mouth() {
        let seq = LocalSequencer::new().sequence("a. b", &[0.0, 0.01, 0.02, 0.03]);
        let events = seq.as_slice();
        assert_eq!(events[0], Viseme::new(11, 0));
        assert_eq!(events[1], Viseme::neutral(10));
        assert_eq!(events[2], Viseme::new(1, 30));
        assert_eq!(events.last(), Some(&Viseme::neutral(30)));
        assert!(seq.check().is_ok());
    }

    #[test]
    fn space_after_word_does_not_close_mouth() {
        let text = "hello world";
        let seq = LocalSequencer::new().sequence(text, &per_char_times(text, 0.05));
        // Only the terminal entry is neutral.
        let neutral_count = seq.iter().filter(|v| v.is_neutral()).count();
        assert_eq!(neutral_count, 1);
    }

    #[test]
    fn unknown_words_only_yield_empty_sequence() {
        let text = "xyzzy plugh";
        let seq = LocalSequencer::new().sequence(text, &per_char_times(text, 0.05));
        assert!(seq.is_empty());
    }

    #[test]
    fn empty_text_yields_empty_sequence() {
        assert!(LocalSequencer::new().sequence("", &[]).is_empty());
    }

    #[test]
    fn unknown_words_are_skipped_between_known_ones() {
        let text = "hello xyzzy world";
        let seq = LocalSequencer::new().sequence(text, &per_char_times(text, 0.05));
        assert!(!seq.is_empty());
        // "world" starts at char 12 → 600 ms.
        assert!(seq.iter().any(|v| v.start_ms == 600));
    }

    #[test]
    fn short_alignment_skips_events_without_panicking() {
        let seq = LocalSequencer::new().sequence("hello world", &[0.0, 0.05]);
        assert!(seq.check().is_ok());
        assert!(seq.iter().all(|v| v.start_ms <= 50));
    }

    #[test]
    fn repeats_across_words_are_collapsed() {
        // "see eat": S IY | IY T → the I shape must not repeat.
        let text = "see eat";
        let seq = LocalSequencer::new().sequence(text, &per_char_times(text, 0.05));
        assert!(seq.check().is_ok());
    }

    #[test]
    fn non_finite_timestamps_are_skipped() {
        let seq = LocalSequencer::new().sequence("me", &[f64::NAN, 0.1]);
        assert_eq!(seq.as_slice()[0], Viseme::new(12, 100));
    }

    #[test]
    fn every_known_sentence_ends_neutral() {
        let text = "Hello, nice to meet you. The weather is really nice today.";
        let seq = LocalSequencer::new().sequence(text, &per_char_times(text, 0.04));
        assert!(!seq.is_empty());
        assert!(seq.check().is_ok());
        assert!(seq.last().unwrap().is_neutral());
    }

    #[test]
    fn proportional_spreads_phonemes_over_word_span() {
        // "hello" spans 0.0..0.4 from end times; 4 phonemes → 0,100,200,300.
        let starts = [0.0, 0.1, 0.2, 0.3, 0.35];
        let ends = [0.1, 0.2, 0.3, 0.35, 0.4];
        let seq = LocalSequencer::new()
            .with_revision(SequencingRevision::Proportional)
            .sequence_with_end_times("hello", &starts, &ends);
        let events = seq.into_vec();
        assert_eq!(events[0], Viseme::new(11, 0));
        assert_eq!(events[1], Viseme::new(8, 200));
        assert_eq!(events[2], Viseme::new(13, 300));
        assert!(events.last().unwrap().is_neutral());
    }

    #[test]
    fn proportional_without_end_times_uses_last_start() {
        let seq = LocalSequencer::new()
            .with_revision(SequencingRevision::Proportional)
            .sequence("me", &[0.0, 0.2]);
        // span 0.0..0.2 over 2 phonemes → M@0, IY@100.
        assert_eq!(seq.as_slice()[1], Viseme::new(12, 100));
    }

    #[test]
    fn revision_versions_round_trip() {
        for rev in [SequencingRevision::Positional, SequencingRevision::Proportional] {
            assert_eq!(SequencingRevision::from_version(rev.version()), Some(rev));
        }
        assert_eq!(SequencingRevision::from_version(0), None);
        assert_eq!(SequencingRevision::from_version(3), None);
    }

    #[test]
    fn custom_dictionary_is_used() {
        let mut dict = PronunciationDictionary::new();
        dict.insert("zorp", "F EY1");
        let seq = LocalSequencer::new()
            .with_dictionary(Arc::new(dict))
            .sequence("zorp hello", &per_char_times("zorp hello", 0.05));
        assert_eq!(seq.as_slice()[0], Viseme::new(2, 0));
        // "hello" is not in the custom dictionary: FF, I, neutral tail.
        assert_eq!(seq.len(), 3);
    }

    #[test]
    fn from_config_without_path_uses_bundled() {
        let sequencer = LocalSequencer::from_config(&DictionaryConfig::default()).unwrap();
        assert!(sequencer.dictionary().contains("hello"));
    }

    #[test]
    fn from_config_merges_file_over_bundled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.dict");
        std::fs::write(&path, "lipsync L IH1 P S IH2 NG K\n").unwrap();
        let config = DictionaryConfig {
            path: Some(path),
            merge_bundled: true,
        };
        let sequencer = LocalSequencer::from_config(&config).unwrap();
        assert!(sequencer.dictionary().contains("lipsync"));
        assert!(sequencer.dictionary().contains("hello"));
    }

    #[test]
    fn from_config_without_merge_uses_only_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmudict.dict");
        std::fs::write(&path, "lipsync L IH1 P S IH2 NG K\n").unwrap();
        let config = DictionaryConfig {
            path: Some(path),
            merge_bundled: false,
        };
        let sequencer = LocalSequencer::from_config(&config).unwrap();
        assert!(sequencer.dictionary().has_full_dictionary());
        assert_eq!(sequencer.dictionary().lookup("lipsync").len(), 7);
        assert!(!sequencer.dictionary().contains("hello"));
    }

    #[test]
    fn from_config_missing_file_is_error() {
        let config = DictionaryConfig {
            path: Some("/nonexistent/cmudict.dict".into()),
            merge_bundled: true,
        };
        assert!(LocalSequencer::from_config(&config).is_err());
    }

    #[test]
    fn seconds_to_ms_floors_and_clamps() {
        assert_eq!(seconds_to_ms(0.2), Some(200));
        assert_eq!(seconds_to_ms(0.0999), Some(99));
        assert_eq!(seconds_to_ms(-1.0), Some(0));
        assert_eq!(seconds_to_ms(f64::INFINITY), None);
    }

    #[test]
    fn seconds_to_ms_absorbs_one_ulp_below_a_millisecond() {
        assert_eq!(seconds_to_ms(1.005), Some(1005));
        let just_under = f64::from_bits(2.18f64.to_bits() - 1);
        assert_eq!(seconds_to_ms(just_under), Some(2180));
        // A genuine sub-millisecond offset still floors.
        assert_eq!(seconds_to_ms(2.1799), Some(2179));
    }

    #[test]
    fn proportional_timing_survives_a_json_round_trip() {
        let text = "refrigerator";
        let starts: Vec<f64> = (0..text.len()).map(|i| 1.3 + i as f64 * 0.07).collect();
        let ends: Vec<f64> = starts.iter().map(|s| s + 0.07).collect();
        let sequencer = LocalSequencer::new().with_revision(SequencingRevision::Proportional);

        let json = serde_json::to_string(&(starts.clone(), ends.clone())).unwrap();
        let (wire_starts, wire_ends): (Vec<f64>, Vec<f64>) = serde_json::from_str(&json).unwrap();

        assert_eq!(
            sequencer.sequence_with_end_times(text, &wire_starts, &wire_ends),
            sequencer.sequence_with_end_times(text, &starts, &ends),
        );
    }
}
