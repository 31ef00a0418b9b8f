//! Pronunciation dictionary in CMU format.
//!
//! A dictionary is a stack of layers searched newest-first:
//!
//! - tables parsed from CMU-format text (the compiled-in core lexicon,
//!   [`PronunciationDictionary::parse`], [`PronunciationDictionary::insert`])
//! - full `cmudict.dict` files loaded through `cmudict-fast`
//!   ([`PronunciationDictionary::from_file`])
//!
//! Text tables accept:
//!
//! ```text
//! ;;; comment
//! HELLO  HH AH0 L OW1
//! HELLO(2)  HH EH0 L OW1
//! read  R IY1 D  # trailing comments are allowed
//! ```
//!
//! Keys are case-insensitive. Alternate pronunciations (`word(2)`) are
//! ignored in favour of the first entry for the word. Stress digits are
//! stripped from every returned phoneme.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use cmudict_fast::{Cmudict, Rule};
use tracing::{debug, error, info, warn};

use crate::error::{LexiconError, Result};
use crate::phoneme::{is_valid_symbol, strip_stress};

/// Core English lexicon compiled into the binary.
const BUNDLED_SOURCE: &str = include_str!("../assets/core.dict");

/// Environment variable naming a full `cmudict.dict` to load.
pub const CMUDICT_ENV: &str = "LIPSYNC_CMUDICT";

/// Distribution-packaged CMU dictionary (Debian/Ubuntu `cmudict`).
const SYSTEM_CMUDICT: &str = "/usr/share/cmudict/cmudict.dict";

static BUNDLED: LazyLock<PronunciationDictionary> = LazyLock::new(|| {
    let core = match PronunciationDictionary::parse(BUNDLED_SOURCE) {
        Ok(dict) => dict,
        Err(e) => {
            error!("bundled lexicon failed to parse: {e}");
            PronunciationDictionary::default()
        }
    };

    let Some(path) = locate_cmudict() else {
        debug!(entries = core.len(), "bundled core lexicon loaded (no full cmudict found)");
        return core;
    };
    match PronunciationDictionary::from_file(&path) {
        Ok(mut full) => {
            // Core entries stay on top of the full dictionary.
            full.extend(core);
            info!(path = %path.display(), entries = full.len(), "full CMU dictionary loaded");
            full
        }
        Err(e) => {
            warn!(path = %path.display(), "ignoring unreadable CMU dictionary: {e}");
            core
        }
    }
});

/// Where a full `cmudict.dict` is looked for, in priority order.
pub fn cmudict_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = std::env::var_os(CMUDICT_ENV).filter(|v| !v.is_empty()) {
        candidates.push(PathBuf::from(path));
    }
    if let Some(data) = dirs::data_dir() {
        candidates.push(data.join("lipsync").join("cmudict.dict"));
    }
    candidates.push(PathBuf::from(SYSTEM_CMUDICT));
    candidates
}

/// The first existing full `cmudict.dict`, if any.
pub fn locate_cmudict() -> Option<PathBuf> {
    first_existing(cmudict_candidates())
}

fn first_existing(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|p| p.is_file())
}

#[derive(Clone)]
enum Layer {
    Table(HashMap<String, Vec<String>>),
    Cmu { dict: Arc<Cmudict>, entries: usize },
}

impl Layer {
    fn get(&self, key: &str) -> Option<Vec<String>> {
        match self {
            Self::Table(entries) => entries.get(key).cloned(),
            Self::Cmu { dict, .. } => dict
                .get(key)
                .or_else(|| dict.get(&key.to_uppercase()))
                .and_then(|rules| rules.first())
                .map(rule_phonemes),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Table(entries) => entries.len(),
            Self::Cmu { entries, .. } => *entries,
        }
    }
}

fn rule_phonemes(rule: &Rule) -> Vec<String> {
    rule.pronunciation()
        .iter()
        .map(|symbol| strip_stress(&symbol.to_string()).to_ascii_uppercase())
        .collect()
}

/// Word → phoneme sequence lookup.
#[derive(Clone, Default)]
pub struct PronunciationDictionary {
    layers: Vec<Layer>,
}

impl fmt::Debug for PronunciationDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PronunciationDictionary")
            .field("layers", &self.layers.len())
            .field("entries", &self.len())
            .field("full_cmudict", &self.has_full_dictionary())
            .finish()
    }
}

impl PronunciationDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default dictionary.
    ///
    /// The compiled-in core lexicon, layered over the full CMU dictionary
    /// when [`locate_cmudict`] finds one. Loaded once on first use and
    /// shared read-only afterwards.
    pub fn bundled() -> &'static Self {
        &BUNDLED
    }

    /// Parse a dictionary from CMU-format text.
    ///
    /// # Errors
    ///
    /// Returns [`LexiconError::Parse`] with the 1-based line number if a line
    /// has a word but no pronunciation, or contains a malformed symbol.
    pub fn parse(source: &str) -> Result<Self> {
        let mut entries: HashMap<String, Vec<String>> = HashMap::new();
        for (idx, raw) in source.lines().enumerate() {
            let line_no = idx + 1;
            let line = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            }
            .trim();
            if line.is_empty() || line.starts_with(";;;") {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(word) = tokens.next() else {
                continue;
            };
            let symbols: Vec<&str> = tokens.collect();
            if symbols.is_empty() {
                return Err(LexiconError::Parse {
                    line: line_no,
                    message: format!("'{word}' has no pronunciation"),
                });
            }
            if let Some(bad) = symbols.iter().find(|s| !is_valid_symbol(s)) {
                return Err(LexiconError::Parse {
                    line: line_no,
                    message: format!("invalid phoneme symbol '{bad}' for '{word}'"),
                });
            }

            let (base, alternate) = split_alternate(word);
            let key = base.to_lowercase();
            if alternate && entries.contains_key(&key) {
                continue;
            }
            entries.entry(key).or_insert_with(|| {
                symbols
                    .iter()
                    .map(|s| strip_stress(s).to_ascii_uppercase())
                    .collect()
            });
        }
        Ok(Self {
            layers: vec![Layer::Table(entries)],
        })
    }

    /// Load a full `cmudict.dict` from disk.
    ///
    /// # Errors
    ///
    /// Returns [`LexiconError::Io`] if the file cannot be read, or
    /// [`LexiconError::Cmudict`] if `cmudict-fast` rejects its content.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let entries = count_headwords(&source);
        let dict = Cmudict::new(path).map_err(|e| LexiconError::Cmudict {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), entries, "CMU dictionary loaded from file");
        Ok(Self {
            layers: vec![Layer::Cmu {
                dict: Arc::new(dict),
                entries,
            }],
        })
    }

    /// Add or replace a pronunciation.
    ///
    /// `pronunciation` is a space-delimited ARPABET string; stress digits are
    /// stripped.
    pub fn insert(&mut self, word: &str, pronunciation: &str) {
        let phonemes = pronunciation
            .split_whitespace()
            .map(|s| strip_stress(s).to_ascii_uppercase())
            .collect();
        if !matches!(self.layers.last(), Some(Layer::Table(_))) {
            self.layers.push(Layer::Table(HashMap::new()));
        }
        if let Some(Layer::Table(entries)) = self.layers.last_mut() {
            entries.insert(word.to_lowercase(), phonemes);
        }
    }

    /// Layer another dictionary over this one. Entries in `other` win.
    pub fn extend(&mut self, other: Self) {
        self.layers.extend(other.layers);
    }

    /// Look up the phonemes for `word`.
    ///
    /// Returns an empty list for unknown words. Lookup is case-insensitive.
    pub fn lookup(&self, word: &str) -> Vec<String> {
        let key = word.to_lowercase();
        self.layers
            .iter()
            .rev()
            .find_map(|layer| layer.get(&key))
            .unwrap_or_default()
    }

    /// Returns true if the dictionary has an entry for `word`.
    pub fn contains(&self, word: &str) -> bool {
        !self.lookup(word).is_empty()
    }

    /// Number of entries across all layers.
    ///
    /// A word present in more than one layer counts once per layer.
    pub fn len(&self) -> usize {
        self.layers.iter().map(Layer::len).sum()
    }

    /// Returns true if the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if a full `cmudict.dict` is one of the layers.
    pub fn has_full_dictionary(&self) -> bool {
        self.layers.iter().any(|l| matches!(l, Layer::Cmu { .. }))
    }
}

/// Headwords in a cmudict file, not counting `word(2)` alternates.
fn count_headwords(source: &str) -> usize {
    source
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|word| !word.starts_with(";;;") && !split_alternate(word).1)
        .count()
}

/// Split `word(2)` into `("word", true)`; plain words return `(word, false)`.
fn split_alternate(word: &str) -> (&str, bool) {
    if let Some(open) = word.rfind('(')
        && word.ends_with(')')
        && word[open + 1..word.len() - 1]
            .bytes()
            .all(|b| b.is_ascii_digit())
        && open > 0
    {
        return (&word[..open], true);
    }
    (word, false)
}
