//! Ordered viseme sequences and the invariants they carry.
//!
//! A well-formed sequence is non-decreasing in `start_ms`, never repeats a
//! viseme id in adjacent entries, and (when non-empty) ends on the neutral
//! viseme so the mouth closes when speech ends. [`SequenceBuilder`] enforces
//! all three while events are appended.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{NEUTRAL_VISEME, Viseme};

/// A time-ordered list of visemes for one utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisemeSequence(Vec<Viseme>);

/// Which invariant a sequence breaks, with the offending index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceViolation {
    /// `start_ms` at `index` is earlier than at `index - 1`.
    OutOfOrder { index: usize },
    /// The viseme id at `index` repeats the one at `index - 1`.
    RepeatedViseme { index: usize },
    /// The last entry is not the neutral viseme.
    MissingNeutralTail,
}

impl std::fmt::Display for SequenceViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfOrder { index } => write!(f, "entry {index} starts before its predecessor"),
            Self::RepeatedViseme { index } => {
                write!(f, "entry {index} repeats the previous viseme id")
            }
            Self::MissingNeutralTail => write!(f, "sequence does not end on the neutral viseme"),
        }
    }
}

impl VisemeSequence {
    /// The empty sequence (no recognised speech).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a well-formed sequence from raw events.
    ///
    /// Events are passed through [`SequenceBuilder`]; if the result is
    /// non-empty and does not end neutral, a neutral entry is appended at
    /// `tail_ms` (or at the last event's time if that is later).
    pub fn normalized(events: impl IntoIterator<Item = Viseme>, tail_ms: Option<u64>) -> Self {
        let mut builder = SequenceBuilder::new();
        builder.extend(events);
        builder.finish(tail_ms)
    }

    /// Wrap entries without normalization. Use [`check`](Self::check) to
    /// validate data received from elsewhere.
    pub fn from_raw(entries: Vec<Viseme>) -> Self {
        Self(entries)
    }

    /// Verify the sequence invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn check(&self) -> Result<(), SequenceViolation> {
        for (index, pair) in self.0.windows(2).enumerate() {
            if pair[1].start_ms < pair[0].start_ms {
                return Err(SequenceViolation::OutOfOrder { index: index + 1 });
            }
            if pair[1].viseme_id == pair[0].viseme_id {
                return Err(SequenceViolation::RepeatedViseme { index: index + 1 });
            }
        }
        match self.0.last() {
            Some(last) if !last.is_neutral() => Err(SequenceViolation::MissingNeutralTail),
            _ => Ok(()),
        }
    }

    pub fn as_slice(&self) -> &[Viseme] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Viseme> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Viseme> {
        self.0.last()
    }

    /// Offset of the final entry, i.e. when the mouth returns to neutral.
    pub fn end_ms(&self) -> u64 {
        self.0.last().map(|v| v.start_ms).unwrap_or(0)
    }

    pub fn into_vec(self) -> Vec<Viseme> {
        self.0
    }
}

impl<'a> IntoIterator for &'a VisemeSequence {
    type Item = &'a Viseme;
    type IntoIter = std::slice::Iter<'a, Viseme>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for VisemeSequence {
    type Item = Viseme;
    type IntoIter = std::vec::IntoIter<Viseme>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Incrementally assembles a well-formed [`VisemeSequence`].
///
/// - An event that would start before its predecessor is clamped to the
///   predecessor's time.
/// - An event repeating its predecessor's id is dropped.
#[derive(Debug, Default)]
pub struct SequenceBuilder {
    events: Vec<Viseme>,
}

impl SequenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Returns false if it was dropped as a repeat.
    pub fn push(&mut self, viseme: Viseme) -> bool {
        let mut viseme = viseme;
        if let Some(prev) = self.events.last() {
            if prev.viseme_id == viseme.viseme_id {
                trace!(viseme_id = viseme.viseme_id, "dropping repeated viseme");
                return false;
            }
            if viseme.start_ms < prev.start_ms {
                trace!(
                    start_ms = viseme.start_ms,
                    prev_ms = prev.start_ms,
                    "clamping out-of-order viseme"
                );
                viseme.start_ms = prev.start_ms;
            }
        }
        self.events.push(viseme);
        true
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Viseme>) {
        for event in events {
            self.push(event);
        }
    }

    pub fn last(&self) -> Option<&Viseme> {
        self.events.last()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Close the sequence.
    ///
    /// A non-empty sequence that does not already end neutral gets a neutral
    /// entry at `tail_ms` (clamped to the last event). Without a `tail_ms`
    /// the neutral entry lands on the last event's time.
    pub fn finish(mut self, tail_ms: Option<u64>) -> VisemeSequence {
        if let Some(last) = self.events.last().copied()
            && last.viseme_id != NEUTRAL_VISEME
        {
            let at = tail_ms.unwrap_or(last.start_ms).max(last.start_ms);
            self.events.push(Viseme::neutral(at));
        }
        VisemeSequence(self.events)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn ids(seq: &VisemeSequence) -> Vec<u8> {
        seq.iter().map(|v| v.viseme_id).collect()
    }

    #[test]
    fn empty_input_stays_empty() {
        let seq = VisemeSequence::normalized(Vec::new(), Some(500));
        assert!(seq.is_empty());
        assert!(seq.check().is_ok());
        assert_eq!(seq.end_ms(), 0);
    }

    #[test]
    fn repeats_are_dropped() {
        let seq = VisemeSequence::normalized(
            [Viseme::new(4, 0), Viseme::new(4, 10), Viseme::new(7, 20)],
            Some(30),
        );
        assert_eq!(ids(&seq), [4, 7, 0]);
    }

    #[test]
    fn out_of_order_is_clamped() {
        let seq = VisemeSequence::normalized([Viseme::new(4, 50), Viseme::new(7, 20)], None);
        assert_eq!(seq.as_slice()[1].start_ms, 50);
        assert!(seq.check().is_ok());
    }

    #[test]
    fn neutral_tail_appended_at_tail_ms() {
        let seq = VisemeSequence::normalized([Viseme::new(10, 0)], Some(300));
        assert_eq!(seq.last(), Some(&Viseme::neutral(300)));
    }

    #[test]
    fn neutral_tail_never_precedes_last_event() {
        let seq = VisemeSequence::normalized([Viseme::new(10, 400)], Some(300));
        assert_eq!(seq.last(), Some(&Viseme::neutral(400)));
    }

    #[test]
    fn existing_neutral_tail_is_kept() {
        let seq = VisemeSequence::normalized([Viseme::new(10, 0), Viseme::neutral(90)], Some(300));
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.end_ms(), 90);
    }

    #[test]
    fn check_reports_each_violation() {
        let unordered = VisemeSequence::from_raw(vec![Viseme::new(1, 10), Viseme::neutral(5)]);
        assert_eq!(
            unordered.check(),
            Err(SequenceViolation::OutOfOrder { index: 1 })
        );

        let repeated = VisemeSequence::from_raw(vec![Viseme::new(1, 0), Viseme::new(1, 5)]);
        assert_eq!(
            repeated.check(),
            Err(SequenceViolation::RepeatedViseme { index: 1 })
        );

        let open = VisemeSequence::from_raw(vec![Viseme::new(1, 0)]);
        assert_eq!(open.check(), Err(SequenceViolation::MissingNeutralTail));
    }

    #[test]
    fn serializes_as_plain_array() {
        let seq = VisemeSequence::normalized([Viseme::new(2, 0)], Some(10));
        let json = serde_json::to_string(&seq).unwrap();
        assert_eq!(
            json,
            r#"[{"visemeId":2,"startMs":0},{"visemeId":0,"startMs":10}]"#
        );
    }
}
