//! Vendor viseme event normalization.
//!
//! Event-emitting synthesizers report `(vendor viseme id, audio offset)` pairs
//! as they synthesize, with offsets in 100-nanosecond ticks. They emit one
//! event per phonetic unit, so consecutive events often repeat the same
//! shape; [`VendorVisemeStream`] removes those repeats.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

use super::sequence::{SequenceBuilder, VisemeSequence};
use super::table::vendor_to_viseme;
use super::{NEUTRAL_VISEME, Viseme};
use crate::error::{LipSyncError, Result};

/// Ticks (100 ns units) per millisecond.
pub const TICKS_PER_MS: u64 = 10_000;

/// Lead subtracted from vendor offsets so the mouth moves slightly ahead of
/// the audio, compensating for perceived lag.
pub const LEAD_CORRECTION_MS: u64 = 100;

/// One provider-native viseme event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorVisemeEvent {
    /// Vendor viseme id (vendor's own id space).
    pub viseme_id: u32,
    /// Offset from audio start in 100 ns ticks.
    pub audio_offset_ticks: u64,
}

impl VendorVisemeEvent {
    pub fn new(viseme_id: u32, audio_offset_ticks: u64) -> Self {
        Self {
            viseme_id,
            audio_offset_ticks,
        }
    }
}

/// Normalize one vendor event with the default lead correction.
///
/// `start_ms = max(0, ticks / 10_000 - 100)`.
///
/// # Errors
///
/// Returns [`LipSyncError::UnmappedVendorViseme`] if the id is missing from
/// the vendor table.
pub fn normalize(vendor_viseme_id: u32, raw_offset_ticks: u64) -> Result<Viseme> {
    normalize_with_lead(vendor_viseme_id, raw_offset_ticks, LEAD_CORRECTION_MS)
}

/// Normalize one vendor event with an explicit lead correction.
///
/// # Errors
///
/// Returns [`LipSyncError::UnmappedVendorViseme`] if the id is missing from
/// the vendor table.
pub fn normalize_with_lead(
    vendor_viseme_id: u32,
    raw_offset_ticks: u64,
    lead_ms: u64,
) -> Result<Viseme> {
    let shape = vendor_to_viseme(vendor_viseme_id)
        .ok_or(LipSyncError::UnmappedVendorViseme(vendor_viseme_id))?;
    let offset_ms = raw_offset_ticks / TICKS_PER_MS;
    Ok(Viseme::new(shape.id(), offset_ms.saturating_sub(lead_ms)))
}

/// Normalizes and deduplicates a stream of vendor events in emission order.
///
/// The previous id starts out neutral, so a leading silence event is
/// suppressed (the mouth is already closed).
pub struct VendorVisemeStream<I> {
    events: I,
    lead_ms: u64,
    prev: u8,
}

impl<I> VendorVisemeStream<I>
where
    I: Iterator<Item = VendorVisemeEvent>,
{
    pub fn new(events: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            events: events.into_iter(),
            lead_ms: LEAD_CORRECTION_MS,
            prev: NEUTRAL_VISEME,
        }
    }

    /// Override the lead correction.
    pub fn with_lead_ms(mut self, lead_ms: u64) -> Self {
        self.lead_ms = lead_ms;
        self
    }

    /// Drain the stream into a well-formed sequence.
    ///
    /// # Errors
    ///
    /// Fails on the first unmapped vendor id.
    pub fn collect_sequence(self) -> Result<VisemeSequence> {
        let mut builder = SequenceBuilder::new();
        for viseme in self {
            builder.push(viseme?);
        }
        Ok(builder.finish(None))
    }
}

impl<I> Iterator for VendorVisemeStream<I>
where
    I: Iterator<Item = VendorVisemeEvent>,
{
    type Item = Result<Viseme>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let event = self.events.next()?;
            let viseme =
                match normalize_with_lead(event.viseme_id, event.audio_offset_ticks, self.lead_ms) {
                    Ok(v) => v,
                    Err(e) => return Some(Err(e)),
                };
            if viseme.viseme_id == self.prev {
                trace!(viseme_id = viseme.viseme_id, "suppressing repeated vendor viseme");
                continue;
            }
            self.prev = viseme.viseme_id;
            return Some(Ok(viseme));
        }
    }
}

/// Collect vendor events delivered over a channel (e.g. from a synthesizer
/// callback) until the sender side closes.
///
/// # Errors
///
/// Fails on the first unmapped vendor id.
pub async fn collect_from_channel(
    mut rx: mpsc::Receiver<VendorVisemeEvent>,
    lead_ms: u64,
) -> Result<VisemeSequence> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    VendorVisemeStream::new(events)
        .with_lead_ms(lead_ms)
        .collect_sequence()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn offset_converts_and_subtracts_lead() {
        let v = normalize(5, 2_000_000).unwrap();
        assert_eq!(v.start_ms, 100);
    }

    #[test]
    fn early_offset_clamps_to_zero() {
        let v = normalize(5, 500_000).unwrap();
        assert_eq!(v.start_ms, 0);
    }

    #[test]
    fn offset_formula_holds_across_range() {
        for ticks in [0u64, 9_999, 10_000, 1_000_000, 1_009_999, 1_010_000, 123_456_789] {
            let expected = (ticks / 10_000).saturating_sub(100);
            assert_eq!(normalize(1, ticks).unwrap().start_ms, expected, "ticks {ticks}");
        }
    }

    #[test]
    fn unmapped_id_is_config_error() {
        let err = normalize(99, 0).unwrap_err();
        assert!(matches!(err, LipSyncError::UnmappedVendorViseme(99)));
    }

    #[test]
    fn custom_lead() {
        assert_eq!(normalize_with_lead(21, 2_000_000, 0).unwrap().start_ms, 200);
    }

    #[test]
    fn stream_drops_leading_silence_and_repeats() {
        let events = [
            VendorVisemeEvent::new(0, 0),
            VendorVisemeEvent::new(21, 1_500_000),
            VendorVisemeEvent::new(21, 2_000_000),
            VendorVisemeEvent::new(2, 2_500_000),
            VendorVisemeEvent::new(0, 4_000_000),
        ];
        let out: Vec<Viseme> = VendorVisemeStream::new(events)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            out,
            vec![Viseme::new(1, 50), Viseme::new(10, 150), Viseme::neutral(300)]
        );
    }

    #[test]
    fn ids_mapping_to_same_shape_are_deduplicated() {
        // Vendor ids 2 and 9 both map to the wide-open shape.
        let events = [VendorVisemeEvent::new(2, 2_000_000), VendorVisemeEvent::new(9, 3_000_000)];
        let out: Vec<Viseme> = VendorVisemeStream::new(events)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn collect_sequence_appends_neutral_tail() {
        let events = [VendorVisemeEvent::new(21, 2_000_000)];
        let seq = VendorVisemeStream::new(events).collect_sequence().unwrap();
        assert_eq!(seq.last(), Some(&Viseme::neutral(100)));
        assert!(seq.check().is_ok());
    }

    #[test]
    fn collect_sequence_fails_on_unmapped_id() {
        let events = [VendorVisemeEvent::new(1, 0), VendorVisemeEvent::new(40, 10)];
        assert!(VendorVisemeStream::new(events).collect_sequence().is_err());
    }

    #[test]
    fn std_channel_receiver_works_as_source() {
        let (tx, rx) = std::sync::mpsc::channel();
        tx.send(VendorVisemeEvent::new(15, 1_200_000)).unwrap();
        tx.send(VendorVisemeEvent::new(0, 1_800_000)).unwrap();
        drop(tx);
        let seq = VendorVisemeStream::new(rx).collect_sequence().unwrap();
        assert_eq!(seq.as_slice(), [Viseme::new(7, 20), Viseme::neutral(80)]);
    }

    #[tokio::test]
    async fn tokio_channel_collects_until_closed() {
        let (tx, rx) = mpsc::channel(8);
        let producer = tokio::spawn(async move {
            for (id, ticks) in [(21, 1_000_000), (6, 2_000_000), (0, 3_000_000)] {
                tx.send(VendorVisemeEvent::new(id, ticks)).await.unwrap();
            }
        });
        let seq = collect_from_channel(rx, LEAD_CORRECTION_MS).await.unwrap();
        producer.await.unwrap();
        assert_eq!(seq.len(), 3);
        assert!(seq.last().unwrap().is_neutral());
    }

    #[test]
    fn event_deserializes_from_camel_case() {
        let event: VendorVisemeEvent =
            serde_json::from_str(r#"{"visemeId": 7, "audioOffsetTicks": 50000}"#).unwrap();
        assert_eq!(event, VendorVisemeEvent::new(7, 50_000));
    }
}
