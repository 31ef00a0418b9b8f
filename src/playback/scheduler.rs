//! Per-utterance viseme timers.
//!
//! Every utterance gets a [`CancellationToken`] (child of the scheduler's
//! root token) and a generation number. Scheduling a new utterance cancels
//! the previous one, and a timer only writes if its generation is still
//! current, so a superseded utterance can never move the mouth.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use uuid::Uuid;

use super::VisemeSink;
use crate::runtime::LipSyncEvent;
use crate::viseme::{NEUTRAL_VISEME, VisemeSequence};

/// A scheduled utterance.
#[derive(Debug)]
pub struct UtteranceHandle {
    id: Uuid,
    generation: u64,
    started_at: Instant,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl UtteranceHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When offset zero of the sequence was anchored.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Token cancelled when this utterance is superseded or shut down.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until every timer has fired or been cancelled.
    pub async fn timers_done(&mut self) {
        let _ = (&mut self.task).await;
    }
}

/// Schedules viseme writes for one utterance at a time.
pub struct PlaybackScheduler {
    sink: Arc<dyn VisemeSink>,
    root: CancellationToken,
    generation: Arc<AtomicU64>,
    current: Mutex<Option<CancellationToken>>,
    events: Option<broadcast::Sender<LipSyncEvent>>,
}

impl std::fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("generation", &self.current_generation())
            .field("shut_down", &self.root.is_cancelled())
            .finish()
    }
}

impl PlaybackScheduler {
    pub fn new(sink: Arc<dyn VisemeSink>) -> Self {
        Self {
            sink,
            root: CancellationToken::new(),
            generation: Arc::new(AtomicU64::new(0)),
            current: Mutex::new(None),
            events: None,
        }
    }

    /// Broadcast a [`LipSyncEvent::VisemeApplied`] for every write.
    pub fn with_events(mut self, tx: broadcast::Sender<LipSyncEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Generation of the most recently scheduled utterance (0 before any).
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Schedule `sequence` starting now, cancelling any utterance in flight.
    pub fn schedule(&self, sequence: &VisemeSequence) -> UtteranceHandle {
        self.schedule_with_id(Uuid::new_v4(), sequence)
    }

    /// Like [`schedule`](Self::schedule) with a caller-chosen utterance id.
    pub fn schedule_with_id(&self, id: Uuid, sequence: &VisemeSequence) -> UtteranceHandle {
        let cancel = self.root.child_token();
        let generation = {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = current.replace(cancel.clone()) {
                previous.cancel();
            }
            self.generation.fetch_add(1, Ordering::AcqRel) + 1
        };

        let started_at = Instant::now();
        info!(utterance_id = %id, generation, visemes = sequence.len(), "scheduling utterance");

        let task = tokio::spawn(run_timers(
            TimerContext {
                id,
                generation,
                started_at,
                sink: Arc::clone(&self.sink),
                current_generation: Arc::clone(&self.generation),
                cancel: cancel.clone(),
                events: self.events.clone(),
            },
            sequence.clone(),
        ));

        UtteranceHandle {
            id,
            generation,
            started_at,
            cancel,
            task,
        }
    }

    /// Audio for `handle` has ended: cancel its remaining timers and close
    /// the mouth.
    ///
    /// The reset is skipped if a newer utterance has been scheduled since,
    /// so a late "audio ended" never closes the next utterance's mouth.
    /// Returns whether the reset was applied.
    pub fn finish(&self, handle: &UtteranceHandle) -> bool {
        handle.cancel.cancel();
        if self.root.is_cancelled() || self.current_generation() != handle.generation {
            debug!(utterance_id = %handle.id, "stale utterance end; not resetting");
            return false;
        }
        self.sink.apply(NEUTRAL_VISEME);
        debug!(utterance_id = %handle.id, "audio ended; viseme reset to neutral");
        true
    }

    /// Cancel whatever is in flight and close the mouth.
    pub fn interrupt(&self) {
        let current = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(token) = current {
            token.cancel();
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.sink.apply(NEUTRAL_VISEME);
    }

    /// Cancel all outstanding timers permanently.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

struct TimerContext {
    id: Uuid,
    generation: u64,
    started_at: Instant,
    sink: Arc<dyn VisemeSink>,
    current_generation: Arc<AtomicU64>,
    cancel: CancellationToken,
    events: Option<broadcast::Sender<LipSyncEvent>>,
}

async fn run_timers(ctx: TimerContext, sequence: VisemeSequence) {
    for viseme in sequence {
        let due = ctx.started_at + Duration::from_millis(viseme.start_ms);
        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                trace!(utterance_id = %ctx.id, "timers cancelled");
                return;
            }
            _ = tokio::time::sleep_until(due) => {}
        }
        if ctx.cancel.is_cancelled()
            || ctx.current_generation.load(Ordering::Acquire) != ctx.generation
        {
            return;
        }
        ctx.sink.apply(viseme.viseme_id);
        trace!(utterance_id = %ctx.id, viseme_id = viseme.viseme_id, start_ms = viseme.start_ms, "viseme applied");
        if let Some(tx) = &ctx.events {
            let _ = tx.send(LipSyncEvent::VisemeApplied {
                utterance_id: ctx.id,
                viseme_id: viseme.viseme_id,
                start_ms: viseme.start_ms,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::viseme::Viseme;

    /// Records each write with its offset from the sink's creation.
    struct RecordingSink {
        origin: Instant,
        writes: Mutex<Vec<(u8, Duration)>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                origin: Instant::now(),
                writes: Mutex::new(Vec::new()),
            })
        }

        fn ids(&self) -> Vec<u8> {
            self.writes.lock().unwrap().iter().map(|(id, _)| *id).collect()
        }

        fn writes(&self) -> Vec<(u8, Duration)> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl VisemeSink for RecordingSink {
        fn apply(&self, viseme_id: u8) {
            self.writes
                .lock()
                .unwrap()
                .push((viseme_id, self.origin.elapsed()));
        }
    }

    fn hello() -> VisemeSequence {
        VisemeSequence::from_raw(vec![
            Viseme::new(11, 0),
            Viseme::new(8, 100),
            Viseme::new(13, 150),
            Viseme::neutral(200),
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn applies_each_viseme_at_its_offset() {
        let sink = RecordingSink::new();
        let scheduler = PlaybackScheduler::new(sink.clone());
        let mut handle = scheduler.schedule(&hello());
        handle.timers_done().await;

        let writes = sink.writes();
        assert_eq!(writes.iter().map(|(id, _)| *id).collect::<Vec<_>>(), [11, 8, 13, 0]);
        for ((_, at), expected) in writes.iter().zip([0u64, 100, 150, 200]) {
            assert_eq!(*at, Duration::from_millis(expected));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn new_utterance_cancels_previous_timers() {
        let sink = RecordingSink::new();
        let scheduler = PlaybackScheduler::new(sink.clone());

        let mut first = scheduler.schedule(&VisemeSequence::from_raw(vec![
            Viseme::new(1, 0),
            Viseme::new(2, 500),
            Viseme::neutral(900),
        ]));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut second = scheduler.schedule(&VisemeSequence::from_raw(vec![
            Viseme::new(10, 0),
            Viseme::neutral(50),
        ]));
        assert!(first.is_cancelled());
        assert!(!scheduler.finish(&first), "stale end must not reset");

        second.timers_done().await;
        first.timers_done().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(sink.ids(), [1, 10, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn finish_cancels_remaining_and_resets() {
        let sink = RecordingSink::new();
        let scheduler = PlaybackScheduler::new(sink.clone());
        let mut handle = scheduler.schedule(&VisemeSequence::from_raw(vec![
            Viseme::new(4, 0),
            Viseme::new(7, 300),
            Viseme::neutral(600),
        ]));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(scheduler.finish(&handle));
        handle.timers_done().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(sink.ids(), [4, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_everything() {
        let sink = RecordingSink::new();
        let scheduler = PlaybackScheduler::new(sink.clone());
        let mut handle = scheduler.schedule(&VisemeSequence::from_raw(vec![
            Viseme::new(4, 100),
            Viseme::neutral(200),
        ]));
        scheduler.shutdown();
        handle.timers_done().await;

        assert!(handle.is_cancelled());
        assert!(!scheduler.finish(&handle));
        assert!(sink.ids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_resets_immediately() {
        let sink = RecordingSink::new();
        let scheduler = PlaybackScheduler::new(sink.clone());
        let mut handle = scheduler.schedule(&VisemeSequence::from_raw(vec![
            Viseme::new(4, 100),
            Viseme::neutral(200),
        ]));
        scheduler.interrupt();
        handle.timers_done().await;
        assert_eq!(sink.ids(), [0]);
    }

    #[tokio::test(start_paused = true)]
    async fn generations_increase() {
        let scheduler = PlaybackScheduler::new(RecordingSink::new());
        assert_eq!(scheduler.current_generation(), 0);
        let a = scheduler.schedule(&VisemeSequence::empty());
        let b = scheduler.schedule(&VisemeSequence::empty());
        assert_eq!(a.generation(), 1);
        assert_eq!(b.generation(), 2);
        assert_eq!(scheduler.current_generation(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn broadcasts_applied_visemes() {
        let (tx, mut rx) = broadcast::channel(16);
        let scheduler = PlaybackScheduler::new(RecordingSink::new()).with_events(tx);
        let id = Uuid::new_v4();
        let mut handle = scheduler.schedule_with_id(id, &hello());
        handle.timers_done().await;

        let mut applied = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let LipSyncEvent::VisemeApplied {
                utterance_id,
                viseme_id,
                ..
            } = event
            {
                assert_eq!(utterance_id, id);
                applied.push(viseme_id);
            }
        }
        assert_eq!(applied, [11, 8, 13, 0]);
    }
}
