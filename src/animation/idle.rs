//! Idle blink and head movement.
//!
//! While a character is on screen it blinks every 2–5 s and nods its head
//! every 3–6 s, independently of speech. Each pulse raises a boolean input,
//! holds it briefly, then lowers it.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AnimationTarget, CharacterRig, StateMachineInput};
use crate::config::IdleConfig;

/// Timing for one pulsed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PulseTiming {
    min_ms: u64,
    max_ms: u64,
    hold_ms: u64,
}

impl PulseTiming {
    fn next_delay(&self) -> Duration {
        let ms = if self.max_ms > self.min_ms {
            rand::thread_rng().gen_range(self.min_ms..=self.max_ms)
        } else {
            self.min_ms
        };
        Duration::from_millis(ms)
    }
}

/// Drives the rig's blink and head-down inputs until cancelled.
pub struct IdleAnimator {
    target: Arc<dyn AnimationTarget>,
    pulses: Vec<(StateMachineInput, PulseTiming)>,
    cancel: CancellationToken,
}

impl IdleAnimator {
    /// Inputs the rig lacks are skipped.
    pub fn new(
        target: Arc<dyn AnimationTarget>,
        rig: &CharacterRig,
        config: &IdleConfig,
        cancel: CancellationToken,
    ) -> Self {
        let mut pulses = Vec::new();
        if let Some(blink) = &rig.blink {
            pulses.push((
                blink.clone(),
                PulseTiming {
                    min_ms: config.blink_min_ms,
                    max_ms: config.blink_max_ms,
                    hold_ms: config.blink_hold_ms,
                },
            ));
        }
        if let Some(head_down) = &rig.head_down {
            pulses.push((
                head_down.clone(),
                PulseTiming {
                    min_ms: config.head_down_min_ms,
                    max_ms: config.head_down_max_ms,
                    hold_ms: config.head_down_hold_ms,
                },
            ));
        }
        Self {
            target,
            pulses,
            cancel,
        }
    }

    /// Number of inputs this animator will pulse.
    pub fn pulse_count(&self) -> usize {
        self.pulses.len()
    }

    /// Run until the cancellation token is cancelled.
    ///
    /// Intended to be spawned as a background task:
    ///
    /// ```rust,ignore
    /// tokio::spawn(animator.run());
    /// ```
    pub async fn run(self) {
        if self.pulses.is_empty() {
            debug!("rig has no idle inputs");
            return;
        }
        info!(inputs = self.pulses.len(), "idle animation started");
        let mut tasks = tokio::task::JoinSet::new();
        for (input, timing) in self.pulses {
            tasks.spawn(pulse_loop(
                Arc::clone(&self.target),
                input,
                timing,
                self.cancel.clone(),
            ));
        }
        while tasks.join_next().await.is_some() {}
        info!("idle animation stopped");
    }
}

async fn pulse_loop(
    target: Arc<dyn AnimationTarget>,
    input: StateMachineInput,
    timing: PulseTiming,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(timing.next_delay()) => {}
        }
        if let Err(e) = target.set_bool(&input, true) {
            warn!(%input, "idle pulse failed: {e}");
            continue;
        }
        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(Duration::from_millis(timing.hold_ms)) => false,
        };
        if let Err(e) = target.set_bool(&input, false) {
            warn!(%input, "idle release failed: {e}");
        }
        if cancelled {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::animation::{InputValue, MemoryTarget};

    fn fast_config() -> IdleConfig {
        IdleConfig {
            enabled: true,
            blink_min_ms: 10,
            blink_max_ms: 20,
            blink_hold_ms: 5,
            head_down_min_ms: 15,
            head_down_max_ms: 25,
            head_down_hold_ms: 5,
        }
    }

    #[test]
    fn delay_stays_in_range() {
        let timing = PulseTiming {
            min_ms: 2_000,
            max_ms: 5_000,
            hold_ms: 100,
        };
        for _ in 0..200 {
            let d = timing.next_delay();
            assert!(d >= Duration::from_millis(2_000) && d <= Duration::from_millis(5_000));
        }
    }

    #[test]
    fn degenerate_range_uses_min() {
        let timing = PulseTiming {
            min_ms: 300,
            max_ms: 300,
            hold_ms: 0,
        };
        assert_eq!(timing.next_delay(), Duration::from_millis(300));
    }

    #[test]
    fn rig_without_idle_inputs_has_no_pulses() {
        let rig = CharacterRig::preset("eggni").unwrap();
        let animator = IdleAnimator::new(
            Arc::new(MemoryTarget::new()),
            &rig,
            &IdleConfig::default(),
            CancellationToken::new(),
        );
        assert_eq!(animator.pulse_count(), 0);
    }

    #[tokio::test]
    async fn pulses_until_cancelled_and_leaves_inputs_low() {
        let target = Arc::new(MemoryTarget::new());
        let rig = CharacterRig::preset("thanos").unwrap();
        let cancel = CancellationToken::new();
        let animator = IdleAnimator::new(target.clone(), &rig, &fast_config(), cancel.clone());
        assert_eq!(animator.pulse_count(), 2);

        let task = tokio::spawn(animator.run());
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("idle animator should stop after cancel")
            .unwrap();

        let blink = rig.blink.unwrap();
        let head = rig.head_down.unwrap();
        let writes = target.writes();
        assert!(writes.iter().any(|(i, v)| *i == blink && *v == InputValue::Bool(true)));
        assert!(writes.iter().any(|(i, v)| *i == head && *v == InputValue::Bool(true)));
        assert_eq!(target.value(&blink), Some(InputValue::Bool(false)));
        assert_eq!(target.value(&head), Some(InputValue::Bool(false)));
    }
}
