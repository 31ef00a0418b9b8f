//! The animation collaborator.
//!
//! Characters are driven through named state-machine inputs (a number input
//! for the viseme, boolean inputs for blink and head movement, and so on).
//! The runtime that owns those inputs sits behind [`AnimationTarget`];
//! [`CharacterRig`] records which inputs a given character exposes.

pub mod idle;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tokio_util::sync::CancellationToken;

use crate::config::LipSyncConfig;
use crate::error::{LipSyncError, Result};
use crate::viseme::NEUTRAL_VISEME;

pub use idle::IdleAnimator;

/// Delay between clearing and re-setting an action that is already active.
pub const RETRIGGER_DELAY: Duration = Duration::from_millis(100);

/// A named input on a named state machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateMachineInput {
    pub machine: String,
    pub input: String,
}

impl StateMachineInput {
    pub fn new(machine: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            input: input.into(),
        }
    }
}

impl std::fmt::Display for StateMachineInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.machine, self.input)
    }
}

/// Value held by a state-machine input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Number(f64),
    Bool(bool),
}

/// The animation runtime, as seen from lip-sync.
///
/// Writes are single-value, last-write-wins assignments; implementations use
/// interior mutability so a target can be shared across timers.
pub trait AnimationTarget: Send + Sync {
    /// Set a number input.
    fn set_number(&self, input: &StateMachineInput, value: f64) -> Result<()>;

    /// Set a boolean input.
    fn set_bool(&self, input: &StateMachineInput, value: bool) -> Result<()>;

    /// Current value of a number input, if it exists and has been set.
    fn number(&self, input: &StateMachineInput) -> Option<f64>;
}

/// Which state-machine inputs a character exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRig {
    pub name: String,
    /// Number input receiving viseme ids.
    pub viseme: Option<StateMachineInput>,
    /// Boolean input raised briefly to blink.
    pub blink: Option<StateMachineInput>,
    /// Boolean input raised briefly to nod the head down.
    pub head_down: Option<StateMachineInput>,
    /// Boolean input toggling the alternate eye style.
    pub joke: Option<StateMachineInput>,
    /// Number input selecting a canned body action.
    pub action: Option<StateMachineInput>,
}

impl CharacterRig {
    /// Preset names accepted by [`preset`](Self::preset).
    pub const PRESETS: [&'static str; 4] = ["thanos", "pico", "pico-v2", "eggni"];

    /// Built-in rig by name.
    pub fn preset(name: &str) -> Option<Self> {
        let rig = match name {
            "thanos" => Self {
                name: name.to_owned(),
                viseme: Some(StateMachineInput::new("mouth-movement", "viseme")),
                blink: Some(StateMachineInput::new("eye-movement", "blink")),
                head_down: Some(StateMachineInput::new("head-movement", "down")),
                joke: Some(StateMachineInput::new("eye-movement", "joke")),
                action: None,
            },
            "pico" | "eggni" => Self {
                name: name.to_owned(),
                viseme: Some(StateMachineInput::new("State Machine 1", "viseme")),
                blink: None,
                head_down: None,
                joke: None,
                action: None,
            },
            // Body actions only; its mouth is not rigged yet.
            "pico-v2" => Self {
                name: name.to_owned(),
                viseme: None,
                blink: None,
                head_down: None,
                joke: None,
                action: Some(StateMachineInput::new("movement", "actionId")),
            },
            _ => return None,
        };
        Some(rig)
    }

    /// Distinct state machines the rig touches, in first-use order.
    pub fn state_machines(&self) -> Vec<&str> {
        let mut machines: Vec<&str> = Vec::new();
        let inputs = [
            &self.viseme,
            &self.blink,
            &self.head_down,
            &self.joke,
            &self.action,
        ];
        for input in inputs.into_iter().flatten() {
            if !machines.contains(&input.machine.as_str()) {
                machines.push(&input.machine);
            }
        }
        machines
    }
}

/// The current viseme, shared between playback timers and the renderer.
///
/// Holds the last written id atomically and, when bound, forwards every
/// write to the rig's viseme input on an [`AnimationTarget`].
pub struct SharedVisemeInput {
    current: AtomicU8,
    binding: Option<(Arc<dyn AnimationTarget>, StateMachineInput)>,
}

impl std::fmt::Debug for SharedVisemeInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedVisemeInput")
            .field("current", &self.get())
            .field("input", &self.binding.as_ref().map(|(_, input)| input))
            .finish()
    }
}

impl Default for SharedVisemeInput {
    fn default() -> Self {
        Self::standalone()
    }
}

impl SharedVisemeInput {
    /// An unbound input; renderers poll [`get`](Self::get).
    pub fn standalone() -> Self {
        Self {
            current: AtomicU8::new(NEUTRAL_VISEME),
            binding: None,
        }
    }

    /// Forward writes to `input` on `target`.
    pub fn bound(target: Arc<dyn AnimationTarget>, input: StateMachineInput) -> Self {
        Self {
            current: AtomicU8::new(NEUTRAL_VISEME),
            binding: Some((target, input)),
        }
    }

    /// Bind to the viseme input of `rig`, or stay standalone if the rig has
    /// no mouth.
    pub fn for_rig(target: Arc<dyn AnimationTarget>, rig: &CharacterRig) -> Self {
        match &rig.viseme {
            Some(input) => Self::bound(target, input.clone()),
            None => {
                warn!(rig = %rig.name, "rig has no viseme input; visemes will not be rendered");
                Self::standalone()
            }
        }
    }

    pub fn get(&self) -> u8 {
        self.current.load(Ordering::Acquire)
    }

    /// Write a viseme id.
    ///
    /// # Errors
    ///
    /// Propagates a rejected write from the bound target. The local value is
    /// updated regardless.
    pub fn set(&self, viseme_id: u8) -> Result<()> {
        self.current.store(viseme_id, Ordering::Release);
        if let Some((target, input)) = &self.binding {
            target.set_number(input, f64::from(viseme_id))?;
        }
        Ok(())
    }
}

/// The configured character, bound to an animation target.
///
/// `visemes` is the playback sink; `idle` is present when `[idle] enabled`
/// is set and must be spawned by the caller.
pub struct CharacterBinding {
    pub rig: CharacterRig,
    pub visemes: Arc<SharedVisemeInput>,
    pub idle: Option<IdleAnimator>,
}

impl std::fmt::Debug for CharacterBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharacterBinding")
            .field("rig", &self.rig.name)
            .field("visemes", &self.visemes)
            .field("idle", &self.idle.is_some())
            .finish()
    }
}

impl CharacterBinding {
    /// Bind the `[character]` rig on `target`, with idle animation per
    /// `[idle]`. `cancel` stops the idle animator.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Config`] for an unknown rig name.
    pub fn from_config(
        target: Arc<dyn AnimationTarget>,
        config: &LipSyncConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let rig = CharacterRig::preset(&config.character.rig).ok_or_else(|| {
            LipSyncError::Config(format!("unknown character rig '{}'", config.character.rig))
        })?;
        let visemes = Arc::new(SharedVisemeInput::for_rig(Arc::clone(&target), &rig));
        let idle = config
            .idle
            .enabled
            .then(|| IdleAnimator::new(target, &rig, &config.idle, cancel));
        debug!(rig = %rig.name, idle = idle.is_some(), "character bound");
        Ok(Self { rig, visemes, idle })
    }
}

/// Trigger a canned action on the rig's action input.
///
/// If the input already holds `action_id` the state machine would not see a
/// change, so it is cleared first and re-set after [`RETRIGGER_DELAY`].
///
/// # Errors
///
/// Returns [`LipSyncError::Animation`] if the rig has no action input, or
/// propagates a rejected write.
pub async fn retrigger_action(
    target: &dyn AnimationTarget,
    rig: &CharacterRig,
    action_id: u32,
) -> Result<()> {
    let input = rig.action.as_ref().ok_or_else(|| {
        LipSyncError::Animation(format!("rig '{}' has no action input", rig.name))
    })?;
    let value = f64::from(action_id);
    if target.number(input) == Some(value) {
        debug!(%input, action_id, "action already active; retriggering");
        target.set_number(input, 0.0)?;
        tokio::time::sleep(RETRIGGER_DELAY).await;
    }
    target.set_number(input, value)
}

/// In-process [`AnimationTarget`] holding input values in a map.
///
/// Used headless (no renderer attached) and in tests; keeps a log of every
/// write in order.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<StateMachineInput, InputValue>,
    writes: Vec<(StateMachineInput, InputValue)>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of any input.
    pub fn value(&self, input: &StateMachineInput) -> Option<InputValue> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.values.get(input).copied())
    }

    /// Every write so far, oldest first.
    pub fn writes(&self) -> Vec<(StateMachineInput, InputValue)> {
        self.state
            .lock()
            .map(|s| s.writes.clone())
            .unwrap_or_default()
    }

    fn write(&self, input: &StateMachineInput, value: InputValue) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| LipSyncError::Animation(format!("target lock poisoned: {e}")))?;
        state.values.insert(input.clone(), value);
        state.writes.push((input.clone(), value));
        Ok(())
    }
}

impl AnimationTarget for MemoryTarget {
    fn set_number(&self, input: &StateMachineInput, value: f64) -> Result<()> {
        self.write(input, InputValue::Number(value))
    }

    fn set_bool(&self, input: &StateMachineInput, value: bool) -> Result<()> {
        self.write(input, InputValue::Bool(value))
    }

    fn number(&self, input: &StateMachineInput) -> Option<f64> {
        match self.value(input)? {
            InputValue::Number(n) => Some(n),
            InputValue::Bool(_) => None,
        }
    }
}
