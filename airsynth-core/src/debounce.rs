//! # Temporal Debouncer
//!
//! Turns the noisy per-frame raised/not-raised stream of every finger into
//! clean `Raised` / `Lowered` transitions. Raising needs a run of consecutive
//! raised frames; lowering happens on the first frame the finger is down or
//! its hand is gone.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::landmarks::{FingerKey, HandSide};
#[cfg(test)]
use crate::landmarks::FingerName;

/// Consecutive raised frames needed before a raise is confirmed.
pub const DEBOUNCE_FRAMES: u8 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub frames: u8,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            frames: DEBOUNCE_FRAMES,
        }
    }
}

/// Per-finger debounce state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebounceState {
    pub consecutive_raised: u8,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Raised,
    Lowered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub key: FingerKey,
    pub edge: Edge,
}

/// One step of the debounce state machine.
///
/// `observation` is the raw classifier output for the finger, or `None` when
/// the owning hand is not in the frame.
pub fn advance(
    state: DebounceState,
    observation: Option<bool>,
    frames: u8,
) -> (DebounceState, Option<Edge>) {
    match observation {
        Some(true) => {
            let consecutive_raised = state
                .consecutive_raised
                .saturating_add(1)
                .min(frames.saturating_add(1));
            if consecutive_raised >= frames && !state.confirmed {
                (
                    DebounceState {
                        consecutive_raised,
                        confirmed: true,
                    },
                    Some(Edge::Raised),
                )
            } else {
                (
                    DebounceState {
                        consecutive_raised,
                        ..state
                    },
                    None,
                )
            }
        }
        Some(false) | None => {
            let edge = state.confirmed.then_some(Edge::Lowered);
            (DebounceState::default(), edge)
        }
    }
}

/// Debounce state for all ten fingers.
#[derive(Debug, Clone)]
pub struct Debouncer {
    frames: u8,
    states: [DebounceState; FingerKey::COUNT],
}

impl Debouncer {
    pub fn new(config: &DebounceConfig) -> Self {
        Self {
            frames: config.frames.max(1),
            states: [DebounceState::default(); FingerKey::COUNT],
        }
    }

    /// Advances every finger by one frame.
    ///
    /// `observations` holds the raw classifier output of each visible hand.
    /// Sides not listed are treated as gone. If a side appears twice the first
    /// entry is used.
    pub fn update(&mut self, observations: &[(HandSide, [bool; 5])]) -> Vec<Transition> {
        let mut per_side: [Option<[bool; 5]>; 2] = [None, None];
        for (side, raised) in observations {
            let slot = &mut per_side[side.slot()];
            if slot.is_some() {
                debug!("Duplicate {} hand in frame, ignoring the second", side);
                continue;
            }
            *slot = Some(*raised);
        }

        let mut transitions = Vec::new();
        for key in FingerKey::all() {
            let observation = per_side[key.side.slot()].map(|r| r[key.finger.position()]);
            let slot = key.slot();
            let (next, edge) = advance(self.states[slot], observation, self.frames);
            self.states[slot] = next;
            if let Some(edge) = edge {
                transitions.push(Transition { key, edge });
            }
        }
        transitions
    }

    pub fn state(&self, key: FingerKey) -> DebounceState {
        self.states[key.slot()]
    }

    pub fn is_confirmed(&self, key: FingerKey) -> bool {
        self.states[key.slot()].confirmed
    }

    /// Keys currently confirmed raised, left hand first.
    pub fn confirmed_keys(&self) -> Vec<FingerKey> {
        FingerKey::all().filter(|k| self.is_confirmed(*k)).collect()
    }

    /// Drops a confirmation that produced no sound. No transition is
    /// emitted; a finger that is still up needs a full run to raise again.
    pub fn unconfirm(&mut self, key: FingerKey) {
        self.states[key.slot()] = DebounceState::default();
    }

    /// Forgets everything without emitting transitions.
    pub fn reset(&mut self) {
        self.states = [DebounceState::default(); FingerKey::COUNT];
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(&DebounceConfig::default())
    }
}

/// Classifier output with a single finger raised.
#[cfg(test)]
pub(crate) fn only(finger: FingerName) -> [bool; 5] {
    let mut raised = [false; 5];
    raised[finger.position()] = true;
    raised
}
