//! # Gesture Router
//!
//! Maps confirmed finger transitions to what should happen because of them:
//! note commands for the synthesizer, plus particle and history events for
//! whoever is drawing the screen.

use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

use crate::landmarks::{FingerKey, FingerName, HandSide, Landmark};
use crate::presets::PresetSource;

/// Normalized screen position, already mirrored for a selfie view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn mirrored(landmark: &Landmark) -> Self {
        Self {
            x: 1.0 - landmark.x,
            y: landmark.y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticleSpawn {
    pub position: ScreenPoint,
    pub color: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub display_name: String,
    pub side: HandSide,
    pub finger: FingerName,
    pub color: String,
    pub timestamp_ms: f64,
}

/// Everything the engine reports for a frame, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EngineEvent {
    NoteOn { key: FingerKey, notes: Vec<u8> },
    NoteOff { key: FingerKey },
    Particle(ParticleSpawn),
    History(HistoryEntry),
}

#[derive(Debug, Default)]
pub struct GestureRouter {
    next_history_id: u64,
}

impl GestureRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events for a confirmed raise: note-on, a particle at the fingertip,
    /// then a history entry.
    ///
    /// # Arguments
    /// * `key` - Finger that was raised
    /// * `presets` - Note lookup
    /// * `instrument_id` - Active instrument
    /// * `fingertip` - Where the raised fingertip is this frame
    /// * `timestamp_ms` - Frame time
    ///
    /// # Returns
    /// * The three events, or nothing when the instrument has no mapping
    ///   for the finger
    pub fn route_raise(
        &mut self,
        key: FingerKey,
        presets: &dyn PresetSource,
        instrument_id: &str,
        fingertip: Landmark,
        timestamp_ms: f64,
    ) -> Vec<EngineEvent> {
        let Some(note) = presets.resolve_note(instrument_id, key.side, key.finger) else {
            warn!("No note mapped for {} on '{}'", key, instrument_id);
            return Vec::new();
        };

        let id = self.next_history_id;
        self.next_history_id += 1;
        vec![
            EngineEvent::NoteOn {
                key,
                notes: note.midi_notes.clone(),
            },
            EngineEvent::Particle(ParticleSpawn {
                position: ScreenPoint::mirrored(&fingertip),
                color: note.color.clone(),
                display_name: note.display_name.clone(),
            }),
            EngineEvent::History(HistoryEntry {
                id,
                display_name: note.display_name,
                side: key.side,
                finger: key.finger,
                color: note.color,
                timestamp_ms,
            }),
        ]
    }

    /// A lowered finger only ever stops its note.
    pub fn route_lower(&self, key: FingerKey) -> EngineEvent {
        EngineEvent::NoteOff { key }
    }
}

/// The most recent played notes, newest first.
#[derive(Debug, Clone)]
pub struct NoteHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl NoteHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
