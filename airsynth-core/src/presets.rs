//! # Instrument Presets
//!
//! What each finger plays. A preset maps every finger of both hands to a
//! `NoteConfig` (a label, one or more MIDI notes and a display colour) and
//! carries the instrument category the synthesizer uses to pick its voicing.
//!
//! ## Features
//! - General MIDI style instrument categories
//! - Chord and drum-kit note library
//! - Built-in default library, or a JSON preset file
//! - `PresetSource` trait so the engine can be fed from anywhere

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::landmarks::{FingerName, HandSide};

/// Preset selected when nothing else is requested.
pub const DEFAULT_INSTRUMENT_ID: &str = "acoustic-grand-piano";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstrumentCategory {
    Piano,
    Chromatic,
    Organ,
    Guitar,
    Bass,
    Strings,
    Ensemble,
    Brass,
    Reed,
    Pipe,
    SynthLead,
    SynthPad,
    SynthFx,
    Ethnic,
    Percussive,
}

impl InstrumentCategory {
    /// Drum-like instruments get the short percussive envelope.
    pub fn is_percussive(&self) -> bool {
        matches!(self, InstrumentCategory::Percussive)
    }
}

/// The sound assigned to one finger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteConfig {
    /// Label shown to the player, e.g. "Am7" or "Kick".
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "notes")]
    pub midi_notes: Vec<u8>,
    /// CSS-style hex colour.
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerMapping {
    pub thumb: NoteConfig,
    pub index: NoteConfig,
    pub middle: NoteConfig,
    pub ring: NoteConfig,
    pub pinky: NoteConfig,
}

impl FingerMapping {
    pub fn get(&self, finger: FingerName) -> &NoteConfig {
        match finger {
            FingerName::Thumb => &self.thumb,
            FingerName::Index => &self.index,
            FingerName::Middle => &self.middle,
            FingerName::Ring => &self.ring,
            FingerName::Pinky => &self.pinky,
        }
    }

    fn iter(&self) -> impl Iterator<Item = &NoteConfig> {
        FingerName::ALL.into_iter().map(|f| self.get(f))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentPreset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: InstrumentCategory,
    /// General MIDI program number.
    #[serde(rename = "instrument", default)]
    pub program: u8,
    pub left: FingerMapping,
    pub right: FingerMapping,
}

impl InstrumentPreset {
    pub fn mapping(&self, side: HandSide) -> &FingerMapping {
        match side {
            HandSide::Left => &self.left,
            HandSide::Right => &self.right,
        }
    }
}

/// Lookup of notes and categories by instrument id.
pub trait PresetSource {
    fn resolve_note(
        &self,
        instrument_id: &str,
        side: HandSide,
        finger: FingerName,
    ) -> Option<NoteConfig>;

    fn category(&self, instrument_id: &str) -> Option<InstrumentCategory>;
}

/// Display colours used by the built-in presets.
pub mod colors {
    pub const RED: &str = "#FF6B6B";
    pub const CORAL: &str = "#FF8E72";
    pub const ORANGE: &str = "#FF9F43";
    pub const AMBER: &str = "#FECA57";
    pub const GREEN: &str = "#4ECDC4";
    pub const TEAL: &str = "#26A69A";
    pub const CYAN: &str = "#00BCD4";
    pub const SKY: &str = "#29B6F6";
    pub const BLUE: &str = "#42A5F5";
    pub const INDIGO: &str = "#5C6BC0";
    pub const PURPLE: &str = "#9B59B6";
    pub const VIOLET: &str = "#7E57C2";
    pub const MAGENTA: &str = "#E040FB";
    pub const PINK: &str = "#EC407A";
    pub const ROSE: &str = "#F48FB1";
    pub const BROWN: &str = "#8D6E63";
    pub const GOLD: &str = "#FFD54F";
    pub const NEON_CYAN: &str = "#00F5FF";
    pub const NEON_GREEN: &str = "#00FF87";
    pub const NEON_YELLOW: &str = "#FFE600";
    pub const NEON_PINK: &str = "#FF0080";
    pub const NEON_PURPLE: &str = "#8000FF";
}

/// Named chords, single notes and General MIDI drum-kit notes.
pub static CHORD_LIBRARY: Lazy<BTreeMap<&'static str, Vec<u8>>> = Lazy::new(|| {
    let mut lib: BTreeMap<&'static str, Vec<u8>> = BTreeMap::new();
    let chords: [(&str, &[u8]); 20] = [
        ("C", &[60, 64, 67]),
        ("D", &[62, 66, 69]),
        ("F", &[65, 69, 72]),
        ("G", &[67, 71, 74]),
        ("Dm", &[62, 65, 69]),
        ("Em", &[64, 67, 71]),
        ("Am", &[69, 72, 76]),
        ("C7", &[60, 64, 67, 70]),
        ("G7", &[67, 71, 74, 77]),
        ("Cmaj7", &[60, 64, 67, 71]),
        ("Fmaj7", &[65, 69, 72, 76]),
        ("Gmaj7", &[67, 71, 74, 78]),
        ("Dm7", &[62, 65, 69, 72]),
        ("Em7", &[64, 67, 71, 74]),
        ("Am7", &[69, 72, 76, 79]),
        ("Csus2", &[60, 62, 67]),
        ("Csus4", &[60, 65, 67]),
        ("Gsus4", &[67, 72, 74]),
        ("Cdim", &[60, 63, 66]),
        ("Caug", &[60, 64, 68]),
    ];
    for (name, notes) in chords {
        lib.insert(name, notes.to_vec());
    }

    let singles: [(&str, u8); 17] = [
        ("C4", 60),
        ("D4", 62),
        ("E4", 64),
        ("F4", 65),
        ("G4", 67),
        ("A4", 69),
        ("B4", 71),
        ("C5", 72),
        ("D5", 74),
        ("E5", 76),
        ("F5", 77),
        ("G5", 79),
        ("A5", 81),
        ("B5", 83),
        ("C6", 84),
        ("D6", 86),
        ("E6", 88),
    ];
    let drums: [(&str, u8); 10] = [
        ("Kick", 36),
        ("Snare", 38),
        ("Clap", 39),
        ("HiHat", 42),
        ("Tom1", 45),
        ("HiHatOpen", 46),
        ("Tom2", 47),
        ("Crash", 49),
        ("Ride", 51),
        ("Cowbell", 56),
    ];
    let bass: [(&str, u8); 7] = [
        ("BassC", 36),
        ("BassD", 38),
        ("BassE", 40),
        ("BassF", 41),
        ("BassG", 43),
        ("BassA", 45),
        ("BassB", 47),
    ];
    for (name, note) in singles.into_iter().chain(drums).chain(bass) {
        lib.insert(name, vec![note]);
    }
    lib
});

fn note(name: &str, color: &str) -> NoteConfig {
    NoteConfig {
        display_name: name.to_string(),
        midi_notes: CHORD_LIBRARY.get(name).cloned().unwrap_or_default(),
        color: color.to_string(),
    }
}

fn mapping(entries: [(&str, &str); 5]) -> FingerMapping {
    let [thumb, index, middle, ring, pinky] = entries.map(|(name, color)| note(name, color));
    FingerMapping {
        thumb,
        index,
        middle,
        ring,
        pinky,
    }
}

/// Left/right finger layouts shared by every preset of a category.
fn category_layout(category: InstrumentCategory) -> (FingerMapping, FingerMapping) {
    use colors::*;
    use InstrumentCategory::*;
    match category {
        Chromatic | Pipe => (
            mapping([("C5", CYAN), ("D5", SKY), ("E5", BLUE), ("F5", INDIGO), ("G5", VIOLET)]),
            mapping([("A5", PURPLE), ("B5", MAGENTA), ("C6", PINK), ("D6", ROSE), ("E6", CORAL)]),
        ),
        Bass => (
            mapping([
                ("BassC", INDIGO),
                ("BassD", BLUE),
                ("BassE", TEAL),
                ("BassF", GREEN),
                ("BassG", CYAN),
            ]),
            mapping([
                ("BassA", PURPLE),
                ("BassB", VIOLET),
                ("BassC", MAGENTA),
                ("BassD", PINK),
                ("BassE", ROSE),
            ]),
        ),
        SynthLead | Reed => (
            mapping([
                ("C5", NEON_CYAN),
                ("D5", NEON_GREEN),
                ("E5", NEON_YELLOW),
                ("F5", NEON_PINK),
                ("G5", NEON_PURPLE),
            ]),
            mapping([("A5", CYAN), ("B5", MAGENTA), ("C6", PINK), ("D6", VIOLET), ("E6", PURPLE)]),
        ),
        Strings | Ensemble | SynthPad | SynthFx => (
            mapping([("Cmaj7", GOLD), ("Gmaj7", AMBER), ("Fmaj7", ORANGE), ("Am7", CORAL), ("Em7", RED)]),
            mapping([("Dm7", ROSE), ("Csus2", PINK), ("Gsus4", MAGENTA), ("Csus4", PURPLE), ("Am", VIOLET)]),
        ),
        Percussive => (
            mapping([("Kick", RED), ("Snare", ORANGE), ("HiHat", AMBER), ("Tom1", GOLD), ("Tom2", BROWN)]),
            mapping([
                ("Crash", CYAN),
                ("Ride", TEAL),
                ("HiHatOpen", GREEN),
                ("Clap", BLUE),
                ("Cowbell", INDIGO),
            ]),
        ),
        Piano | Organ | Guitar | Brass | Ethnic => (
            mapping([("C", RED), ("G", GREEN), ("Am", BLUE), ("F", AMBER), ("Dm", PURPLE)]),
            mapping([("Em", PINK), ("C7", TEAL), ("G7", GOLD), ("Am7", VIOLET), ("Fmaj7", CYAN)]),
        ),
    }
}

static BUILTIN_PRESETS: Lazy<Vec<InstrumentPreset>> = Lazy::new(|| {
    use InstrumentCategory::*;
    let table: [(&str, &str, &str, InstrumentCategory, u8); 16] = [
        ("acoustic-grand-piano", "Acoustic Grand Piano", "Classic concert grand piano", Piano, 0),
        ("electric-piano-1", "Electric Piano 1", "Rhodes-style electric piano", Piano, 4),
        ("celesta", "Celesta", "Delicate bell-like keyboard", Chromatic, 8),
        ("marimba", "Marimba", "Wooden percussion marimba", Chromatic, 12),
        ("drawbar-organ", "Drawbar Organ", "Hammond-style drawbar organ", Organ, 16),
        ("overdriven-guitar", "Overdriven Guitar", "Crunchy overdriven guitar", Guitar, 29),
        ("electric-bass-finger", "Electric Bass (Finger)", "Fingerstyle electric bass", Bass, 33),
        ("violin", "Violin", "Solo violin", Strings, 40),
        ("string-ensemble-1", "String Ensemble 1", "Lush string section", Ensemble, 48),
        ("trumpet", "Trumpet", "Solo trumpet", Brass, 56),
        ("flute", "Flute", "Concert flute", Pipe, 73),
        ("lead-square", "Lead 1 (Square)", "Square wave lead", SynthLead, 80),
        ("pad-warm", "Pad 2 (Warm)", "Warm analog pad", SynthPad, 89),
        ("fx-atmosphere", "FX 4 (Atmosphere)", "Atmospheric texture", SynthFx, 99),
        ("taiko-drum", "Taiko Drum", "Japanese taiko", Percussive, 116),
        ("synth-drum", "Synth Drum", "Electronic synth drum", Percussive, 118),
    ];
    table
        .into_iter()
        .map(|(id, name, description, category, program)| {
            let (left, right) = category_layout(category);
            InstrumentPreset {
                id: id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                category,
                program,
                left,
                right,
            }
        })
        .collect()
});

/// An ordered set of presets, looked up by id.
#[derive(Debug, Clone, Default)]
pub struct PresetLibrary {
    presets: Vec<InstrumentPreset>,
}

impl PresetLibrary {
    pub fn builtin() -> Self {
        Self {
            presets: BUILTIN_PRESETS.clone(),
        }
    }

    pub fn from_presets(presets: Vec<InstrumentPreset>) -> Self {
        Self { presets }
    }

    /// Loads a JSON array of presets from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading preset file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("parsing preset file {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let presets: Vec<InstrumentPreset> = serde_json::from_str(json)?;
        for preset in &presets {
            let sides = [&preset.left, &preset.right];
            if let Some(bad) = sides
                .iter()
                .flat_map(|m| m.iter())
                .flat_map(|n| n.midi_notes.iter())
                .find(|&&n| n > crate::tuning::MIDI_MAX)
            {
                anyhow::bail!("preset '{}' uses out-of-range MIDI note {}", preset.id, bad);
            }
        }
        Ok(Self { presets })
    }

    pub fn get(&self, id: &str) -> Option<&InstrumentPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentPreset> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

impl PresetSource for PresetLibrary {
    fn resolve_note(
        &self,
        instrument_id: &str,
        side: HandSide,
        finger: FingerName,
    ) -> Option<NoteConfig> {
        self.get(instrument_id)
            .map(|p| p.mapping(side).get(finger).clone())
    }

    fn category(&self, instrument_id: &str) -> Option<InstrumentCategory> {
        self.get(instrument_id).map(|p| p.category)
    }
}
