//! # Musical Tuning Module
//!
//! Equal-temperament helpers for turning MIDI note numbers into oscillator
//! frequencies and readable note names.
//!
//! ## Features
//! - Full MIDI range (0..=127) note table with names and frequencies
//! - A4 = 440 Hz equal temperament
//! - Cent offsets for per-oscillator detune

use once_cell::sync::Lazy;

/// Concert pitch for MIDI note 69 (A4).
pub const A4_FREQUENCY: f32 = 440.0;
/// MIDI number of A4.
pub const A4_MIDI: u8 = 69;
/// Highest valid MIDI note number.
pub const MIDI_MAX: u8 = 127;

/// Represents a single musical note with its name and frequency.
#[derive(Debug, Clone)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

/// Statically computed notes for the whole MIDI range.
///
/// Computed once on first use. Octave numbering follows the usual
/// convention where middle C (MIDI 60) is C4.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    const NOTE_NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    (0..=MIDI_MAX)
        .map(|n| {
            let octave = n as i32 / 12 - 1;
            Note {
                name: format!("{}{}", NOTE_NAMES[n as usize % 12], octave),
                frequency: midi_to_frequency(n),
            }
        })
        .collect()
});

/// Converts a MIDI note number to its equal-temperament frequency.
///
/// `f = 440 · 2^((n − 69) / 12)`
///
/// # Arguments
/// * `note` - MIDI note number
///
/// # Returns
/// * Frequency in Hz
pub fn midi_to_frequency(note: u8) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf((note as f32 - A4_MIDI as f32) / 12.0)
}

/// Returns the note name for a MIDI number, e.g. 60 → "C4".
pub fn note_name(note: u8) -> Option<&'static str> {
    NOTES.get(note as usize).map(|n| n.name.as_str())
}

/// Frequency ratio for an offset in cents (100 cents = 1 semitone).
pub fn cents_to_ratio(cents: f32) -> f32 {
    2.0_f32.powf(cents / 1200.0)
}
