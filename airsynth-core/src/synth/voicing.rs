//! Oscillator shapes and the instrument-category voicing table.

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::presets::InstrumentCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// One sample at `phase` in `[0, 1)`, amplitude in `[-1, 1]`.
    pub fn sample(&self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

/// Attack/decay/release in seconds, sustain as a fraction of the voice volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f32,
    pub release: f64,
}

impl Envelope {
    pub const SUSTAINED: Envelope = Envelope {
        attack: 0.02,
        decay: 0.1,
        sustain: 0.3,
        release: 0.3,
    };

    pub const PERCUSSIVE: Envelope = Envelope {
        attack: 0.001,
        decay: 0.05,
        sustain: 0.2,
        release: 0.05,
    };
}

/// How a category sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voicing {
    pub waveform: Waveform,
    pub percussive: bool,
}

impl Voicing {
    pub fn for_category(category: InstrumentCategory) -> Self {
        use InstrumentCategory::*;
        let waveform = match category {
            Percussive => Waveform::Triangle,
            SynthLead => Waveform::Square,
            Strings | Ensemble | SynthPad => Waveform::Sine,
            Guitar | Bass => Waveform::Sawtooth,
            Piano | Chromatic | Organ | Brass | Reed | Pipe | SynthFx | Ethnic => {
                Waveform::Triangle
            }
        };
        Voicing {
            waveform,
            percussive: category.is_percussive(),
        }
    }
}

impl Default for Voicing {
    fn default() -> Self {
        Voicing::for_category(InstrumentCategory::Piano)
    }
}
