// airsynth-core/src/lib.rs

//! The core logic for the air synth.
//! This crate turns hand-landmark frames from an external tracker into
//! played notes: finger classification, debouncing, note routing and a
//! small polyphonic synthesizer. It is completely headless and contains
//! no camera or drawing code.

pub mod audio;
pub mod classifier;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod landmarks;
pub mod presets;
pub mod quality;
pub mod router;
pub mod synth;
pub mod tuning;

pub use config::EngineConfig;
pub use engine::{Engine, FrameReport};
pub use error::{EngineError, SynthError};
pub use landmarks::{FingerKey, FingerName, Hand, HandSide, Landmark, TrackedHand};
pub use presets::{PresetLibrary, PresetSource, DEFAULT_INSTRUMENT_ID};
pub use router::EngineEvent;
