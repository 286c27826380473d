//! # Engine
//!
//! Runs one frame of hand landmarks through the whole pipeline, always in
//! the same order: classify → debounce → route → synthesize, with the
//! tracking-quality estimate updated alongside.
//!
//! The engine owns every piece of per-finger state. Switching instrument,
//! going idle and shutting down all stop sounding voices and clear debounce
//! state before the next frame is processed.

use tracing::{debug, info, warn};

use crate::classifier::Classifier;
use crate::config::EngineConfig;
use crate::debounce::{Debouncer, Edge};
use crate::error::{EngineError, SynthError};
use crate::landmarks::{FingerKey, Hand, HandSide, LandmarkSmoother, TrackedHand};
use crate::presets::{PresetLibrary, PresetSource, DEFAULT_INSTRUMENT_ID};
use crate::quality::QualityEstimator;
use crate::router::{EngineEvent, GestureRouter, NoteHistory};
use crate::synth::graph::SharedGraph;
use crate::synth::Synth;

/// What happened during one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub events: Vec<EngineEvent>,
    /// Fingers confirmed raised after this frame.
    pub active: Vec<FingerKey>,
    /// Smoothed tracking quality, `[left, right]`.
    pub accuracy: [f32; 2],
    /// Hands dropped because the tracker output was malformed.
    pub rejected_hands: usize,
    /// Note-ons the synthesizer refused. Their fingers are not confirmed
    /// and produced no events.
    pub failed_notes: Vec<(FingerKey, SynthError)>,
}

pub struct Engine {
    config: EngineConfig,
    presets: Box<dyn PresetSource + Send>,
    instrument_id: String,
    classifier: Classifier,
    debouncer: Debouncer,
    router: GestureRouter,
    synth: Synth,
    quality: QualityEstimator,
    smoother: LandmarkSmoother,
    history: NoteHistory,
    volume: f32,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        presets: Box<dyn PresetSource + Send>,
        instrument_id: &str,
    ) -> Result<Self, EngineError> {
        let category = presets
            .category(instrument_id)
            .ok_or_else(|| EngineError::UnknownInstrument(instrument_id.to_string()))?;

        let volume = f32::from(config.volume_percent.min(100)) / 100.0;
        let mut synth = Synth::new(config.synth.clone());
        synth.set_instrument(category);
        synth.set_volume(volume);

        Ok(Self {
            classifier: Classifier::new(config.classifier.clone()),
            debouncer: Debouncer::new(&config.debounce),
            router: GestureRouter::new(),
            quality: QualityEstimator::new(config.quality.clone()),
            smoother: LandmarkSmoother::new(config.position_smoothing),
            history: NoteHistory::new(config.history_length),
            instrument_id: instrument_id.to_string(),
            presets,
            synth,
            volume,
            config,
        })
    }

    /// Engine on the built-in presets with the default instrument.
    pub fn with_builtin_presets(config: EngineConfig) -> Result<Self, EngineError> {
        Self::new(config, Box::new(PresetLibrary::builtin()), DEFAULT_INSTRUMENT_ID)
    }

    /// Attaches an audio graph at the output's sample rate.
    pub fn initialize_audio(&mut self, sample_rate: u32) -> SharedGraph {
        self.synth.initialize(sample_rate)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn synth(&self) -> &Synth {
        &self.synth
    }

    pub fn synth_mut(&mut self) -> &mut Synth {
        &mut self.synth
    }

    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    /// Validates raw tracker hands and processes them.
    pub fn process_frame(&mut self, hands: &[TrackedHand], timestamp_ms: f64) -> FrameReport {
        let mut valid = Vec::with_capacity(hands.len());
        let mut rejected = 0;
        for raw in hands {
            match Hand::try_from(raw) {
                Ok(hand) => valid.push(hand),
                Err(e) => {
                    debug!("Dropping tracked hand: {}", e);
                    rejected += 1;
                }
            }
        }
        let mut report = self.process_hands(&valid, timestamp_ms);
        report.rejected_hands = rejected;
        report
    }

    /// Processes one frame of already validated hands.
    pub fn process_hands(&mut self, hands: &[Hand], timestamp_ms: f64) -> FrameReport {
        let smoothed = self.smoother.update(hands);

        let observations: Vec<(HandSide, [bool; 5])> = hands
            .iter()
            .map(|hand| (hand.side, self.classifier.classify(hand)))
            .collect();
        let transitions = self.debouncer.update(&observations);

        let mut events = Vec::new();
        let mut failed_notes = Vec::new();
        for transition in &transitions {
            let key = transition.key;
            if transition.edge == Edge::Lowered {
                self.synth.note_off(key);
                events.push(self.router.route_lower(key));
                continue;
            }

            // A raise always comes from a hand in this frame.
            let Some(fingertip) = smoothed
                .iter()
                .find(|h| h.side == key.side)
                .map(|h| h.fingertip(key.finger))
            else {
                self.debouncer.unconfirm(key);
                continue;
            };

            let routed = self.router.route_raise(
                key,
                self.presets.as_ref(),
                &self.instrument_id,
                fingertip,
                timestamp_ms,
            );
            let Some(notes) = routed.iter().find_map(|e| match e {
                EngineEvent::NoteOn { notes, .. } => Some(notes),
                _ => None,
            }) else {
                self.debouncer.unconfirm(key);
                continue;
            };

            // Confirmed means sounding: a refused note-on takes the
            // confirmation back and the finger has to settle again.
            if let Err(e) = self.synth.note_on(key, notes, self.volume) {
                warn!("Note on for {} failed: {}", key, e);
                self.debouncer.unconfirm(key);
                failed_notes.push((key, e));
                continue;
            }

            for event in routed {
                if let EngineEvent::History(entry) = &event {
                    self.history.push(entry.clone());
                }
                events.push(event);
            }
        }

        let accuracy = self.quality.update(hands, timestamp_ms);

        FrameReport {
            events,
            active: self.debouncer.confirmed_keys(),
            accuracy,
            rejected_hands: 0,
            failed_notes,
        }
    }

    /// Switches instrument. Sounding voices are stopped and every finger has
    /// to be raised afresh.
    pub fn set_instrument(&mut self, instrument_id: &str) -> Result<(), EngineError> {
        let category = self
            .presets
            .category(instrument_id)
            .ok_or_else(|| EngineError::UnknownInstrument(instrument_id.to_string()))?;

        self.clear_performance();
        self.synth.set_instrument(category);
        self.instrument_id = instrument_id.to_string();
        info!("Instrument set to '{}' ({:?})", instrument_id, category);
        Ok(())
    }

    /// Volume in percent (0..=100), for the master bus and new voices.
    pub fn set_volume_percent(&mut self, percent: u8) {
        self.volume = f32::from(percent.min(100)) / 100.0;
        self.synth.set_volume(self.volume);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Leaves the playing state: everything stops, nothing stays confirmed.
    pub fn go_idle(&mut self) {
        self.clear_performance();
        info!("Engine idle");
    }

    /// Ends the session and releases audio resources.
    pub fn shutdown(&mut self) {
        self.clear_performance();
        self.synth.dispose();
        info!("Engine shut down");
    }

    fn clear_performance(&mut self) {
        self.synth.stop_all();
        self.debouncer.reset();
        self.smoother.reset();
    }

    /// Fingers currently confirmed raised.
    pub fn active_keys(&self) -> Vec<FingerKey> {
        self.debouncer.confirmed_keys()
    }

    /// Fingers with a sounding voice.
    pub fn sounding_keys(&self) -> Vec<FingerKey> {
        self.synth.active_keys()
    }

    pub fn accuracy(&self, side: HandSide) -> f32 {
        self.quality.accuracy(side)
    }

    pub fn smoothed_hand(&self, side: HandSide) -> Option<Hand> {
        self.smoother.get(side)
    }

    pub fn history(&self) -> &NoteHistory {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}
