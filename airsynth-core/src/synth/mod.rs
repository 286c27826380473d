//! # Voice Manager
//!
//! Polyphonic synthesizer keyed by finger. Each raised finger owns at most
//! one voice; a voice is one oscillator per MIDI note in the finger's chord,
//! each with its own attack/decay/sustain/release gain envelope.
//!
//! ## Features
//! - Equal-temperament oscillators with per-note detune spread
//! - Linear attack, exponential decay to sustain, exponential release
//! - Atomic voice creation (either every oscillator starts or none do)
//! - Instrument category selects waveform and envelope shape
//! - Recording tap on the master output
//!
//! The synthesizer does nothing audible until `initialize` attaches an
//! audio graph. Volume and instrument choices made before that are kept and
//! applied once the graph exists.

pub mod graph;
pub mod param;
pub mod voicing;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::SynthError;
use crate::landmarks::FingerKey;
use crate::presets::InstrumentCategory;
use crate::tuning::{midi_to_frequency, MIDI_MAX};
use graph::{lock, AudioGraph, NodeId, Oscillator, SharedGraph};
use param::AudioParam;
use voicing::{Envelope, Voicing};

/// Synthesizer tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub sustained: Envelope,
    pub percussive: Envelope,
    /// Spread between adjacent oscillators of a chord, in cents.
    pub detune_cents: f32,
    /// Attack peak as a fraction of the voice volume.
    pub peak_level: f32,
    /// Exponential ramps cannot reach zero; they stop here instead.
    pub envelope_floor: f32,
    /// Extra time after the release before the oscillator is stopped.
    pub stop_margin: f64,
    /// Maximum simultaneous oscillators, including release tails.
    pub max_oscillators: usize,
    /// Blocks buffered per recording tap before new ones are dropped.
    pub tap_capacity: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sustained: Envelope::SUSTAINED,
            percussive: Envelope::PERCUSSIVE,
            detune_cents: 5.0,
            peak_level: 0.5,
            envelope_floor: 0.001,
            stop_margin: 0.01,
            max_oscillators: 64,
            tap_capacity: 256,
        }
    }
}

/// A sounding finger.
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    pub notes: Vec<u8>,
    pub nodes: Vec<NodeId>,
    release: f64,
}

#[derive(Debug)]
pub struct Synth {
    config: SynthConfig,
    graph: Option<SharedGraph>,
    voices: HashMap<FingerKey, Voice>,
    voicing: Voicing,
    volume: f32,
}

impl Synth {
    pub fn new(config: SynthConfig) -> Self {
        Self {
            config,
            graph: None,
            voices: HashMap::new(),
            voicing: Voicing::default(),
            volume: 0.3,
        }
    }

    /// Creates the audio graph at the output's sample rate. Calling it again
    /// returns the existing graph.
    pub fn initialize(&mut self, sample_rate: u32) -> SharedGraph {
        if let Some(graph) = &self.graph {
            return graph.clone();
        }
        let mut graph = AudioGraph::new(sample_rate, self.config.max_oscillators);
        graph.set_master_gain(self.volume);
        let graph = graph.shared();
        info!("Synthesizer initialized at {} Hz", sample_rate);
        self.graph = Some(graph.clone());
        graph
    }

    pub fn is_initialized(&self) -> bool {
        self.graph.is_some()
    }

    pub fn graph(&self) -> Option<SharedGraph> {
        self.graph.clone()
    }

    pub fn voicing(&self) -> Voicing {
        self.voicing
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn envelope(&self) -> Envelope {
        if self.voicing.percussive {
            self.config.percussive
        } else {
            self.config.sustained
        }
    }

    /// Starts a voice for `key`, replacing any voice it already has.
    ///
    /// # Arguments
    /// * `key` - Finger that owns the voice
    /// * `notes` - MIDI notes, one oscillator each
    /// * `volume` - Voice level in `[0, 1]`
    ///
    /// # Returns
    /// * `Ok(())` - Every oscillator was scheduled
    /// * `Err(e)` - Nothing was scheduled and no voice was registered
    pub fn note_on(&mut self, key: FingerKey, notes: &[u8], volume: f32) -> Result<(), SynthError> {
        let graph = self.graph.clone().ok_or(SynthError::NotInitialized)?;
        if notes.is_empty() {
            return Err(SynthError::EmptyChord);
        }
        if let Some(&bad) = notes.iter().find(|&&n| n > MIDI_MAX) {
            return Err(SynthError::InvalidNote(bad));
        }

        self.note_off(key);

        let envelope = self.envelope();
        let volume = volume.clamp(0.0, 1.0);
        let peak = volume * self.config.peak_level;
        let sustain = (volume * envelope.sustain).max(self.config.envelope_floor);
        let waveform = self.voicing.waveform;
        let count = notes.len();

        let mut g = lock(&graph);
        if g.is_suspended() {
            return Err(SynthError::Suspended);
        }
        // Release tails give way to new voices, oldest first. Only sounding
        // voices can make the graph full.
        if g.available() < count && g.available() + g.released_count() >= count {
            let needed = count - g.available();
            let evicted = g.evict_released(needed);
            debug!("Cut {} release tails to make room for {}", evicted, key);
        }
        if g.available() < count {
            return Err(SynthError::VoiceLimit {
                requested: count,
                available: g.available(),
            });
        }

        let now = g.current_time();
        let mut nodes = Vec::with_capacity(count);
        for (i, &note) in notes.iter().enumerate() {
            let detune = (i as f32 - count as f32 / 2.0) * self.config.detune_cents;
            let oscillator = Oscillator::new(waveform, midi_to_frequency(note), detune);

            let mut gain = AudioParam::new(0.0);
            gain.set_value_at_time(0.0, now);
            gain.linear_ramp_to_value_at_time(peak, now + envelope.attack);
            gain.exponential_ramp_to_value_at_time(sustain, now + envelope.attack + envelope.decay);

            match g.add_node(oscillator, gain) {
                Ok(id) => nodes.push(id),
                Err(e) => {
                    for id in nodes {
                        g.remove_node(id);
                    }
                    return Err(e);
                }
            }
        }
        drop(g);

        debug!("Voice on {} ({} oscillators)", key, count);
        self.voices.insert(
            key,
            Voice {
                notes: notes.to_vec(),
                nodes,
                release: envelope.release,
            },
        );
        Ok(())
    }

    /// Releases the voice for `key`. Unknown keys are ignored.
    pub fn note_off(&mut self, key: FingerKey) {
        let Some(voice) = self.voices.remove(&key) else {
            return;
        };
        let Some(graph) = &self.graph else {
            return;
        };

        let mut g = lock(graph);
        let now = g.current_time();
        let stop_at = now + voice.release + self.config.stop_margin;
        for id in voice.nodes {
            if let Some(node) = g.node_mut(id) {
                node.gain.hold_at(now);
                node.gain
                    .exponential_ramp_to_value_at_time(self.config.envelope_floor, now + voice.release);
            }
            g.stop_node_at(id, stop_at);
        }
        debug!("Voice off {}", key);
    }

    pub fn stop_all(&mut self) {
        let keys: Vec<FingerKey> = self.voices.keys().copied().collect();
        for key in keys {
            self.note_off(key);
        }
    }

    /// Master output level, clamped to `[0, 1]`.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(graph) = &self.graph {
            lock(graph).set_master_gain(self.volume);
        }
    }

    pub fn set_instrument(&mut self, category: InstrumentCategory) {
        self.voicing = Voicing::for_category(category);
        debug!(
            "Voicing for {:?}: {:?}, percussive={}",
            category, self.voicing.waveform, self.voicing.percussive
        );
    }

    pub fn suspend(&mut self) {
        if let Some(graph) = &self.graph {
            lock(graph).suspend();
        }
    }

    pub fn resume(&mut self) {
        if let Some(graph) = &self.graph {
            lock(graph).resume();
        }
    }

    pub fn is_active(&self, key: FingerKey) -> bool {
        self.voices.contains_key(&key)
    }

    pub fn voice(&self, key: FingerKey) -> Option<&Voice> {
        self.voices.get(&key)
    }

    /// Sounding keys, left hand first.
    pub fn active_keys(&self) -> Vec<FingerKey> {
        let mut keys: Vec<FingerKey> = self.voices.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Returns a receiver of rendered master output blocks. Live playback is
    /// unaffected by whether anyone reads from it.
    pub fn recording_tap(&mut self) -> Option<Receiver<Vec<f32>>> {
        let graph = self.graph.as_ref()?;
        let (tx, rx) = crossbeam_channel::bounded(self.config.tap_capacity);
        lock(graph).add_tap(tx);
        Some(rx)
    }

    /// Silences everything and releases the graph. The synthesizer can be
    /// initialized again afterwards.
    pub fn dispose(&mut self) {
        self.voices.clear();
        if let Some(graph) = self.graph.take() {
            lock(&graph).clear();
            info!("Synthesizer disposed");
        }
    }
}

impl Default for Synth {
    fn default() -> Self {
        Self::new(SynthConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::graph::SharedGraph;
    use super::voicing::Waveform;
    use super::*;
    use crate::landmarks::{FingerName, HandSide};

    const LEFT_THUMB: FingerKey = FingerKey::new(HandSide::Left, FingerName::Thumb);
    const RIGHT_INDEX: FingerKey = FingerKey::new(HandSide::Right, FingerName::Index);
    const RATE: u32 = 48_000;

    fn ready() -> (Synth, SharedGraph) {
        let mut synth = Synth::default();
        let graph = synth.initialize(RATE);
        (synth, graph)
    }

    fn advance(graph: &SharedGraph, seconds: f64) {
        let mut buf = vec![0.0; (seconds * RATE as f64).round() as usize];
        lock(graph).render(&mut buf);
    }

    #[test]
    fn calls_before_initialize_are_harmless() {
        let mut synth = Synth::default();
        assert_eq!(
            synth.note_on(LEFT_THUMB, &[60], 0.5),
            Err(SynthError::NotInitialized)
        );
        synth.note_off(LEFT_THUMB);
        synth.stop_all();
        synth.set_volume(0.8);
        synth.set_instrument(InstrumentCategory::SynthLead);
        assert!(synth.recording_tap().is_none());

        // Remembered for when the graph appears.
        let graph = synth.initialize(RATE);
        assert!((lock(&graph).master_gain() - 0.8).abs() < 1e-6);
        assert_eq!(synth.voicing().waveform, Waveform::Square);
    }

    #[test]
    fn chord_creates_one_detuned_oscillator_per_note() {
        let (mut synth, graph) = ready();
        synth.note_on(LEFT_THUMB, &[60, 64, 67], 0.3).unwrap();

        let voice = synth.voice(LEFT_THUMB).unwrap();
        assert_eq!(voice.nodes.len(), 3);
        let g = lock(&graph);
        let detunes: Vec<f32> = voice
            .nodes
            .iter()
            .map(|id| g.node(*id).unwrap().oscillator.detune_cents)
            .collect();
        assert_eq!(detunes, vec![-7.5, -2.5, 2.5]);
        let first = &g.node(voice.nodes[0]).unwrap().oscillator;
        assert!((first.frequency - midi_to_frequency(60)).abs() < 1e-3);
        assert_eq!(first.waveform, Waveform::Triangle);
    }

    #[test]
    fn envelope_shape() {
        let (mut synth, graph) = ready();
        advance(&graph, 0.5);
        synth.note_on(LEFT_THUMB, &[69], 0.4).unwrap();

        let id = synth.voice(LEFT_THUMB).unwrap().nodes[0];
        let g = lock(&graph);
        let gain = &g.node(id).unwrap().gain;
        let t0 = 0.5;
        assert_eq!(gain.value_at(t0), 0.0);
        assert!((gain.value_at(t0 + 0.01) - 0.1).abs() < 1e-4);
        assert!((gain.value_at(t0 + 0.02) - 0.2).abs() < 1e-5);
        // Sustain is volume × 0.3.
        assert!((gain.value_at(t0 + 0.12) - 0.12).abs() < 1e-5);
        assert!((gain.value_at(t0 + 5.0) - 0.12).abs() < 1e-5);
    }

    #[test]
    fn percussive_envelope_and_floor() {
        let (mut synth, graph) = ready();
        synth.set_instrument(InstrumentCategory::Percussive);
        synth.note_on(RIGHT_INDEX, &[36], 0.0).unwrap();
        let id = synth.voice(RIGHT_INDEX).unwrap().nodes[0];
        {
            let g = lock(&graph);
            let gain = &g.node(id).unwrap().gain;
            // Silent voice: attack peak 0 and decay target clamped to the floor.
            assert_eq!(gain.value_at(0.0005), 0.0);
            assert!(gain.value_at(1.0) <= 0.001 + 1e-6);
        }
        synth.note_off(RIGHT_INDEX);
        let g = lock(&graph);
        let stop = g.node(id).unwrap().stop_time.unwrap();
        assert!((stop - (0.05 + 0.01)).abs() < 1e-9);
    }

    #[test]
    fn retrigger_keeps_a_single_voice() {
        let (mut synth, graph) = ready();
        synth.note_on(LEFT_THUMB, &[60, 64, 67], 0.3).unwrap();
        let old = synth.voice(LEFT_THUMB).unwrap().nodes.clone();
        advance(&graph, 0.05);
        synth.note_on(LEFT_THUMB, &[60, 64, 67], 0.3).unwrap();

        assert_eq!(synth.active_keys(), vec![LEFT_THUMB]);
        let new = &synth.voice(LEFT_THUMB).unwrap().nodes;
        assert!(new.iter().all(|id| !old.contains(id)));
        let g = lock(&graph);
        for id in &old {
            let stop = g.node(*id).unwrap().stop_time.unwrap();
            assert!((stop - (0.05 + 0.3 + 0.01)).abs() < 1e-6);
        }
        assert_eq!(g.node_count(), 6);
    }

    #[test]
    fn release_ramps_down_and_reclaims() {
        let (mut synth, graph) = ready();
        synth.note_on(LEFT_THUMB, &[60], 0.5).unwrap();
        let id = synth.voice(LEFT_THUMB).unwrap().nodes[0];
        advance(&graph, 0.2);
        synth.note_off(LEFT_THUMB);
        assert!(!synth.is_active(LEFT_THUMB));
        {
            let g = lock(&graph);
            let gain = &g.node(id).unwrap().gain;
            assert!((gain.value_at(0.2) - 0.15).abs() < 1e-5);
            assert!((gain.value_at(0.5) - 0.001).abs() < 1e-6);
        }
        advance(&graph, 0.32);
        assert_eq!(lock(&graph).node_count(), 0);
    }

    #[test]
    fn note_off_is_idempotent() {
        let (mut synth, graph) = ready();
        synth.note_on(LEFT_THUMB, &[60], 0.5).unwrap();
        synth.note_off(LEFT_THUMB);
        let stop_first = {
            let g = lock(&graph);
            let id = *g.node_ids().first().unwrap();
            g.node(id).unwrap().stop_time
        };
        synth.note_off(LEFT_THUMB);
        synth.note_off(RIGHT_INDEX);
        let g = lock(&graph);
        let id = *g.node_ids().first().unwrap();
        assert_eq!(g.node(id).unwrap().stop_time, stop_first);
        assert!(synth.active_keys().is_empty());
    }

    #[test]
    fn stop_all_releases_everything() {
        let (mut synth, _graph) = ready();
        synth.note_on(LEFT_THUMB, &[60, 64, 67], 0.3).unwrap();
        synth.note_on(RIGHT_INDEX, &[60, 64, 67, 70], 0.3).unwrap();
        assert_eq!(synth.active_keys(), vec![LEFT_THUMB, RIGHT_INDEX]);
        synth.stop_all();
        assert!(synth.active_keys().is_empty());
        synth.stop_all();
    }

    #[test]
    fn voice_creation_is_all_or_nothing() {
        let mut synth = Synth::new(SynthConfig {
            max_oscillators: 4,
            ..SynthConfig::default()
        });
        let graph = synth.initialize(RATE);
        synth.note_on(LEFT_THUMB, &[60, 64, 67], 0.3).unwrap();

        let err = synth.note_on(RIGHT_INDEX, &[60, 64, 67], 0.3).unwrap_err();
        assert_eq!(
            err,
            SynthError::VoiceLimit {
                requested: 3,
                available: 1
            }
        );
        assert!(!synth.is_active(RIGHT_INDEX));
        assert_eq!(lock(&graph).node_count(), 3);
    }

    #[test]
    fn release_tails_make_room_for_new_voices() {
        let mut synth = Synth::new(SynthConfig {
            max_oscillators: 4,
            ..SynthConfig::default()
        });
        let graph = synth.initialize(RATE);
        synth.note_on(LEFT_THUMB, &[60, 64, 67], 0.3).unwrap();
        let tails = synth.voice(LEFT_THUMB).unwrap().nodes.clone();
        synth.note_off(LEFT_THUMB);

        synth.note_on(RIGHT_INDEX, &[60, 64, 67], 0.3).unwrap();
        let g = lock(&graph);
        assert_eq!(g.node_count(), 4);
        assert!(g.node(tails[0]).is_none());
        assert!(g.node(tails[1]).is_none());
        assert!(g.node(tails[2]).is_some());
    }

    #[test]
    fn invalid_and_empty_chords_are_rejected() {
        let (mut synth, graph) = ready();
        assert_eq!(
            synth.note_on(LEFT_THUMB, &[60, 130], 0.3),
            Err(SynthError::InvalidNote(130))
        );
        assert_eq!(synth.note_on(LEFT_THUMB, &[], 0.3), Err(SynthError::EmptyChord));
        assert_eq!(lock(&graph).node_count(), 0);
        assert!(synth.active_keys().is_empty());
    }

    #[test]
    fn suspended_output_rejects_new_voices() {
        let (mut synth, _graph) = ready();
        synth.suspend();
        assert_eq!(
            synth.note_on(LEFT_THUMB, &[60], 0.3),
            Err(SynthError::Suspended)
        );
        synth.resume();
        assert!(synth.note_on(LEFT_THUMB, &[60], 0.3).is_ok());
    }

    #[test]
    fn volume_is_clamped() {
        let (mut synth, graph) = ready();
        synth.set_volume(3.0);
        assert_eq!(lock(&graph).master_gain(), 1.0);
        synth.set_volume(-1.0);
        assert_eq!(synth.volume(), 0.0);
    }

    #[test]
    fn recording_tap_sees_output() {
        let (mut synth, graph) = ready();
        let rx = synth.recording_tap().unwrap();
        synth.note_on(LEFT_THUMB, &[69], 1.0).unwrap();
        advance(&graph, 0.05);
        let block = rx.try_recv().unwrap();
        assert_eq!(block.len(), 2400);
        assert!(block.iter().any(|s| s.abs() > 0.01));
    }

    #[test]
    fn dispose_releases_the_graph() {
        let (mut synth, graph) = ready();
        synth.note_on(LEFT_THUMB, &[60], 0.3).unwrap();
        synth.dispose();
        assert!(!synth.is_initialized());
        assert!(synth.active_keys().is_empty());
        assert_eq!(lock(&graph).node_count(), 0);
        assert_eq!(
            synth.note_on(LEFT_THUMB, &[60], 0.3),
            Err(SynthError::NotInitialized)
        );
    }
}
