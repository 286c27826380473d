//! # Audio Graph
//!
//! The render side of the synthesizer: a set of oscillator nodes, each with
//! its own automated gain, summed into a master gain and a soft limiter.
//! The graph owns the audio clock; time only advances as samples are
//! rendered, so every scheduled ramp and stop is sample accurate.
//!
//! ## Features
//! - Node capacity limit (`SynthError::VoiceLimit`)
//! - Scheduled oscillator stop with automatic reclamation
//! - Suspend/resume (a suspended graph renders silence and holds its clock)
//! - Recording taps that receive every rendered block

use crossbeam_channel::{Sender, TrySendError};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::param::AudioParam;
use super::voicing::Waveform;
use crate::error::SynthError;
use crate::tuning::cents_to_ratio;

pub type NodeId = u64;

/// Graph shared between the control side and the audio callback.
pub type SharedGraph = Arc<Mutex<AudioGraph>>;

/// Locks the graph, recovering it if a previous holder panicked.
pub fn lock(graph: &SharedGraph) -> MutexGuard<'_, AudioGraph> {
    graph.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f32,
    pub detune_cents: f32,
    phase: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32, detune_cents: f32) -> Self {
        Self {
            waveform,
            frequency,
            detune_cents,
            phase: 0.0,
        }
    }

    /// Frequency after detune.
    pub fn effective_frequency(&self) -> f32 {
        self.frequency * cents_to_ratio(self.detune_cents)
    }

    fn next_sample(&mut self, step: f32) -> f32 {
        let s = self.waveform.sample(self.phase);
        self.phase = (self.phase + step).fract();
        s
    }
}

#[derive(Debug, Clone)]
pub struct VoiceNode {
    pub oscillator: Oscillator,
    pub gain: AudioParam,
    pub start_time: f64,
    pub stop_time: Option<f64>,
}

impl VoiceNode {
    fn is_playing(&self, t: f64) -> bool {
        t >= self.start_time && self.stop_time.is_none_or(|stop| t < stop)
    }
}

#[derive(Debug)]
pub struct AudioGraph {
    sample_rate: u32,
    frames_rendered: u64,
    nodes: BTreeMap<NodeId, VoiceNode>,
    next_id: NodeId,
    max_nodes: usize,
    master_gain: f32,
    suspended: bool,
    taps: Vec<Sender<Vec<f32>>>,
    scratch: Vec<f32>,
}

impl AudioGraph {
    pub fn new(sample_rate: u32, max_nodes: usize) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            frames_rendered: 0,
            nodes: BTreeMap::new(),
            next_id: 0,
            max_nodes,
            master_gain: 1.0,
            suspended: false,
            taps: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn shared(self) -> SharedGraph {
        Arc::new(Mutex::new(self))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current position of the audio clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Free node slots.
    pub fn available(&self) -> usize {
        self.max_nodes.saturating_sub(self.nodes.len())
    }

    pub fn add_node(&mut self, oscillator: Oscillator, gain: AudioParam) -> Result<NodeId, SynthError> {
        if self.suspended {
            return Err(SynthError::Suspended);
        }
        if self.available() == 0 {
            return Err(SynthError::VoiceLimit {
                requested: 1,
                available: 0,
            });
        }
        let id = self.next_id;
        self.next_id += 1;
        let start_time = self.current_time();
        self.nodes.insert(
            id,
            VoiceNode {
                oscillator,
                gain,
                start_time,
                stop_time: None,
            },
        );
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&VoiceNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut VoiceNode> {
        self.nodes.get_mut(&id)
    }

    /// Removes a node immediately, without a release tail.
    pub fn remove_node(&mut self, id: NodeId) {
        self.nodes.remove(&id);
    }

    /// Nodes with a stop scheduled, i.e. release tails.
    pub fn released_count(&self) -> usize {
        self.nodes.values().filter(|n| n.stop_time.is_some()).count()
    }

    /// Removes up to `count` release tails, earliest stop first, and returns
    /// how many were removed.
    pub fn evict_released(&mut self, count: usize) -> usize {
        let mut released: Vec<(f64, NodeId)> = self
            .nodes
            .iter()
            .filter_map(|(id, node)| node.stop_time.map(|stop| (stop, *id)))
            .collect();
        released.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let evicted = released.len().min(count);
        for (_, id) in released.into_iter().take(evicted) {
            self.nodes.remove(&id);
        }
        evicted
    }

    pub fn stop_node_at(&mut self, id: NodeId, time: f64) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.stop_time = Some(time);
        }
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain;
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Attaches a receiver for rendered master output. Blocks are dropped
    /// rather than stalling the renderer when the receiver falls behind.
    pub fn add_tap(&mut self, tap: Sender<Vec<f32>>) {
        self.taps.push(tap);
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    /// Stops everything and detaches all taps. The graph stays suspended.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.taps.clear();
        self.suspended = true;
    }

    /// Renders `out.len()` mono frames and advances the clock.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.suspended {
            out.fill(0.0);
            return;
        }

        let sr = self.sample_rate as f64;
        let inv_sr = 1.0 / self.sample_rate as f32;

        for (i, sample) in out.iter_mut().enumerate() {
            let t = (self.frames_rendered + i as u64) as f64 / sr;
            let mut mix = 0.0;
            for node in self.nodes.values_mut() {
                if !node.is_playing(t) {
                    continue;
                }
                let step = node.oscillator.effective_frequency() * inv_sr;
                mix += node.oscillator.next_sample(step) * node.gain.value_at(t);
            }
            // Soft limiter on the master bus.
            *sample = (mix * self.master_gain).tanh();
        }

        self.frames_rendered += out.len() as u64;
        let now = self.current_time();
        self.nodes
            .retain(|_, node| node.stop_time.is_none_or(|stop| stop > now));

        if !self.taps.is_empty() {
            self.taps.retain(|tap| match tap.try_send(out.to_vec()) {
                Err(TrySendError::Disconnected(_)) => false,
                _ => true,
            });
        }
    }

    /// Renders into an interleaved buffer, copying the mono mix to every channel.
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frames = data.len() / channels;
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(frames, 0.0);
        self.render(&mut scratch);
        for (frame, value) in data.chunks_mut(channels).zip(scratch.iter()) {
            frame.fill(*value);
        }
        self.scratch = scratch;
    }
}
