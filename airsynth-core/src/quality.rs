//! # Tracking Quality Estimator
//!
//! A rough 0..1 "how well is this hand being tracked" signal per hand side,
//! for display only. It never influences whether a note is triggered.
//!
//! The score combines three things:
//! - stability: coefficient of variation of recent palm sizes
//! - freshness: time since the hand was last seen
//! - facing: whether the fingertips are closer to the camera than the knuckles
//!
//! and is exponentially smoothed frame to frame.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::landmarks::{index, Hand, HandSide};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Palm-size samples kept per side.
    pub window: usize,
    /// Below this many samples the raw score is zero.
    pub min_samples: usize,
    /// A side unseen for longer than this scores zero.
    pub stale_after_ms: f64,
    /// Coefficient of variation at which stability reaches zero.
    pub max_variation: f32,
    /// Knuckle-to-tip depth difference that counts as fully facing.
    pub facing_depth: f32,
    /// Weight of the previous smoothed value.
    pub smoothing: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            window: 30,
            min_samples: 3,
            stale_after_ms: 1200.0,
            max_variation: 0.08,
            facing_depth: 0.03,
            smoothing: 0.8,
        }
    }
}

/// Per-side tracking history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccuracyState {
    palm_sizes: VecDeque<f32>,
    last_seen_ms: Option<f64>,
    facing: f32,
    smoothed: f32,
}

impl AccuracyState {
    pub fn smoothed(&self) -> f32 {
        self.smoothed
    }

    pub fn sample_count(&self) -> usize {
        self.palm_sizes.len()
    }

    fn observe(&mut self, palm_size: f32, facing: f32, now_ms: f64, window: usize) {
        self.palm_sizes.push_back(palm_size);
        while self.palm_sizes.len() > window.max(1) {
            self.palm_sizes.pop_front();
        }
        self.last_seen_ms = Some(now_ms);
        self.facing = facing;
    }

    /// Unsmoothed score at `now_ms`.
    pub fn raw_score(&self, now_ms: f64, config: &QualityConfig) -> f32 {
        let Some(last_seen) = self.last_seen_ms else {
            return 0.0;
        };
        let elapsed = (now_ms - last_seen).max(0.0);
        if self.palm_sizes.len() < config.min_samples || elapsed > config.stale_after_ms {
            return 0.0;
        }

        let n = self.palm_sizes.len() as f32;
        let mean = self.palm_sizes.iter().sum::<f32>() / n;
        if mean <= f32::EPSILON {
            return 0.0;
        }
        let variance = self
            .palm_sizes
            .iter()
            .map(|s| (s - mean) * (s - mean))
            .sum::<f32>()
            / n;
        let cv = variance.sqrt() / mean;

        let stability = (1.0 - cv / config.max_variation).clamp(0.0, 1.0);
        let freshness = (1.0 - (elapsed / config.stale_after_ms) as f32).clamp(0.0, 1.0);
        stability * freshness * self.facing
    }
}

/// How squarely the palm faces the camera, 0..1.
pub fn facing_score(hand: &Hand, facing_depth: f32) -> f32 {
    let mcp_z = index::FINGER_MCPS
        .iter()
        .map(|&i| hand.point(i).z)
        .sum::<f32>()
        / index::FINGER_MCPS.len() as f32;
    let tip_z = index::TIPS.iter().map(|&i| hand.point(i).z).sum::<f32>()
        / index::TIPS.len() as f32;
    ((mcp_z - tip_z) / facing_depth.max(f32::EPSILON)).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Default)]
pub struct QualityEstimator {
    config: QualityConfig,
    states: [AccuracyState; 2],
}

impl QualityEstimator {
    pub fn new(config: QualityConfig) -> Self {
        Self {
            config,
            states: Default::default(),
        }
    }

    /// Records this frame's hands and advances both sides' smoothed scores.
    /// Returns `[left, right]`.
    pub fn update(&mut self, hands: &[Hand], now_ms: f64) -> [f32; 2] {
        let mut seen = [false; 2];
        for hand in hands {
            let slot = hand.side.slot();
            if seen[slot] {
                continue;
            }
            seen[slot] = true;
            let facing = facing_score(hand, self.config.facing_depth);
            self.states[slot].observe(hand.palm_size(), facing, now_ms, self.config.window);
        }

        let k = self.config.smoothing.clamp(0.0, 1.0);
        for state in self.states.iter_mut() {
            let raw = state.raw_score(now_ms, &self.config);
            state.smoothed = k * state.smoothed + (1.0 - k) * raw;
        }
        self.scores()
    }

    pub fn accuracy(&self, side: HandSide) -> f32 {
        self.states[side.slot()].smoothed
    }

    pub fn scores(&self) -> [f32; 2] {
        [self.states[0].smoothed, self.states[1].smoothed]
    }

    pub fn state(&self, side: HandSide) -> &AccuracyState {
        &self.states[side.slot()]
    }

    pub fn reset(&mut self) {
        self.states = Default::default();
    }
}
