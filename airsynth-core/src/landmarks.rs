//! # Hand Landmark Model
//!
//! Types for the 21-point hand skeleton produced by an external hand tracker,
//! the identity of a single finger on a single hand (`FingerKey`), and the
//! explicit smoothing state used for on-screen positions.
//!
//! ## Features
//! - Fixed anatomical landmark indices (wrist, thumb CMC..TIP, finger MCP..TIP)
//! - Validation of raw tracker output into a well-formed `Hand`
//! - Planar geometry helpers shared by the classifier and quality estimator
//! - `LandmarkSmoother` with an explicit `reset()`

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Number of landmarks in one hand skeleton.
pub const LANDMARK_COUNT: usize = 21;

/// Anatomical landmark indices.
pub mod index {
    pub const WRIST: usize = 0;

    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;

    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;

    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;

    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;

    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;

    /// Fingertips in thumb..pinky order.
    pub const TIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];
    /// Knuckles of the four non-thumb fingers.
    pub const FINGER_MCPS: [usize; 4] = [INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];
}

/// A single tracked point. `x` and `y` are normalized to the camera frame,
/// `z` is depth relative to the wrist (smaller is closer to the camera).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Linear interpolation towards `other`.
    pub fn lerp(&self, other: &Landmark, t: f32) -> Landmark {
        Landmark {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

/// Which hand a skeleton belongs to, as labelled by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandSide {
    #[serde(alias = "left", alias = "LEFT")]
    Left,
    #[serde(alias = "right", alias = "RIGHT")]
    Right,
}

impl HandSide {
    pub const ALL: [HandSide; 2] = [HandSide::Left, HandSide::Right];

    /// Parses a tracker label, ignoring case.
    pub fn from_label(label: &str) -> Option<Self> {
        if label.eq_ignore_ascii_case("left") {
            Some(HandSide::Left)
        } else if label.eq_ignore_ascii_case("right") {
            Some(HandSide::Right)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HandSide::Left => "left",
            HandSide::Right => "right",
        }
    }

    pub(crate) fn slot(&self) -> usize {
        match self {
            HandSide::Left => 0,
            HandSide::Right => 1,
        }
    }
}

impl fmt::Display for HandSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerName {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl FingerName {
    /// Thumb..pinky, matching the order of classifier output.
    pub const ALL: [FingerName; 5] = [
        FingerName::Thumb,
        FingerName::Index,
        FingerName::Middle,
        FingerName::Ring,
        FingerName::Pinky,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FingerName::Thumb => "thumb",
            FingerName::Index => "index",
            FingerName::Middle => "middle",
            FingerName::Ring => "ring",
            FingerName::Pinky => "pinky",
        }
    }

    pub fn position(&self) -> usize {
        match self {
            FingerName::Thumb => 0,
            FingerName::Index => 1,
            FingerName::Middle => 2,
            FingerName::Ring => 3,
            FingerName::Pinky => 4,
        }
    }

    /// Landmark index of this finger's tip.
    pub fn tip(&self) -> usize {
        index::TIPS[self.position()]
    }
}

impl fmt::Display for FingerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one finger on one hand. Stable across frames and used as the
/// key for debounce state and sounding voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FingerKey {
    pub side: HandSide,
    pub finger: FingerName,
}

impl FingerKey {
    /// Total number of distinct keys (two hands, five fingers).
    pub const COUNT: usize = 10;

    pub const fn new(side: HandSide, finger: FingerName) -> Self {
        Self { side, finger }
    }

    /// Dense index in `0..FingerKey::COUNT`, left hand first.
    pub fn slot(&self) -> usize {
        self.side.slot() * 5 + self.finger.position()
    }

    pub fn from_slot(slot: usize) -> Option<Self> {
        let side = *HandSide::ALL.get(slot / 5)?;
        let finger = *FingerName::ALL.get(slot % 5)?;
        Some(Self::new(side, finger))
    }

    pub fn all() -> impl Iterator<Item = FingerKey> {
        (0..Self::COUNT).filter_map(Self::from_slot)
    }
}

impl fmt::Display for FingerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.side, self.finger)
    }
}

/// A hand as delivered by the tracker, before validation.
///
/// Reading is lenient so that one broken hand never costs the whole frame:
/// an unrecognised label becomes `None` and a missing or `null` x/y becomes
/// NaN, both of which `Hand::try_from` then rejects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackedHand {
    #[serde(default, deserialize_with = "lenient_handedness")]
    pub handedness: Option<HandSide>,
    #[serde(default, deserialize_with = "lenient_landmarks")]
    pub landmarks: Vec<Landmark>,
}

fn lenient_handedness<'de, D>(deserializer: D) -> Result<Option<HandSide>, D::Error>
where
    D: Deserializer<'de>,
{
    let label = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(label
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(HandSide::from_label))
}

#[derive(Deserialize)]
struct LenientLandmark {
    #[serde(default)]
    x: Option<f32>,
    #[serde(default)]
    y: Option<f32>,
    #[serde(default)]
    z: Option<f32>,
}

fn lenient_landmarks<'de, D>(deserializer: D) -> Result<Vec<Landmark>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Option<LenientLandmark>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|point| match point {
            Some(p) => Landmark::new(
                p.x.unwrap_or(f32::NAN),
                p.y.unwrap_or(f32::NAN),
                p.z.unwrap_or(0.0),
            ),
            None => Landmark::new(f32::NAN, f32::NAN, 0.0),
        })
        .collect())
}

/// A validated hand skeleton for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    pub side: HandSide,
    pub landmarks: [Landmark; LANDMARK_COUNT],
}

/// Why a tracked hand was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedHand {
    MissingHandedness,
    WrongLandmarkCount(usize),
    NonFiniteCoordinate(usize),
}

impl fmt::Display for MalformedHand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedHand::MissingHandedness => write!(f, "hand has no handedness label"),
            MalformedHand::WrongLandmarkCount(n) => {
                write!(f, "expected {} landmarks, got {}", LANDMARK_COUNT, n)
            }
            MalformedHand::NonFiniteCoordinate(i) => {
                write!(f, "landmark {} has a non-finite coordinate", i)
            }
        }
    }
}

impl TryFrom<&TrackedHand> for Hand {
    type Error = MalformedHand;

    fn try_from(raw: &TrackedHand) -> Result<Self, Self::Error> {
        let side = raw.handedness.ok_or(MalformedHand::MissingHandedness)?;
        let landmarks: [Landmark; LANDMARK_COUNT] = raw
            .landmarks
            .as_slice()
            .try_into()
            .map_err(|_| MalformedHand::WrongLandmarkCount(raw.landmarks.len()))?;
        if let Some(i) = landmarks.iter().position(|l| !l.is_finite()) {
            return Err(MalformedHand::NonFiniteCoordinate(i));
        }
        Ok(Hand { side, landmarks })
    }
}

impl Hand {
    pub fn new(side: HandSide, landmarks: [Landmark; LANDMARK_COUNT]) -> Self {
        Self { side, landmarks }
    }

    #[inline]
    pub fn point(&self, i: usize) -> Landmark {
        self.landmarks[i]
    }

    pub fn fingertip(&self, finger: FingerName) -> Landmark {
        self.landmarks[finger.tip()]
    }

    /// Wrist to middle-finger knuckle, the reference length for
    /// hand-size-relative thresholds.
    pub fn palm_size(&self) -> f32 {
        distance(&self.point(index::WRIST), &self.point(index::MIDDLE_MCP))
    }
}

// ── Planar geometry ────────────────────────────────────────

/// Distance in the image plane. Depth is ignored.
#[inline]
pub fn distance(a: &Landmark, b: &Landmark) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Image-plane vector from `a` to `b`.
#[inline]
pub fn vector(a: &Landmark, b: &Landmark) -> [f32; 2] {
    [b.x - a.x, b.y - a.y]
}

/// Cosine of the angle between two planar vectors. Returns 0 when either
/// vector is degenerate.
pub fn cosine(u: [f32; 2], v: [f32; 2]) -> f32 {
    let nu = (u[0] * u[0] + u[1] * u[1]).sqrt();
    let nv = (v[0] * v[0] + v[1] * v[1]).sqrt();
    if nu < f32::EPSILON || nv < f32::EPSILON {
        return 0.0;
    }
    (u[0] * v[0] + u[1] * v[1]) / (nu * nv)
}

/// Arithmetic mean of a set of landmarks.
pub fn centroid(points: &[Landmark]) -> Landmark {
    if points.is_empty() {
        return Landmark::default();
    }
    let n = points.len() as f32;
    let (x, y, z) = points
        .iter()
        .fold((0.0, 0.0, 0.0), |(x, y, z), p| (x + p.x, y + p.y, z + p.z));
    Landmark::new(x / n, y / n, z / n)
}

// ── Smoothing ──────────────────────────────────────────────

/// Exponential smoothing of landmark positions, per hand side.
///
/// Only used for display positions (particle spawn points, skeleton). The
/// raised/not-raised decision always works on the raw landmarks.
#[derive(Debug, Clone)]
pub struct LandmarkSmoother {
    /// 0.0 follows the input exactly, values near 1.0 lag heavily.
    smoothing: f32,
    cache: [Option<[Landmark; LANDMARK_COUNT]>; 2],
}

impl LandmarkSmoother {
    pub fn new(smoothing: f32) -> Self {
        Self {
            smoothing: smoothing.clamp(0.0, 0.99),
            cache: [None, None],
        }
    }

    /// Feeds this frame's hands and returns their smoothed skeletons.
    /// Sides that are absent from the frame forget their history.
    pub fn update(&mut self, hands: &[Hand]) -> Vec<Hand> {
        let t = 1.0 - self.smoothing;
        let mut seen = [false; 2];
        let mut out = Vec::with_capacity(hands.len());

        for hand in hands {
            let slot = hand.side.slot();
            if seen[slot] {
                continue;
            }
            seen[slot] = true;

            let next = match &self.cache[slot] {
                Some(prev) => {
                    let mut blended = *prev;
                    for (b, raw) in blended.iter_mut().zip(hand.landmarks.iter()) {
                        *b = b.lerp(raw, t);
                    }
                    blended
                }
                None => hand.landmarks,
            };
            self.cache[slot] = Some(next);
            out.push(Hand::new(hand.side, next));
        }

        for (slot, present) in seen.iter().enumerate() {
            if !present {
                self.cache[slot] = None;
            }
        }
        out
    }

    pub fn get(&self, side: HandSide) -> Option<Hand> {
        self.cache[side.slot()].map(|landmarks| Hand::new(side, landmarks))
    }

    pub fn reset(&mut self) {
        self.cache = [None, None];
    }
}

impl Default for LandmarkSmoother {
    fn default() -> Self {
        Self::new(0.5)
    }
}
