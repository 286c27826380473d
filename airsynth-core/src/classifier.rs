//! # Geometric Finger Classifier
//!
//! Decides, from one frame of landmarks, which fingers of a hand are raised.
//! Every threshold is scaled by the apparent palm size so the same hand gives
//! the same answer close to and far from the camera.
//!
//! ## Features
//! - Adaptive vertical threshold (`base × clamp(palm / reference, 0.5, 1.5)`)
//! - Thumb majority vote over four independent geometric checks
//! - All-criteria test for index, middle, ring and pinky
//!
//! Pure and deterministic: the same landmarks always produce the same output.

use serde::{Deserialize, Serialize};

use crate::landmarks::{centroid, cosine, distance, index, vector, FingerName, Hand};

/// Tunable constants for classification. The defaults are empirically chosen,
/// not derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Vertical margin (normalized units) a fingertip must clear above its PIP joint
    /// at the reference palm size.
    pub base_threshold: f32,
    /// Palm size at which `base_threshold` applies unscaled.
    pub reference_palm_size: f32,
    pub min_scale: f32,
    pub max_scale: f32,

    /// |CMC→TIP| / |CMC→MCP| must exceed this.
    pub thumb_extension_ratio: f32,
    /// |TIP→palm centre| must exceed this multiple of |CMC→palm centre|.
    pub thumb_away_ratio: f32,
    /// Cosine at the IP joint must be below this.
    pub thumb_straight_cosine: f32,
    /// |TIP→index MCP| must exceed this multiple of |MCP→index MCP|.
    pub thumb_index_clearance: f32,
    /// How many of the four thumb checks must pass.
    pub thumb_min_votes: usize,

    /// Minimum cosine between consecutive finger segments.
    pub min_segment_cosine: f32,
    /// |TIP→wrist| must exceed this multiple of |MCP→wrist|.
    pub tip_reach_ratio: f32,
    /// |TIP→MCP| must exceed this fraction of palm size.
    pub min_extension_palm_ratio: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_threshold: 0.015,
            reference_palm_size: 0.25,
            min_scale: 0.5,
            max_scale: 1.5,
            thumb_extension_ratio: 1.8,
            thumb_away_ratio: 1.2,
            thumb_straight_cosine: -0.2,
            thumb_index_clearance: 0.85,
            thumb_min_votes: 3,
            min_segment_cosine: -0.1,
            tip_reach_ratio: 0.9,
            min_extension_palm_ratio: 0.5,
        }
    }
}

impl ClassifierConfig {
    /// Scale factor applied to the base threshold for a given palm size.
    pub fn threshold_scale(&self, palm_size: f32) -> f32 {
        let reference = self.reference_palm_size.max(f32::EPSILON);
        (palm_size / reference).clamp(self.min_scale, self.max_scale)
    }

    /// Hand-size-adjusted vertical margin.
    pub fn adaptive_threshold(&self, palm_size: f32) -> f32 {
        self.base_threshold * self.threshold_scale(palm_size)
    }
}

/// Outcome of each thumb check, kept separately for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThumbChecks {
    pub extended: bool,
    pub pointing_away: bool,
    pub straight: bool,
    pub clear_of_index: bool,
}

impl ThumbChecks {
    pub fn votes(&self) -> usize {
        [
            self.extended,
            self.pointing_away,
            self.straight,
            self.clear_of_index,
        ]
        .iter()
        .filter(|&&v| v)
        .count()
    }
}

/// Classifies the five fingers of a hand.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Raised state for each finger, ordered thumb, index, middle, ring, pinky.
    pub fn classify(&self, hand: &Hand) -> [bool; 5] {
        let palm = hand.palm_size();
        let threshold = self.config.adaptive_threshold(palm);

        let mut raised = [false; 5];
        for finger in FingerName::ALL {
            raised[finger.position()] = match finger {
                FingerName::Thumb => self.thumb_raised(hand),
                _ => self.finger_raised(hand, finger, palm, threshold),
            };
        }
        raised
    }

    pub fn thumb_raised(&self, hand: &Hand) -> bool {
        self.thumb_checks(hand).votes() >= self.config.thumb_min_votes
    }

    pub fn thumb_checks(&self, hand: &Hand) -> ThumbChecks {
        let cfg = &self.config;
        let cmc = hand.point(index::THUMB_CMC);
        let mcp = hand.point(index::THUMB_MCP);
        let ip = hand.point(index::THUMB_IP);
        let tip = hand.point(index::THUMB_TIP);
        let index_mcp = hand.point(index::INDEX_MCP);

        let palm_center = centroid(&[
            index_mcp,
            hand.point(index::PINKY_MCP),
            hand.point(index::WRIST),
        ]);

        let base_len = distance(&cmc, &mcp).max(f32::EPSILON);
        let extended = distance(&cmc, &tip) / base_len > cfg.thumb_extension_ratio;

        let pointing_away =
            distance(&tip, &palm_center) > cfg.thumb_away_ratio * distance(&cmc, &palm_center);

        let straight = cosine(vector(&ip, &mcp), vector(&ip, &tip)) < cfg.thumb_straight_cosine;

        let clear_of_index =
            distance(&tip, &index_mcp) > cfg.thumb_index_clearance * distance(&mcp, &index_mcp);

        ThumbChecks {
            extended,
            pointing_away,
            straight,
            clear_of_index,
        }
    }

    fn finger_raised(&self, hand: &Hand, finger: FingerName, palm: f32, threshold: f32) -> bool {
        let cfg = &self.config;
        // MCP, PIP, DIP, TIP are consecutive.
        let tip_idx = finger.tip();
        let mcp = hand.point(tip_idx - 3);
        let pip = hand.point(tip_idx - 2);
        let dip = hand.point(tip_idx - 1);
        let tip = hand.point(tip_idx);
        let wrist = hand.point(index::WRIST);

        let above_pip = tip.y < pip.y - threshold;
        if !above_pip {
            return false;
        }

        let lower = vector(&mcp, &pip);
        let middle = vector(&pip, &dip);
        let upper = vector(&dip, &tip);
        let uncurled = cosine(lower, middle) >= cfg.min_segment_cosine
            && cosine(middle, upper) >= cfg.min_segment_cosine;

        let reaches_out = distance(&tip, &wrist) > cfg.tip_reach_ratio * distance(&mcp, &wrist);
        let long_enough = distance(&tip, &mcp) > cfg.min_extension_palm_ratio * palm;

        uncurled && reaches_out && long_enough
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::landmarks::{HandSide, Landmark, LANDMARK_COUNT};

    const MCPS: [(f32, f32); 4] = [(0.43, 0.57), (0.5, 0.55), (0.57, 0.57), (0.63, 0.60)];

    fn set_finger(lm: &mut [Landmark; LANDMARK_COUNT], finger: usize, raised: bool) {
        let (mx, my) = MCPS[finger];
        let base = 5 + finger * 4;
        let offsets: [f32; 4] = if raised {
            [0.0, -0.08, -0.14, -0.19]
        } else {
            [0.0, -0.06, -0.02, 0.01]
        };
        for (k, dy) in offsets.iter().enumerate() {
            lm[base + k] = Landmark::new(mx, my + dy, 0.0);
        }
    }

    fn set_thumb(lm: &mut [Landmark; LANDMARK_COUNT], points: [(f32, f32); 4]) {
        for (k, (x, y)) in points.iter().enumerate() {
            lm[1 + k] = Landmark::new(*x, *y, 0.0);
        }
    }

    pub(crate) const THUMB_OUT: [(f32, f32); 4] =
        [(0.44, 0.75), (0.38, 0.70), (0.33, 0.66), (0.28, 0.62)];
    pub(crate) const THUMB_TUCKED: [(f32, f32); 4] =
        [(0.44, 0.75), (0.40, 0.70), (0.42, 0.65), (0.46, 0.66)];

    /// Builds a hand with palm size 0.25 and the given raised pattern.
    pub(crate) fn hand_with(side: HandSide, raised: [bool; 5]) -> Hand {
        let mut lm = [Landmark::default(); LANDMARK_COUNT];
        lm[index::WRIST] = Landmark::new(0.5, 0.8, 0.0);
        set_thumb(&mut lm, if raised[0] { THUMB_OUT } else { THUMB_TUCKED });
        for finger in 0..4 {
            set_finger(&mut lm, finger, raised[finger + 1]);
        }
        Hand::new(side, lm)
    }

    fn hand_with_thumb(points: [(f32, f32); 4]) -> Hand {
        let mut hand = hand_with(HandSide::Right, [false; 5]);
        set_thumb(&mut hand.landmarks, points);
        hand
    }

    #[test]
    fn open_hand_raises_everything() {
        let hand = hand_with(HandSide::Left, [true; 5]);
        assert!((hand.palm_size() - 0.25).abs() < 1e-6);
        assert_eq!(Classifier::default().classify(&hand), [true; 5]);
    }

    #[test]
    fn fist_raises_nothing() {
        let hand = hand_with(HandSide::Right, [false; 5]);
        assert_eq!(Classifier::default().classify(&hand), [false; 5]);
    }

    #[test]
    fn mixed_pattern() {
        let pattern = [false, true, false, true, false];
        let hand = hand_with(HandSide::Right, pattern);
        assert_eq!(Classifier::default().classify(&hand), pattern);
    }

    #[test]
    fn thumb_all_checks_pass_when_extended() {
        let checks = Classifier::default().thumb_checks(&hand_with_thumb(THUMB_OUT));
        assert_eq!(checks.votes(), 4);
    }

    #[test]
    fn thumb_tucked_fails_all_checks() {
        let checks = Classifier::default().thumb_checks(&hand_with_thumb(THUMB_TUCKED));
        assert_eq!(checks.votes(), 0);
    }

    #[test]
    fn thumb_three_of_four_is_raised() {
        // Bent at the IP joint; the other three checks still hold.
        let hand = hand_with_thumb([(0.44, 0.75), (0.38, 0.70), (0.30, 0.72), (0.28, 0.62)]);
        let classifier = Classifier::default();
        let checks = classifier.thumb_checks(&hand);
        assert!(!checks.straight);
        assert_eq!(checks.votes(), 3);
        assert!(classifier.thumb_raised(&hand));
    }

    #[test]
    fn thumb_two_of_four_is_not_raised() {
        // Long proximal segment breaks the extension ratio, bend breaks straightness.
        let hand = hand_with_thumb([(0.44, 0.75), (0.36, 0.66), (0.30, 0.72), (0.28, 0.62)]);
        let classifier = Classifier::default();
        let checks = classifier.thumb_checks(&hand);
        assert!(!checks.extended);
        assert!(!checks.straight);
        assert!(checks.pointing_away);
        assert!(checks.clear_of_index);
        assert!(!classifier.thumb_raised(&hand));
    }

    #[test]
    fn threshold_scales_with_palm_size() {
        let cfg = ClassifierConfig::default();
        assert!((cfg.threshold_scale(0.125) - 0.5).abs() < 1e-6);
        assert!((cfg.adaptive_threshold(0.125) - 0.0075).abs() < 1e-7);
        assert!((cfg.threshold_scale(0.25) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn threshold_scale_is_clamped() {
        let cfg = ClassifierConfig::default();
        assert_eq!(cfg.threshold_scale(0.025), 0.5);
        assert_eq!(cfg.threshold_scale(0.0), 0.5);
        assert_eq!(cfg.threshold_scale(0.5), 1.5);
    }

    #[test]
    fn small_hand_uses_the_scaled_threshold() {
        // Half-size fist, so palm size 0.125 and threshold 0.0075.
        let mut hand = hand_with(HandSide::Left, [false; 5]);
        let wrist = hand.point(index::WRIST);
        for lm in hand.landmarks.iter_mut() {
            *lm = wrist.lerp(lm, 0.5);
        }
        assert!((hand.palm_size() - 0.125).abs() < 1e-6);

        // Straight index finger whose tip clears the PIP by only 0.01.
        let mcp = hand.point(index::INDEX_MCP);
        for (k, dy) in [0.06, 0.065, 0.07].iter().enumerate() {
            hand.landmarks[index::INDEX_PIP + k] = Landmark::new(mcp.x, mcp.y - dy, 0.0);
        }

        assert!(Classifier::default().classify(&hand)[1]);

        let unscaled = Classifier::new(ClassifierConfig {
            min_scale: 1.0,
            max_scale: 1.0,
            ..ClassifierConfig::default()
        });
        assert!(!unscaled.classify(&hand)[1]);
    }

    #[test]
    fn finger_pointing_down_is_not_raised() {
        let mut hand = hand_with(HandSide::Left, [false, true, false, false, false]);
        // Flip the index finger below its knuckle.
        for (k, dy) in [0.0, 0.08, 0.14, 0.19].iter().enumerate() {
            hand.landmarks[5 + k] = Landmark::new(0.43, 0.57 + dy, 0.0);
        }
        assert!(!Classifier::default().classify(&hand)[1]);
    }

    #[test]
    fn hooked_finger_is_not_raised() {
        let mut hand = hand_with(HandSide::Left, [false, true, false, false, false]);
        // Tip above PIP but DIP folded back towards the palm.
        hand.landmarks[index::INDEX_PIP] = Landmark::new(0.43, 0.49, 0.0);
        hand.landmarks[index::INDEX_DIP] = Landmark::new(0.43, 0.53, 0.0);
        hand.landmarks[index::INDEX_TIP] = Landmark::new(0.43, 0.45, 0.0);
        assert!(!Classifier::default().classify(&hand)[1]);
    }

    #[test]
    fn degenerate_hand_does_not_panic() {
        let hand = Hand::new(HandSide::Left, [Landmark::new(0.5, 0.5, 0.0); LANDMARK_COUNT]);
        assert_eq!(Classifier::default().classify(&hand), [false; 5]);
    }
}
