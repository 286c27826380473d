#![allow(dead_code)]

use airsynth_core::{HandSide, Landmark, TrackedHand};

const WRIST: (f32, f32) = (0.5, 0.8);
const MCPS: [(f32, f32); 4] = [(0.43, 0.57), (0.5, 0.55), (0.57, 0.57), (0.63, 0.60)];
const THUMB_OUT: [(f32, f32); 4] = [(0.44, 0.75), (0.38, 0.70), (0.33, 0.66), (0.28, 0.62)];
const THUMB_TUCKED: [(f32, f32); 4] = [(0.44, 0.75), (0.40, 0.70), (0.42, 0.65), (0.46, 0.66)];

/// A tracker hand with palm size 0.25 and the given fingers raised
/// (thumb, index, middle, ring, pinky).
pub fn tracked(side: HandSide, raised: [bool; 5]) -> TrackedHand {
    let mut landmarks = vec![Landmark::new(WRIST.0, WRIST.1, 0.0)];
    let thumb = if raised[0] { THUMB_OUT } else { THUMB_TUCKED };
    landmarks.extend(thumb.iter().map(|(x, y)| Landmark::new(*x, *y, -0.04)));
    for (finger, (mx, my)) in MCPS.iter().enumerate() {
        let offsets: [f32; 4] = if raised[finger + 1] {
            [0.0, -0.08, -0.14, -0.19]
        } else {
            [0.0, -0.06, -0.02, 0.01]
        };
        for (k, dy) in offsets.iter().enumerate() {
            let z = if k == 3 { -0.04 } else { 0.0 };
            landmarks.push(Landmark::new(*mx, my + dy, z));
        }
    }
    TrackedHand {
        handedness: Some(side),
        landmarks,
    }
}

pub fn only_thumb(side: HandSide) -> TrackedHand {
    tracked(side, [true, false, false, false, false])
}

pub fn fist(side: HandSide) -> TrackedHand {
    tracked(side, [false; 5])
}
