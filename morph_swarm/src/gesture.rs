//! Gesture signal extraction.
//!
//! Input is one hand's 21 landmarks in normalised image coordinates (x, y in
//! `0..1`, z a relative depth), or nothing when no hand is in view.  Output is
//! a [`GestureState`] snapshot that downstream consumers treat as immutable
//! until the next one arrives.

use crate::Point3;

pub const LANDMARK_COUNT: usize = 21;

/// Landmark index of the wrist.
pub const WRIST: usize = 0;

/// Landmark indices of the thumb, index, middle, ring and pinky tips.
pub const FINGERTIPS: [usize; 5] = [4, 8, 12, 16, 20];

/// Average wrist→fingertip distance of a closed fist.
const REACH_CLOSED: f32 = 0.15;
/// Average wrist→fingertip distance of a fully spread hand.
const REACH_OPEN: f32 = 0.45;

// ════════════════════════════════════════════════════════════════════════════
// HandLandmarks
// ════════════════════════════════════════════════════════════════════════════

/// The 21 tracked points of one hand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandLandmarks(pub [Point3; LANDMARK_COUNT]);

impl HandLandmarks {
    /// `None` unless exactly 21 points are supplied.
    pub fn from_slice(points: &[Point3]) -> Option<Self> {
        <[Point3; LANDMARK_COUNT]>::try_from(points).ok().map(HandLandmarks)
    }

    pub fn wrist(&self) -> Point3 { self.0[WRIST] }

    pub fn fingertips(&self) -> [Point3; 5] { FINGERTIPS.map(|i| self.0[i]) }

    /// A synthetic upright hand whose fingertips all lie `reach` from `wrist`.
    ///
    /// Fingers fan out upward (toward −y in image space); each finger's four
    /// joints are spaced along its ray.
    pub fn with_reach(wrist: Point3, reach: f32) -> Self {
        const JOINT_FRACTIONS: [f32; 4] = [0.35, 0.6, 0.8, 1.0];
        let mut pts = [wrist; LANDMARK_COUNT];
        for finger in 0..5 {
            let angle = -0.9 + finger as f32 * 0.45;
            let dir = Point3::new(angle.sin(), -angle.cos(), 0.0);
            for (j, frac) in JOINT_FRACTIONS.iter().enumerate() {
                pts[1 + finger * 4 + j] = wrist + dir * (reach * frac);
            }
        }
        HandLandmarks(pts)
    }
}

/// Hand openness in `[0, 1]`.
///
/// The mean Euclidean distance (depth included) from the wrist to the five
/// fingertips, rescaled from `[0.15, 0.45]` and clamped.
pub fn openness(hand: &HandLandmarks) -> f32 {
    let wrist = hand.wrist();
    let mean = hand.fingertips().iter().map(|tip| tip.distance(wrist)).sum::<f32>() / 5.0;
    ((mean - REACH_CLOSED) / (REACH_OPEN - REACH_CLOSED)).clamp(0.0, 1.0)
}

/// Inverse of the openness rescale, before clamping.
pub fn reach_for_openness(openness: f32) -> f32 {
    REACH_CLOSED + openness * (REACH_OPEN - REACH_CLOSED)
}

// ════════════════════════════════════════════════════════════════════════════
// GestureState
// ════════════════════════════════════════════════════════════════════════════

/// One frame's gesture reading.
///
/// `is_open == (openness > 0.5)` always holds.  When `detected` is false the
/// other fields carry no information and consumers substitute their own idle
/// intensity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureState {
    pub detected: bool,
    pub is_open:  bool,
    pub openness: f32,
}

impl GestureState {
    pub const NONE: GestureState = GestureState { detected: false, is_open: false, openness: 0.0 };

    /// A detected hand with the given openness (clamped).
    pub fn from_openness(openness: f32) -> Self {
        let openness = openness.clamp(0.0, 1.0);
        GestureState { detected: true, is_open: openness > 0.5, openness }
    }

    pub fn from_landmarks(hand: &HandLandmarks) -> Self {
        Self::from_openness(openness(hand))
    }
}

impl Default for GestureState {
    fn default() -> Self { GestureState::NONE }
}

// ════════════════════════════════════════════════════════════════════════════
// HandFrame / FrameGate
// ════════════════════════════════════════════════════════════════════════════

/// One camera frame as delivered by a hand tracker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandFrame {
    /// Capture time in microseconds; strictly increases per new frame.
    pub timestamp_us: u64,
    pub hand:         Option<HandLandmarks>,
}

/// Drops frames that were already processed.
///
/// Trackers are polled faster than the camera delivers, so the same frame is
/// often returned twice.  Only a strictly newer timestamp yields a state.
#[derive(Debug, Default)]
pub struct FrameGate {
    last_timestamp: Option<u64>,
}

impl FrameGate {
    pub fn new() -> Self { Self::default() }

    pub fn extract(&mut self, frame: &HandFrame) -> Option<GestureState> {
        if matches!(self.last_timestamp, Some(last) if frame.timestamp_us <= last) {
            return None;
        }
        self.last_timestamp = Some(frame.timestamp_us);
        Some(match &frame.hand {
            Some(hand) => GestureState::from_landmarks(hand),
            None       => GestureState::NONE,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const WRIST_AT: Point3 = Point3::new(0.5, 0.8, 0.0);

    #[test]
    fn synthetic_hand_has_exact_reach() {
        let hand = HandLandmarks::with_reach(WRIST_AT, 0.3);
        for tip in hand.fingertips() {
            assert!((tip.distance(WRIST_AT) - 0.3).abs() < 1e-6);
        }
    }

    #[test]
    fn openness_rescales_linearly() {
        assert!(openness(&HandLandmarks::with_reach(WRIST_AT, 0.15)).abs() < 1e-5);
        assert!((openness(&HandLandmarks::with_reach(WRIST_AT, 0.30)) - 0.5).abs() < 1e-5);
        assert!((openness(&HandLandmarks::with_reach(WRIST_AT, 0.45)) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn openness_clamps_both_ends() {
        assert_eq!(openness(&HandLandmarks::with_reach(WRIST_AT, 0.02)), 0.0);
        assert_eq!(openness(&HandLandmarks::with_reach(WRIST_AT, 0.9)), 1.0);
    }

    #[test]
    fn openness_counts_depth() {
        // Tips straight behind the wrist: only z differs.
        let mut pts = [WRIST_AT; LANDMARK_COUNT];
        for &i in &FINGERTIPS {
            pts[i] = WRIST_AT + Point3::new(0.0, 0.0, 0.3);
        }
        assert!((openness(&HandLandmarks(pts)) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn is_open_iff_openness_above_half() {
        for i in 0..=100 {
            let g = GestureState::from_openness(i as f32 / 100.0);
            assert_eq!(g.is_open, g.openness > 0.5, "openness {}", g.openness);
            assert!(g.detected);
        }
        assert!(!GestureState::from_openness(0.5).is_open);
    }

    #[test]
    fn reach_inverts_openness() {
        for o in [0.0, 0.25, 0.8, 1.0] {
            let hand = HandLandmarks::with_reach(WRIST_AT, reach_for_openness(o));
            assert!((openness(&hand) - o).abs() < 1e-5);
        }
    }

    #[test]
    fn from_slice_requires_21_points() {
        assert!(HandLandmarks::from_slice(&[Point3::ZERO; 20]).is_none());
        assert!(HandLandmarks::from_slice(&[Point3::ZERO; 21]).is_some());
    }

    #[test]
    fn no_hand_yields_none_state() {
        let mut gate = FrameGate::new();
        let s = gate.extract(&HandFrame { timestamp_us: 1, hand: None }).unwrap();
        assert_eq!(s, GestureState::NONE);
    }

    #[test]
    fn gate_skips_repeated_and_stale_frames() {
        let mut gate = FrameGate::new();
        let hand = Some(HandLandmarks::with_reach(WRIST_AT, 0.45));
        assert!(gate.extract(&HandFrame { timestamp_us: 100, hand }).is_some());
        assert!(gate.extract(&HandFrame { timestamp_us: 100, hand }).is_none());
        assert!(gate.extract(&HandFrame { timestamp_us: 90,  hand }).is_none());
        let next = gate.extract(&HandFrame { timestamp_us: 133, hand }).unwrap();
        assert!(next.is_open);
    }
}
