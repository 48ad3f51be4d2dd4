//! Gesture → drone parameter mapping.

use morph_swarm::GestureState;

/// Intensity used when no hand is detected, so the drone still breathes.
///
/// Deliberately not the visual idle value (0.0).
pub const AUDIO_IDLE_INTENSITY: f32 = 0.1;

pub const CUTOFF_MIN_HZ: f32 = 150.0;
pub const CUTOFF_MAX_HZ: f32 = 6000.0;
pub const GAIN_MIN: f32 = 0.3;
pub const GAIN_MAX: f32 = 0.6;

/// Time constant of every parameter move.
pub const SMOOTHING_SECS: f32 = 0.1;

/// Intensity that drives the audio: raw openness with a hand, else 0.1.
pub fn audio_intensity(gesture: &GestureState) -> f32 {
    if gesture.detected {
        gesture.openness
    } else {
        AUDIO_IDLE_INTENSITY
    }
}

/// Target values for the filter and master gain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DroneParams {
    pub cutoff_hz: f32,
    pub gain:      f32,
}

impl DroneParams {
    /// Cutoff rises with the square of intensity so brightness opens up
    /// evenly to the ear; gain is linear.
    pub fn from_intensity(intensity: f32) -> Self {
        let i = intensity.clamp(0.0, 1.0);
        DroneParams {
            cutoff_hz: CUTOFF_MIN_HZ + i * i * (CUTOFF_MAX_HZ - CUTOFF_MIN_HZ),
            gain:      GAIN_MIN + i * (GAIN_MAX - GAIN_MIN),
        }
    }

    pub fn from_gesture(gesture: &GestureState) -> Self {
        Self::from_intensity(audio_intensity(gesture))
    }
}

/// Anything that consumes drone parameters: the audio engine, a MIDI mirror.
pub trait ParamSink {
    fn apply(&mut self, params: DroneParams);

    /// Short label for status lines and logs.
    fn label(&self) -> &str;

    /// Start winding down without blocking.  The sink stays alive until
    /// [`is_released`](ParamSink::is_released) reports true.
    fn begin_release(&mut self) {}

    fn is_released(&self) -> bool { true }
}

// ════════════════════════════════════════════════════════════════════════════
// Smoother
// ════════════════════════════════════════════════════════════════════════════

/// First-order exponential approach toward a target.
///
/// After `τ` seconds the value has covered ~63% of the gap.  Retargeting
/// mid-approach continues from the current value, so there is never a jump.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Smoother {
    value:  f32,
    target: f32,
    tau:    f32,
}

impl Smoother {
    pub fn new(initial: f32, tau: f32) -> Self {
        Smoother { value: initial, target: initial, tau: tau.max(1e-6) }
    }

    pub fn set_target(&mut self, target: f32) { self.target = target; }

    pub fn target(&self) -> f32 { self.target }

    pub fn value(&self) -> f32 { self.value }

    /// Advance by `dt` seconds and return the new value.
    pub fn advance(&mut self, dt: f32) -> f32 {
        let k = 1.0 - (-dt.max(0.0) / self.tau).exp();
        self.value += (self.target - self.value) * k;
        self.value
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
