//! The particle swarm.
//!
//! A fixed pool of positions is created once and never resized.  Every frame
//! each particle computes an instantaneous target and moves a constant
//! fraction of the way there:
//!
//! ```text
//! base    = targets[i mod N] + jitter(±0.01)
//! scaled  = base × breathing            (breathing ≠ 1 only with no hand)
//! target  = scaled
//!         + drift(t, i) × intensity
//!         + normalize(scaled) × intensity^1.5 × explosion_scale
//! pos    += (target − pos) × damping
//! ```
//!
//! The easing is a plain exponential lag, not a spring.  Swapping the target
//! set mid-flight therefore morphs smoothly from wherever the particles are.

use std::sync::Arc;

use glam::Mat3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gesture::GestureState;
use crate::Point3;

pub const DEFAULT_PARTICLE_COUNT: usize = 4000;

/// Visual intensity while no hand is detected: the shape is fully formed.
const VISUAL_IDLE_INTENSITY: f32 = 0.0;

// ════════════════════════════════════════════════════════════════════════════
// SimParams
// ════════════════════════════════════════════════════════════════════════════

/// Tunables of the per-frame update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Fraction of the remaining distance covered each frame.
    pub damping:             f32,
    /// Per-axis uniform jitter added to each particle's target every frame.
    pub jitter:              f32,
    /// Peak procedural drift at full intensity.
    pub noise_amplitude:     f32,
    /// Outward displacement at full intensity.
    pub explosion_scale:     f32,
    pub explosion_exponent:  f32,
    /// Relative size swing of the idle pulsation.
    pub breathing_amplitude: f32,
    /// Idle pulsation angular rate (rad/s).
    pub breathing_rate:      f32,
    /// Yaw added per frame at rest.
    pub spin_base:           f32,
    /// Extra yaw per frame at full intensity.
    pub spin_gain:           f32,
    pub tilt_amplitude:      f32,
    pub tilt_rate:           f32,
    /// Half-extent of the cube initial positions are scattered in.
    pub spawn_extent:        f32,
}

impl Default for SimParams {
    fn default() -> Self {
        SimParams {
            damping:             0.06,
            jitter:              0.01,
            noise_amplitude:     0.25,
            explosion_scale:     3.0,
            explosion_exponent:  1.5,
            breathing_amplitude: 0.05,
            breathing_rate:      1.5,
            spin_base:           0.002,
            spin_gain:           0.02,
            tilt_amplitude:      0.15,
            tilt_rate:           0.4,
            spawn_extent:        5.0,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TargetPointSet
// ════════════════════════════════════════════════════════════════════════════

/// The current goal shape.
///
/// Immutable once built and shared cheaply; a shape change replaces the whole
/// set.  Particles index it modulo its length, so a set smaller than the pool
/// is simply reused.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TargetPointSet(Arc<[Point3]>);

impl TargetPointSet {
    pub fn new(points: Vec<Point3>) -> Self { TargetPointSet(points.into()) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn as_slice(&self) -> &[Point3] { &self.0 }

    /// Target of particle `i`; the origin when the set is empty.
    pub fn point_for(&self, i: usize) -> Point3 {
        if self.0.is_empty() {
            Point3::ZERO
        } else {
            self.0[i % self.0.len()]
        }
    }
}

impl From<Vec<Point3>> for TargetPointSet {
    fn from(points: Vec<Point3>) -> Self { TargetPointSet::new(points) }
}

// ════════════════════════════════════════════════════════════════════════════
// Rotation
// ════════════════════════════════════════════════════════════════════════════

/// Whole-swarm orientation, purely cosmetic.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rotation {
    /// Accumulated spin about the vertical axis (radians).
    pub yaw:  f32,
    /// Oscillating lean about the horizontal axis (radians).
    pub tilt: f32,
}

impl Rotation {
    pub fn matrix(&self) -> Mat3 {
        Mat3::from_rotation_x(self.tilt) * Mat3::from_rotation_y(self.yaw)
    }
}

/// Intensity that drives the visuals: raw openness with a hand, else 0.
pub fn visual_intensity(gesture: &GestureState) -> f32 {
    if gesture.detected {
        gesture.openness
    } else {
        VISUAL_IDLE_INTENSITY
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ParticleSystem
// ════════════════════════════════════════════════════════════════════════════

pub struct ParticleSystem<R = StdRng> {
    positions: Vec<Point3>,
    targets:   TargetPointSet,
    params:    SimParams,
    elapsed:   f32,
    rotation:  Rotation,
    rng:       R,
}

impl ParticleSystem<StdRng> {
    /// A pool seeded from OS entropy.
    pub fn from_entropy(count: usize, params: SimParams) -> Self {
        Self::new(count, params, StdRng::from_entropy())
    }
}

impl<R: Rng> ParticleSystem<R> {
    /// Scatter `count` particles uniformly in the spawn cube.  No targets yet:
    /// until [`ParticleSystem::set_targets`] every particle heads for the origin.
    pub fn new(count: usize, params: SimParams, mut rng: R) -> Self {
        let e = if params.spawn_extent.is_finite() { params.spawn_extent.abs() } else { 0.0 };
        let positions = (0..count)
            .map(|_| {
                Point3::new(
                    rng.gen_range(-e..=e),
                    rng.gen_range(-e..=e),
                    rng.gen_range(-e..=e),
                )
            })
            .collect();
        ParticleSystem {
            positions,
            targets: TargetPointSet::default(),
            params,
            elapsed: 0.0,
            rotation: Rotation::default(),
            rng,
        }
    }

    /// Replace the goal shape.  Current positions are left untouched.
    pub fn set_targets(&mut self, targets: impl Into<TargetPointSet>) {
        self.targets = targets.into();
        debug!(points = self.targets.len(), "swarm targets replaced");
    }

    pub fn targets(&self) -> &TargetPointSet { &self.targets }

    pub fn positions(&self) -> &[Point3] { &self.positions }

    pub fn len(&self) -> usize { self.positions.len() }

    pub fn is_empty(&self) -> bool { self.positions.is_empty() }

    pub fn params(&self) -> &SimParams { &self.params }

    pub fn rotation(&self) -> Rotation { self.rotation }

    /// Seconds of simulated time.
    pub fn elapsed(&self) -> f32 { self.elapsed }

    /// Write positions as `x, y, z, x, y, z, …` for a rendering surface.
    pub fn fill_flat(&self, out: &mut Vec<f32>) {
        out.clear();
        out.reserve(self.positions.len() * 3);
        for p in &self.positions {
            out.extend_from_slice(&[p.x, p.y, p.z]);
        }
    }

    /// Advance one display frame of `dt` seconds.
    pub fn step(&mut self, gesture: &GestureState, dt: f32) {
        self.elapsed += dt.max(0.0);
        let t = self.elapsed;
        let p = &self.params;

        let intensity = visual_intensity(gesture);
        let breathing = if gesture.detected {
            1.0
        } else {
            1.0 + (t * p.breathing_rate).sin() * p.breathing_amplitude
        };
        let burst = intensity.powf(p.explosion_exponent) * p.explosion_scale;

        for (i, pos) in self.positions.iter_mut().enumerate() {
            let mut base = self.targets.point_for(i);
            if p.jitter > 0.0 {
                base += Point3::new(
                    self.rng.gen_range(-p.jitter..=p.jitter),
                    self.rng.gen_range(-p.jitter..=p.jitter),
                    self.rng.gen_range(-p.jitter..=p.jitter),
                );
            }
            let scaled = base * breathing;
            let target = scaled
                + drift(t, i) * (p.noise_amplitude * intensity)
                + scaled.normalize_or_zero() * burst;

            *pos += (target - *pos) * p.damping;
        }

        self.rotation.yaw += p.spin_base + intensity * p.spin_gain;
        self.rotation.tilt = (t * p.tilt_rate).sin() * p.tilt_amplitude;
    }
}

/// Unit-scale organic wobble that varies with time and particle index.
fn drift(t: f32, i: usize) -> Point3 {
    let k = i as f32;
    Point3::new(
        (t * 1.3 + k * 0.17).sin(),
        (t * 1.1 + k * 0.11).cos(),
        (t * 0.9 + k * 0.23).sin(),
    )
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
