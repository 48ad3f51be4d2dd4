//! # morph_swarm
//!
//! The per-frame core of the toy.
//!
//! * [`gesture`]: turns 21 hand landmarks into a [`GestureState`]
//!   (`detected`, `is_open`, `openness`), skipping frames already seen.
//! * [`swarm`]: a fixed pool of particles exponentially easing toward a
//!   [`TargetPointSet`], perturbed by procedural drift and an outward burst
//!   that grows super-linearly with hand openness.
//!
//! ## Data flow
//!
//! ```text
//! hand tracker ──HandFrame──▶ FrameGate ──GestureState──┬─▶ ParticleSystem::step (every render frame)
//!                                                       └─▶ audio mapper (on change)
//! shape generator ──TargetPointSet──▶ ParticleSystem::set_targets (on selection)
//! ```

pub mod gesture;
pub mod swarm;

pub use gesture::{
    openness, reach_for_openness, FrameGate, GestureState, HandFrame, HandLandmarks, FINGERTIPS,
    LANDMARK_COUNT, WRIST,
};
pub use swarm::{
    visual_intensity, ParticleSystem, Rotation, SimParams, TargetPointSet, DEFAULT_PARTICLE_COUNT,
};

pub use morph_shapes::Point3;
