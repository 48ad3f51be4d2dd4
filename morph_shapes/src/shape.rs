//! Procedural shape generators.
//!
//! Every generator returns exactly `count` points and never fails.  The
//! random source is injected so callers can seed it.

use std::f32::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::Point3;

/// Radius of the sphere and half-extent of the cube.
pub const SHAPE_RADIUS: f32 = 1.2;

/// Point count used for every procedural shape.
pub const PROCEDURAL_POINT_COUNT: usize = 3500;

// ════════════════════════════════════════════════════════════════════════════
// Shape: the procedural catalogue
// ════════════════════════════════════════════════════════════════════════════

/// The built-in shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Sphere,
    Cube,
    Bottle,
}

impl Shape {
    pub const ALL: [Shape; 3] = [Shape::Sphere, Shape::Cube, Shape::Bottle];

    pub fn name(self) -> &'static str {
        match self {
            Shape::Sphere => "Sphere",
            Shape::Cube   => "Cube",
            Shape::Bottle => "Bottle",
        }
    }

    /// Case-insensitive lookup by display name.
    pub fn from_name(name: &str) -> Option<Shape> {
        Shape::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Generate `count` points for `shape`.
pub fn generate<R: Rng + ?Sized>(shape: Shape, count: usize, rng: &mut R) -> Vec<Point3> {
    match shape {
        Shape::Sphere => sphere(count, rng),
        Shape::Cube   => cube(count, rng),
        Shape::Bottle => bottle(count, rng),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Sphere
// ════════════════════════════════════════════════════════════════════════════

/// Uniform samples on a shell of radius [`SHAPE_RADIUS`].
///
/// θ is uniform on `[0, 2π)` and φ = acos(2u − 1), which spreads points evenly
/// over the surface instead of bunching them at the poles.
pub fn sphere<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Point3> {
    (0..count)
        .map(|_| {
            let theta = rng.gen::<f32>() * TAU;
            let phi   = (2.0 * rng.gen::<f32>() - 1.0).acos();
            Point3::new(
                SHAPE_RADIUS * phi.sin() * theta.cos(),
                SHAPE_RADIUS * phi.sin() * theta.sin(),
                SHAPE_RADIUS * phi.cos(),
            )
        })
        .collect()
}

// ════════════════════════════════════════════════════════════════════════════
// Cube
// ════════════════════════════════════════════════════════════════════════════

/// Fuzzy cube surface.
///
/// Each point starts uniform inside the cube, then exactly one randomly chosen
/// axis is snapped to ±[`SHAPE_RADIUS`].  The other two coordinates keep their
/// interior jitter, so the faces read as slightly thick rather than crisp.
pub fn cube<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Point3> {
    (0..count)
        .map(|_| {
            let mut p = [
                (rng.gen::<f32>() - 0.5) * 2.0 * SHAPE_RADIUS,
                (rng.gen::<f32>() - 0.5) * 2.0 * SHAPE_RADIUS,
                (rng.gen::<f32>() - 0.5) * 2.0 * SHAPE_RADIUS,
            ];
            let axis = rng.gen_range(0..3);
            p[axis] = if rng.gen_bool(0.5) { SHAPE_RADIUS } else { -SHAPE_RADIUS };
            Point3::from_array(p)
        })
        .collect()
}

// ════════════════════════════════════════════════════════════════════════════
// Bottle
// ════════════════════════════════════════════════════════════════════════════

const BASE_TOP:     f32 = 0.05;
const BODY_TOP:     f32 = 0.6;
const SHOULDER_TOP: f32 = 0.7;
const NECK_TOP:     f32 = 0.95;

const BODY_RADIUS: f32 = 0.8;
const NECK_RADIUS: f32 = 0.3;
const LIP_RADIUS:  f32 = 0.35;

const BOTTLE_HEIGHT: f32 = 3.5;
const BOTTLE_FLOOR:  f32 = -1.5;

/// Profile radius at normalised height `y ∈ [0, 1]`.
///
/// | band | radius |
/// |---|---|
/// | `y < 0.05` (base) | 0.8, the rim of the base disk |
/// | `0.05 ≤ y < 0.6` (body) | 0.8 |
/// | `0.6 ≤ y < 0.7` (shoulder) | linear 0.8 → 0.3 |
/// | `0.7 ≤ y < 0.95` (neck) | 0.3 |
/// | `y ≥ 0.95` (lip) | 0.35 |
pub fn bottle_radius(y: f32) -> f32 {
    if y < BODY_TOP {
        BODY_RADIUS
    } else if y < SHOULDER_TOP {
        let t = (y - BODY_TOP) / (SHOULDER_TOP - BODY_TOP);
        BODY_RADIUS + (NECK_RADIUS - BODY_RADIUS) * t
    } else if y < NECK_TOP {
        NECK_RADIUS
    } else {
        LIP_RADIUS
    }
}

/// Bottle silhouette lathed around the Y axis.
///
/// Points in the base band fill the disk; everywhere else they sit on the
/// profile.  Height maps to `3.5·y − 1.5`.
pub fn bottle<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Point3> {
    (0..count)
        .map(|_| {
            let y     = rng.gen::<f32>();
            let theta = rng.gen::<f32>() * TAU;
            let mut r = bottle_radius(y);
            if y < BASE_TOP {
                r *= rng.gen::<f32>().sqrt();
            }
            Point3::new(r * theta.cos(), BOTTLE_HEIGHT * y + BOTTLE_FLOOR, r * theta.sin())
        })
        .collect()
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng { StdRng::seed_from_u64(0x5EED) }

    #[test]
    fn every_shape_returns_requested_count() {
        let mut r = rng();
        for shape in Shape::ALL {
            for n in [0, 1, 17, PROCEDURAL_POINT_COUNT] {
                assert_eq!(generate(shape, n, &mut r).len(), n, "{} x {}", shape, n);
            }
        }
    }

    #[test]
    fn sphere_points_on_shell() {
        for p in sphere(2000, &mut rng()) {
            assert!((p.length() - SHAPE_RADIUS).abs() < 1e-4, "|p| = {}", p.length());
        }
    }

    #[test]
    fn sphere_is_not_pole_biased() {
        // Uniform on a sphere ⇒ z is uniform on [-r, r]; the upper half
        // should hold roughly half the points.
        let pts = sphere(20_000, &mut rng());
        let upper = pts.iter().filter(|p| p.z > 0.0).count() as f32 / pts.len() as f32;
        assert!((upper - 0.5).abs() < 0.02, "upper fraction {}", upper);
        let polar = pts.iter().filter(|p| p.z.abs() > 0.9 * SHAPE_RADIUS).count() as f32
            / pts.len() as f32;
        assert!((polar - 0.1).abs() < 0.02, "polar cap fraction {}", polar);
    }

    #[test]
    fn cube_snaps_at_least_one_axis_to_a_face() {
        for p in cube(2000, &mut rng()) {
            let on_face = p.to_array().iter().filter(|c| c.abs() == SHAPE_RADIUS).count();
            assert!(on_face >= 1, "{:?} not on a face", p);
            for c in p.to_array() {
                assert!(c.abs() <= SHAPE_RADIUS);
            }
        }
    }

    #[test]
    fn cube_faces_are_fuzzy_not_hollow() {
        // Unsnapped coordinates stay interior-uniform, so plenty of them lie
        // well inside the cube.
        let pts = cube(2000, &mut rng());
        let interior = pts
            .iter()
            .flat_map(|p| p.to_array())
            .filter(|c| c.abs() < 0.5 * SHAPE_RADIUS)
            .count();
        assert!(interior > 1000);
    }

    #[test]
    fn bottle_radius_breakpoints() {
        assert_eq!(bottle_radius(0.0), 0.8);
        assert_eq!(bottle_radius(0.3), 0.8);
        assert_eq!(bottle_radius(0.6), 0.8);
        assert!((bottle_radius(0.65) - 0.55).abs() < 1e-6);
        assert!((bottle_radius(0.7) - 0.3).abs() < 1e-6);
        assert_eq!(bottle_radius(0.8), 0.3);
        assert_eq!(bottle_radius(0.95), 0.35);
        assert_eq!(bottle_radius(1.0), 0.35);
    }

    #[test]
    fn bottle_shoulder_is_continuous() {
        let eps = 1e-4;
        for edge in [BODY_TOP, SHOULDER_TOP] {
            let below = bottle_radius(edge - eps);
            let above = bottle_radius(edge + eps);
            assert!((below - above).abs() < 0.01, "jump at {}: {} vs {}", edge, below, above);
        }
    }

    #[test]
    fn bottle_points_follow_profile() {
        for p in bottle(3000, &mut rng()) {
            let y = (p.y - BOTTLE_FLOOR) / BOTTLE_HEIGHT;
            assert!((0.0..=1.0).contains(&y));
            let r = (p.x * p.x + p.z * p.z).sqrt();
            if y < BASE_TOP {
                assert!(r <= BODY_RADIUS + 1e-5);
            } else {
                assert!((r - bottle_radius(y)).abs() < 1e-4, "y={} r={}", y, r);
            }
        }
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let a = generate(Shape::Cube, 50, &mut rng());
        let b = generate(Shape::Cube, 50, &mut rng());
        assert_eq!(a, b);
    }

    #[test]
    fn shape_names_round_trip() {
        for s in Shape::ALL {
            assert_eq!(Shape::from_name(&s.name().to_lowercase()), Some(s));
        }
        assert_eq!(Shape::from_name("torus"), None);
    }
}
