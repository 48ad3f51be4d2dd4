//! # morph_shapes
//!
//! Point clouds the particle swarm eases toward.
//!
//! * [`shape`]: procedural generators: a spherical shell, a fuzzy cube
//!   surface and a lathed bottle profile.  Pure functions of a point count and
//!   an injected random source.
//! * [`remote`]: a blocking client that turns a free-text description into a
//!   point cloud via a remote JSON endpoint, with distinguishable failures.
//!
//! ## Quick start
//!
//! ```rust
//! use morph_shapes::{generate, Shape, PROCEDURAL_POINT_COUNT};
//! use rand::SeedableRng;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let points = generate(Shape::Bottle, PROCEDURAL_POINT_COUNT, &mut rng);
//! assert_eq!(points.len(), 3500);
//! ```

pub mod remote;
pub mod shape;

pub use remote::{parse_points, spawn_request, ShapeClient, ShapeClientConfig, ShapeGenError};
pub use shape::{
    bottle, bottle_radius, cube, generate, sphere, Shape, PROCEDURAL_POINT_COUNT, SHAPE_RADIUS,
};

/// A single 3D coordinate of a target shape.
pub type Point3 = glam::Vec3;
