//! # leap_morph
//!
//! Hand-gesture particle toy: a few thousand particles morph between 3D
//! shapes, burst outward as the hand opens, and drive a drone whose
//! brightness follows the same gesture.
//!
//! ## Gesture → Response mapping
//!
//! | Hand | Visuals | Drone |
//! |---|---|---|
//! | Not in view | Slow breathing pulse, gentle spin | Idle: dark and quiet |
//! | Closed fist | Tight shape, gentle spin | Darkest, quietest |
//! | Opening | Particles burst outward, spin speeds up | Filter opens, louder |
//! | Fully open | Maximum burst and drift | Brightest, loudest |
//!
//! ## Feature flags
//!
//! * (default): **Simulation mode**: a synthetic hand driven from the keyboard.
//! * `leap`: **Hardware mode**: polls a real LeapMotion controller via LeapC.
//!
//! ### Keyboard
//!
//! | Key | Action |
//! |---|---|
//! | `1` / `2` / `3` | Sphere / Cube / Bottle |
//! | `G` | Generate a shape from a typed description |
//! | `M` | Audio on / off |
//! | `C` | Cycle particle colour |
//! | `H` | Show / hide the simulated hand |
//! | `Up` / `Down` | Open / close the simulated hand |
//! | `Q` / `Esc` | Quit |

pub mod config;
pub mod gesture;
pub mod visualizer;
pub mod app;
