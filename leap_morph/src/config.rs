//! Application configuration.
//!
//! Everything has a default, so an empty (or absent) TOML file is valid.
//! Command-line flags are applied on top in `main.rs`.
//!
//! ```toml
//! particle_count = 4000
//! shape          = "bottle"
//! color          = "#66ccff"
//! audio_on_start = false
//!
//! [sim]
//! damping = 0.08
//!
//! [shape_service]
//! endpoint = "http://127.0.0.1:8787/v1/shapes"
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use morph_shapes::{Shape, ShapeClientConfig};
use morph_swarm::{SimParams, DEFAULT_PARTICLE_COUNT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid colour {0:?}, expected #RRGGBB")]
    InvalidColor(String),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

// ════════════════════════════════════════════════════════════════════════════
// ParticleColor
// ════════════════════════════════════════════════════════════════════════════

/// Colours offered by the colour-cycle key.
pub const PALETTE: [ParticleColor; 6] = [
    ParticleColor(0x66CCFF),
    ParticleColor(0xFF6AD5),
    ParticleColor(0xFFD166),
    ParticleColor(0x7CFF9B),
    ParticleColor(0xC792EA),
    ParticleColor(0xFFFFFF),
];

/// 24-bit RGB particle colour, written `#RRGGBB`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticleColor(pub u32);

impl ParticleColor {
    /// Opaque ARGB for the framebuffer.
    pub fn argb(self) -> u32 { 0xFF00_0000 | (self.0 & 0x00FF_FFFF) }

    /// Next palette entry, or the first one if `self` is not in the palette.
    pub fn next_in_palette(self) -> ParticleColor {
        match PALETTE.iter().position(|&c| c == self) {
            Some(i) => PALETTE[(i + 1) % PALETTE.len()],
            None    => PALETTE[0],
        }
    }
}

impl Default for ParticleColor {
    fn default() -> Self { PALETTE[0] }
}

impl FromStr for ParticleColor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
        if hex.len() != 6 {
            return Err(ConfigError::InvalidColor(s.to_string()));
        }
        u32::from_str_radix(hex, 16)
            .map(ParticleColor)
            .map_err(|_| ConfigError::InvalidColor(s.to_string()))
    }
}

impl TryFrom<String> for ParticleColor {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl From<ParticleColor> for String {
    fn from(c: ParticleColor) -> String { c.to_string() }
}

impl fmt::Display for ParticleColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0 & 0x00FF_FFFF)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub particle_count:     usize,
    /// Shape shown at startup.
    pub shape:              Shape,
    pub color:              ParticleColor,
    /// Open the audio device immediately instead of waiting for the toggle key.
    pub audio_on_start:     bool,
    /// Mirror drone parameters to a MIDI output port.
    pub midi_mirror:        bool,
    pub midi_channel:       u8,
    /// Points requested from the shape service.
    pub remote_point_count: usize,
    /// Seed for particle placement and shape sampling; entropy when absent.
    pub seed:               Option<u64>,
    pub sim:                SimParams,
    pub shape_service:      ShapeClientConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            particle_count:     DEFAULT_PARTICLE_COUNT,
            shape:              Shape::Sphere,
            color:              ParticleColor::default(),
            audio_on_start:     false,
            midi_mirror:        false,
            midi_channel:       0,
            remote_point_count: 1500,
            seed:               None,
            sim:                SimParams::default(),
            shape_service:      ShapeClientConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.sim;
        if !sim.spawn_extent.is_finite() || sim.spawn_extent <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sim.spawn_extent must be a positive number, got {}", sim.spawn_extent
            )));
        }
        if !(sim.damping > 0.0 && sim.damping <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "sim.damping must be in (0, 1], got {}", sim.damping
            )));
        }
        if !sim.jitter.is_finite() || sim.jitter < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sim.jitter must be zero or positive, got {}", sim.jitter
            )));
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let cfg = AppConfig::from_toml(
            r##"
            shape = "bottle"
            color = "#ff8800"
            seed  = 7

            [sim]
            damping = 0.1
            "##,
        )
        .unwrap();
        assert_eq!(cfg.shape, Shape::Bottle);
        assert_eq!(cfg.color, ParticleColor(0xFF8800));
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.sim.damping, 0.1);
        assert_eq!(cfg.sim.jitter, SimParams::default().jitter);
        assert_eq!(cfg.particle_count, DEFAULT_PARTICLE_COUNT);
    }

    #[test]
    fn bad_colour_is_a_parse_error() {
        assert!(matches!(AppConfig::from_toml(r##"color = "blue""##), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn bad_spawn_extent_is_rejected() {
        for v in ["-1.0", "0.0", "nan", "inf"] {
            let text = format!("[sim]\nspawn_extent = {}", v);
            assert!(
                matches!(AppConfig::from_toml(&text), Err(ConfigError::Invalid(_))),
                "spawn_extent = {} accepted", v
            );
        }
    }

    #[test]
    fn damping_outside_unit_interval_is_rejected() {
        for v in ["0.0", "-0.1", "1.5", "nan"] {
            let text = format!("[sim]\ndamping = {}", v);
            assert!(
                matches!(AppConfig::from_toml(&text), Err(ConfigError::Invalid(_))),
                "damping = {} accepted", v
            );
        }
        assert!(AppConfig::from_toml("[sim]\ndamping = 1.0").is_ok());
    }

    #[test]
    fn negative_jitter_is_rejected() {
        for v in ["-0.01", "nan", "inf"] {
            let text = format!("[sim]\njitter = {}", v);
            assert!(
                matches!(AppConfig::from_toml(&text), Err(ConfigError::Invalid(_))),
                "jitter = {} accepted", v
            );
        }
        assert!(AppConfig::from_toml("[sim]\njitter = 0.0").is_ok());
    }

    #[test]
    fn colour_parsing() {
        assert_eq!("#66ccff".parse::<ParticleColor>().unwrap(), ParticleColor(0x66CCFF));
        assert_eq!("66CCFF".parse::<ParticleColor>().unwrap(), ParticleColor(0x66CCFF));
        assert!("#66ccf".parse::<ParticleColor>().is_err());
        assert!("#gggggg".parse::<ParticleColor>().is_err());
        assert_eq!(ParticleColor(0x66CCFF).to_string(), "#66ccff");
        assert_eq!(ParticleColor(0x123456).argb(), 0xFF123456);
    }

    #[test]
    fn palette_cycles() {
        let mut c = PALETTE[0];
        for _ in 0..PALETTE.len() {
            c = c.next_in_palette();
        }
        assert_eq!(c, PALETTE[0]);
        assert_eq!(ParticleColor(0x010203).next_in_palette(), PALETTE[0]);
    }

    #[test]
    fn serialises_back_to_toml() {
        let cfg = AppConfig { seed: Some(3), ..AppConfig::default() };
        let text = toml::to_string(&cfg).unwrap();
        assert_eq!(AppConfig::from_toml(&text).unwrap(), cfg);
    }
}
