//! leap_morph: interactive entry point.

use clap::Parser;
use leap_morph::app::{run, AppError};
use leap_morph::config::{AppConfig, ParticleColor};
use morph_shapes::Shape;

#[derive(Parser)]
#[command(name = "leap_morph")]
#[command(about = "Gesture-controlled morphing particles with a drone", long_about = None)]
struct Cli {
    /// TOML config file; flags below override it
    #[arg(short, long)]
    config: Option<String>,

    /// Starting shape: sphere, cube or bottle
    #[arg(short, long, value_parser = parse_shape)]
    shape: Option<Shape>,

    /// Number of particles
    #[arg(short, long)]
    particles: Option<usize>,

    /// Particle colour as #RRGGBB
    #[arg(long, value_parser = parse_color)]
    color: Option<ParticleColor>,

    /// Start with audio on
    #[arg(long)]
    audio: bool,

    /// Mirror the drone parameters to a MIDI output
    #[arg(long)]
    midi: bool,

    /// Seed for particle placement and shape sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

fn parse_shape(s: &str) -> Result<Shape, String> {
    Shape::from_name(s).ok_or_else(|| format!("unknown shape {:?}", s))
}

fn parse_color(s: &str) -> Result<ParticleColor, String> {
    s.parse().map_err(|e: leap_morph::config::ConfigError| e.to_string())
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if cli.dump_config {
        match toml::to_string_pretty(&cfg) {
            Ok(text) => print!("{}", text),
            Err(e)   => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Leap Morph: Gesture Particles & Drone              ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "leap")]
    println!("  Mode: LeapMotion hardware");
    #[cfg(not(feature = "leap"))]
    println!("  Mode: Keyboard simulation  (use --features leap for hardware)");
    println!("  Shape: {}   Particles: {}   Colour: {}", cfg.shape, cfg.particle_count, cfg.color);
    println!("  Audio starts {}; press M to toggle.", if cfg.audio_on_start { "on" } else { "off" });
    println!();
    println!("  Opening visualizer window…");
    println!();

    if let Err(e) = run(cfg) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, AppError> {
    let mut cfg = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None       => AppConfig::default(),
    };
    if let Some(shape) = cli.shape         { cfg.shape = shape; }
    if let Some(n)     = cli.particles     { cfg.particle_count = n; }
    if let Some(c)     = cli.color         { cfg.color = c; }
    if let Some(seed)  = cli.seed          { cfg.seed = Some(seed); }
    if cli.audio { cfg.audio_on_start = true; }
    if cli.midi  { cfg.midi_mirror = true; }
    Ok(cfg)
}
