//! drone_render: render the gesture drone offline to a WAV file.
//!
//! The rendered performance starts with no hand in view (idle breathing),
//! then sweeps a hand from closed to fully open and back, and ends with the
//! shutdown fade.  Useful for auditioning the mapping without an audio device.
//!
//! ```text
//! drone_render sweep.wav --seconds 12
//! ```

use clap::Parser;
use hound::{SampleFormat, WavSpec, WavWriter};
use morph_drone::{DroneParams, DroneSynth, FADE_OUT_SECS};
use morph_swarm::GestureState;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

/// Gesture updates per second, roughly a webcam frame rate.
const GESTURE_RATE: u32 = 30;

/// Seconds of "no hand" before the sweep begins.
const IDLE_LEAD_SECS: f32 = 2.0;

#[derive(Parser)]
#[command(name = "drone_render")]
#[command(about = "Render the gesture drone to WAV", long_about = None)]
struct Cli {
    /// Output WAV file path
    output: String,

    /// Total duration in seconds, including the idle lead-in
    #[arg(short, long, default_value = "12.0")]
    seconds: f32,

    /// Sample rate in Hz
    #[arg(short = 'r', long, default_value = "44100")]
    sample_rate: u32,

    /// Seed for the oscillator detune
    #[arg(long, default_value = "1")]
    seed: u64,
}

/// Gesture at time `t`: idle, then a closed→open→closed triangle.
fn gesture_at(t: f32, sweep_secs: f32) -> GestureState {
    if t < IDLE_LEAD_SECS {
        return GestureState::NONE;
    }
    let phase = ((t - IDLE_LEAD_SECS) / sweep_secs).clamp(0.0, 1.0);
    let openness = 1.0 - (2.0 * phase - 1.0).abs();
    GestureState::from_openness(openness)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let sr = cli.sample_rate.max(8000);
    let total = (cli.seconds.max(IDLE_LEAD_SECS + 1.0) * sr as f32) as usize;
    let sweep_secs = total as f32 / sr as f32 - IDLE_LEAD_SECS - FADE_OUT_SECS;

    let mut synth = DroneSynth::new(sr as f32, &mut StdRng::seed_from_u64(cli.seed));
    info!(freqs = ?synth.frequencies(), "rendering {} samples at {} Hz", total, sr);

    let spec = WavSpec {
        channels: 1,
        sample_rate: sr,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&cli.output, spec)?;

    let update_every = (sr / GESTURE_RATE) as usize;
    let fade_at = total.saturating_sub((FADE_OUT_SECS * sr as f32) as usize);
    let mut last = None;

    for n in 0..total {
        if n == fade_at {
            synth.begin_fade_out(FADE_OUT_SECS);
        }
        if n % update_every == 0 {
            let g = gesture_at(n as f32 / sr as f32, sweep_secs);
            // Only push on change, as a live gesture stream would.
            if last != Some(g) {
                synth.set_params(DroneParams::from_gesture(&g));
                last = Some(g);
            }
        }
        writer.write_sample(synth.next_sample())?;
    }
    writer.finalize()?;

    info!("Wrote {:.1} s to {}", total as f32 / sr as f32, cli.output);
    Ok(())
}
