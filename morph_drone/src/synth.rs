//! The drone voice.
//!
//! ```text
//! osc ×6 (A-minor-ninth, static detune) ─▶ Σ ─▶ low-pass (biquad) ─▶ × master gain ─▶ out
//! ```
//!
//! Cutoff and gain both glide toward their targets through a [`Smoother`];
//! the filter coefficients are refreshed every [`CONTROL_BLOCK`] samples.

use std::f32::consts::TAU;

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F32};
use rand::Rng;
use tracing::debug;

use crate::mapping::{DroneParams, Smoother, AUDIO_IDLE_INTENSITY, SMOOTHING_SECS};

/// A2 E3 C4 E4 G4 B4: root, fifth, minor third, fifth, minor seventh, ninth.
pub const CHORD_HZ: [f32; 6] = [110.00, 164.81, 261.63, 329.63, 392.00, 493.88];

/// Length of the release ramp on shutdown.
pub const FADE_OUT_SECS: f32 = 0.5;

/// Widest static detune applied to any oscillator, either direction.
const MAX_DETUNE_CENTS: f32 = 8.0;

/// Samples between filter coefficient refreshes.
const CONTROL_BLOCK: usize = 32;

/// Per-voice level before the master gain; six voices stay below full scale.
const VOICE_LEVEL: f32 = 0.12;

/// Harmonic weights of each voice: a soft, band-limited saw.
const PARTIALS: [f32; 4] = [1.0, 0.5, 0.33, 0.25];

// ════════════════════════════════════════════════════════════════════════════
// Oscillator
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
struct Oscillator {
    freq:  f32,
    phase: f32,
}

impl Oscillator {
    fn next(&mut self, sample_rate: f32) -> f32 {
        let s = PARTIALS
            .iter()
            .enumerate()
            .map(|(k, w)| w * (self.phase * (k + 1) as f32).sin())
            .sum::<f32>();
        self.phase += TAU * self.freq / sample_rate;
        if self.phase >= TAU { self.phase -= TAU; }
        s
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Fade
// ════════════════════════════════════════════════════════════════════════════

/// Linear ramp from the gain at fade start down to zero.
#[derive(Clone, Copy, Debug)]
struct Fade {
    from:  f32,
    total: u32,
    done:  u32,
}

impl Fade {
    fn next(&mut self) -> f32 {
        if self.done >= self.total { return 0.0; }
        let level = self.from * (1.0 - self.done as f32 / self.total as f32);
        self.done += 1;
        level
    }

    fn finished(&self) -> bool { self.done >= self.total }
}

// ════════════════════════════════════════════════════════════════════════════
// DroneSynth
// ════════════════════════════════════════════════════════════════════════════

pub struct DroneSynth {
    sample_rate: f32,
    oscillators: Vec<Oscillator>,
    filter:      DirectForm2Transposed<f32>,
    cutoff:      Smoother,
    gain:        Smoother,
    fade:        Option<Fade>,
    block_pos:   usize,
}

impl DroneSynth {
    /// Build the voice at `sample_rate`, detuning each oscillator once.
    ///
    /// Cutoff starts at the idle target; master gain starts from silence and
    /// glides up, so the drone fades in.
    pub fn new<R: Rng + ?Sized>(sample_rate: f32, rng: &mut R) -> Self {
        let oscillators: Vec<Oscillator> = CHORD_HZ
            .iter()
            .map(|&f| {
                let cents = rng.gen_range(-MAX_DETUNE_CENTS..=MAX_DETUNE_CENTS);
                Oscillator { freq: f * 2f32.powf(cents / 1200.0), phase: rng.gen::<f32>() * TAU }
            })
            .collect();
        debug!(freqs = ?oscillators.iter().map(|o| o.freq).collect::<Vec<_>>(), "drone voiced");

        let idle = DroneParams::from_intensity(AUDIO_IDLE_INTENSITY);
        let mut gain = Smoother::new(0.0, SMOOTHING_SECS);
        gain.set_target(idle.gain);

        let coeffs = lowpass(sample_rate, idle.cutoff_hz)
            .unwrap_or_else(|| Coefficients { a1: 0.0, a2: 0.0, b0: 1.0, b1: 0.0, b2: 0.0 });

        DroneSynth {
            sample_rate,
            oscillators,
            filter: DirectForm2Transposed::<f32>::new(coeffs),
            cutoff: Smoother::new(idle.cutoff_hz, SMOOTHING_SECS),
            gain,
            fade: None,
            block_pos: 0,
        }
    }

    pub fn sample_rate(&self) -> f32 { self.sample_rate }

    /// Oscillator frequencies after detune.
    pub fn frequencies(&self) -> Vec<f32> {
        self.oscillators.iter().map(|o| o.freq).collect()
    }

    /// Retarget cutoff and gain.  Ignored once a fade-out has begun.
    pub fn set_params(&mut self, params: DroneParams) {
        if self.fade.is_some() { return; }
        self.cutoff.set_target(params.cutoff_hz);
        self.gain.set_target(params.gain);
    }

    /// Current (smoothed) cutoff and gain.
    pub fn current(&self) -> DroneParams {
        DroneParams { cutoff_hz: self.cutoff.value(), gain: self.gain.value() }
    }

    /// Start a linear ramp of the master gain to zero over `secs`.
    pub fn begin_fade_out(&mut self, secs: f32) {
        if self.fade.is_some() { return; }
        let total = (secs * self.sample_rate).round().max(1.0) as u32;
        self.fade = Some(Fade { from: self.gain.value(), total, done: 0 });
    }

    /// True once a fade-out has run to completion.
    pub fn is_silent(&self) -> bool {
        self.fade.map_or(false, |f| f.finished())
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.block_pos == 0 {
            let cutoff = self.cutoff.advance(CONTROL_BLOCK as f32 / self.sample_rate);
            if let Some(c) = lowpass(self.sample_rate, cutoff) {
                self.filter.update_coefficients(c);
            }
        }
        self.block_pos = (self.block_pos + 1) % CONTROL_BLOCK;

        let level = match self.fade.as_mut() {
            Some(f) => f.next(),
            None    => self.gain.advance(1.0 / self.sample_rate),
        };

        let sr = self.sample_rate;
        let mix = self.oscillators.iter_mut().map(|o| o.next(sr)).sum::<f32>() * VOICE_LEVEL;
        self.filter.run(mix) * level
    }

    pub fn render(&mut self, out: &mut [f32]) {
        for s in out.iter_mut() {
            *s = self.next_sample();
        }
    }
}

fn lowpass(sample_rate: f32, cutoff_hz: f32) -> Option<Coefficients<f32>> {
    let f0 = cutoff_hz.clamp(20.0, sample_rate * 0.45);
    Coefficients::<f32>::from_params(Type::LowPass, sample_rate.hz(), f0.hz(), Q_BUTTERWORTH_F32).ok()
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SR: f32 = 48_000.0;

    fn synth() -> DroneSynth { DroneSynth::new(SR, &mut StdRng::seed_from_u64(11)) }

    fn rms(buf: &[f32]) -> f32 {
        (buf.iter().map(|s| s * s).sum::<f32>() / buf.len() as f32).sqrt()
    }

    #[test]
    fn six_voices_with_small_static_detune() {
        let s = synth();
        let freqs = s.frequencies();
        assert_eq!(freqs.len(), 6);
        for (f, base) in freqs.iter().zip(CHORD_HZ) {
            let cents = 1200.0 * (f / base).log2();
            assert!(cents.abs() <= MAX_DETUNE_CENTS + 1e-3, "{} cents", cents);
        }
        // Detune is fixed at construction.
        let mut s = s;
        let mut buf = vec![0.0; 4096];
        s.render(&mut buf);
        assert_eq!(s.frequencies(), freqs);
    }

    #[test]
    fn different_seeds_detune_differently() {
        let a = DroneSynth::new(SR, &mut StdRng::seed_from_u64(1)).frequencies();
        let b = DroneSynth::new(SR, &mut StdRng::seed_from_u64(2)).frequencies();
        assert_ne!(a, b);
    }

    #[test]
    fn fades_in_from_silence() {
        let mut s = synth();
        assert_eq!(s.current().gain, 0.0);
        let mut buf = vec![0.0; SR as usize];
        s.render(&mut buf);
        let idle = DroneParams::from_intensity(AUDIO_IDLE_INTENSITY);
        assert!((s.current().gain - idle.gain).abs() < 1e-3);
        assert!(rms(&buf[..64]) < rms(&buf[buf.len() - 4800..]));
    }

    #[test]
    fn steady_state_matches_targets() {
        let mut s = synth();
        s.set_params(DroneParams::from_intensity(1.0));
        let mut buf = vec![0.0; SR as usize];
        s.render(&mut buf);
        let cur = s.current();
        assert!((cur.cutoff_hz - 6000.0).abs() < 1.0);
        assert!((cur.gain - 0.6).abs() < 1e-3);

        s.set_params(DroneParams::from_intensity(0.0));
        s.render(&mut buf);
        let cur = s.current();
        assert!((cur.cutoff_hz - 150.0).abs() < 1.0);
        assert!((cur.gain - 0.3).abs() < 1e-3);
    }

    #[test]
    fn parameter_change_has_no_jump() {
        let mut s = synth();
        let mut buf = vec![0.0; SR as usize / 2];
        s.render(&mut buf);
        let before = s.current().gain;
        s.set_params(DroneParams::from_intensity(1.0));
        s.next_sample();
        // One sample later the gain has barely moved.
        assert!((s.current().gain - before).abs() < 1e-3);
    }

    #[test]
    fn brighter_filter_passes_more_energy() {
        let render = |intensity: f32| {
            let mut s = synth();
            s.set_params(DroneParams { cutoff_hz: DroneParams::from_intensity(intensity).cutoff_hz, gain: 0.5 });
            let mut buf = vec![0.0; SR as usize];
            s.render(&mut buf);
            rms(&buf[buf.len() / 2..])
        };
        assert!(render(1.0) > render(0.0));
    }

    #[test]
    fn fade_out_reaches_silence_in_half_a_second() {
        let mut s = synth();
        let mut buf = vec![0.0; SR as usize];
        s.render(&mut buf);
        s.begin_fade_out(FADE_OUT_SECS);
        assert!(!s.is_silent());

        let mut tail = vec![0.0; (SR * FADE_OUT_SECS) as usize];
        s.render(&mut tail);
        assert!(s.is_silent());

        let mut after = vec![1.0; 256];
        s.render(&mut after);
        assert!(after.iter().all(|&x| x == 0.0));

        // The ramp is gradual: the last tenth is much quieter than the first.
        let n = tail.len() / 10;
        assert!(rms(&tail[tail.len() - n..]) < 0.25 * rms(&tail[..n]));
    }

    #[test]
    fn params_ignored_while_fading() {
        let mut s = synth();
        s.begin_fade_out(FADE_OUT_SECS);
        s.set_params(DroneParams::from_intensity(1.0));
        assert_eq!(s.current().cutoff_hz, DroneParams::from_intensity(AUDIO_IDLE_INTENSITY).cutoff_hz);
    }

    #[test]
    fn output_is_bounded() {
        let mut s = synth();
        s.set_params(DroneParams::from_intensity(1.0));
        let mut buf = vec![0.0; SR as usize];
        s.render(&mut buf);
        assert!(buf.iter().all(|x| x.is_finite() && x.abs() < 1.0));
    }
}
