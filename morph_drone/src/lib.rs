//! # morph_drone
//!
//! A continuous minor-ninth drone whose brightness and loudness follow the
//! hand.
//!
//! * [`mapping`]: gesture → [`DroneParams`] (cutoff, gain), the audio-side idle
//!   intensity, and the [`Smoother`] used for click-free parameter moves.
//! * [`synth`]: six detuned oscillators → shared low-pass → master gain.
//! * [`engine`]: the synth on the system audio device via `cpal`; explicit
//!   start, faded shutdown.
//! * [`midi`]: mirrors the same parameters as MIDI CCs for an external synth.
//!
//! Any consumer of parameters implements [`ParamSink`].

pub mod engine;
pub mod mapping;
pub mod midi;
pub mod synth;

pub use engine::{AudioError, DroneEngine};
pub use mapping::{
    audio_intensity, DroneParams, ParamSink, Smoother, AUDIO_IDLE_INTENSITY, CUTOFF_MAX_HZ,
    CUTOFF_MIN_HZ, GAIN_MAX, GAIN_MIN, SMOOTHING_SECS,
};
pub use midi::MidiMirror;
pub use synth::{DroneSynth, CHORD_HZ, FADE_OUT_SECS};
