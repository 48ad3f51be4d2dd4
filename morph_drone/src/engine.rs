//! Real-time drone output using cpal.
//!
//! Opening the device is an explicit call ([`DroneEngine::start`]) made in
//! response to the user, never at program start.  Release always fades the
//! master gain to zero over [`FADE_OUT_SECS`] before the stream is dropped.
//! A caller that cannot wait starts the fade with
//! [`DroneEngine::begin_fade_out`] and drops the engine once
//! [`DroneEngine::is_silent`] is true; `Drop` only sleeps for whatever part
//! of the fade is still left.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{error, info};

use crate::mapping::{DroneParams, ParamSink};
use crate::synth::{DroneSynth, FADE_OUT_SECS};

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoDevice,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("audio stream error: {0}")]
    Stream(String),
}

pub struct DroneEngine {
    synth:       Arc<Mutex<DroneSynth>>,
    stream:      Option<cpal::Stream>,
    sample_rate: u32,
    device_name: String,
}

impl DroneEngine {
    /// Open the default output device and start the drone.
    pub fn start() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        info!("Audio host: {:?}", host.id());

        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("Audio device: {}", device_name);

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::Device(e.to_string()))?;
        info!("Audio config: {:?}", config);

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        let synth = Arc::new(Mutex::new(DroneSynth::new(
            sample_rate as f32,
            &mut StdRng::from_entropy(),
        )));

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config.into(), synth.clone(), channels)
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config.into(), synth.clone(), channels)
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config.into(), synth.clone(), channels)
            }
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        }?;

        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;
        info!("Drone started at {} Hz, {} channel(s)", sample_rate, channels);

        Ok(DroneEngine { synth, stream: Some(stream), sample_rate, device_name })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        synth: Arc<Mutex<DroneSynth>>,
        channels: usize,
    ) -> Result<cpal::Stream, AudioError>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut synth) = synth.lock() else {
                        data.iter_mut().for_each(|s| *s = T::from_sample(0.0));
                        return;
                    };
                    // Mono drone copied to every output channel.
                    for frame in data.chunks_mut(channels.max(1)) {
                        let v = synth.next_sample();
                        for ch in frame.iter_mut() {
                            *ch = T::from_sample(v);
                        }
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))
    }

    pub fn sample_rate(&self) -> u32 { self.sample_rate }

    pub fn device_name(&self) -> &str { &self.device_name }

    pub fn set_params(&self, params: DroneParams) {
        if let Ok(mut synth) = self.synth.lock() {
            synth.set_params(params);
        }
    }

    /// Start the fade-out and return at once.  The stream keeps playing the
    /// ramp until the engine is dropped.
    pub fn begin_fade_out(&self) {
        if let Ok(mut synth) = self.synth.lock() {
            synth.begin_fade_out(FADE_OUT_SECS);
        }
    }

    /// True once the fade-out has played to the end.
    pub fn is_silent(&self) -> bool {
        self.synth.lock().map_or(true, |s| s.is_silent())
    }

    /// Fade out and release the device, waiting for the ramp.
    pub fn shutdown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(stream) = self.stream.take() else { return };
        self.begin_fade_out();
        // Let the callback play out what is left of the ramp.
        let deadline = Instant::now()
            + Duration::from_secs_f32(FADE_OUT_SECS)
            + Duration::from_millis(30);
        while !self.is_silent() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        drop(stream);
        info!("Drone stopped, audio device released");
    }
}

impl Drop for DroneEngine {
    fn drop(&mut self) {
        self.release();
    }
}

impl ParamSink for DroneEngine {
    fn apply(&mut self, params: DroneParams) {
        self.set_params(params);
    }

    fn label(&self) -> &str { "drone" }

    fn begin_release(&mut self) { self.begin_fade_out(); }

    fn is_released(&self) -> bool { self.is_silent() }
}
