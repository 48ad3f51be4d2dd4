//! MIDI mirror of the drone parameters.
//!
//! Sends the cutoff as CC 74 (brightness) and the gain as CC 7 (channel
//! volume) so an external synth can follow the same gesture.  With no port
//! available the mirror stays silent instead of failing.

use tracing::{info, warn};

use crate::mapping::{DroneParams, ParamSink, CUTOFF_MAX_HZ, CUTOFF_MIN_HZ, GAIN_MAX};

const CC_VOLUME:     u8 = 7;
const CC_BRIGHTNESS: u8 = 74;

// ════════════════════════════════════════════════════════════════════════════
// CcOut: abstraction over midir / null (for testing)
// ════════════════════════════════════════════════════════════════════════════

trait CcOut {
    fn control_change(&mut self, channel: u8, controller: u8, value: u8);
}

// ── midir backend ─────────────────────────────────────────────────────────

struct MidirOut {
    conn: midir::MidiOutputConnection,
}

impl CcOut for MidirOut {
    fn control_change(&mut self, channel: u8, controller: u8, value: u8) {
        let _ = self.conn.send(&[0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F]);
    }
}

// ── null backend (used when no MIDI port is available) ────────────────────

struct NullOut;

impl CcOut for NullOut {
    fn control_change(&mut self, _ch: u8, _cc: u8, _v: u8) {}
}

/// Try to open the first suitable MIDI output port.
fn open_midi_output() -> Option<(Box<dyn CcOut>, String)> {
    let midi_out = match midir::MidiOutput::new("leap_morph_mirror") {
        Ok(m)  => m,
        Err(e) => {
            warn!("MIDI init error: {}; mirror disabled", e);
            return None;
        }
    };

    let ports = midi_out.ports();
    if ports.is_empty() {
        warn!("No MIDI output ports found; mirror disabled");
        return None;
    }

    // Prefer a softsynth if visible
    let port_idx = ports
        .iter()
        .position(|p| {
            midi_out
                .port_name(p)
                .map(|n| {
                    let n = n.to_lowercase();
                    n.contains("fluid") || n.contains("timidity") || n.contains("synth")
                })
                .unwrap_or(false)
        })
        .unwrap_or(0);

    let port = &ports[port_idx];
    let name = midi_out.port_name(port).unwrap_or_else(|_| "Unknown".to_string());

    match midi_out.connect(port, "morph-cc") {
        Ok(conn) => {
            info!("MIDI mirror on port: {}", name);
            Some((Box::new(MidirOut { conn }), name))
        }
        Err(e) => {
            warn!("Failed to connect MIDI port {}: {}; mirror disabled", name, e);
            None
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Value scaling
// ════════════════════════════════════════════════════════════════════════════

/// Cutoff on a log scale: 150 Hz → 0, 6000 Hz → 127.
pub fn cutoff_to_cc(cutoff_hz: f32) -> u8 {
    let hz = cutoff_hz.clamp(CUTOFF_MIN_HZ, CUTOFF_MAX_HZ);
    let t = (hz / CUTOFF_MIN_HZ).ln() / (CUTOFF_MAX_HZ / CUTOFF_MIN_HZ).ln();
    (t * 127.0).round() as u8
}

/// Gain on a linear scale: 0 → 0, [`GAIN_MAX`] → 127.
pub fn gain_to_cc(gain: f32) -> u8 {
    ((gain / GAIN_MAX).clamp(0.0, 1.0) * 127.0).round() as u8
}

// ════════════════════════════════════════════════════════════════════════════
// MidiMirror
// ════════════════════════════════════════════════════════════════════════════

pub struct MidiMirror {
    out:       Box<dyn CcOut>,
    channel:   u8,
    port_name: Option<String>,
    /// Last (brightness, volume) sent; repeats are suppressed.
    last:      Option<(u8, u8)>,
}

impl MidiMirror {
    /// Connect to a port, or fall back to a silent mirror.
    pub fn open(channel: u8) -> Self {
        match open_midi_output() {
            Some((out, name)) => Self::with_output(out, channel, Some(name)),
            None              => Self::with_output(Box::new(NullOut), channel, None),
        }
    }

    fn with_output(out: Box<dyn CcOut>, channel: u8, port_name: Option<String>) -> Self {
        MidiMirror { out, channel: channel & 0x0F, port_name, last: None }
    }

    pub fn is_connected(&self) -> bool { self.port_name.is_some() }

    pub fn port_name(&self) -> Option<&str> { self.port_name.as_deref() }
}

impl ParamSink for MidiMirror {
    fn apply(&mut self, params: DroneParams) {
        let values = (cutoff_to_cc(params.cutoff_hz), gain_to_cc(params.gain));
        if self.last == Some(values) { return; }
        let (brightness, volume) = values;
        let prev = self.last.replace(values);
        if prev.map(|p| p.0) != Some(brightness) {
            self.out.control_change(self.channel, CC_BRIGHTNESS, brightness);
        }
        if prev.map(|p| p.1) != Some(volume) {
            self.out.control_change(self.channel, CC_VOLUME, volume);
        }
    }

    fn label(&self) -> &str { "midi" }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
