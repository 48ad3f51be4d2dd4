//! Hand tracking, from LeapMotion hardware or keyboard simulation.
//!
//! A [`HandTracker`] hands out the most recent camera frame whenever it is
//! polled.  [`spawn_tracker`] polls it continuously on its own thread, drops
//! frames it has already seen, and publishes each new [`GestureState`] as a
//! [`TrackerMsg`].  Consumers never learn which backend produced the state.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use morph_swarm::{reach_for_openness, FrameGate, GestureState, HandFrame, HandLandmarks, Point3};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("camera or tracking device access was denied")]
    PermissionDenied,

    #[error("hand tracking backend failed to load: {0}")]
    BackendLoad(String),
}

/// What the tracking thread publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerMsg {
    /// A new frame was processed.
    Gesture(GestureState),
    /// The tracker stopped for good; no further gestures will arrive.
    Failed(TrackerError),
}

// ════════════════════════════════════════════════════════════════════════════
// HandTracker trait: unified interface for hw and sim
// ════════════════════════════════════════════════════════════════════════════

pub trait HandTracker {
    fn name(&self) -> &'static str;

    /// The latest frame, which may be the one returned last time.
    ///
    /// `Ok(None)` means the tracker has shut down cleanly.
    fn poll(&mut self) -> Result<Option<HandFrame>, TrackerError>;
}

// ════════════════════════════════════════════════════════════════════════════
// Extraction loop
// ════════════════════════════════════════════════════════════════════════════

/// Open a tracker on a new thread and run [`run_extraction`] on it.
///
/// The tracker is constructed on the tracking thread, so backends that are
/// not `Send` work too.  An opening failure is published as
/// [`TrackerMsg::Failed`].
pub fn spawn_tracker<F, T>(open: F) -> Receiver<TrackerMsg>
where
    F: FnOnce() -> Result<T, TrackerError> + Send + 'static,
    T: HandTracker,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || match open() {
        Ok(mut tracker) => {
            info!("Hand tracker started: {}", tracker.name());
            run_extraction(&mut tracker, &tx);
        }
        Err(e) => {
            warn!("Hand tracker unavailable: {}", e);
            let _ = tx.send(TrackerMsg::Failed(e));
        }
    });
    rx
}

/// Poll `tracker` until it closes, fails, or nobody is listening.
pub fn run_extraction<T: HandTracker + ?Sized>(tracker: &mut T, tx: &Sender<TrackerMsg>) {
    let mut gate = FrameGate::new();
    loop {
        match tracker.poll() {
            Ok(Some(frame)) => {
                let Some(state) = gate.extract(&frame) else { continue };
                if tx.send(TrackerMsg::Gesture(state)).is_err() {
                    return;
                }
            }
            Ok(None) => {
                debug!("Hand tracker {} closed", tracker.name());
                return;
            }
            Err(e) => {
                warn!("Hand tracker {} failed: {}", tracker.name(), e);
                let _ = tx.send(TrackerMsg::Failed(e));
                return;
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ErrorStreak: bounded tolerance for backend poll errors
// ════════════════════════════════════════════════════════════════════════════

/// How long a backend may return nothing but errors before it is given up.
pub const POLL_FAILURE_LIMIT: Duration = Duration::from_secs(2);

/// Tracks an unbroken run of poll errors.  Isolated errors are tolerated;
/// a run lasting [`ErrorStreak::limit`] becomes a terminal
/// [`TrackerError::BackendLoad`].
#[derive(Clone, Debug)]
pub struct ErrorStreak {
    limit: Duration,
    since: Option<Instant>,
    count: u32,
}

impl ErrorStreak {
    pub fn new(limit: Duration) -> Self {
        ErrorStreak { limit, since: None, count: 0 }
    }

    /// A successful poll ends the streak.
    pub fn clear(&mut self) {
        self.since = None;
        self.count = 0;
    }

    /// Count one error seen at `now`.
    pub fn record(&mut self, now: Instant, err: &str) -> Result<(), TrackerError> {
        let since = *self.since.get_or_insert(now);
        self.count += 1;
        if now.saturating_duration_since(since) >= self.limit {
            return Err(TrackerError::BackendLoad(format!(
                "{} consecutive poll errors, last: {}",
                self.count, err
            )));
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapHandTracker: real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Leap coordinates are millimetres; this many make one landmark unit.
#[cfg(feature = "leap")]
const LEAP_MM_PER_UNIT: f32 = 400.0;

/// Hand tracker backed by a LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// The first hand in each tracking frame is converted to 21 landmarks: the
/// wrist is approximated by the mean of the finger metacarpal bases, and each
/// digit contributes the far joint of its four bones.
#[cfg(feature = "leap")]
pub struct LeapHandTracker {
    connection: leaprs::Connection,
    started:    Instant,
    errors:     ErrorStreak,
}

#[cfg(feature = "leap")]
impl LeapHandTracker {
    pub fn open() -> Result<Self, TrackerError> {
        use leaprs::*;

        let mut connection =
            Connection::create(ConnectionConfig::default()).map_err(leap_error)?;
        connection.open().map_err(leap_error)?;
        Ok(LeapHandTracker {
            connection,
            started: Instant::now(),
            errors:  ErrorStreak::new(POLL_FAILURE_LIMIT),
        })
    }
}

#[cfg(feature = "leap")]
fn leap_error<E: std::fmt::Debug>(e: E) -> TrackerError {
    let text = format!("{:?}", e);
    let lower = text.to_lowercase();
    if lower.contains("permission") || lower.contains("access") {
        TrackerError::PermissionDenied
    } else {
        TrackerError::BackendLoad(text)
    }
}

#[cfg(feature = "leap")]
impl HandTracker for LeapHandTracker {
    fn name(&self) -> &'static str { "leap" }

    fn poll(&mut self) -> Result<Option<HandFrame>, TrackerError> {
        use leaprs::*;

        loop {
            let msg = match self.connection.poll(100) {
                Ok(m) => {
                    self.errors.clear();
                    m
                }
                Err(e) => {
                    self.errors.record(Instant::now(), &format!("{:?}", e))?;
                    continue;
                }
            };
            if let Event::Tracking(frame) = msg.event() {
                let hand = frame.hands().next().and_then(|h| leap_landmarks(&h));
                return Ok(Some(HandFrame {
                    timestamp_us: self.started.elapsed().as_micros() as u64,
                    hand,
                }));
            }
        }
    }
}

#[cfg(feature = "leap")]
fn leap_landmarks(hand: &leaprs::Hand) -> Option<HandLandmarks> {
    let fingers: Vec<_> = hand.digits().collect();
    if fingers.len() < 5 { return None; }

    let scale = |x: f32, y: f32, z: f32| Point3::new(x, y, z) / LEAP_MM_PER_UNIT;

    let mut points = [Point3::ZERO; morph_swarm::LANDMARK_COUNT];
    let mut wrist = Point3::ZERO;
    for (k, digit) in fingers.iter().take(5).enumerate() {
        let joints = [
            digit.metacarpal().next_joint(),
            digit.proximal().next_joint(),
            digit.intermediate().next_joint(),
            digit.distal().next_joint(),
        ];
        for (j, p) in joints.iter().enumerate() {
            points[1 + 4 * k + j] = scale(p.x, p.y, p.z);
        }
        if k > 0 {
            let base = digit.metacarpal().prev_joint();
            wrist += scale(base.x, base.y, base.z);
        }
    }
    points[morph_swarm::WRIST] = wrist / 4.0;
    Some(HandLandmarks(points))
}

// ════════════════════════════════════════════════════════════════════════════
// SimHandTracker: keyboard simulation (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Raw input event from the simulation window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimInput {
    KeyDown(SimKey),
}

/// Simulated key codes (mapped from minifb Key).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKey {
    ToggleHand,   // H
    OpennessUp,   // Up
    OpennessDown, // Down
}

/// Openness change per key press.
const SIM_OPENNESS_STEP: f32 = 0.05;

/// Where the synthetic hand sits in landmark space.
const SIM_WRIST: Point3 = Point3::new(0.5, 0.75, 0.0);

/// Synthetic hand driven by [`SimInput`] events from the visualizer.
///
/// Frames are "captured" at camera cadence while `poll` runs faster, so most
/// polls return the previous frame, exactly like a webcam tracker.
pub struct SimHandTracker {
    rx:             Receiver<SimInput>,
    present:        bool,
    openness:       f32,
    frame_interval: Duration,
    poll_interval:  Duration,
    started:        Instant,
    last_capture:   Option<Instant>,
    current:        Option<HandFrame>,
}

impl SimHandTracker {
    /// 30 fps camera, polled every 8 ms.
    pub fn new(rx: Receiver<SimInput>) -> Self {
        Self::with_timing(rx, Duration::from_millis(33), Duration::from_millis(8))
    }

    pub fn with_timing(rx: Receiver<SimInput>, frame_interval: Duration, poll_interval: Duration) -> Self {
        SimHandTracker {
            rx,
            present: false,
            openness: 0.0,
            frame_interval,
            poll_interval,
            started: Instant::now(),
            last_capture: None,
            current: None,
        }
    }

    fn apply(&mut self, input: SimInput) {
        match input {
            SimInput::KeyDown(SimKey::ToggleHand) => {
                self.present = !self.present;
                debug!(present = self.present, "sim hand toggled");
            }
            SimInput::KeyDown(SimKey::OpennessUp) => {
                self.openness = (self.openness + SIM_OPENNESS_STEP).min(1.0);
            }
            SimInput::KeyDown(SimKey::OpennessDown) => {
                self.openness = (self.openness - SIM_OPENNESS_STEP).max(0.0);
            }
        }
    }

    fn capture(&self, now: Instant) -> HandFrame {
        HandFrame {
            timestamp_us: now.duration_since(self.started).as_micros() as u64,
            hand: self
                .present
                .then(|| HandLandmarks::with_reach(SIM_WRIST, reach_for_openness(self.openness))),
        }
    }
}

impl HandTracker for SimHandTracker {
    fn name(&self) -> &'static str { "simulated" }

    fn poll(&mut self) -> Result<Option<HandFrame>, TrackerError> {
        thread::sleep(self.poll_interval);
        loop {
            match self.rx.try_recv() {
                Ok(input)                       => self.apply(input),
                Err(TryRecvError::Empty)        => break,
                Err(TryRecvError::Disconnected) => return Ok(None),
            }
        }

        let now = Instant::now();
        let due = self
            .last_capture
            .map_or(true, |t| now.duration_since(t) >= self.frame_interval);
        if due {
            self.current = Some(self.capture(now));
            self.last_capture = Some(now);
        }
        Ok(self.current)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
