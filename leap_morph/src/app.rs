//! Top-level application state.
//!
//! `AppState` owns the particle pool, the latest gesture snapshot, the
//! optional audio sinks and any in-flight shape request.  Every subsystem
//! failure lands in the status line; the particles keep moving regardless.

use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Instant;

use morph_drone::{DroneEngine, DroneParams, MidiMirror, ParamSink};
use morph_shapes::{
    generate, spawn_request, Point3, Shape, ShapeClient, ShapeGenError, PROCEDURAL_POINT_COUNT,
};
use morph_swarm::{GestureState, ParticleSystem};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AppConfig, ConfigError, ParticleColor};
use crate::gesture::{spawn_tracker, SimInput, TrackerError, TrackerMsg};
use crate::visualizer::{FrameView, UiCommand, Visualizer};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot open window: {0}")]
    Window(String),
}

/// A shape request waiting on the service.
struct PendingShape {
    description: String,
    rx:          Receiver<Result<Vec<Point3>, ShapeGenError>>,
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState {
    // ── simulation ───────────────────────────────────────────────────────
    swarm:       ParticleSystem,
    shape_rng:   StdRng,
    shape_label: String,
    gesture:     GestureState,
    flat:        Vec<f32>,

    // ── audio ────────────────────────────────────────────────────────────
    audio:       Option<Box<dyn ParamSink>>,
    /// Sinks fading out; dropped from `tick` once silent.
    releasing:   Vec<Box<dyn ParamSink>>,
    midi:        Option<Box<dyn ParamSink>>,

    // ── remote shapes ────────────────────────────────────────────────────
    shape_client:       Option<ShapeClient>,
    pending:            Option<PendingShape>,
    remote_point_count: usize,

    // ── presentation ─────────────────────────────────────────────────────
    color:         ParticleColor,
    tracker_label: String,
    pub status:    String,
}

impl AppState {
    pub fn new(cfg: &AppConfig) -> Self {
        let mut seed_rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        let swarm = ParticleSystem::new(
            cfg.particle_count,
            cfg.sim.clone(),
            StdRng::seed_from_u64(seed_rng.gen()),
        );

        let shape_client = match ShapeClient::new(cfg.shape_service.clone()) {
            Ok(c) => {
                if !c.has_credential() {
                    info!(
                        "No shape service key in ${}; remote generation will fail until it is set",
                        cfg.shape_service.api_key_env
                    );
                }
                Some(c)
            }
            Err(e) => {
                warn!("Shape service client unavailable: {}", e);
                None
            }
        };

        let mut app = AppState {
            swarm,
            shape_rng: seed_rng,
            shape_label: String::new(),
            gesture: GestureState::NONE,
            flat: Vec::with_capacity(cfg.particle_count * 3),
            audio: None,
            releasing: Vec::new(),
            midi: None,
            shape_client,
            pending: None,
            remote_point_count: cfg.remote_point_count.max(1),
            color: cfg.color,
            tracker_label: "starting".to_string(),
            status: String::new(),
        };
        app.select_shape(cfg.shape);
        app.swarm.fill_flat(&mut app.flat);
        app
    }

    // ── commands ─────────────────────────────────────────────────────────

    pub fn handle_command(&mut self, cmd: UiCommand) {
        match cmd {
            UiCommand::SelectShape(shape) => self.select_shape(shape),
            UiCommand::ToggleAudio        => self.toggle_audio(),
            UiCommand::CycleColor => {
                self.color = self.color.next_in_palette();
                self.status = format!("Colour {}", self.color);
            }
            UiCommand::GenerateRemote | UiCommand::Quit => { /* handled in run loop */ }
        }
    }

    /// Swap in a procedural shape.  Particles keep their positions and ease
    /// toward the new targets; any in-flight remote request is abandoned.
    pub fn select_shape(&mut self, shape: Shape) {
        if self.pending.take().is_some() {
            info!("Remote shape request superseded by {}", shape);
        }
        let points = generate(shape, PROCEDURAL_POINT_COUNT, &mut self.shape_rng);
        self.swarm.set_targets(points);
        self.shape_label = shape.name().to_string();
        self.status = format!("Shape: {}", shape);
        info!("Shape selected: {}", shape);
    }

    // ── remote shapes ────────────────────────────────────────────────────

    /// Start generating a shape from `description` in the background.
    pub fn request_remote_shape(&mut self, description: &str) {
        let description = description.trim();
        if description.is_empty() {
            self.status = "No description entered".to_string();
            return;
        }
        if let Some(p) = &self.pending {
            self.status = format!("Still generating \"{}\"", p.description);
            return;
        }
        let Some(client) = &self.shape_client else {
            self.status = "Shape service unavailable".to_string();
            return;
        };

        let rx = spawn_request(client.clone(), description.to_string(), self.remote_point_count);
        self.pending = Some(PendingShape { description: description.to_string(), rx });
        self.status = format!("Generating \"{}\"…", description);
    }

    /// Collect a finished remote shape, if any.  Failures keep the current shape.
    pub fn poll_remote(&mut self) {
        let Some(pending) = &self.pending else { return };
        let result = match pending.rx.try_recv() {
            Ok(result)                      => result,
            Err(TryRecvError::Empty)        => return,
            Err(TryRecvError::Disconnected) => Err(ShapeGenError::Transport("request abandoned".into())),
        };
        let Some(PendingShape { description, .. }) = self.pending.take() else { return };

        match result {
            Ok(points) => {
                let n = points.len();
                self.swarm.set_targets(points);
                self.status = format!("Generated \"{}\" ({} points)", description, n);
                info!("Remote shape \"{}\" applied with {} points", description, n);
                self.shape_label = description;
            }
            Err(e) => {
                self.status = format!("Shape generation failed: {}", e);
            }
        }
    }

    pub fn is_generating(&self) -> bool { self.pending.is_some() }

    // ── gestures ─────────────────────────────────────────────────────────

    /// Store a new gesture snapshot.  Audio sinks hear about it only when it
    /// differs from the previous one.
    pub fn apply_gesture(&mut self, gesture: GestureState) {
        if gesture == self.gesture { return; }
        self.gesture = gesture;
        self.push_params();
    }

    pub fn set_tracker_label(&mut self, label: &str) {
        self.tracker_label = label.to_string();
    }

    /// The tracker is gone for good: fall back to "no hand" and keep going.
    pub fn tracker_failed(&mut self, err: &TrackerError) {
        warn!("Hand tracking disabled: {}", err);
        self.tracker_label = "unavailable".to_string();
        self.status = format!("Hand tracking unavailable: {}", err);
        self.apply_gesture(GestureState::NONE);
    }

    fn push_params(&mut self) {
        let params = DroneParams::from_gesture(&self.gesture);
        for sink in self.audio.iter_mut().chain(self.midi.iter_mut()) {
            sink.apply(params);
        }
    }

    // ── audio ────────────────────────────────────────────────────────────

    pub fn toggle_audio(&mut self) {
        if self.audio.is_some() {
            self.disable_audio();
        } else {
            self.enable_audio();
        }
    }

    /// Open the audio device.  Failure is reported, never fatal.
    pub fn enable_audio(&mut self) {
        if self.audio.is_some() { return; }
        match DroneEngine::start() {
            Ok(engine) => {
                self.status = format!("Audio on ({})", engine.device_name());
                self.attach_audio(Box::new(engine));
            }
            Err(e) => {
                warn!("Audio unavailable: {}", e);
                self.status = format!("Audio unavailable: {}", e);
            }
        }
    }

    /// Install an audio sink and bring it up to date with the current gesture.
    pub fn attach_audio(&mut self, mut sink: Box<dyn ParamSink>) {
        sink.apply(DroneParams::from_gesture(&self.gesture));
        info!("Audio sink attached: {}", sink.label());
        self.audio = Some(sink);
    }

    /// Start the audio fade-out and return at once.  The device is released
    /// by a later `tick` when the fade has finished.
    pub fn disable_audio(&mut self) {
        if let Some(mut sink) = self.audio.take() {
            sink.begin_release();
            info!("Audio sink fading out: {}", sink.label());
            self.releasing.push(sink);
            self.status = "Audio off".to_string();
        }
    }

    fn reap_released(&mut self) {
        self.releasing.retain(|sink| {
            let done = sink.is_released();
            if done { info!("Audio sink released: {}", sink.label()); }
            !done
        });
    }

    pub fn enable_midi(&mut self, channel: u8) {
        let mirror = MidiMirror::open(channel);
        match mirror.port_name() {
            Some(port) => info!("MIDI mirror on {} channel {}", port, channel),
            None       => warn!("MIDI mirror has no output port"),
        }
        let mut sink: Box<dyn ParamSink> = Box::new(mirror);
        sink.apply(DroneParams::from_gesture(&self.gesture));
        self.midi = Some(sink);
    }

    // ── per-frame ────────────────────────────────────────────────────────

    pub fn tick(&mut self, dt: f32) {
        self.reap_released();
        self.swarm.step(&self.gesture, dt);
        self.swarm.fill_flat(&mut self.flat);
    }

    /// Release every device.  Audio fades out before the stream closes.
    pub fn shutdown(&mut self) {
        self.disable_audio();
        self.releasing.clear();
        self.midi = None;
        self.pending = None;
        info!("Shut down");
    }

    // ── accessors for the render loop ─────────────────────────────────────

    pub fn gesture(&self) -> GestureState { self.gesture }
    pub fn shape_label(&self) -> &str { &self.shape_label }
    pub fn color(&self) -> ParticleColor { self.color }
    pub fn audio_on(&self) -> bool { self.audio.is_some() }
    pub fn releasing_audio(&self) -> usize { self.releasing.len() }
    pub fn swarm(&self) -> &ParticleSystem { &self.swarm }

    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            positions: &self.flat,
            rotation:  self.swarm.rotation(),
            color:     self.color.argb(),
            shape:     &self.shape_label,
            gesture:   self.gesture,
            audio:     if self.audio_on() { "AUDIO ON" } else { "AUDIO OFF" },
            tracker:   &self.tracker_label,
            status:    &self.status,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the main application loop
// ════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "leap")]
fn start_tracker(_sim_rx: Receiver<SimInput>) -> (Receiver<TrackerMsg>, &'static str) {
    (spawn_tracker(crate::gesture::LeapHandTracker::open), "leap")
}

#[cfg(not(feature = "leap"))]
fn start_tracker(sim_rx: Receiver<SimInput>) -> (Receiver<TrackerMsg>, &'static str) {
    use crate::gesture::SimHandTracker;
    (spawn_tracker(move || Ok(SimHandTracker::new(sim_rx))), "simulated")
}

/// Run the full application.
///
/// Creates the visualizer and the hand tracker (simulation by default,
/// hardware with `--features leap`) and drives the loop at ~60 fps.
pub fn run(cfg: AppConfig) -> Result<(), AppError> {
    // ── Sim hand channel ──────────────────────────────────────────────────
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let (tracker_rx, tracker_name) = start_tracker(sim_rx);
    let mut tracker_rx = Some(tracker_rx);

    let mut vis = Visualizer::new(sim_tx).map_err(AppError::Window)?;

    let mut app = AppState::new(&cfg);
    app.set_tracker_label(tracker_name);
    if cfg.midi_mirror   { app.enable_midi(cfg.midi_channel); }
    if cfg.audio_on_start { app.enable_audio(); }

    let mut last = Instant::now();
    'frame: while vis.is_open() {
        // 1. Window input
        for cmd in vis.poll_input() {
            match cmd {
                UiCommand::Quit => break 'frame,
                UiCommand::GenerateRemote => {
                    let description = prompt_description();
                    app.request_remote_shape(&description);
                    last = Instant::now();
                }
                other => app.handle_command(other),
            }
        }

        // 2. Latest gesture snapshot
        if let Some(rx) = &tracker_rx {
            let mut latest = None;
            let mut closed = false;
            loop {
                match rx.try_recv() {
                    Ok(TrackerMsg::Gesture(g)) => latest = Some(g),
                    Ok(TrackerMsg::Failed(e)) => {
                        latest = None;
                        app.tracker_failed(&e);
                    }
                    Err(TryRecvError::Empty)        => break,
                    Err(TryRecvError::Disconnected) => { closed = true; break; }
                }
            }
            if let Some(g) = latest { app.apply_gesture(g); }
            if closed { tracker_rx = None; }
        }

        // 3. Remote shape results
        app.poll_remote();

        // 4. Simulation
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32().min(0.1);
        last = now;
        app.tick(dt);

        // 5. Render
        vis.render(&app.view());
    }

    app.shutdown();
    Ok(())
}

/// Prompt for a shape description on stdout/stdin.  Pauses the window.
fn prompt_description() -> String {
    print!("\n  Describe a shape: ");
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use morph_shapes::ShapeClientConfig;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    struct Recording(Rc<RefCell<Vec<DroneParams>>>);

    impl ParamSink for Recording {
        fn apply(&mut self, params: DroneParams) { self.0.borrow_mut().push(params); }
        fn label(&self) -> &str { "recording" }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            particle_count: 300,
            seed: Some(42),
            shape_service: ShapeClientConfig {
                endpoint:    "http://127.0.0.1:9/v1/shapes".to_string(),
                api_key_env: "LEAP_MORPH_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
                ..ShapeClientConfig::default()
            },
            ..AppConfig::default()
        }
    }

    /// Sink whose fade finishes when the test says so.
    struct Fading {
        started:  Rc<Cell<bool>>,
        silent:   Rc<Cell<bool>>,
        dropped:  Rc<Cell<bool>>,
    }

    impl ParamSink for Fading {
        fn apply(&mut self, _: DroneParams) {}
        fn label(&self) -> &str { "fading" }
        fn begin_release(&mut self) { self.started.set(true); }
        fn is_released(&self) -> bool { self.silent.get() }
    }

    impl Drop for Fading {
        fn drop(&mut self) { self.dropped.set(true); }
    }

    fn make_app() -> AppState { AppState::new(&test_config()) }

    fn with_recorder(app: &mut AppState) -> Rc<RefCell<Vec<DroneParams>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        app.attach_audio(Box::new(Recording(log.clone())));
        log
    }

    fn wait_for_remote(app: &mut AppState) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while app.is_generating() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            app.poll_remote();
        }
        assert!(!app.is_generating(), "remote request never finished");
    }

    #[test]
    fn starts_on_configured_shape() {
        let app = AppState::new(&AppConfig { shape: Shape::Bottle, ..test_config() });
        assert_eq!(app.shape_label(), "Bottle");
        assert_eq!(app.swarm().targets().len(), PROCEDURAL_POINT_COUNT);
        assert_eq!(app.swarm().len(), 300);
        assert_eq!(app.gesture(), GestureState::NONE);
        assert!(!app.audio_on());
    }

    #[test]
    fn shape_change_keeps_particle_positions() {
        let mut app = make_app();
        for _ in 0..30 { app.tick(1.0 / 60.0); }
        let before = app.swarm().positions().to_vec();
        let old_targets = app.swarm().targets().clone();

        app.handle_command(UiCommand::SelectShape(Shape::Cube));
        assert_eq!(app.swarm().positions(), &before[..]);
        assert_ne!(*app.swarm().targets(), old_targets);
        assert_eq!(app.shape_label(), "Cube");
    }

    #[test]
    fn attached_sink_hears_current_then_only_changes() {
        let mut app = make_app();
        let log = with_recorder(&mut app);
        let idle = DroneParams::from_gesture(&GestureState::NONE);
        assert_eq!(*log.borrow(), vec![idle]);

        app.apply_gesture(GestureState::NONE);
        assert_eq!(log.borrow().len(), 1);

        let open = GestureState::from_openness(0.8);
        app.apply_gesture(open);
        app.apply_gesture(open);
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(log.borrow()[1], DroneParams::from_intensity(0.8));

        app.apply_gesture(GestureState::NONE);
        assert_eq!(log.borrow().last(), Some(&idle));
    }

    #[test]
    fn detected_fist_is_darker_than_idle() {
        // Idle uses intensity 0.1; a detected fist uses its own openness.
        let mut app = make_app();
        let log = with_recorder(&mut app);
        app.apply_gesture(GestureState::from_openness(0.0));
        let fist = log.borrow()[1];
        assert_eq!(fist, DroneParams::from_intensity(0.0));
        assert!(fist.cutoff_hz < log.borrow()[0].cutoff_hz);
    }

    #[test]
    fn tracker_failure_falls_back_to_no_hand() {
        let mut app = make_app();
        let log = with_recorder(&mut app);
        app.apply_gesture(GestureState::from_openness(1.0));

        app.tracker_failed(&TrackerError::PermissionDenied);
        assert_eq!(app.gesture(), GestureState::NONE);
        assert!(app.status.contains("unavailable"));
        assert_eq!(app.view().tracker, "unavailable");
        assert_eq!(log.borrow().last(), Some(&DroneParams::from_gesture(&GestureState::NONE)));

        // The swarm keeps running.
        let t = app.swarm().elapsed();
        app.tick(0.016);
        assert!(app.swarm().elapsed() > t);
    }

    #[test]
    fn remote_failure_keeps_current_shape() {
        let mut app = make_app();
        let targets = app.swarm().targets().clone();

        app.request_remote_shape("a teapot");
        assert!(app.is_generating());
        wait_for_remote(&mut app);

        assert_eq!(*app.swarm().targets(), targets);
        assert_eq!(app.shape_label(), "Sphere");
        assert!(app.status.starts_with("Shape generation failed"), "{}", app.status);
    }

    #[test]
    fn empty_description_is_rejected() {
        let mut app = make_app();
        app.request_remote_shape("   ");
        assert!(!app.is_generating());
        assert_eq!(app.status, "No description entered");
    }

    #[test]
    fn selecting_a_shape_abandons_pending_request() {
        let mut app = make_app();
        app.request_remote_shape("a chair");
        app.select_shape(Shape::Bottle);
        assert!(!app.is_generating());
        app.poll_remote();
        assert_eq!(app.shape_label(), "Bottle");
    }

    #[test]
    fn colour_cycles_through_palette() {
        let mut app = make_app();
        let first = app.color();
        app.handle_command(UiCommand::CycleColor);
        assert_ne!(app.color(), first);
        assert_eq!(app.view().color, app.color().argb());
    }

    #[test]
    fn tick_refreshes_flat_buffer() {
        let mut app = make_app();
        app.tick(1.0 / 60.0);
        let view = app.view();
        assert_eq!(view.positions.len(), 300 * 3);
        let p0 = app.swarm().positions()[0];
        assert_eq!(&view.positions[..3], &[p0.x, p0.y, p0.z]);
    }

    #[test]
    fn shutdown_releases_audio() {
        let mut app = make_app();
        with_recorder(&mut app);
        assert!(app.audio_on());
        app.shutdown();
        assert!(!app.audio_on());
        assert_eq!(app.view().audio, "AUDIO OFF");
    }

    #[test]
    fn audio_off_fades_without_blocking_the_frame() {
        let mut app = make_app();
        let (started, silent, dropped) =
            (Rc::new(Cell::new(false)), Rc::new(Cell::new(false)), Rc::new(Cell::new(false)));
        app.attach_audio(Box::new(Fading {
            started: started.clone(),
            silent:  silent.clone(),
            dropped: dropped.clone(),
        }));

        let t0 = Instant::now();
        app.handle_command(UiCommand::ToggleAudio);
        assert!(t0.elapsed() < Duration::from_millis(100));
        assert!(!app.audio_on());
        assert!(started.get());
        assert!(!dropped.get());
        assert_eq!(app.releasing_audio(), 1);

        // Still fading: frames keep coming and the sink stays alive.
        app.tick(1.0 / 60.0);
        assert!(!dropped.get());
        assert_eq!(app.releasing_audio(), 1);

        silent.set(true);
        app.tick(1.0 / 60.0);
        assert!(dropped.get());
        assert_eq!(app.releasing_audio(), 0);
    }
}
