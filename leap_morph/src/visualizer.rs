//! Software-rendered visualizer using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                                                          │
//! │            particle cloud (perspective, additive)        │
//! │                                                          │
//! ├──────────────────────────────────────────────────────────┤
//! │  SHAPE  ·  HAND  ·  AUDIO        [openness bar]          │
//! │  status line                                             │
//! │  key legend                                              │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::sync::mpsc::Sender;

use glam::Mat3;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use morph_shapes::Shape;
use morph_swarm::{GestureState, Point3, Rotation};

use crate::gesture::{SimInput, SimKey};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:    usize = 960;
pub const WIN_H:    usize = 720;
const HUD_H:        usize = 64;
const VIEW_H:       usize = WIN_H - HUD_H;
const GLYPH_SCALE:  usize = 2;
const BAR_W:        usize = 200;
const BG_COLOR:     u32   = 0xFF05060C;
const HUD_BG:       u32   = 0xFF10142A;
const OPEN_COLOR:   u32   = 0xFFFFD700;
const TEXT_COLOR:   u32   = 0xFFEEEEEE;
const DIM_COLOR:    u32   = 0xFF888888;

/// Distance from the camera to the swarm origin.
const CAMERA_DIST:  f32 = 7.0;
/// Focal length in pixels.
const FOCAL:        f32 = 520.0;
const NEAR_PLANE:   f32 = 0.5;
/// Fraction of last frame's brightness kept, giving short motion trails.
const TRAIL_KEEP:   f32 = 0.55;
/// Brightness one particle adds to a pixel at full shade.
const SPLAT_LEVEL:  f32 = 0.35;

// ════════════════════════════════════════════════════════════════════════════
// UiCommand / FrameView
// ════════════════════════════════════════════════════════════════════════════

/// Discrete actions requested from the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiCommand {
    SelectShape(Shape),
    /// Ask the shape service for a new shape; the description is typed in the terminal.
    GenerateRemote,
    ToggleAudio,
    CycleColor,
    Quit,
}

/// Everything drawn in one frame.
pub struct FrameView<'a> {
    /// Particle positions as `x, y, z, …`.
    pub positions: &'a [f32],
    pub rotation:  Rotation,
    /// Opaque ARGB particle colour.
    pub color:     u32,
    pub shape:     &'a str,
    pub gesture:   GestureState,
    pub audio:     &'a str,
    pub tracker:   &'a str,
    pub status:    &'a str,
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    buf:    Vec<u32>,
    sim_tx: Sender<SimInput>,
}

impl Visualizer {
    pub fn new(sim_tx: Sender<SimInput>) -> Result<Self, String> {
        let mut window = Window::new(
            "Leap Morph",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        ).map_err(|e| e.to_string())?;

        window.limit_update_rate(Some(std::time::Duration::from_millis(16))); // ~60fps

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; WIN_W * WIN_H],
            sim_tx,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Poll the keyboard.  Hand-simulation keys go straight to the simulated
    /// tracker; everything else is returned for the app to handle.
    pub fn poll_input(&mut self) -> Vec<UiCommand> {
        let mut cmds = Vec::new();
        if !self.window.is_open() {
            cmds.push(UiCommand::Quit);
            return cmds;
        }

        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        let held     = |k: Key| self.window.is_key_pressed(k, KeyRepeat::Yes);

        if one_shot(Key::Q) || one_shot(Key::Escape) {
            cmds.push(UiCommand::Quit);
            return cmds;
        }
        for (keys, shape) in [
            ([Key::Key1, Key::NumPad1], Shape::Sphere),
            ([Key::Key2, Key::NumPad2], Shape::Cube),
            ([Key::Key3, Key::NumPad3], Shape::Bottle),
        ] {
            if keys.iter().any(|&k| one_shot(k)) {
                cmds.push(UiCommand::SelectShape(shape));
            }
        }
        if one_shot(Key::G) { cmds.push(UiCommand::GenerateRemote); }
        if one_shot(Key::M) { cmds.push(UiCommand::ToggleAudio); }
        if one_shot(Key::C) { cmds.push(UiCommand::CycleColor); }

        // Simulated hand
        if one_shot(Key::H) {
            let _ = self.sim_tx.send(SimInput::KeyDown(SimKey::ToggleHand));
        }
        if held(Key::Up) {
            let _ = self.sim_tx.send(SimInput::KeyDown(SimKey::OpennessUp));
        }
        if held(Key::Down) {
            let _ = self.sim_tx.send(SimInput::KeyDown(SimKey::OpennessDown));
        }

        cmds
    }

    /// Render one frame.
    pub fn render(&mut self, view: &FrameView<'_>) {
        self.fade_scene();

        let rot = view.rotation.matrix();
        for p in view.positions.chunks_exact(3) {
            if let Some((x, y, shade)) = project(Point3::new(p[0], p[1], p[2]), &rot) {
                self.splat(x, y, view.color, shade);
            }
        }

        self.draw_hud(view);
        self.window.update_with_buffer(&self.buf, WIN_W, WIN_H).ok();
    }

    // ── Scene ─────────────────────────────────────────────────────────────

    fn fade_scene(&mut self) {
        for px in &mut self.buf[..VIEW_H * WIN_W] {
            *px = blend(BG_COLOR, *px, TRAIL_KEEP);
        }
    }

    /// 2×2 additive splat.
    fn splat(&mut self, x: usize, y: usize, color: u32, shade: f32) {
        let level = SPLAT_LEVEL * shade;
        for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            let (sx, sy) = (x + dx, y + dy);
            if sx < WIN_W && sy < VIEW_H {
                let i = sy * WIN_W + sx;
                self.buf[i] = add_scaled(self.buf[i], color, level);
            }
        }
    }

    // ── HUD ───────────────────────────────────────────────────────────────

    fn draw_hud(&mut self, view: &FrameView<'_>) {
        self.fill_rect(0, VIEW_H, WIN_W, HUD_H, HUD_BG);

        let row1 = VIEW_H + 6;
        let row2 = VIEW_H + 24;
        let row3 = VIEW_H + 44;

        let heading = format!("SHAPE: {}   HAND: {}   {}", view.shape, view.tracker, view.audio);
        self.draw_label(&heading, 10, row1, TEXT_COLOR);

        // Openness bar
        let bar_x = WIN_W - BAR_W - 12;
        self.draw_border(bar_x, row1, BAR_W, 12, DIM_COLOR);
        let g = view.gesture;
        if g.detected {
            let fill = ((BAR_W - 2) as f32 * g.openness.clamp(0.0, 1.0)) as usize;
            let color = if g.is_open { OPEN_COLOR } else { view.color };
            self.fill_rect(bar_x + 1, row1 + 1, fill, 10, color);
        } else {
            self.draw_label("NO HAND", bar_x + 6, row1 + 1, DIM_COLOR);
        }

        self.draw_label(view.status, 10, row2, TEXT_COLOR);
        self.draw_label(
            "1/2/3=shape  G=generate  M=audio  C=colour  H=hand  up/down=open  Q=quit",
            10, row3, DIM_COLOR,
        );
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y+h).min(WIN_H) {
            for col in x..(x+w).min(WIN_W) {
                self.buf[row * WIN_W + col] = color;
            }
        }
    }

    fn draw_border(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 { return; }
        for col in x..(x+w).min(WIN_W) {
            self.set_pixel(col, y, color);
            self.set_pixel(col, y + h - 1, color);
        }
        for row in y..(y+h).min(WIN_H) {
            self.set_pixel(x, row, color);
            self.set_pixel(x + w - 1, row, color);
        }
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < WIN_W && y < WIN_H {
            self.buf[y * WIN_W + x] = color;
        }
    }

    /// 3×5 bitmap font drawn at [`GLYPH_SCALE`].
    fn draw_label(&mut self, text: &str, x: usize, y: usize, color: u32) {
        let mut cx = x;
        for ch in text.chars() {
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        for sy in 0..GLYPH_SCALE {
                            for sx in 0..GLYPH_SCALE {
                                self.set_pixel(
                                    cx + col * GLYPH_SCALE + sx,
                                    y + row * GLYPH_SCALE + sy,
                                    color,
                                );
                            }
                        }
                    }
                }
            }
            cx += 4 * GLYPH_SCALE;
            if cx + 4 * GLYPH_SCALE > WIN_W { break; }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Projection
// ════════════════════════════════════════════════════════════════════════════

/// Rotate `p` by `rot` and project it onto the scene area.
///
/// Returns the pixel and a depth shade in `[0.25, 1]` (nearer is brighter),
/// or `None` when the point is behind the near plane or off screen.
pub fn project(p: Point3, rot: &Mat3) -> Option<(usize, usize, f32)> {
    let r = *rot * p;
    let depth = CAMERA_DIST - r.z;
    if depth < NEAR_PLANE { return None; }

    let sx = WIN_W as f32 / 2.0 + r.x * FOCAL / depth;
    let sy = VIEW_H as f32 / 2.0 - r.y * FOCAL / depth;
    if sx < 0.0 || sy < 0.0 || sx >= WIN_W as f32 || sy >= VIEW_H as f32 {
        return None;
    }

    let shade = (1.6 - depth / CAMERA_DIST).clamp(0.25, 1.0);
    Some((sx as usize, sy as usize, shade))
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '(' => [0b010, 0b100, 0b100, 0b100, 0b010],
        ')' => [0b010, 0b001, 0b001, 0b001, 0b010],
        '"' | '\'' => [0b101, 0b101, 0b000, 0b000, 0b000],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

/// Alpha-blend two ARGB colors. `t` = 0.0 → all `a`, `t` = 1.0 → all `b`.
fn blend(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    let lerp = |ca: u32, cb: u32| (ca as f32 * (1.0-t) + cb as f32 * t) as u32;
    let ar = (a >> 16) & 0xFF; let br = (b >> 16) & 0xFF;
    let ag = (a >>  8) & 0xFF; let bg = (b >>  8) & 0xFF;
    let ab =  a        & 0xFF; let bb =  b        & 0xFF;
    0xFF000000 | (lerp(ar,br) << 16) | (lerp(ag,bg) << 8) | lerp(ab,bb)
}

/// Add `level × src` to `dst`, saturating each channel.
fn add_scaled(dst: u32, src: u32, level: f32) -> u32 {
    let ch = |shift: u32| {
        let d = (dst >> shift) & 0xFF;
        let s = ((src >> shift) & 0xFF) as f32 * level;
        (d + s as u32).min(0xFF)
    };
    0xFF000000 | (ch(16) << 16) | (ch(8) << 8) | ch(0)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: (usize, usize) = (WIN_W / 2, VIEW_H / 2);

    #[test]
    fn origin_projects_to_scene_center() {
        let (x, y, shade) = project(Point3::ZERO, &Mat3::IDENTITY).unwrap();
        assert_eq!((x, y), CENTER);
        assert!((shade - 0.6).abs() < 1e-6);
    }

    #[test]
    fn screen_axes_follow_world_axes() {
        let id = Mat3::IDENTITY;
        let (rx, ry, _) = project(Point3::new(1.0, 0.0, 0.0), &id).unwrap();
        assert!(rx > CENTER.0 && ry == CENTER.1);
        let (ux, uy, _) = project(Point3::new(0.0, 1.0, 0.0), &id).unwrap();
        assert!(uy < CENTER.1 && ux == CENTER.0);
    }

    #[test]
    fn nearer_points_are_larger_and_brighter() {
        let id = Mat3::IDENTITY;
        let (near_x, _, near_shade) = project(Point3::new(1.0, 0.0, 1.0), &id).unwrap();
        let (far_x, _, far_shade) = project(Point3::new(1.0, 0.0, -1.0), &id).unwrap();
        assert!(near_x > far_x);
        assert!(near_shade > far_shade);
    }

    #[test]
    fn behind_camera_and_off_screen_are_culled() {
        let id = Mat3::IDENTITY;
        assert!(project(Point3::new(0.0, 0.0, CAMERA_DIST + 1.0), &id).is_none());
        assert!(project(Point3::new(100.0, 0.0, 0.0), &id).is_none());
        assert!(project(Point3::new(0.0, -100.0, 0.0), &id).is_none());
    }

    #[test]
    fn exploded_swarm_still_fits_on_screen() {
        // Full-intensity burst pushes sphere points out to radius 4.2.
        let id = Mat3::IDENTITY;
        for p in [Point3::new(4.2, 0.0, 0.0), Point3::new(0.0, 4.2, 0.0), Point3::new(0.0, -4.2, 0.0)] {
            assert!(project(p, &id).is_some(), "{:?} culled", p);
        }
    }

    #[test]
    fn yaw_turns_x_into_depth() {
        let rot = Rotation { yaw: std::f32::consts::FRAC_PI_2, tilt: 0.0 }.matrix();
        let (x, _, _) = project(Point3::new(1.0, 0.0, 0.0), &rot).unwrap();
        assert!((x as i64 - CENTER.0 as i64).abs() <= 1);
    }

    #[test]
    fn additive_splat_saturates() {
        assert_eq!(add_scaled(0xFF000000, 0xFFFFFFFF, 0.5), 0xFF7F7F7F);
        assert_eq!(add_scaled(0xFFF0F0F0, 0xFFFFFFFF, 1.0), 0xFFFFFFFF);
        assert_eq!(add_scaled(0xFF102030, 0xFF000000, 1.0), 0xFF102030);
    }

    #[test]
    fn blend_endpoints() {
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 0.0), 0xFF000000);
        assert_eq!(blend(0xFF000000, 0xFFFFFFFF, 1.0), 0xFFFFFFFF);
    }
}
