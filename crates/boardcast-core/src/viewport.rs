//! Viewport transform engine: pan, anchored zoom, pinch gestures, inertia.
//!
//! Pure geometry over a finite world rectangle. The controller never touches
//! the network; input handling feeds it events and the draw engine uses its
//! coordinate mapping.

use crate::input::{MouseButton, TouchPoint, WheelEvent};
use kurbo::{Point, Size, Vec2};

#[cfg(target_arch = "wasm32")]
use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// Minimum allowed zoom scale.
pub const MIN_SCALE: f64 = 0.2;
/// Maximum allowed zoom scale.
pub const MAX_SCALE: f64 = 3.0;

/// Exponential rate converting wheel delta units into a zoom factor.
const WHEEL_ZOOM_RATE: f64 = 0.0015;
/// Scale factor applied to wheel deltas when panning.
const WHEEL_PAN_RATE: f64 = 0.8;

/// Gesture-end speed (px/ms) above which inertial panning starts.
const INERTIA_START_SPEED: f64 = 0.05;
/// Per-frame friction factor applied to the inertial velocity.
const INERTIA_FRICTION: f64 = 0.92;
/// Per-frame speed (px) below which inertial motion stops.
const INERTIA_STOP_SPEED: f64 = 0.5;
/// Assumed animation-frame interval for converting velocity to a per-frame
/// displacement.
const INERTIA_FRAME_MS: f64 = 16.0;

/// Blend factor folding the newest velocity sample into the running value.
const VELOCITY_BLEND: f64 = 0.3;

/// Transient state for one multi-touch gesture.
#[derive(Debug, Clone)]
struct GestureSession {
    initial_distance: f64,
    initial_scale: f64,
    /// World coordinate under the gesture-start midpoint; held visually
    /// stationary under the live midpoint for the gesture's duration.
    world_anchor: Point,
    last_midpoint: Point,
    last_move: Instant,
    /// Smoothed midpoint velocity in px/ms.
    velocity: Vec2,
}

/// Pan/zoom state for one session.
///
/// The offset is the screen position of the world origin; a world point `w`
/// renders at `offset + w * scale`. Both scale and offset are always kept
/// inside their valid ranges.
#[derive(Debug, Clone)]
pub struct ViewportController {
    offset: Vec2,
    scale: f64,
    world: Size,
    viewport: Size,
    gesture: Option<GestureSession>,
    /// Residual velocity in px/frame while inertia is running.
    inertia: Option<Vec2>,
}

impl ViewportController {
    pub fn new(world: Size, viewport: Size) -> Self {
        let mut controller = Self {
            offset: Vec2::ZERO,
            scale: 1.0,
            world,
            viewport,
            gesture: None,
            inertia: None,
        };
        controller.offset = controller.clamp_pan(0.0, 0.0, controller.scale);
        controller
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn world(&self) -> Size {
        self.world
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Update the viewport size, re-clamping the offset so the world stays
    /// reachable.
    pub fn set_viewport_size(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.offset = self.clamp_pan(self.offset.x, self.offset.y, self.scale);
    }

    /// Convert a screen point to world coordinates.
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.offset.x) / self.scale,
            (screen.y - self.offset.y) / self.scale,
        )
    }

    /// Convert a world point to screen coordinates.
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point::new(
            world.x * self.scale + self.offset.x,
            world.y * self.scale + self.offset.y,
        )
    }

    /// Clamp a candidate offset for the given scale.
    ///
    /// On an axis where the scaled world fits inside the viewport the world
    /// is centered; otherwise the offset is constrained so the world edges
    /// never pull inside the viewport edges.
    pub fn clamp_pan(&self, x: f64, y: f64, scale: f64) -> Vec2 {
        Vec2::new(
            clamp_axis(x, self.world.width * scale, self.viewport.width),
            clamp_axis(y, self.world.height * scale, self.viewport.height),
        )
    }

    /// Pan by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset = self.clamp_pan(self.offset.x + dx, self.offset.y + dy, self.scale);
    }

    /// Zoom by `factor`, keeping the world point under `anchor` fixed.
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        if (new_scale - self.scale).abs() < f64::EPSILON {
            return;
        }

        let world_anchor = self.screen_to_world(anchor);
        self.scale = new_scale;
        self.offset = self.clamp_pan(
            anchor.x - world_anchor.x * new_scale,
            anchor.y - world_anchor.y * new_scale,
            new_scale,
        );
    }

    /// Pan from a single-pointer drag (primary or middle button).
    pub fn on_pointer_drag(&mut self, delta: Vec2, button: MouseButton) {
        match button {
            MouseButton::Left | MouseButton::Middle => self.pan_by(delta.x, delta.y),
            MouseButton::Right => {}
        }
    }

    /// Begin a multi-touch gesture. Fewer than two contacts are handled by
    /// the pointer-drag path instead.
    pub fn on_gesture_start(&mut self, touches: &[TouchPoint]) {
        self.inertia = None;
        if touches.len() < 2 {
            self.gesture = None;
            return;
        }

        let midpoint = touch_midpoint(touches);
        self.gesture = Some(GestureSession {
            initial_distance: touch_distance(touches).max(f64::EPSILON),
            initial_scale: self.scale,
            world_anchor: self.screen_to_world(midpoint),
            last_midpoint: midpoint,
            last_move: Instant::now(),
            velocity: Vec2::ZERO,
        });
    }

    /// Update an active gesture: pinch scale against the start distance,
    /// with the anchor world point pinned under the live midpoint.
    pub fn on_gesture_move(&mut self, touches: &[TouchPoint]) {
        if touches.len() < 2 {
            return;
        }
        let Some(gesture) = &mut self.gesture else {
            return;
        };

        let midpoint = touch_midpoint(touches);
        let distance = touch_distance(touches);

        let new_scale = (gesture.initial_scale * distance / gesture.initial_distance)
            .clamp(MIN_SCALE, MAX_SCALE);

        // Velocity from midpoint motion, dt floored to one millisecond so a
        // same-frame pair of events cannot produce an unbounded sample.
        let dt_ms = (gesture.last_move.elapsed().as_secs_f64() * 1000.0).max(1.0);
        let sample = (midpoint - gesture.last_midpoint) * (1.0 / dt_ms);
        gesture.velocity = gesture.velocity * (1.0 - VELOCITY_BLEND) + sample * VELOCITY_BLEND;
        gesture.last_midpoint = midpoint;
        gesture.last_move = Instant::now();

        let world_anchor = gesture.world_anchor;
        self.scale = new_scale;
        self.offset = self.clamp_pan(
            midpoint.x - world_anchor.x * new_scale,
            midpoint.y - world_anchor.y * new_scale,
            new_scale,
        );
    }

    /// End the gesture, converting residual midpoint velocity into inertial
    /// panning when it is above the start threshold.
    pub fn on_gesture_end(&mut self) {
        if let Some(gesture) = self.gesture.take() {
            if gesture.velocity.hypot() > INERTIA_START_SPEED {
                self.inertia = Some(gesture.velocity * INERTIA_FRAME_MS);
            }
        }
    }

    /// Advance inertial panning by one animation frame.
    ///
    /// Returns true while motion continues; callers stop scheduling frames
    /// once it returns false.
    pub fn tick_inertia(&mut self) -> bool {
        let Some(velocity) = self.inertia else {
            return false;
        };

        self.pan_by(velocity.x, velocity.y);
        let slowed = velocity * INERTIA_FRICTION;
        if slowed.hypot() < INERTIA_STOP_SPEED {
            self.inertia = None;
            false
        } else {
            self.inertia = Some(slowed);
            true
        }
    }

    /// Whether inertial panning is currently running.
    pub fn is_coasting(&self) -> bool {
        self.inertia.is_some()
    }

    /// Wheel input: zoom (anchored at the pointer) with the zoom modifier
    /// held, otherwise pan by the scaled deltas.
    pub fn on_wheel(&mut self, event: WheelEvent) {
        if event.modifiers.zoom_modifier() {
            let factor = (-event.delta.y * WHEEL_ZOOM_RATE).exp();
            self.zoom_at(event.position, factor);
        } else {
            self.pan_by(
                -event.delta.x * WHEEL_PAN_RATE,
                -event.delta.y * WHEEL_PAN_RATE,
            );
        }
    }
}

fn clamp_axis(offset: f64, scaled_world: f64, viewport: f64) -> f64 {
    if scaled_world <= viewport {
        (viewport - scaled_world) / 2.0
    } else {
        offset.clamp(viewport - scaled_world, 0.0)
    }
}

fn touch_midpoint(touches: &[TouchPoint]) -> Point {
    touches[0].position.midpoint(touches[1].position)
}

fn touch_distance(touches: &[TouchPoint]) -> f64 {
    touches[0].position.distance(touches[1].position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;

    fn controller() -> ViewportController {
        ViewportController::new(Size::new(8000.0, 6000.0), Size::new(800.0, 600.0))
    }

    fn touches(a: (f64, f64), b: (f64, f64)) -> Vec<TouchPoint> {
        vec![
            TouchPoint::new(1, Point::new(a.0, a.1)),
            TouchPoint::new(2, Point::new(b.0, b.1)),
        ]
    }

    #[test]
    fn test_clamp_rejects_positive_offset_when_world_larger() {
        let vp = controller();
        let clamped = vp.clamp_pan(100.0, 100.0, 1.0);
        assert_eq!(clamped, Vec2::ZERO);
    }

    #[test]
    fn test_clamp_limits_far_edge() {
        let vp = controller();
        let clamped = vp.clamp_pan(-10_000.0, -10_000.0, 1.0);
        assert_eq!(clamped, Vec2::new(800.0 - 8000.0, 600.0 - 6000.0));
    }

    #[test]
    fn test_clamp_centers_small_world() {
        let vp = ViewportController::new(Size::new(400.0, 300.0), Size::new(800.0, 600.0));
        let clamped = vp.clamp_pan(123.0, -456.0, 1.0);
        assert_eq!(clamped, Vec2::new(200.0, 150.0));
    }

    #[test]
    fn test_clamp_valid_across_scale_range() {
        let vp = controller();
        let mut scale = MIN_SCALE;
        while scale <= MAX_SCALE {
            let clamped = vp.clamp_pan(37.0, -9999.0, scale);
            for (offset, world, view) in [
                (clamped.x, 8000.0 * scale, 800.0),
                (clamped.y, 6000.0 * scale, 600.0),
            ] {
                if world <= view {
                    assert_eq!(offset, (view - world) / 2.0);
                } else {
                    assert!(offset <= 0.0 && offset >= view - world);
                }
            }
            scale += 0.2;
        }
    }

    #[test]
    fn test_zoom_clamped_to_bounds() {
        let mut vp = controller();
        vp.zoom_at(Point::new(400.0, 300.0), 0.001);
        assert_eq!(vp.scale(), MIN_SCALE);

        vp.zoom_at(Point::new(400.0, 300.0), 1000.0);
        assert_eq!(vp.scale(), MAX_SCALE);
    }

    #[test]
    fn test_zoom_preserves_anchor_world_point() {
        let mut vp = controller();
        vp.pan_by(-1000.0, -1000.0);

        let anchor = Point::new(400.0, 300.0);
        let before = vp.screen_to_world(anchor);
        vp.zoom_at(anchor, 1.5);
        let after = vp.screen_to_world(anchor);

        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn test_pinch_doubles_scale_and_pins_midpoint() {
        let mut vp = controller();
        vp.pan_by(-2000.0, -2000.0);

        // Distance 100 at start, 200 after: scale 1 -> 2.
        let start = touches((350.0, 300.0), (450.0, 300.0));
        let moved = touches((300.0, 300.0), (500.0, 300.0));
        let midpoint = Point::new(400.0, 300.0);

        vp.on_gesture_start(&start);
        let world_before = vp.screen_to_world(midpoint);
        vp.on_gesture_move(&moved);

        assert!((vp.scale() - 2.0).abs() < 1e-12);
        let world_after = vp.screen_to_world(midpoint);
        assert!((world_before.x - world_after.x).abs() < 1e-9);
        assert!((world_before.y - world_after.y).abs() < 1e-9);
    }

    #[test]
    fn test_pinch_scale_clamped() {
        let mut vp = controller();
        let start = touches((390.0, 300.0), (410.0, 300.0));
        let moved = touches((0.0, 300.0), (800.0, 300.0));

        vp.on_gesture_start(&start);
        vp.on_gesture_move(&moved);
        assert_eq!(vp.scale(), MAX_SCALE);
    }

    #[test]
    fn test_single_touch_starts_no_gesture() {
        let mut vp = controller();
        vp.on_gesture_start(&[TouchPoint::new(1, Point::new(10.0, 10.0))]);
        vp.on_gesture_end();
        assert!(!vp.is_coasting());
    }

    #[test]
    fn test_slow_gesture_end_has_no_inertia() {
        let mut vp = controller();
        let start = touches((350.0, 300.0), (450.0, 300.0));
        vp.on_gesture_start(&start);
        // No movement: velocity stays zero.
        vp.on_gesture_move(&start);
        vp.on_gesture_end();
        assert!(!vp.is_coasting());
    }

    #[test]
    fn test_fast_gesture_end_coasts_until_stopped() {
        let mut vp = controller();
        vp.pan_by(-2000.0, -2000.0);
        let before = vp.offset();

        vp.on_gesture_start(&touches((350.0, 300.0), (450.0, 300.0)));
        // A 60 px midpoint jump inside one floored millisecond.
        vp.on_gesture_move(&touches((410.0, 300.0), (510.0, 300.0)));
        vp.on_gesture_end();
        assert!(vp.is_coasting());

        let mut frames = 0;
        while vp.tick_inertia() {
            frames += 1;
            assert!(frames < 1000, "inertia must decay to a stop");
        }

        assert!(!vp.is_coasting());
        assert!(vp.offset().x > before.x);
        // Still clamped after coasting.
        let clamped = vp.clamp_pan(vp.offset().x, vp.offset().y, vp.scale());
        assert_eq!(clamped, vp.offset());
    }

    #[test]
    fn test_pointer_drag_pans_left_and_middle_only() {
        let mut vp = controller();
        vp.pan_by(-100.0, -100.0);
        let start = vp.offset();

        vp.on_pointer_drag(Vec2::new(-10.0, -5.0), MouseButton::Left);
        assert_eq!(vp.offset(), Vec2::new(start.x - 10.0, start.y - 5.0));

        vp.on_pointer_drag(Vec2::new(-10.0, -5.0), MouseButton::Middle);
        assert_eq!(vp.offset(), Vec2::new(start.x - 20.0, start.y - 10.0));

        let fixed = vp.offset();
        vp.on_pointer_drag(Vec2::new(-10.0, -5.0), MouseButton::Right);
        assert_eq!(vp.offset(), fixed);
    }

    #[test]
    fn test_wheel_pans_without_modifier() {
        let mut vp = controller();
        vp.pan_by(-100.0, -100.0);
        let start = vp.offset();

        vp.on_wheel(WheelEvent {
            position: Point::new(400.0, 300.0),
            delta: Vec2::new(10.0, 20.0),
            modifiers: Modifiers::default(),
        });

        assert_eq!(
            vp.offset(),
            Vec2::new(start.x - 10.0 * 0.8, start.y - 20.0 * 0.8)
        );
    }

    #[test]
    fn test_wheel_zooms_with_modifier() {
        let mut vp = controller();
        let before = vp.scale();

        vp.on_wheel(WheelEvent {
            position: Point::new(400.0, 300.0),
            delta: Vec2::new(0.0, -120.0),
            modifiers: Modifiers {
                ctrl: true,
                ..Modifiers::default()
            },
        });

        assert!(vp.scale() > before);
        assert!(vp.scale() <= MAX_SCALE);
    }

    #[test]
    fn test_screen_world_roundtrip() {
        let mut vp = controller();
        vp.pan_by(-321.0, -123.0);
        vp.zoom_at(Point::new(200.0, 200.0), 1.7);

        let screen = Point::new(245.0, 411.0);
        let back = vp.world_to_screen(vp.screen_to_world(screen));
        assert!((back.x - screen.x).abs() < 1e-9);
        assert!((back.y - screen.y).abs() < 1e-9);
    }

    #[test]
    fn test_viewport_resize_reclamps() {
        let mut vp = ViewportController::new(Size::new(1000.0, 1000.0), Size::new(800.0, 600.0));
        vp.pan_by(-200.0, -400.0);

        // Growing the viewport beyond the world recenters both axes.
        vp.set_viewport_size(Size::new(2000.0, 2000.0));
        assert_eq!(vp.offset(), Vec2::new(500.0, 500.0));
    }
}
