//! Stroke data model and draft capture.
//!
//! A stroke exists in two forms: a [`DraftStroke`] that accumulates pointer
//! samples while the pen is down, and an immutable [`Stroke`] produced
//! exactly once at pointer-up. Only the frozen form ever reaches the wire.

use kurbo::{CubicBez, ParamCurve, Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a committed stroke.
pub type StrokeId = Uuid;

/// Minimum displacement (world units) before a new input sample is recorded.
pub const MIN_SAMPLE_DISTANCE: f64 = 2.0;

/// Blend factor pulling an interior point toward the midpoint of its
/// neighbors during capture.
pub const SMOOTHING_BLEND: f64 = 0.25;

/// Interpolated sub-points emitted per original segment in curved mode.
pub const CURVE_SUBDIVISIONS: usize = 4;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Blend mode applied when compositing a stroke onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositeMode {
    /// Ordinary source-over painting (pen).
    #[default]
    Normal,
    /// Multiply blending (highlighter).
    Multiply,
}

/// Rendering style carried by every stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: SerializableColor,
    pub width: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub composite: CompositeMode,
}

fn default_opacity() -> f64 {
    1.0
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: SerializableColor::black(),
            width: 2.0,
            opacity: 1.0,
            composite: CompositeMode::Normal,
        }
    }
}

/// One continuous pen gesture: an ordered point sequence in canvas-world
/// coordinates plus rendering style. Immutable once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub id: StrokeId,
    pub points: Vec<Point>,
    #[serde(flatten)]
    pub style: StrokeStyle,
    pub author: String,
}

impl Stroke {
    /// Axis-aligned bounding box of the point sequence.
    pub fn bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };

        let mut rect = Rect::from_points(*first, *first);
        for point in &self.points[1..] {
            rect = rect.union_pt(*point);
        }
        rect
    }

    /// Minimum distance from `point` to any segment of the stroke.
    ///
    /// For a single-point stroke this is the distance to that point.
    pub fn min_segment_distance(&self, point: Point) -> f64 {
        match self.points.len() {
            0 => f64::INFINITY,
            1 => self.points[0].distance(point),
            _ => self
                .points
                .windows(2)
                .map(|seg| point_segment_distance(point, seg[0], seg[1]))
                .fold(f64::INFINITY, f64::min),
        }
    }

    /// Whether an eraser of the given radius at `point` removes this stroke.
    ///
    /// The stroke's own half-width extends the eraser reach, so wide strokes
    /// are erased by touching their painted edge, not their centerline.
    pub fn hit_by_eraser(&self, point: Point, radius: f64) -> bool {
        self.min_segment_distance(point) <= radius + self.style.width / 2.0
    }
}

/// Distance from `point` to the segment `a`-`b`, with the projection
/// parameter clamped to [0, 1].
pub fn point_segment_distance(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return point.distance(a);
    }

    let t = ((point - a).dot(seg) / len_sq).clamp(0.0, 1.0);
    let projection = a + seg * t;
    point.distance(projection)
}

/// Smoothing applied when a draft is frozen into a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingQuality {
    /// Midpoint blending only, applied during capture.
    #[default]
    Standard,
    /// Additionally fit cubic Bezier segments at freeze and emit
    /// interpolated sub-points.
    Curved,
}

/// Mutable, local-only stroke under construction.
///
/// Never leaves the client: remote participants see only the frozen
/// [`Stroke`] broadcast at pointer-up.
#[derive(Debug, Clone)]
pub struct DraftStroke {
    points: Vec<Point>,
    style: StrokeStyle,
    author: String,
}

impl DraftStroke {
    pub fn new(start: Point, style: StrokeStyle, author: impl Into<String>) -> Self {
        Self {
            points: vec![start],
            style,
            author: author.into(),
        }
    }

    /// Record a pointer sample.
    ///
    /// Samples closer than [`MIN_SAMPLE_DISTANCE`] to the previous recorded
    /// point are discarded as jitter. Accepted samples trigger a smoothing
    /// pass that blends the now-interior previous point toward the midpoint
    /// of its neighbors by [`SMOOTHING_BLEND`].
    ///
    /// Returns whether the sample was recorded.
    pub fn append(&mut self, point: Point) -> bool {
        let last = self.points[self.points.len() - 1];
        if last.distance(point) < MIN_SAMPLE_DISTANCE {
            return false;
        }

        self.points.push(point);

        let n = self.points.len();
        if n >= 3 {
            let mid = self.points[n - 3].midpoint(self.points[n - 1]);
            self.points[n - 2] = self.points[n - 2].lerp(mid, SMOOTHING_BLEND);
        }

        true
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Freeze the draft into an immutable stroke.
    pub fn freeze(self, quality: SmoothingQuality) -> Stroke {
        let points = match quality {
            SmoothingQuality::Standard => self.points,
            SmoothingQuality::Curved => resample_curved(&self.points),
        };

        Stroke {
            id: Uuid::new_v4(),
            points,
            style: self.style,
            author: self.author,
        }
    }
}

/// Fit Catmull-Rom derived cubic Bezier segments through the captured points
/// and evaluate [`CURVE_SUBDIVISIONS`] sub-points per original segment.
fn resample_curved(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(points.len() * CURVE_SUBDIVISIONS);
    out.push(points[0]);

    for i in 0..points.len() - 1 {
        let p0 = if i == 0 { points[0] } else { points[i - 1] };
        let p1 = points[i];
        let p2 = points[i + 1];
        let p3 = if i + 2 < points.len() {
            points[i + 2]
        } else {
            points[i + 1]
        };

        // Catmull-Rom tangents expressed as Bezier control points.
        let c1 = p1 + (p2 - p0) * (1.0 / 6.0);
        let c2 = p2 - (p3 - p1) * (1.0 / 6.0);
        let segment = CubicBez::new(p1, c1, c2, p2);

        for step in 1..=CURVE_SUBDIVISIONS {
            out.push(segment.eval(step as f64 / CURVE_SUBDIVISIONS as f64));
        }
    }

    out
}
