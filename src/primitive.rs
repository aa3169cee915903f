use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tiny_skia as sk;

use crate::geom::{ensure_ccw, polygon_area, rotate_point, CanvasBounds};

/// below this many square pixels a primitive is treated as degenerate
pub const MIN_PRIMITIVE_AREA: f32 = 0.25;

/// how many times propose/mutate resample a degenerate result before giving up
pub const MAX_SHAPE_RETRIES: u32 = 16;

/// smallest radius / side a shape may shrink to (pixels)
const MIN_EXTENT_PX: f32 = 0.5;

/// angle parameters move this many degrees per pixel of positional step
const ANGLE_DEGREES_PER_PX: f32 = 3.0;

/// the shape vocabulary. used by settings to choose which kinds a run may place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Triangle,
    Rectangle,
    Ellipse,
    Stroke,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 4] = [
        ShapeKind::Triangle,
        ShapeKind::Rectangle,
        ShapeKind::Ellipse,
        ShapeKind::Stroke,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Triangle => "triangle",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Stroke => "stroke",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShapeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShapeKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown shape kind '{s}' (expected triangle, rectangle, ellipse or stroke)"))
    }
}

/// geometric part of a primitive. angles are degrees, clockwise (SVG rotate()).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Triangle { points: [(f32, f32); 3] },
    /// axis-aligned, x0 < x1 and y0 < y1 after clamping
    Rectangle { x0: f32, y0: f32, x1: f32, y1: f32 },
    Ellipse { cx: f32, cy: f32, rx: f32, ry: f32, angle: f32 },
    /// rotated rectangular brush stroke centered on (cx, cy)
    Stroke { cx: f32, cy: f32, length: f32, width: f32, angle: f32 },
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Triangle { .. } => ShapeKind::Triangle,
            Shape::Rectangle { .. } => ShapeKind::Rectangle,
            Shape::Ellipse { .. } => ShapeKind::Ellipse,
            Shape::Stroke { .. } => ShapeKind::Stroke,
        }
    }

    /// number of real-valued geometric parameters
    pub fn param_count(&self) -> usize {
        match self {
            Shape::Triangle { .. } => 6,
            Shape::Rectangle { .. } => 4,
            Shape::Ellipse { .. } | Shape::Stroke { .. } => 5,
        }
    }

    fn params(&self) -> [f32; 6] {
        match *self {
            Shape::Triangle { points: [a, b, c] } => [a.0, a.1, b.0, b.1, c.0, c.1],
            Shape::Rectangle { x0, y0, x1, y1 } => [x0, y0, x1, y1, 0.0, 0.0],
            Shape::Ellipse { cx, cy, rx, ry, angle } => [cx, cy, rx, ry, angle, 0.0],
            Shape::Stroke { cx, cy, length, width, angle } => [cx, cy, length, width, angle, 0.0],
        }
    }

    fn with_params(&self, p: [f32; 6]) -> Shape {
        match self {
            Shape::Triangle { .. } => Shape::Triangle { points: [(p[0], p[1]), (p[2], p[3]), (p[4], p[5])] },
            Shape::Rectangle { .. } => Shape::Rectangle { x0: p[0], y0: p[1], x1: p[2], y1: p[3] },
            Shape::Ellipse { .. } => Shape::Ellipse { cx: p[0], cy: p[1], rx: p[2], ry: p[3], angle: p[4] },
            Shape::Stroke { .. } => Shape::Stroke { cx: p[0], cy: p[1], length: p[2], width: p[3], angle: p[4] },
        }
    }

    /// true if parameter `i` is a rotation (degrees) rather than a pixel quantity
    fn is_angle_param(&self, i: usize) -> bool {
        matches!(self, Shape::Ellipse { .. } | Shape::Stroke { .. }) && i == 4
    }

    /// re-establish every structural constraint: coordinates inside the canvas,
    /// positive extents, ordered rectangle corners, CCW triangles, angles in [0, 180).
    pub fn clamped(&self, bounds: &CanvasBounds) -> Shape {
        let max_extent = bounds.extent().max(MIN_EXTENT_PX);
        match *self {
            Shape::Triangle { mut points } => {
                for p in &mut points {
                    p.0 = bounds.clamp_x(p.0);
                    p.1 = bounds.clamp_y(p.1);
                }
                ensure_ccw(&mut points);
                Shape::Triangle { points }
            }
            Shape::Rectangle { x0, y0, x1, y1 } => {
                let (x0, x1) = (bounds.clamp_x(x0), bounds.clamp_x(x1));
                let (y0, y1) = (bounds.clamp_y(y0), bounds.clamp_y(y1));
                Shape::Rectangle { x0: x0.min(x1), y0: y0.min(y1), x1: x0.max(x1), y1: y0.max(y1) }
            }
            Shape::Ellipse { cx, cy, rx, ry, angle } => Shape::Ellipse {
                cx: bounds.clamp_x(cx),
                cy: bounds.clamp_y(cy),
                rx: rx.clamp(MIN_EXTENT_PX, max_extent),
                ry: ry.clamp(MIN_EXTENT_PX, max_extent),
                angle: angle.rem_euclid(180.0),
            },
            Shape::Stroke { cx, cy, length, width, angle } => Shape::Stroke {
                cx: bounds.clamp_x(cx),
                cy: bounds.clamp_y(cy),
                length: length.clamp(MIN_EXTENT_PX, max_extent * 2.0),
                width: width.clamp(MIN_EXTENT_PX, max_extent),
                angle: angle.rem_euclid(180.0),
            },
        }
    }

    pub fn area(&self) -> f32 {
        match *self {
            Shape::Triangle { points } => polygon_area(&points),
            Shape::Rectangle { x0, y0, x1, y1 } => (x1 - x0).max(0.0) * (y1 - y0).max(0.0),
            Shape::Ellipse { rx, ry, .. } => std::f32::consts::PI * rx * ry,
            Shape::Stroke { length, width, .. } => length * width,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        let n = self.param_count();
        !self.params()[..n].iter().all(|v| v.is_finite()) || self.area() < MIN_PRIMITIVE_AREA
    }

    /// axis-aligned bounding box (x_min, y_min, x_max, y_max), unclamped
    pub fn aabb(&self) -> (f32, f32, f32, f32) {
        match *self {
            Shape::Triangle { points } => {
                let mut b = (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
                for &(x, y) in &points {
                    b.0 = b.0.min(x);
                    b.1 = b.1.min(y);
                    b.2 = b.2.max(x);
                    b.3 = b.3.max(y);
                }
                b
            }
            Shape::Rectangle { x0, y0, x1, y1 } => (x0, y0, x1, y1),
            Shape::Ellipse { cx, cy, rx, ry, angle } => {
                let (s, c) = angle.to_radians().sin_cos();
                let ex = ((rx * c).powi(2) + (ry * s).powi(2)).sqrt();
                let ey = ((rx * s).powi(2) + (ry * c).powi(2)).sqrt();
                (cx - ex, cy - ey, cx + ex, cy + ey)
            }
            Shape::Stroke { cx, cy, length, width, angle } => {
                let (hl, hw) = (length * 0.5, width * 0.5);
                let corners = [(-hl, -hw), (hl, -hw), (hl, hw), (-hl, hw)];
                let mut b = (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
                for (dx, dy) in corners {
                    let (x, y) = rotate_point(cx + dx, cy + dy, cx, cy, angle);
                    b.0 = b.0.min(x);
                    b.1 = b.1.min(y);
                    b.2 = b.2.max(x);
                    b.3 = b.3.max(y);
                }
                b
            }
        }
    }

    /// center of the bounding box
    pub fn center(&self) -> (f32, f32) {
        let (x0, y0, x1, y1) = self.aabb();
        ((x0 + x1) * 0.5, (y0 + y1) * 0.5)
    }

    /// build the fill geometry for tiny-skia
    fn build_path(&self) -> Option<sk::Path> {
        match *self {
            Shape::Triangle { points } => {
                let mut pb = sk::PathBuilder::new();
                pb.move_to(points[0].0, points[0].1);
                pb.line_to(points[1].0, points[1].1);
                pb.line_to(points[2].0, points[2].1);
                pb.close();
                pb.finish()
            }
            Shape::Rectangle { x0, y0, x1, y1 } => {
                sk::Rect::from_ltrb(x0, y0, x1, y1).map(sk::PathBuilder::from_rect)
            }
            Shape::Ellipse { cx, cy, rx, ry, angle } => {
                let oval = sk::Rect::from_xywh(cx - rx, cy - ry, rx * 2.0, ry * 2.0)?;
                sk::PathBuilder::from_oval(oval)?.transform(sk::Transform::from_rotate_at(angle, cx, cy))
            }
            Shape::Stroke { cx, cy, length, width, angle } => {
                let rect = sk::Rect::from_xywh(cx - length * 0.5, cy - width * 0.5, length, width)?;
                sk::PathBuilder::from_rect(rect).transform(sk::Transform::from_rotate_at(angle, cx, cy))
            }
        }
    }

    /// a random shape of `kind` around `anchor` with extent about `size` pixels
    fn random<R: Rng + ?Sized>(rng: &mut R, kind: ShapeKind, anchor: (f32, f32), size: f32) -> Shape {
        let (ax, ay) = anchor;
        match kind {
            ShapeKind::Triangle => {
                let mut jitter = || (ax + rng.random_range(-1.0f32..=1.0) * size, ay + rng.random_range(-1.0f32..=1.0) * size);
                Shape::Triangle { points: [jitter(), jitter(), jitter()] }
            }
            ShapeKind::Rectangle => {
                let w = size * rng.random_range(0.5f32..=1.5);
                let h = size * rng.random_range(0.5f32..=1.5);
                Shape::Rectangle { x0: ax - w * 0.5, y0: ay - h * 0.5, x1: ax + w * 0.5, y1: ay + h * 0.5 }
            }
            ShapeKind::Ellipse => Shape::Ellipse {
                cx: ax,
                cy: ay,
                rx: size * rng.random_range(0.25f32..=0.75),
                ry: size * rng.random_range(0.25f32..=0.75),
                angle: rng.random_range(0.0f32..180.0),
            },
            ShapeKind::Stroke => {
                let length = size * rng.random_range(0.75f32..=1.5);
                Shape::Stroke {
                    cx: ax,
                    cy: ay,
                    length,
                    width: length * rng.random_range(0.1f32..=0.35),
                    angle: rng.random_range(0.0f32..180.0),
                }
            }
        }
    }
}

/// scales applied by `Primitive::mutate` at temperature 1.0
#[derive(Clone, Copy, Debug)]
pub struct MutationScale {
    /// maximum positional jitter in pixels
    pub position_px: f32,
    /// maximum color jitter in channel levels (0-255)
    pub color_levels: f32,
    pub alpha_min: u8,
    pub alpha_max: u8,
}

/// a shape plus an un-premultiplied RGBA fill. immutable once built: mutations
/// return a new primitive. also caches its tiny-skia path.
#[derive(Debug)]
pub struct Primitive {
    shape: Shape,
    rgba: [u8; 4],
    cached_path: OnceLock<Option<Arc<sk::Path>>>,
}

// this way stale paths won't be copied if the primitive is cloned.
impl Clone for Primitive {
    fn clone(&self) -> Self {
        Self::new(self.shape, self.rgba)
    }
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.rgba == other.rgba
    }
}

impl Primitive {
    pub fn new(shape: Shape, rgba: [u8; 4]) -> Self {
        Self { shape, rgba, cached_path: OnceLock::new() }
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    #[inline]
    pub fn rgba(&self) -> [u8; 4] {
        self.rgba
    }

    /// same geometry, different fill
    pub fn with_rgba(&self, rgba: [u8; 4]) -> Primitive {
        Primitive::new(self.shape, rgba)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.shape.area()
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.shape.is_degenerate()
    }

    /// fill path, built once per instance. None if tiny-skia rejects the geometry.
    pub fn path(&self) -> Option<&sk::Path> {
        self.cached_path
            .get_or_init(|| self.shape.build_path().map(Arc::new))
            .as_deref()
    }

    /// draw a structurally valid random primitive of `kind` near `anchor`.
    /// returns None if every retry came out degenerate.
    pub fn propose<R: Rng + ?Sized>(
        rng: &mut R,
        kind: ShapeKind,
        anchor: (f32, f32),
        bounds: &CanvasBounds,
        size: f32,
        alpha_range: (u8, u8),
    ) -> Option<Primitive> {
        profiling::scope!("Primitive::propose");
        let size = size.max(MIN_EXTENT_PX * 2.0);
        for _ in 0..MAX_SHAPE_RETRIES {
            let shape = Shape::random(rng, kind, anchor, size).clamped(bounds);
            if shape.is_degenerate() {
                continue;
            }
            let (lo, hi) = (alpha_range.0.min(alpha_range.1), alpha_range.0.max(alpha_range.1));
            let rgba = [rng.random(), rng.random(), rng.random(), rng.random_range(lo..=hi)];
            let primitive = Primitive::new(shape, rgba);
            if primitive.path().is_some() {
                return Some(primitive);
            }
        }
        None
    }

    /// perturb either one geometric parameter or the fill, with magnitude
    /// proportional to `temperature`. always re-clamped; degenerate results are
    /// resampled and after MAX_SHAPE_RETRIES the mutation is skipped (None).
    pub fn mutate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        temperature: f32,
        bounds: &CanvasBounds,
        scale: &MutationScale,
    ) -> Option<Primitive> {
        profiling::scope!("Primitive::mutate");
        let n = self.shape.param_count();

        for _ in 0..MAX_SHAPE_RETRIES {
            let which = rng.random_range(0..=n);
            let candidate = if which == n {
                let jitter = scale.color_levels * temperature;
                let mut rgba = self.rgba;
                for c in &mut rgba[..3] {
                    *c = (*c as f32 + rng.random_range(-1.0f32..=1.0) * jitter).round().clamp(0.0, 255.0) as u8;
                }
                let alpha = (rgba[3] as f32 + rng.random_range(-1.0f32..=1.0) * jitter).round();
                rgba[3] = alpha.clamp(scale.alpha_min as f32, scale.alpha_max as f32) as u8;
                if rgba == self.rgba {
                    continue;
                }
                Primitive::new(self.shape, rgba)
            } else {
                let delta = rng.random_range(-1.0f32..=1.0) * scale.position_px * temperature;
                match self.nudge(which, delta, bounds) {
                    Some(p) => p,
                    None => continue,
                }
            };

            if candidate != *self && candidate.path().is_some() {
                return Some(candidate);
            }
        }
        None
    }

    /// move geometric parameter `param` by `delta` pixels (angles scale to degrees).
    /// None if the result is degenerate.
    pub fn nudge(&self, param: usize, delta: f32, bounds: &CanvasBounds) -> Option<Primitive> {
        if param >= self.shape.param_count() {
            return None;
        }
        let mut p = self.shape.params();
        p[param] += if self.shape.is_angle_param(param) { delta * ANGLE_DEGREES_PER_PX } else { delta };
        let shape = self.shape.with_params(p).clamped(bounds);
        if shape.is_degenerate() {
            return None;
        }
        Some(Primitive::new(shape, self.rgba))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const SCALE: MutationScale = MutationScale { position_px: 8.0, color_levels: 32.0, alpha_min: 20, alpha_max: 200 };

    fn in_bounds(p: &Primitive, b: &CanvasBounds) -> bool {
        match *p.shape() {
            Shape::Triangle { points } => points.iter().all(|&(x, y)| (0.0..=b.width).contains(&x) && (0.0..=b.height).contains(&y)),
            Shape::Rectangle { x0, y0, x1, y1 } => x0 >= 0.0 && y0 >= 0.0 && x1 <= b.width && y1 <= b.height && x0 < x1 && y0 < y1,
            Shape::Ellipse { cx, cy, .. } | Shape::Stroke { cx, cy, .. } => {
                (0.0..=b.width).contains(&cx) && (0.0..=b.height).contains(&cy)
            }
        }
    }

    #[test]
    fn test_shape_kind_parses_names() {
        assert_eq!("Ellipse".parse::<ShapeKind>(), Ok(ShapeKind::Ellipse));
        assert_eq!(" stroke ".parse::<ShapeKind>(), Ok(ShapeKind::Stroke));
        assert!("hexagon".parse::<ShapeKind>().is_err());
    }

    #[test]
    fn test_propose_stays_in_bounds_for_every_kind() {
        let mut rng = Pcg32::seed_from_u64(7);
        let bounds = CanvasBounds::new(64, 48);
        for kind in ShapeKind::ALL {
            for _ in 0..200 {
                let anchor = (rng.random_range(0.0f32..64.0), rng.random_range(0.0f32..48.0));
                if let Some(p) = Primitive::propose(&mut rng, kind, anchor, &bounds, 12.0, (20, 200)) {
                    assert_eq!(p.kind(), kind);
                    assert!(!p.is_degenerate());
                    assert!(in_bounds(&p, &bounds), "{p:?}");
                    assert!((20..=200).contains(&p.rgba()[3]));
                    assert!(p.path().is_some());
                }
            }
        }
    }

    #[test]
    fn test_mutate_never_produces_degenerate_shapes() {
        let mut rng = Pcg32::seed_from_u64(11);
        let bounds = CanvasBounds::new(32, 32);
        for kind in ShapeKind::ALL {
            let mut p = Primitive::propose(&mut rng, kind, (16.0, 16.0), &bounds, 10.0, (20, 200)).unwrap();
            for _ in 0..500 {
                if let Some(next) = p.mutate(&mut rng, 1.0, &bounds, &SCALE) {
                    assert!(!next.is_degenerate());
                    assert!(in_bounds(&next, &bounds));
                    assert!((SCALE.alpha_min..=SCALE.alpha_max).contains(&next.rgba()[3]));
                    p = next;
                }
            }
        }
    }

    #[test]
    fn test_mutate_leaves_original_untouched() {
        let mut rng = Pcg32::seed_from_u64(3);
        let bounds = CanvasBounds::new(20, 20);
        let original = Primitive::new(Shape::Rectangle { x0: 2.0, y0: 2.0, x1: 10.0, y1: 10.0 }, [10, 20, 30, 128]);
        let snapshot = original.clone();
        let _ = original.mutate(&mut rng, 1.0, &bounds, &SCALE);
        assert_eq!(original, snapshot);
    }

    #[test]
    fn test_degenerate_collapse_is_rejected() {
        let bounds = CanvasBounds::new(10, 10);
        let thin = Primitive::new(Shape::Rectangle { x0: 1.0, y0: 1.0, x1: 2.0, y1: 5.0 }, [0, 0, 0, 255]);
        // pulling x1 onto x0 leaves no area
        assert!(thin.nudge(2, -1.0, &bounds).is_none());
        assert!(thin.nudge(2, 1.0, &bounds).is_some());
    }

    #[test]
    fn test_rectangle_corners_reorder_after_crossing() {
        let bounds = CanvasBounds::new(10, 10);
        let r = Primitive::new(Shape::Rectangle { x0: 2.0, y0: 2.0, x1: 4.0, y1: 6.0 }, [0, 0, 0, 255]);
        let flipped = r.nudge(0, 5.0, &bounds).unwrap();
        assert_eq!(*flipped.shape(), Shape::Rectangle { x0: 4.0, y0: 2.0, x1: 7.0, y1: 6.0 });
    }

    #[test]
    fn test_rotated_ellipse_bounds_swap_axes() {
        let e = Shape::Ellipse { cx: 10.0, cy: 10.0, rx: 6.0, ry: 2.0, angle: 90.0 };
        let (x0, y0, x1, y1) = e.aabb();
        assert!((x1 - x0 - 4.0).abs() < 1e-3);
        assert!((y1 - y0 - 12.0).abs() < 1e-3);
    }

    #[test]
    fn test_stroke_angle_wraps() {
        let bounds = CanvasBounds::new(50, 50);
        let s = Shape::Stroke { cx: 5.0, cy: 5.0, length: 10.0, width: 2.0, angle: 190.0 }.clamped(&bounds);
        match s {
            Shape::Stroke { angle, .. } => assert!((angle - 10.0).abs() < 1e-4),
            _ => unreachable!(),
        }
    }
}
