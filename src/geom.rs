// geometry helpers shared by the primitive model, renderer and fitness code
//
// - shoelace area / winding for triangles
// - point rotation for rotated shapes (ellipses, strokes)
// - canvas bounds used to clamp primitive parameters
// - dirty rects for rect-scoped fitness deltas

/// compute signed area of a polygon using the shoelace formula.
/// returns positive for CCW, negative for CW, zero for degenerate.
pub fn signed_area(pts: &[(f32, f32)]) -> f32 {
    if pts.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 0..pts.len() {
        let j = (i + 1) % pts.len();
        area += pts[i].0 * pts[j].1;
        area -= pts[j].0 * pts[i].1;
    }
    area * 0.5
}

/// Compute polygon area using Shoelace formula
/// Returns absolute area in square pixels
#[inline]
pub fn polygon_area(points: &[(f32, f32)]) -> f32 {
    signed_area(points).abs()
}

/// reverse the winding if needed so the polygon is CCW (positive area).
/// two triangles with the same vertex set then serialize the same way.
pub fn ensure_ccw(pts: &mut [(f32, f32)]) {
    if signed_area(pts) < 0.0 {
        pts.reverse();
    }
}

/// rotate (x, y) around (cx, cy) by `degrees` (clockwise in screen space,
/// matching SVG's rotate()).
#[inline]
pub fn rotate_point(x: f32, y: f32, cx: f32, cy: f32, degrees: f32) -> (f32, f32) {
    let (s, c) = degrees.to_radians().sin_cos();
    let dx = x - cx;
    let dy = y - cy;
    (cx + dx * c - dy * s, cy + dx * s + dy * c)
}

/// canvas extent in pixel units. primitives clamp their coordinates to
/// [0, width] x [0, height].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasBounds {
    pub width: f32,
    pub height: f32,
}

impl CanvasBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width: width as f32, height: height as f32 }
    }

    #[inline]
    pub fn clamp_x(&self, x: f32) -> f32 {
        x.clamp(0.0, self.width)
    }

    #[inline]
    pub fn clamp_y(&self, y: f32) -> f32 {
        y.clamp(0.0, self.height)
    }

    /// longer side, used to scale proposal sizes and mutation steps
    #[inline]
    pub fn extent(&self) -> f32 {
        self.width.max(self.height)
    }
}

/// dirty rectangle for tracking which pixels were modified during optimization.
/// used for rect-scoped fitness deltas (only pixels in here can change).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl DirtyRect {
    /// create a new dirty rect from pixel coordinates (inclusive bounds)
    #[inline]
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        DirtyRect { x0, y0, x1, y1 }
    }

    /// compute union of two dirty rects (smallest rect containing both)
    #[inline]
    pub fn union(self, other: DirtyRect) -> DirtyRect {
        DirtyRect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_area_ccw() {
        // Square with CCW winding
        let pts = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        assert!(signed_area(&pts) > 0.0);
    }

    #[test]
    fn test_signed_area_cw() {
        // Square with CW winding
        let pts = vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)];
        assert!(signed_area(&pts) < 0.0);
    }

    #[test]
    fn test_collinear_triangle_has_no_area() {
        let pts = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
        assert_eq!(polygon_area(&pts), 0.0);
    }

    #[test]
    fn test_ensure_ccw_fixes_winding() {
        let mut pts = [(0.0, 0.0), (0.0, 1.0), (1.0, 0.0)];
        ensure_ccw(&mut pts);
        assert!(signed_area(&pts) > 0.0);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let (x, y) = rotate_point(2.0, 1.0, 1.0, 1.0, 90.0);
        assert!((x - 1.0).abs() < 1e-5);
        assert!((y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_dirty_rect_union() {
        let a = DirtyRect::new(1, 2, 3, 4);
        let b = DirtyRect::new(0, 3, 2, 9);
        assert_eq!(a.union(b), DirtyRect::new(0, 2, 3, 9));
    }
}
