// Fitness module organization
// Each submodule handles a specific aspect of fitness computation

pub mod metrics;
pub mod sse;

// Re-export commonly used types and functions
pub use metrics::{ErrorScore, MetricsSnapshot};
pub use sse::{blit_rect, sse_rgba_parallel, sse_rgba_rect};

use crate::geom::DirtyRect;
use crate::primitive::Primitive;

/// AA padding extends the bbox by ~2 pixels to account for anti-aliasing
/// and for pixel centers just outside the geometric edge.
const AA_PAD: f32 = 2.0;

/// axis-aligned bounding box of a primitive with anti-aliasing padding,
/// clamped to image bounds (inclusive pixel coordinates).
/// None if the primitive lies entirely outside the image.
pub fn primitive_bounds_aa(primitive: &Primitive, width: u32, height: u32) -> Option<DirtyRect> {
    profiling::scope!("primitive_bounds_aa");
    if width == 0 || height == 0 {
        return None;
    }

    let (min_x, min_y, max_x, max_y) = primitive.shape().aabb();
    if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
        return None;
    }

    let (w, h) = (width as f32, height as f32);
    if max_x + AA_PAD < 0.0 || max_y + AA_PAD < 0.0 || min_x - AA_PAD >= w || min_y - AA_PAD >= h {
        return None;
    }

    let x0 = (min_x - AA_PAD).floor().max(0.0) as u32;
    let y0 = (min_y - AA_PAD).floor().max(0.0) as u32;
    let x1 = (max_x + AA_PAD).ceil().min(w - 1.0).max(0.0) as u32;
    let y1 = (max_y + AA_PAD).ceil().min(h - 1.0).max(0.0) as u32;

    Some(DirtyRect::new(x0, y0, x1.max(x0), y1.max(y0)))
}
