//! sum of squared differences (SSE) on RGBA, all 4 channels.
//! alpha is included because we compare premultiplied pixels, where alpha affects blending.
use rayon::prelude::*;

use crate::geom::DirtyRect;

/// pixels per rayon work unit; small canvases stay on one thread
const MIN_CHUNK_PIXELS: usize = 16 * 1024;

#[inline(always)]
fn sq_diff_px(t: &[u8], c: &[u8]) -> u64 {
    let mut acc = 0u64;
    for i in 0..4 {
        let d = t[i] as i64 - c[i] as i64;
        acc += (d * d) as u64;
    }
    acc
}

/// parallel SSE over two equally sized RGBA buffers.
/// integer sums are order-independent, so the result is identical no matter
/// how rayon splits the work.
pub fn sse_rgba_parallel(target_rgba: &[u8], current_rgba: &[u8]) -> u64 {
    profiling::scope!("sse_rgba_parallel");
    debug_assert_eq!(target_rgba.len(), current_rgba.len());
    debug_assert_eq!(target_rgba.len() % 4, 0);

    target_rgba
        .par_chunks(4)
        .zip(current_rgba.par_chunks(4))
        .with_min_len(MIN_CHUNK_PIXELS)
        .map(|(t, c)| sq_diff_px(t, c))
        .sum()
}

/// SSE over a rectangular region (inclusive bounds).
/// stride is the width of the full image in pixels.
pub fn sse_rgba_rect(target: &[u8], current: &[u8], rect: DirtyRect, stride: u32) -> u64 {
    profiling::scope!("sse_rgba_rect");
    debug_assert!(rect.x0 <= rect.x1 && rect.y0 <= rect.y1, "invalid rect {rect:?}");

    let mut sum = 0u64;
    for y in rect.y0..=rect.y1 {
        let row_start = ((y as usize) * (stride as usize) + rect.x0 as usize) * 4;
        let row_end = ((y as usize) * (stride as usize) + rect.x1 as usize + 1) * 4;
        for (t, c) in target[row_start..row_end]
            .chunks_exact(4)
            .zip(current[row_start..row_end].chunks_exact(4))
        {
            sum += sq_diff_px(t, c);
        }
    }
    sum
}

/// copy a rectangular region from src to dst.
/// both buffers must have the same stride (width).
#[inline]
pub fn blit_rect(src: &[u8], dst: &mut [u8], rect: DirtyRect, stride: u32) {
    profiling::scope!("blit_rect");

    // safety invariants: catch bbox union bugs (zero cost in release builds)
    debug_assert!(rect.x0 <= rect.x1, "Invalid rect: x0={} > x1={}", rect.x0, rect.x1);
    debug_assert!(rect.y0 <= rect.y1, "Invalid rect: y0={} > y1={}", rect.y0, rect.y1);

    for y in rect.y0..=rect.y1 {
        let row_start = ((y as usize) * (stride as usize) + rect.x0 as usize) * 4;
        let row_end = ((y as usize) * (stride as usize) + rect.x1 as usize + 1) * 4;

        debug_assert!(row_end <= src.len(), "Buffer overrun: row_end={} > src.len()={}", row_end, src.len());
        debug_assert!(row_end <= dst.len(), "Buffer overrun: row_end={} > dst.len()={}", row_end, dst.len());

        dst[row_start..row_end].copy_from_slice(&src[row_start..row_end]);
    }
}
