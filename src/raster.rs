use crate::error::EngineError;

/// immutable width x height RGBA view over the caller's pixels.
/// keeps the un-premultiplied bytes (color sampling / analysis) and a
/// premultiplied copy (fitness, since tiny-skia renders premultiplied).
#[derive(Clone, Debug)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    unpremul: Vec<u8>,
    premul: Vec<u8>,
}

impl RasterBuffer {
    /// fails with `InvalidDimensions` if either side is zero or the buffer
    /// length is not exactly width*height*4.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self, EngineError> {
        profiling::scope!("RasterBuffer::new");
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4));
        if width == 0 || height == 0 || expected != Some(pixels.len()) {
            return Err(EngineError::InvalidDimensions { width, height, len: pixels.len() });
        }

        let premul = crate::render::premultiply(&pixels);
        Ok(Self { width, height, unpremul: pixels, premul })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// un-premultiplied RGBA at (x, y), None outside the canvas
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        let p = &self.unpremul[idx..idx + 4];
        Some([p[0], p[1], p[2], p[3]])
    }

    #[inline]
    pub fn unpremultiplied(&self) -> &[u8] {
        &self.unpremul
    }

    #[inline]
    pub fn premultiplied(&self) -> &[u8] {
        &self.premul
    }

    /// per-pixel squared RGBA distance between the target and a rendered
    /// (premultiplied) candidate of the same size.
    pub fn difference(&self, candidate_premul: &[u8]) -> Vec<u32> {
        profiling::scope!("RasterBuffer::difference");
        debug_assert_eq!(candidate_premul.len(), self.premul.len());

        self.premul
            .chunks_exact(4)
            .zip(candidate_premul.chunks_exact(4))
            .map(|(t, c)| {
                t.iter()
                    .zip(c)
                    .map(|(&a, &b)| {
                        let d = a as i32 - b as i32;
                        (d * d) as u32
                    })
                    .sum()
            })
            .collect()
    }

    /// average un-premultiplied color over an inclusive pixel rect (clamped).
    /// large rects are sampled on a stride so this stays cheap on big images.
    pub fn mean_color_in(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> [u8; 3] {
        profiling::scope!("mean_color_in");
        let x1 = x1.min(self.width - 1);
        let y1 = y1.min(self.height - 1);
        let x0 = x0.min(x1);
        let y0 = y0.min(y1);

        const MAX_SAMPLES_PER_AXIS: u32 = 32;
        let step_x = ((x1 - x0 + 1) / MAX_SAMPLES_PER_AXIS).max(1);
        let step_y = ((y1 - y0 + 1) / MAX_SAMPLES_PER_AXIS).max(1);

        let mut sum = [0u64; 3];
        let mut count = 0u64;
        let mut y = y0;
        while y <= y1 {
            let mut x = x0;
            while x <= x1 {
                let idx = ((y * self.width + x) * 4) as usize;
                sum[0] += self.unpremul[idx] as u64;
                sum[1] += self.unpremul[idx + 1] as u64;
                sum[2] += self.unpremul[idx + 2] as u64;
                count += 1;
                x += step_x;
            }
            y += step_y;
        }

        // count >= 1: the rect always contains (x0, y0)
        [
            ((sum[0] + count / 2) / count) as u8,
            ((sum[1] + count / 2) / count) as u8,
            ((sum[2] + count / 2) / count) as u8,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_colors() -> Vec<u8> {
        vec![
            255, 0, 0, 255, /**/ 0, 255, 0, 255, //
            0, 0, 255, 255, /**/ 255, 255, 0, 255,
        ]
    }

    #[test]
    fn test_rejects_mismatched_length() {
        let err = RasterBuffer::new(vec![0; 15], 2, 2).unwrap_err();
        assert!(matches!(err, EngineError::InvalidDimensions { width: 2, height: 2, len: 15 }));
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        assert!(RasterBuffer::new(Vec::new(), 0, 4).is_err());
        assert!(RasterBuffer::new(Vec::new(), 4, 0).is_err());
    }

    #[test]
    fn test_pixel_lookup() {
        let raster = RasterBuffer::new(four_colors(), 2, 2).unwrap();
        assert_eq!(raster.pixel(1, 0), Some([0, 255, 0, 255]));
        assert_eq!(raster.pixel(0, 1), Some([0, 0, 255, 255]));
        assert_eq!(raster.pixel(2, 0), None);
    }

    #[test]
    fn test_difference_against_itself_is_zero() {
        let raster = RasterBuffer::new(four_colors(), 2, 2).unwrap();
        let diff = raster.difference(raster.premultiplied());
        assert!(diff.iter().all(|&d| d == 0));
    }

    #[test]
    fn test_difference_counts_squared_channels() {
        let raster = RasterBuffer::new(vec![10, 20, 30, 255], 1, 1).unwrap();
        let diff = raster.difference(&[13, 20, 26, 255]);
        assert_eq!(diff, vec![9 + 16]);
    }

    #[test]
    fn test_mean_color_whole_image() {
        let raster = RasterBuffer::new(four_colors(), 2, 2).unwrap();
        // (255+0+0+255)/4, (0+255+0+255)/4, (0+0+255+0)/4, rounded
        assert_eq!(raster.mean_color_in(0, 0, 1, 1), [128, 128, 64]);
        assert_eq!(raster.mean_color_in(1, 1, 9, 9), [255, 255, 0]);
    }
}
