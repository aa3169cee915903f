use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use crate::geom::DirtyRect;
use crate::raster::RasterBuffer;

/// find the dominant color of an RGBA image.
/// quantizes to the 3 high bits per channel, picks the most populated bin,
/// then averages every pixel that falls into it.
pub fn find_dominant_color(rgba: &[u8]) -> [u8; 3] {
    profiling::scope!("find_dominant_color");
    // First only keep the 3 highest bits of each channel (R, G, B)
    let mut bins = [[[0u64; 8]; 8]; 8];

    for px in rgba.chunks_exact(4) {
        bins[(px[0] >> 5) as usize][(px[1] >> 5) as usize][(px[2] >> 5) as usize] += 1;
    }

    // Find the bin with the most pixels
    let mut best = (0usize, 0usize, 0usize);
    let mut max_count = 0;
    for (r, plane) in bins.iter().enumerate() {
        for (g, row) in plane.iter().enumerate() {
            for (b, &count) in row.iter().enumerate() {
                if count > max_count {
                    max_count = count;
                    best = (r, g, b);
                }
            }
        }
    }

    // Now out of all the colors with those 3 high bits, take the average
    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for px in rgba.chunks_exact(4) {
        if ((px[0] >> 5) as usize, (px[1] >> 5) as usize, (px[2] >> 5) as usize) == best {
            sum[0] += px[0] as u64;
            sum[1] += px[1] as u64;
            sum[2] += px[2] as u64;
            count += 1;
        }
    }

    if count == 0 {
        return [255, 255, 255]; // empty image: white, same as the backdrop
    }
    [
        ((sum[0] + count / 2) / count) as u8,
        ((sum[1] + count / 2) / count) as u8,
        ((sum[2] + count / 2) / count) as u8,
    ]
}

/// the coarse grid keeps at most this many cells per axis
const MASK_MAX_CELLS_PER_AXIS: u32 = 128;

/// weight given to a cell with no error, so every position stays reachable
const MASK_WEIGHT_FLOOR: u64 = 1;

/// placement distribution over the canvas favoring high-error regions.
/// built from the per-pixel squared difference between the target and the
/// current rendering, summed over square cells. after a commit only the cells
/// under the changed region are recomputed.
#[derive(Clone, Debug)]
pub struct ImportanceMask {
    cell: u32,
    cols: u32,
    rows: u32,
    width: u32,
    height: u32,
    weights: Vec<u64>,
    dist: Option<WeightedIndex<u64>>,
}

impl ImportanceMask {
    pub fn build(target: &RasterBuffer, current_premul: &[u8]) -> Self {
        profiling::scope!("ImportanceMask::build");
        let (width, height) = (target.width(), target.height());
        let cell = width.max(height).div_ceil(MASK_MAX_CELLS_PER_AXIS).max(1);
        let cols = width.div_ceil(cell);
        let rows = height.div_ceil(cell);

        let diff = target.difference(current_premul);
        let mut weights = vec![MASK_WEIGHT_FLOOR; (cols * rows) as usize];
        for (i, &d) in diff.iter().enumerate() {
            let x = i as u32 % width;
            let y = i as u32 / width;
            weights[((y / cell) * cols + x / cell) as usize] += d as u64;
        }

        // only fails on an empty or overflowing weight set; fall back to uniform
        let dist = WeightedIndex::new(&weights).ok();
        Self { cell, cols, rows, width, height, weights, dist }
    }

    /// recompute the cells overlapping `rect` (inclusive pixel bounds) against
    /// the new rendering; the rest of the grid is left as is
    pub fn refresh(&mut self, target: &RasterBuffer, current_premul: &[u8], rect: DirtyRect) {
        profiling::scope!("ImportanceMask::refresh");
        let (cx0, cy0) = (rect.x0 / self.cell, rect.y0 / self.cell);
        let cx1 = (rect.x1 / self.cell).min(self.cols - 1);
        let cy1 = (rect.y1 / self.cell).min(self.rows - 1);
        for cy in cy0..=cy1 {
            for cx in cx0..=cx1 {
                self.weights[(cy * self.cols + cx) as usize] = MASK_WEIGHT_FLOOR;
            }
        }

        // whole cells, so the sums match a fresh build
        let target_premul = target.premultiplied();
        let x_end = ((cx1 + 1) * self.cell).min(self.width);
        let y_end = ((cy1 + 1) * self.cell).min(self.height);
        for y in cy0 * self.cell..y_end {
            for x in cx0 * self.cell..x_end {
                let i = ((y * self.width + x) * 4) as usize;
                let d: u64 = target_premul[i..i + 4]
                    .iter()
                    .zip(&current_premul[i..i + 4])
                    .map(|(&a, &b)| {
                        let d = a as i64 - b as i64;
                        (d * d) as u64
                    })
                    .sum();
                self.weights[((y / self.cell) * self.cols + x / self.cell) as usize] += d;
            }
        }
        self.dist = WeightedIndex::new(&self.weights).ok();
    }

    /// a pixel-space anchor inside a cell drawn proportionally to its error
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (f32, f32) {
        let idx = match &self.dist {
            Some(d) => d.sample(rng) as u32,
            None => rng.random_range(0..self.cols * self.rows),
        };
        let (cx, cy) = (idx % self.cols, idx / self.cols);
        let x0 = (cx * self.cell) as f32;
        let y0 = (cy * self.cell) as f32;
        let x1 = ((cx + 1) * self.cell).min(self.width) as f32;
        let y1 = ((cy + 1) * self.cell).min(self.height) as f32;
        (rng.random_range(x0..x1), rng.random_range(y0..y1))
    }

    pub fn cell_size(&self) -> u32 {
        self.cell
    }

    pub fn grid(&self) -> (u32, u32) {
        (self.cols, self.rows)
    }
}
