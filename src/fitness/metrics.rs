//─────────────────────────────────────────────────────────────────────────────
// resolution-invariant metrics (RMSE, PSNR)
//─────────────────────────────────────────────────────────────────────────────

use std::fmt;

/// number of channels the error sums over (premultiplied RGBA)
pub const FITNESS_CHANNELS: u64 = 4;

/// PSNR (peak signal-to-noise ratio) in decibels.
/// - `mse`: mean squared error per channel
/// - `peak`: 255.0 for 8-bit images, 1.0 for normalized [0,1] range
/// higher PSNR = better quality. typical ranges:
///   - 30 dB = acceptable
///   - 35 dB = good
///   - 40+ dB = very good
#[inline]
pub fn psnr_from_mse(mse: f64, peak: f64) -> f64 {
    let mse = mse.max(1e-12);
    10.0 * ((peak * peak) / mse).log10()
}

/// total reconstruction error: sum of squared per-channel differences between
/// the target and a rendering. zero means a pixel-exact match. integer, so two
/// scores compare exactly and the same inputs always give the same score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ErrorScore(pub u64);

impl ErrorScore {
    pub const ZERO: ErrorScore = ErrorScore(0);

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    /// mean squared error per channel on the 0-255 scale
    pub fn mse(self, num_pixels: usize) -> f64 {
        if num_pixels == 0 {
            return 0.0;
        }
        self.0 as f64 / (num_pixels as f64 * FITNESS_CHANNELS as f64)
    }

    /// root mean squared error normalized to [0, 1]
    pub fn rmse(self, num_pixels: usize) -> f64 {
        self.mse(num_pixels).sqrt() / 255.0
    }
}

impl fmt::Display for ErrorScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// cached snapshot of resolution-invariant metrics.
/// computed from a raw score and image dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub rmse: f64,
    pub psnr: f64,
}

impl MetricsSnapshot {
    #[inline]
    pub fn from_score(score: ErrorScore, num_pixels: usize) -> Self {
        let rmse = score.rmse(num_pixels);
        let psnr = psnr_from_mse(score.mse(num_pixels), 255.0);
        Self { rmse, psnr }
    }
}
