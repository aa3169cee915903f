use crate::fitness::MetricsSnapshot;

use super::Engine;

impl Engine {
    /// cached resolution-invariant metrics for the current composition
    #[inline]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.last_metrics
    }

    /// update cached metrics snapshot (rmse, psnr)
    /// call this after score updates to keep metrics in sync.
    pub(super) fn update_metrics_snapshot(&mut self) {
        profiling::scope!("update_metrics_snapshot");
        self.last_metrics = MetricsSnapshot::from_score(self.current_score, self.target.pixel_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation_config::MutateConfig;
    use crate::raster::RasterBuffer;

    #[test]
    fn test_metrics_follow_committed_score() {
        let mut px = Vec::new();
        for i in 0..64u32 {
            px.extend_from_slice(&[(i * 4) as u8, 30, 200, 255]);
        }
        let target = RasterBuffer::new(px, 8, 8).unwrap();
        let mut engine = Engine::new(target, MutateConfig::default(), 2);
        let blank = engine.metrics();
        for _ in 0..30 {
            engine.step();
            assert_eq!(engine.metrics(), MetricsSnapshot::from_score(engine.current_score(), 64));
        }
        assert!(engine.metrics().rmse < blank.rmse);
        assert!(engine.metrics().psnr > blank.psnr);
    }
}
