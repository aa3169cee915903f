// Engine module organization
// Each submodule handles a specific aspect of the search loop

pub mod metrics;
pub mod mutations;
pub mod optimizer;

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::analysis::{find_dominant_color, ImportanceMask};
use crate::composition::Composition;
use crate::fitness::{sse_rgba_parallel, sse_rgba_rect, ErrorScore, MetricsSnapshot};
use crate::geom::{CanvasBounds, DirtyRect};
use crate::mutation_config::MutateConfig;
use crate::raster::RasterBuffer;
use crate::render::CpuRenderer;
use crate::settings::RunLimits;

/// lifecycle of a run.
/// Running → Cancelled | Converged | BudgetExhausted → Completed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// caller asked to stop; nothing further is emitted
    Cancelled,
    /// no improvement within the stale window, or the error target was reached
    Converged,
    /// iteration or time budget used up
    BudgetExhausted,
    /// the worker has exited; nothing more will arrive
    Completed,
}

/// result of one propose → render → score → accept-or-reject iteration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted,
    /// worse or equal score, or the proposal degenerated and was skipped
    Rejected,
}

pub struct Engine {
    pub(self) rng: Pcg32,
    pub(self) cfg: MutateConfig,
    pub(self) renderer: CpuRenderer,
    pub(self) target: RasterBuffer,
    pub(self) bounds: CanvasBounds,
    pub(self) composition: Composition,
    pub(self) current_rgba: Vec<u8>, // premultiplied RGBA of `composition` (tiny-skia's native format)
    pub(self) current_score: ErrorScore,
    pub(self) baseline_score: ErrorScore, // blank canvas error, for progress normalization
    pub(self) mask: Option<ImportanceMask>,
    pub(self) seeded: bool,
    pub(self) iteration: u64,
    pub(self) accepted: u64,
    pub(self) stale: u64,            // consecutive rejected iterations
    pub(self) stage: u32,            // coarse-to-fine divisor, starts at 1
    pub(self) stage_rejections: u32, // consecutive rejections at the current stage
    pub(self) last_metrics: MetricsSnapshot,
}

impl Engine {
    pub fn new(target: RasterBuffer, cfg: MutateConfig, seed: u64) -> Self {
        profiling::scope!("Engine::new");
        let (width, height) = (target.width(), target.height());
        let renderer = CpuRenderer::new(cfg.antialias);
        let composition = Composition::new_blank(width, height);

        // Start with blank white canvas - primitives are added during the search
        let current_rgba = renderer.render_rgba_premul(&composition);
        let current_score = ErrorScore(sse_rgba_parallel(target.premultiplied(), &current_rgba));

        let mask = (cfg.importance_sampling > 0.0).then(|| ImportanceMask::build(&target, &current_rgba));

        let mut this = Self {
            rng: Pcg32::seed_from_u64(seed),
            cfg,
            renderer,
            bounds: CanvasBounds::new(width, height),
            target,
            composition,
            current_rgba,
            current_score,
            baseline_score: current_score,
            mask,
            seeded: false,
            iteration: 0,
            accepted: 0,
            stale: 0,
            stage: 1,
            stage_rejections: 0,
            last_metrics: MetricsSnapshot::default(),
        };
        this.update_metrics_snapshot();
        this
    }

    #[inline]
    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    /// premultiplied rendering of the current composition
    #[inline]
    pub fn current_rgba(&self) -> &[u8] {
        &self.current_rgba
    }

    #[inline]
    pub fn current_score(&self) -> ErrorScore {
        self.current_score
    }

    #[inline]
    pub fn baseline_score(&self) -> ErrorScore {
        self.baseline_score
    }

    #[inline]
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    #[inline]
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    #[inline]
    pub fn stale_attempts(&self) -> u64 {
        self.stale
    }

    #[inline]
    pub fn stage(&self) -> u32 {
        self.stage
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.target.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.target.height()
    }

    #[inline]
    pub fn config(&self) -> &MutateConfig {
        &self.cfg
    }

    /// progress in [0, 1]: 0 = blank canvas error, 1 = exact match
    pub(self) fn progress(&self) -> f32 {
        let baseline = self.baseline_score.get();
        if baseline == 0 {
            return 1.0;
        }
        (1.0 - self.current_score.get() as f64 / baseline as f64).clamp(0.0, 1.0) as f32
    }

    /// mutation temperature: hot early, cold as error falls, divided by the stage
    pub fn temperature(&self) -> f32 {
        self.cfg.temperature(self.progress(), self.stage)
    }

    /// SSE over a rect of `rgba` against the target
    #[inline]
    pub(self) fn score_rect(&self, rgba: &[u8], rect: DirtyRect) -> u64 {
        sse_rgba_rect(self.target.premultiplied(), rgba, rect, self.target.width())
    }

    /// rect-scoped score of a candidate rendering that differs from `old_rgba`
    /// only inside `rect`: old - rect(old) + rect(new)
    #[inline]
    pub(self) fn delta_score(&self, old_score: ErrorScore, old_rgba: &[u8], new_rgba: &[u8], rect: DirtyRect) -> ErrorScore {
        let old_rect = self.score_rect(old_rgba, rect);
        let new_rect = self.score_rect(new_rgba, rect);
        ErrorScore(old_score.get() - old_rect + new_rect)
    }

    /// commit an accepted candidate all at once
    /// `dirty` covers every pixel that differs from the previous rendering
    pub(self) fn commit(&mut self, composition: Composition, rgba: Vec<u8>, score: ErrorScore, dirty: DirtyRect) {
        profiling::scope!("Engine::commit");
        debug_assert!(score < self.current_score);
        self.composition = composition;
        self.current_rgba = rgba;
        self.current_score = score;
        self.update_metrics_snapshot();
        // refresh placement weights against the new rendering
        if let Some(mask) = &mut self.mask {
            mask.refresh(&self.target, &self.current_rgba, dirty);
        }
    }

    /// full-canvas rectangle in the target's dominant color, kept only if it
    /// beats the blank canvas
    pub(self) fn try_seed_background(&mut self) -> StepOutcome {
        profiling::scope!("try_seed_background");
        self.seeded = true;
        // dominant color must be computed on UNPREMULT
        let dom = find_dominant_color(self.target.unpremultiplied());
        let background = Composition::background(self.width(), self.height(), dom);
        let candidate = self.composition.with_appended(background);
        let rgba = self.renderer.render_rgba_premul(&candidate);
        let score = ErrorScore(sse_rgba_parallel(self.target.premultiplied(), &rgba));
        if score < self.current_score {
            let full = DirtyRect::new(0, 0, self.width() - 1, self.height() - 1);
            self.commit(candidate, rgba, score, full);
            StepOutcome::Accepted
        } else {
            StepOutcome::Rejected
        }
    }

    /// one search iteration. the composition only changes if the candidate
    /// scores strictly better.
    pub fn step(&mut self) -> StepOutcome {
        profiling::scope!("step");
        self.iteration += 1;

        let outcome = if !self.seeded {
            self.try_seed_background()
        } else {
            let len = self.composition.len();
            let below_cap = len < self.cfg.max_primitives;
            // while only the background exists there is nothing worth mutating
            let explore = below_cap && (len <= 1 || self.rng.random::<f32>() < self.cfg.p_explore);
            if explore {
                self.try_add_primitive()
            } else {
                self.try_mutate_primitive()
            }
        };

        match outcome {
            StepOutcome::Accepted => {
                self.accepted += 1;
                self.stale = 0;
                self.stage_rejections = 0;
            }
            StepOutcome::Rejected => {
                self.stale += 1;
                self.stage_rejections += 1;
                if self.stage_rejections >= self.cfg.stage_patience && self.stage < self.cfg.max_stage {
                    self.stage += 1;
                    self.stage_rejections = 0;
                    log::debug!(
                        "stage {} at iteration {} (size {:.1}px, temperature {:.3})",
                        self.stage,
                        self.iteration,
                        self.cfg.proposal_size(self.bounds.extent(), self.stage),
                        self.temperature(),
                    );
                }
            }
        }
        outcome
    }

    /// terminal state this engine has reached under `limits`, if any.
    /// convergence wins over budget exhaustion when both hold.
    pub fn check_termination(&self, limits: &RunLimits, elapsed: Duration) -> Option<RunState> {
        if self.stale >= limits.max_stale_attempts || self.last_metrics.rmse <= limits.target_rmse {
            return Some(RunState::Converged);
        }
        if self.iteration >= limits.max_iterations {
            return Some(RunState::BudgetExhausted);
        }
        if limits.max_duration.is_some_and(|d| elapsed >= d) {
            return Some(RunState::BudgetExhausted);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::ShapeKind;

    fn gradient(w: u32, h: u32) -> RasterBuffer {
        let mut px = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                px.extend_from_slice(&[(x * 255 / w) as u8, (y * 255 / h) as u8, 90, 255]);
            }
        }
        RasterBuffer::new(px, w, h).unwrap()
    }

    fn limits() -> RunLimits {
        RunLimits {
            seed: 1,
            snapshot_interval: 1,
            max_iterations: 100,
            max_duration: None,
            max_stale_attempts: 50,
            target_rmse: 0.0,
        }
    }

    #[test]
    fn test_first_step_seeds_dominant_background() {
        let mut px = Vec::new();
        for _ in 0..16 {
            px.extend_from_slice(&[40, 80, 120, 255]);
        }
        let target = RasterBuffer::new(px, 4, 4).unwrap();
        let mut engine = Engine::new(target, MutateConfig::default(), 3);
        assert_eq!(engine.step(), StepOutcome::Accepted);
        assert_eq!(engine.composition().len(), 1);
        // flat image: the background alone is an exact match
        assert_eq!(engine.current_score(), ErrorScore::ZERO);
    }

    #[test]
    fn test_score_never_increases() {
        let cfg = MutateConfig {
            shape_kinds: ShapeKind::ALL.to_vec(),
            ..Default::default()
        };
        let mut engine = Engine::new(gradient(24, 16), cfg, 42);
        let mut last = engine.current_score();
        for _ in 0..150 {
            engine.step();
            assert!(engine.current_score() <= last);
            last = engine.current_score();
        }
        assert!(engine.current_score() < engine.baseline_score());
    }

    #[test]
    fn test_tracked_score_matches_full_recomputation() {
        let cfg = MutateConfig {
            shape_kinds: ShapeKind::ALL.to_vec(),
            ..Default::default()
        };
        let mut engine = Engine::new(gradient(20, 20), cfg, 9);
        for _ in 0..80 {
            engine.step();
        }
        let rendered = engine.renderer.render_rgba_premul(engine.composition());
        assert_eq!(rendered, engine.current_rgba());
        let full = sse_rgba_parallel(engine.target.premultiplied(), &rendered);
        assert_eq!(engine.current_score().get(), full);
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = |seed| {
            let mut engine = Engine::new(gradient(16, 16), MutateConfig::default(), seed);
            for _ in 0..60 {
                engine.step();
            }
            (engine.current_score(), engine.composition().clone())
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn test_primitive_cap_is_respected() {
        let cfg = MutateConfig { max_primitives: 3, ..Default::default() };
        let mut engine = Engine::new(gradient(16, 16), cfg, 8);
        for _ in 0..200 {
            engine.step();
            assert!(engine.composition().len() <= 3);
        }
    }

    #[test]
    fn test_stage_grows_after_rejections() {
        // flat white target: the blank canvas is already perfect, nothing is ever accepted
        let target = RasterBuffer::new(vec![255u8; 8 * 8 * 4], 8, 8).unwrap();
        let cfg = MutateConfig { stage_patience: 5, max_stage: 3, ..Default::default() };
        let mut engine = Engine::new(target, cfg, 1);
        for _ in 0..40 {
            assert_eq!(engine.step(), StepOutcome::Rejected);
        }
        assert_eq!(engine.stage(), 3);
        assert_eq!(engine.stale_attempts(), 40);
    }

    #[test]
    fn test_termination_reasons() {
        let target = RasterBuffer::new(vec![255u8; 4 * 4 * 4], 4, 4).unwrap();
        let engine = Engine::new(target, MutateConfig::default(), 1);
        // blank white canvas already matches
        assert_eq!(engine.check_termination(&limits(), Duration::ZERO), Some(RunState::Converged));

        let engine = Engine::new(gradient(8, 8), MutateConfig::default(), 1);
        assert_eq!(engine.check_termination(&limits(), Duration::ZERO), None);
        let timed = RunLimits { max_duration: Some(Duration::from_millis(5)), ..limits() };
        assert_eq!(engine.check_termination(&timed, Duration::from_secs(1)), Some(RunState::BudgetExhausted));
    }
}
