use rayon::prelude::*;

use crate::composition::Composition;
use crate::fitness::{blit_rect, primitive_bounds_aa, ErrorScore};
use crate::geom::DirtyRect;
use crate::mutation_config::{apply_color_direction, ColorDirection};
use crate::primitive::Primitive;

use super::Engine;

/// shape refinement stops once the nudge step falls below this (pixels)
const MIN_POS_STEP: f32 = 0.5;

/// an accepted candidate after local refinement
pub(super) struct Refined {
    pub composition: Composition,
    pub render_premul: Vec<u8>,
    pub score: ErrorScore,
    /// union of all accepted refinement steps (None if nothing improved)
    pub dirty: Option<DirtyRect>,
}

impl Engine {
    /// Refine primitive `idx` of an already-accepted candidate: color first, then shape.
    /// `base_premul` is the rendering of primitives [0, idx). Every step is strictly
    /// improving, so the result is never worse than the input.
    pub(super) fn refine(
        &self,
        composition: Composition,
        idx: usize,
        base_premul: &[u8],
        render_premul: Vec<u8>,
        score: ErrorScore,
    ) -> Refined {
        profiling::scope!("refine");
        let start = Refined { composition, render_premul, score, dirty: None };
        if !self.cfg.refine_enabled || idx >= start.composition.len() {
            return start;
        }
        let colored = self.optimize_colors_fast(start, idx, base_premul);
        self.optimize_shape_fast(colored, idx, base_premul)
    }

    /// evaluate `primitive` in place of the one at `idx` against the current best:
    /// re-render from idx over the base and score the union rect only
    fn evaluate_replacement(
        &self,
        best: &Refined,
        idx: usize,
        base_premul: &[u8],
        current: &Primitive,
        primitive: Primitive,
    ) -> Option<(Composition, Vec<u8>, ErrorScore, DirtyRect)> {
        let (w, h) = (self.width(), self.height());
        let rect = match (primitive_bounds_aa(current, w, h), primitive_bounds_aa(&primitive, w, h)) {
            (Some(a), Some(b)) => a.union(b),
            (Some(r), None) | (None, Some(r)) => r,
            (None, None) => return None,
        };
        let candidate = best.composition.with_replaced(idx, primitive)?;
        let cand_render_premul = self.renderer.render_from_on_base_premul(&candidate, idx, base_premul);
        // Exact rect delta (optimizer is stateless)
        let cand_score = self.delta_score(best.score, &best.render_premul, &cand_render_premul, rect);
        Some((candidate, cand_render_premul, cand_score, rect))
    }

    /// fold the lowest-scoring result into `best` if it is strictly better
    fn take_if_better(
        &self,
        best: &mut Refined,
        results: Vec<(Composition, Vec<u8>, ErrorScore, DirtyRect)>,
    ) -> bool {
        // min_by_key keeps the first of equal scores, so ties resolve by direction order
        let Some((candidate, cand_render_premul, cand_score, rect)) =
            results.into_iter().min_by_key(|r| r.2)
        else {
            return false;
        };
        if cand_score >= best.score {
            return false;
        }
        best.composition = candidate;
        blit_rect(&cand_render_premul, &mut best.render_premul, rect, self.width());
        best.score = cand_score;
        // Track dirty rect (union of all accepted steps)
        best.dirty = Some(best.dirty.map_or(rect, |d| d.union(rect)));
        true
    }

    /// Optimize the fill of primitive `idx` using parallel steepest descent over
    /// the color directions. Stops when no direction improves or after
    /// `refine_max_rounds` steps.
    pub(super) fn optimize_colors_fast(&self, mut best: Refined, idx: usize, base_premul: &[u8]) -> Refined {
        profiling::scope!("optimize_colors_fast");
        let step = self.cfg.color_step.max(1);

        for _ in 0..self.cfg.refine_max_rounds {
            profiling::scope!("optimize_colors_fast_iteration");
            let Some(current) = best.composition.get(idx) else {
                break;
            };
            let current = current.clone();

            let results: Vec<_> = ColorDirection::ALL
                .par_iter()
                .filter_map(|&direction| {
                    profiling::scope!("test_direction");
                    let rgba = apply_color_direction(current.rgba(), direction, step, &self.cfg);
                    if rgba == current.rgba() {
                        return None;
                    }
                    self.evaluate_replacement(&best, idx, base_premul, &current, current.with_rgba(rgba))
                })
                .collect();

            if !self.take_if_better(&mut best, results) {
                break;
            }
        }
        best
    }

    /// Optimize the geometry of primitive `idx` using parallel steepest descent:
    /// every parameter nudged both ways, best strict improvement taken. The step
    /// halves whenever nothing improves, down to MIN_POS_STEP.
    pub(super) fn optimize_shape_fast(&self, mut best: Refined, idx: usize, base_premul: &[u8]) -> Refined {
        profiling::scope!("optimize_shape_fast");
        let mut step = self.cfg.pos_step;
        let mut tests = Vec::with_capacity(12);

        for _ in 0..self.cfg.refine_max_rounds {
            profiling::scope!("optimize_shape_fast_iteration");
            if step < MIN_POS_STEP {
                break;
            }
            let Some(current) = best.composition.get(idx) else {
                break;
            };
            let current = current.clone();

            tests.clear();
            for param in 0..current.shape().param_count() {
                tests.push((param, step));
                tests.push((param, -step));
            }

            let results: Vec<_> = tests
                .par_iter()
                .filter_map(|&(param, delta)| {
                    profiling::scope!("test_param_direction");
                    let nudged = current.nudge(param, delta, &self.bounds)?;
                    if nudged == current {
                        return None;
                    }
                    self.evaluate_replacement(&best, idx, base_premul, &current, nudged)
                })
                .collect();

            if !self.take_if_better(&mut best, results) {
                step *= 0.5;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::sse_rgba_parallel;
    use crate::mutation_config::MutateConfig;
    use crate::primitive::Shape;
    use crate::raster::RasterBuffer;

    // 8x8 target: opaque dark square at (2..6, 2..6) on white
    fn square_target() -> RasterBuffer {
        let mut px = vec![255u8; 8 * 8 * 4];
        for y in 2..6 {
            for x in 2..6 {
                let i = (y * 8 + x) * 4;
                px[i..i + 4].copy_from_slice(&[30, 60, 90, 255]);
            }
        }
        RasterBuffer::new(px, 8, 8).unwrap()
    }

    fn engine() -> Engine {
        let cfg = MutateConfig { antialias: false, alpha_min: 0, alpha_max: 255, ..Default::default() };
        Engine::new(square_target(), cfg, 1)
    }

    fn start(engine: &Engine, primitive: Primitive) -> (Refined, Vec<u8>) {
        let comp = engine.composition().with_appended(primitive);
        let base = engine.current_rgba().to_vec();
        let render = engine.renderer.render_rgba_premul(&comp);
        let score = ErrorScore(sse_rgba_parallel(engine.target.premultiplied(), &render));
        (Refined { composition: comp, render_premul: render, score, dirty: None }, base)
    }

    #[test]
    fn test_color_refinement_moves_toward_target() {
        let engine = engine();
        let p = Primitive::new(Shape::Rectangle { x0: 2.0, y0: 2.0, x1: 6.0, y1: 6.0 }, [60, 60, 60, 255]);
        let (start, base) = start(&engine, p);
        let before = start.score;
        let refined = engine.optimize_colors_fast(start, 0, &base);
        assert!(refined.score < before);
        assert!(refined.dirty.is_some());
        // incremental render and score stay exact
        let full = engine.renderer.render_rgba_premul(&refined.composition);
        assert_eq!(full, refined.render_premul);
        assert_eq!(sse_rgba_parallel(engine.target.premultiplied(), &full), refined.score.get());
    }

    #[test]
    fn test_shape_refinement_snaps_rectangle_edges() {
        let engine = engine();
        let p = Primitive::new(Shape::Rectangle { x0: 1.0, y0: 2.0, x1: 6.0, y1: 7.0 }, [30, 60, 90, 255]);
        let (start, base) = start(&engine, p);
        let refined = engine.optimize_shape_fast(start, 0, &base);
        assert_eq!(refined.score, ErrorScore::ZERO);
    }

    #[test]
    fn test_refinement_never_worsens() {
        let engine = engine();
        let p = Primitive::new(Shape::Rectangle { x0: 2.0, y0: 2.0, x1: 6.0, y1: 6.0 }, [30, 60, 90, 255]);
        let (start, base) = start(&engine, p.clone());
        let refined = engine.refine(start.composition, 0, &base, start.render_premul, start.score);
        assert_eq!(refined.score, ErrorScore::ZERO);
        assert!(refined.dirty.is_none());
        assert_eq!(refined.composition.get(0), Some(&p));
    }
}
