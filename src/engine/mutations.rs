use rand::Rng;

use crate::fitness::primitive_bounds_aa;
use crate::primitive::Primitive;

use super::{Engine, StepOutcome};

/// pixel rect a shape actually covers (for sampling its fill from the target)
fn covered_pixels(primitive: &Primitive, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let (min_x, min_y, max_x, max_y) = primitive.shape().aabb();
    let x0 = min_x.floor().clamp(0.0, (width - 1) as f32) as u32;
    let y0 = min_y.floor().clamp(0.0, (height - 1) as f32) as u32;
    let x1 = (max_x.ceil() - 1.0).clamp(0.0, (width - 1) as f32) as u32;
    let y1 = (max_y.ceil() - 1.0).clamp(0.0, (height - 1) as f32) as u32;
    (x0, y0, x1.max(x0), y1.max(y0))
}

impl Engine {
    /// where a new primitive goes: a high-error location from the importance
    /// mask, or anywhere on the canvas
    fn pick_anchor(&mut self) -> (f32, f32) {
        if let Some(mask) = &self.mask {
            if self.rng.random::<f32>() < self.cfg.importance_sampling {
                return mask.sample(&mut self.rng);
            }
        }
        (
            self.rng.random_range(0.0..self.bounds.width),
            self.rng.random_range(0.0..self.bounds.height),
        )
    }

    /// Try to add a new primitive colored from the target under it.
    /// Rendered on top of the cached current raster and scored over its AABB only.
    /// If strictly better, it is refined and committed. Returns Accepted on commit.
    pub(super) fn try_add_primitive(&mut self) -> StepOutcome {
        profiling::scope!("try_add_primitive");
        if self.composition.len() >= self.cfg.max_primitives {
            return StepOutcome::Rejected;
        }

        let kind = self.cfg.shape_kinds[self.rng.random_range(0..self.cfg.shape_kinds.len())];
        let anchor = self.pick_anchor();
        let size = self.cfg.proposal_size(self.bounds.extent(), self.stage);
        let Some(proposal) = Primitive::propose(
            &mut self.rng,
            kind,
            anchor,
            &self.bounds,
            size,
            (self.cfg.alpha_min, self.cfg.alpha_max),
        ) else {
            return StepOutcome::Rejected;
        };

        // smart color: mean of the target pixels the shape covers (sampled on UNPREMULT)
        let (width, height) = (self.width(), self.height());
        let (x0, y0, x1, y1) = covered_pixels(&proposal, width, height);
        let [r, g, b] = self.target.mean_color_in(x0, y0, x1, y1);
        let primitive = proposal.with_rgba([r, g, b, proposal.rgba()[3]]);

        let Some(rect) = primitive_bounds_aa(&primitive, width, height) else {
            return StepOutcome::Rejected;
        };

        // Incremental rendering: only the new primitive on top of the current state
        let candidate_rgba = self.renderer.render_one_on_base_premul(&primitive, width, height, &self.current_rgba);
        let candidate_score = self.delta_score(self.current_score, &self.current_rgba, &candidate_rgba, rect);
        if candidate_score >= self.current_score {
            return StepOutcome::Rejected;
        }

        let candidate = self.composition.with_appended(primitive);
        let idx = candidate.len() - 1;
        let refined = self.refine(candidate, idx, &self.current_rgba, candidate_rgba, candidate_score);
        let dirty = refined.dirty.map_or(rect, |d| d.union(rect));
        self.commit(refined.composition, refined.render_premul, refined.score, dirty);
        StepOutcome::Accepted
    }

    /// Try to replace a random existing primitive with a mutated copy (z-order kept).
    /// Everything from that index up is re-rendered over the cached prefix, and
    /// the score delta covers the union of the old and new bounds.
    pub(super) fn try_mutate_primitive(&mut self) -> StepOutcome {
        profiling::scope!("try_mutate_primitive");
        if self.composition.is_empty() {
            return StepOutcome::Rejected;
        }

        let idx = self.rng.random_range(0..self.composition.len());
        let temperature = self.temperature();
        let scale = self.cfg.mutation_scale();
        let Some(old) = self.composition.get(idx) else {
            return StepOutcome::Rejected;
        };
        let Some(mutated) = old.mutate(&mut self.rng, temperature, &self.bounds, &scale) else {
            return StepOutcome::Rejected;
        };

        let (width, height) = (self.width(), self.height());
        let rect = match (primitive_bounds_aa(old, width, height), primitive_bounds_aa(&mutated, width, height)) {
            (Some(a), Some(b)) => a.union(b),
            (Some(r), None) | (None, Some(r)) => r,
            (None, None) => return StepOutcome::Rejected,
        };

        let Some(candidate) = self.composition.with_replaced(idx, mutated) else {
            return StepOutcome::Rejected;
        };
        let base = self.renderer.render_up_to_premul(&self.composition, idx);
        let candidate_rgba = self.renderer.render_from_on_base_premul(&candidate, idx, &base);
        let candidate_score = self.delta_score(self.current_score, &self.current_rgba, &candidate_rgba, rect);
        if candidate_score >= self.current_score {
            return StepOutcome::Rejected;
        }

        let refined = self.refine(candidate, idx, &base, candidate_rgba, candidate_score);
        let dirty = refined.dirty.map_or(rect, |d| d.union(rect));
        self.commit(refined.composition, refined.render_premul, refined.score, dirty);
        StepOutcome::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Shape;

    #[test]
    fn test_covered_pixels_of_unit_rect() {
        let p = Primitive::new(Shape::Rectangle { x0: 1.0, y0: 0.0, x1: 2.0, y1: 1.0 }, [0; 4]);
        assert_eq!(covered_pixels(&p, 2, 2), (1, 0, 1, 0));
    }

    #[test]
    fn test_covered_pixels_clamp_to_canvas() {
        let p = Primitive::new(Shape::Ellipse { cx: 0.0, cy: 0.0, rx: 9.0, ry: 9.0, angle: 0.0 }, [0; 4]);
        assert_eq!(covered_pixels(&p, 4, 3), (0, 0, 3, 2));
    }
}
