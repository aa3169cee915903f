use crate::primitive::{MutationScale, ShapeKind};

/// engine-facing tuning values, built from `PainterSettings::to_mutate_config`
#[derive(Clone, Debug)]
pub struct MutateConfig {
    // shape vocabulary enabled for this run (never empty after validation)
    pub shape_kinds: Vec<ShapeKind>,

    // exploration vs exploitation
    pub p_explore: f32,           // chance to propose a new primitive instead of mutating one
    pub importance_sampling: f32, // chance a new primitive is anchored by the importance mask

    // limits
    pub max_primitives: usize, // cap; at the cap only exploitation happens

    // alpha range (20-200 in [0,255] by default)
    pub alpha_min: u8,
    pub alpha_max: u8,

    // mutation parameters at temperature 1.0
    pub pos_sigma: f32,    // pixel jitter
    pub color_jitter: f32, // channel levels

    // new proposal extent (fraction of the longer canvas side, floored in pixels)
    pub initial_size_frac: f32,
    pub min_size_px: f32,

    // local refinement step sizes
    pub color_step: u8, // levels per ColorDirection step
    pub pos_step: f32,  // pixels per nudge, halved until below 0.5
    pub refine_enabled: bool,
    pub refine_max_rounds: u32,

    // temperature schedule (hot → cold over progress)
    pub temp_min: f32,
    pub temp_max: f32,
    pub temp_curve: f32, // curve exponent (>1 biases toward fine late)

    // staged scale: a stage step after this many consecutive rejections
    pub stage_patience: u32,
    pub max_stage: u32,

    pub antialias: bool,
}

impl Default for MutateConfig {
    fn default() -> Self {
        Self {
            shape_kinds: vec![ShapeKind::Triangle, ShapeKind::Ellipse],

            p_explore: 0.5,
            importance_sampling: 0.7,

            max_primitives: 200,

            alpha_min: 20,
            alpha_max: 200,

            pos_sigma: 16.0,
            color_jitter: 48.0,

            initial_size_frac: 0.25,
            min_size_px: 2.0,

            color_step: 5,
            pos_step: 4.0,
            refine_enabled: true,
            refine_max_rounds: 32,

            temp_min: 0.1,
            temp_max: 1.0,
            temp_curve: 1.5,

            stage_patience: 10,
            max_stage: 8,

            antialias: true,
        }
    }
}

impl MutateConfig {
    /// scales handed to `Primitive::mutate`
    pub fn mutation_scale(&self) -> MutationScale {
        MutationScale {
            position_px: self.pos_sigma,
            color_levels: self.color_jitter,
            alpha_min: self.alpha_min,
            alpha_max: self.alpha_max,
        }
    }

    /// temperature for a given progress in [0, 1] and stage (>= 1).
    /// starts at temp_max, cools toward temp_min, divided by the stage.
    pub fn temperature(&self, progress: f32, stage: u32) -> f32 {
        let p = progress.clamp(0.0, 1.0);
        let t = self.temp_min + (self.temp_max - self.temp_min) * (1.0 - p.powf(self.temp_curve));
        t / stage.max(1) as f32
    }

    /// proposal extent in pixels for a canvas whose longer side is `extent`
    pub fn proposal_size(&self, extent: f32, stage: u32) -> f32 {
        (extent * self.initial_size_frac / stage.max(1) as f32).max(self.min_size_px)
    }
}

/// color mutation directions for hill-climbing optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDirection {
    Lighter,   // multiply RGB by 1.1
    Darker,    // multiply RGB by 0.9
    RedUp,     // increase R
    RedDown,   // decrease R
    GreenUp,   // increase G
    GreenDown, // decrease G
    BlueUp,    // increase B
    BlueDown,  // decrease B
    AlphaUp,   // increase alpha
    AlphaDown, // decrease alpha
}

impl ColorDirection {
    pub const ALL: [ColorDirection; 10] = [
        ColorDirection::Lighter,
        ColorDirection::Darker,
        ColorDirection::RedUp,
        ColorDirection::RedDown,
        ColorDirection::GreenUp,
        ColorDirection::GreenDown,
        ColorDirection::BlueUp,
        ColorDirection::BlueDown,
        ColorDirection::AlphaUp,
        ColorDirection::AlphaDown,
    ];
}

/// apply a color direction to an RGBA fill. alpha stays in the configured range.
#[inline]
pub fn apply_color_direction(rgba: [u8; 4], dir: ColorDirection, step: u8, cfg: &MutateConfig) -> [u8; 4] {
    let scale = |c: u8, f: f32| (c as f32 * f).round().clamp(0.0, 255.0) as u8;
    let mut out = rgba;
    match dir {
        ColorDirection::Lighter => {
            for c in &mut out[..3] {
                // scaling alone never lifts a zero channel
                *c = scale(*c, 1.1).max(c.saturating_add(1));
            }
        }
        ColorDirection::Darker => {
            for c in &mut out[..3] {
                *c = scale(*c, 0.9);
            }
        }
        ColorDirection::RedUp => out[0] = out[0].saturating_add(step),
        ColorDirection::RedDown => out[0] = out[0].saturating_sub(step),
        ColorDirection::GreenUp => out[1] = out[1].saturating_add(step),
        ColorDirection::GreenDown => out[1] = out[1].saturating_sub(step),
        ColorDirection::BlueUp => out[2] = out[2].saturating_add(step),
        ColorDirection::BlueDown => out[2] = out[2].saturating_sub(step),
        ColorDirection::AlphaUp => out[3] = out[3].saturating_add(step).clamp(cfg.alpha_min, cfg.alpha_max),
        ColorDirection::AlphaDown => out[3] = out[3].saturating_sub(step).clamp(cfg.alpha_min, cfg.alpha_max),
    }
    out
}
