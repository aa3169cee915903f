//! tunable settings for a painting run.
//! persisted as JSON; every field has a default so partial files load.
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mutation_config::MutateConfig;
use crate::primitive::ShapeKind;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read or write settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PainterSettings {
    /// seed for the run's random number generator (same seed + same input = same run)
    pub seed: u64,

    // shape vocabulary
    /// kinds a run may place; at least one
    pub shape_kinds: Vec<ShapeKind>,
    /// cap on the number of primitives in the composition
    pub max_primitives: usize,

    // search behavior (0.0-1.0)
    /// chance per iteration to propose a new primitive rather than mutate one
    pub p_explore: f32,
    /// chance a new primitive is anchored at a high-error location
    pub importance_sampling: f32,

    // alpha range (0-255)
    pub alpha_min: u8,
    pub alpha_max: u8,

    // mutation magnitudes at temperature 1.0
    /// positional jitter in pixels
    pub pos_sigma: f32,
    /// color jitter in channel levels
    pub color_jitter: f32,

    // proposal size
    /// initial proposal extent as a fraction of the longer canvas side
    pub initial_size_frac: f32,
    /// smallest proposal extent in pixels
    pub min_size_px: f32,

    // local refinement of accepted candidates
    pub refine_enabled: bool,
    /// step size for color optimization (channel levels)
    pub color_step: u8,
    /// step size for position/shape optimization (in pixels)
    pub pos_step: f32,
    pub refine_max_rounds: u32,

    // temperature schedule
    pub temp_min: f32,
    pub temp_max: f32,
    /// curve exponent (>1 stays hot longer)
    pub temp_curve: f32,

    // staged coarse-to-fine scale
    /// consecutive rejections before size and temperature step down
    pub stage_patience: u32,
    pub max_stage: u32,

    /// anti-aliased rasterization (off also marks emitted SVG crispEdges)
    pub antialias: bool,

    // run control
    /// emit a snapshot every K accepted iterations
    pub snapshot_interval: u64,
    pub max_iterations: u64,
    /// wall-clock budget in seconds (None = unlimited)
    pub max_duration_secs: Option<f64>,
    /// consecutive rejected iterations before the run counts as converged
    pub max_stale_attempts: u64,
    /// normalized RMSE (0-1) at which the run counts as converged
    pub target_rmse: f64,
}

impl Default for PainterSettings {
    fn default() -> Self {
        let m = MutateConfig::default();
        Self {
            seed: 0x5eed,

            shape_kinds: m.shape_kinds,
            max_primitives: m.max_primitives,

            p_explore: m.p_explore,
            importance_sampling: m.importance_sampling,

            alpha_min: m.alpha_min,
            alpha_max: m.alpha_max,

            pos_sigma: m.pos_sigma,
            color_jitter: m.color_jitter,

            initial_size_frac: m.initial_size_frac,
            min_size_px: m.min_size_px,

            refine_enabled: m.refine_enabled,
            color_step: m.color_step,
            pos_step: m.pos_step,
            refine_max_rounds: m.refine_max_rounds,

            temp_min: m.temp_min,
            temp_max: m.temp_max,
            temp_curve: m.temp_curve,

            stage_patience: m.stage_patience,
            max_stage: m.max_stage,

            antialias: m.antialias,

            snapshot_interval: 10,
            max_iterations: 20_000,
            max_duration_secs: None,
            max_stale_attempts: 2_000,
            target_rmse: 0.01,
        }
    }
}

/// termination and cadence values the run controller needs
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunLimits {
    pub seed: u64,
    pub snapshot_interval: u64,
    pub max_iterations: u64,
    pub max_duration: Option<Duration>,
    pub max_stale_attempts: u64,
    pub target_rmse: f64,
}

fn check(ok: bool, msg: impl FnOnce() -> String) -> Result<(), SettingsError> {
    if ok {
        Ok(())
    } else {
        Err(SettingsError::Invalid(msg()))
    }
}

fn unit(name: &str, v: f32) -> Result<(), SettingsError> {
    check((0.0..=1.0).contains(&v), || format!("{name} must be within 0.0-1.0, got {v}"))
}

impl PainterSettings {
    /// save settings to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// load and validate settings from a JSON file.
    /// missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        let settings: PainterSettings = serde_json::from_str(&json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), SettingsError> {
        check(!self.shape_kinds.is_empty(), || "shape_kinds must name at least one shape".into())?;
        check(self.max_primitives >= 1, || "max_primitives must be at least 1".into())?;
        unit("p_explore", self.p_explore)?;
        unit("importance_sampling", self.importance_sampling)?;
        check(self.alpha_max > 0, || "alpha_max must be above 0".into())?;
        check(self.alpha_min <= self.alpha_max, || {
            format!("alpha_min ({}) must not exceed alpha_max ({})", self.alpha_min, self.alpha_max)
        })?;
        check(self.pos_sigma.is_finite() && self.pos_sigma >= 0.0, || "pos_sigma must be a non-negative number".into())?;
        check(self.color_jitter.is_finite() && self.color_jitter >= 0.0, || {
            "color_jitter must be a non-negative number".into()
        })?;
        check(self.initial_size_frac > 0.0 && self.initial_size_frac <= 1.0, || {
            format!("initial_size_frac must be within (0.0, 1.0], got {}", self.initial_size_frac)
        })?;
        check(self.min_size_px.is_finite() && self.min_size_px > 0.0, || "min_size_px must be positive".into())?;
        check(self.pos_step.is_finite() && self.pos_step > 0.0, || "pos_step must be positive".into())?;
        check(self.temp_min >= 0.0 && self.temp_min <= self.temp_max && self.temp_max.is_finite(), || {
            format!("temperature range {}..{} is invalid", self.temp_min, self.temp_max)
        })?;
        check(self.temp_curve.is_finite() && self.temp_curve > 0.0, || "temp_curve must be positive".into())?;
        check(self.stage_patience >= 1, || "stage_patience must be at least 1".into())?;
        check(self.max_stage >= 1, || "max_stage must be at least 1".into())?;
        check(self.snapshot_interval >= 1, || "snapshot_interval must be at least 1".into())?;
        check(self.max_iterations >= 1, || "max_iterations must be at least 1".into())?;
        check(self.max_stale_attempts >= 1, || "max_stale_attempts must be at least 1".into())?;
        check((0.0..=1.0).contains(&self.target_rmse), || {
            format!("target_rmse must be within 0.0-1.0, got {}", self.target_rmse)
        })?;
        if let Some(secs) = self.max_duration_secs {
            check(secs.is_finite() && secs > 0.0, || format!("max_duration_secs must be positive, got {secs}"))?;
            check(Duration::try_from_secs_f64(secs).is_ok(), || {
                format!("max_duration_secs is too large, got {secs}")
            })?;
        }
        Ok(())
    }

    /// convert to MutateConfig for the search engine
    pub fn to_mutate_config(&self) -> MutateConfig {
        MutateConfig {
            shape_kinds: self.shape_kinds.clone(),
            p_explore: self.p_explore,
            importance_sampling: self.importance_sampling,
            max_primitives: self.max_primitives,
            alpha_min: self.alpha_min,
            alpha_max: self.alpha_max,
            pos_sigma: self.pos_sigma,
            color_jitter: self.color_jitter,
            initial_size_frac: self.initial_size_frac,
            min_size_px: self.min_size_px,
            color_step: self.color_step,
            pos_step: self.pos_step,
            refine_enabled: self.refine_enabled,
            refine_max_rounds: self.refine_max_rounds,
            temp_min: self.temp_min,
            temp_max: self.temp_max,
            temp_curve: self.temp_curve,
            stage_patience: self.stage_patience,
            max_stage: self.max_stage,
            antialias: self.antialias,
        }
    }

    pub fn run_limits(&self) -> RunLimits {
        RunLimits {
            seed: self.seed,
            snapshot_interval: self.snapshot_interval.max(1),
            max_iterations: self.max_iterations,
            // validate() rejects durations that do not fit; treat them as unlimited here
            max_duration: self.max_duration_secs.and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
            max_stale_attempts: self.max_stale_attempts,
            target_rmse: self.target_rmse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        PainterSettings::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let s: PainterSettings = serde_json::from_str(r#"{ "seed": 7, "shape_kinds": ["stroke"] }"#).unwrap();
        assert_eq!(s.seed, 7);
        assert_eq!(s.shape_kinds, vec![ShapeKind::Stroke]);
        assert_eq!(s.max_primitives, PainterSettings::default().max_primitives);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let empty = PainterSettings { shape_kinds: vec![], ..Default::default() };
        assert!(matches!(empty.validate(), Err(SettingsError::Invalid(_))));

        let alpha = PainterSettings { alpha_min: 200, alpha_max: 100, ..Default::default() };
        assert!(alpha.validate().is_err());

        let cadence = PainterSettings { snapshot_interval: 0, ..Default::default() };
        assert!(cadence.validate().is_err());

        let duration = PainterSettings { max_duration_secs: Some(-1.0), ..Default::default() };
        assert!(duration.validate().is_err());
    }

    #[test]
    fn test_oversized_duration_is_rejected() {
        let huge = PainterSettings { max_duration_secs: Some(1e30), ..Default::default() };
        assert!(matches!(huge.validate(), Err(SettingsError::Invalid(_))));
        // unvalidated settings still convert without panicking
        assert_eq!(huge.run_limits().max_duration, None);
    }

    #[test]
    fn test_conversion_carries_values() {
        let s = PainterSettings { alpha_min: 5, antialias: false, max_duration_secs: Some(1.5), ..Default::default() };
        let cfg = s.to_mutate_config();
        assert_eq!(cfg.alpha_min, 5);
        assert!(!cfg.antialias);
        assert_eq!(s.run_limits().max_duration, Some(Duration::from_millis(1500)));
    }
}
