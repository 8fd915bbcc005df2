//! Parameter metadata for match criteria
//!
//! Describes every numeric field of [`MatchCriteria`] so callers can:
//! - build search grids for [`crate::sweep_parallel`]
//! - apply loosely-typed overrides (e.g. from a form or a config map)
//!
//! # Example
//!
//! ```rust
//! use bumpslide::params::{param_meta, CriteriaGrid};
//! use bumpslide::prelude::*;
//!
//! for param in param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let grid = CriteriaGrid::new(MatchCriteria::default())
//!     .bump_lens([3, 5, 8])
//!     .slide_thresholds([0.0005, 0.001]);
//! assert_eq!(grid.len(), 6);
//! ```

use std::collections::HashMap;

use crate::{
  scan::{MatchCriteria, PhaseCriteria},
  PatternError, Result,
};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Bar count (positive integer)
  Length,
  /// Move threshold (non-negative, fraction or price units)
  Threshold,
  /// Summed volume floor (non-negative integer)
  Volume,
}

/// Metadata for a single criteria parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Dotted field path (e.g., "bump.len")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Range for optimization: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn length(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Length, default, range, description }
  }

  pub const fn threshold(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Threshold, default, range, description }
  }

  pub const fn volume(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Volume, default, range, description }
  }

  /// Generate all values for grid search, `min` and `max` inclusive
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    if step <= 0.0 || max < min {
      return vec![min];
    }
    // Counted rather than accumulated so float drift never drops `max`
    let steps = ((max - min) / step + 1e-9).floor() as usize;
    (0..=steps).map(|k| min + k as f64 * step).collect()
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if !value.is_finite() || value < min || value > max {
      return Err(PatternError::config(
        self.name,
        format!("{value} outside [{min}, {max}]"),
      ));
    }
    match self.param_type {
      ParamType::Threshold => Ok(()),
      ParamType::Length | ParamType::Volume => {
        if value.fract() != 0.0 {
          return Err(PatternError::config(self.name, "must be a whole number"));
        }
        Ok(())
      },
    }
  }
}

static PARAMS: [ParamMeta; 6] = [
  ParamMeta::length("bump.len", 5.0, (1.0, 30.0, 1.0), "Bars spanned by the bump"),
  ParamMeta::threshold(
    "bump.threshold",
    0.0005,
    (0.0, 0.01, 0.0005),
    "Minimum bump magnitude, inclusive",
  ),
  ParamMeta::volume(
    "bump.min_volume",
    0.0,
    (0.0, 10_000_000.0, 100_000.0),
    "Minimum summed volume over the bump bars",
  ),
  ParamMeta::length("slide.len", 3.0, (1.0, 30.0, 1.0), "Bars spanned by the slide"),
  ParamMeta::threshold(
    "slide.threshold",
    0.0005,
    (0.0, 0.01, 0.0005),
    "Minimum slide magnitude, inclusive",
  ),
  ParamMeta::volume(
    "slide.min_volume",
    0.0,
    (0.0, 10_000_000.0, 100_000.0),
    "Minimum summed volume over the slide bars",
  ),
];

/// Metadata for all numeric fields of [`MatchCriteria`]
pub fn param_meta() -> &'static [ParamMeta] {
  &PARAMS
}

/// Metadata for one field by dotted name
pub fn find_param(name: &str) -> Option<&'static ParamMeta> {
  PARAMS.iter().find(|p| p.name == name)
}

// ============================================================
// PARAMETER OVERRIDES
// ============================================================

/// Apply `params` on top of `base`. Unknown keys are rejected; missing keys
/// keep the base value.
pub fn with_params(base: &MatchCriteria, params: &HashMap<&str, f64>) -> Result<MatchCriteria> {
  let mut criteria = base.clone();
  for (&key, &value) in params {
    let meta = find_param(key)
      .ok_or_else(|| PatternError::config("params", format!("unknown parameter '{key}'")))?;
    meta.validate(value)?;
    match meta.name.split_once('.') {
      Some(("bump", field)) => set_field(&mut criteria.bump, field, value),
      Some(("slide", field)) => set_field(&mut criteria.slide, field, value),
      _ => {},
    }
  }
  criteria.validate()?;
  Ok(criteria)
}

fn set_field(phase: &mut PhaseCriteria, field: &str, value: f64) {
  match field {
    "len" => phase.len = value as usize,
    "threshold" => phase.threshold = value,
    "min_volume" => phase.min_volume = value as i64,
    _ => {},
  }
}

// ============================================================
// CRITERIA GRID
// ============================================================

/// Cartesian product of bump/slide lengths and thresholds over a base criteria
///
/// Axes not set keep the base value. Filters and volume floors come from
/// the base unchanged.
#[derive(Debug, Clone)]
pub struct CriteriaGrid {
  base: MatchCriteria,
  bump_lens: Vec<usize>,
  bump_thresholds: Vec<f64>,
  slide_lens: Vec<usize>,
  slide_thresholds: Vec<f64>,
}

impl CriteriaGrid {
  pub fn new(base: MatchCriteria) -> Self {
    Self {
      bump_lens: vec![base.bump.len],
      bump_thresholds: vec![base.bump.threshold],
      slide_lens: vec![base.slide.len],
      slide_thresholds: vec![base.slide.threshold],
      base,
    }
  }

  pub fn bump_lens(mut self, values: impl IntoIterator<Item = usize>) -> Self {
    self.bump_lens = values.into_iter().collect();
    self
  }

  pub fn bump_thresholds(mut self, values: impl IntoIterator<Item = f64>) -> Self {
    self.bump_thresholds = values.into_iter().collect();
    self
  }

  pub fn slide_lens(mut self, values: impl IntoIterator<Item = usize>) -> Self {
    self.slide_lens = values.into_iter().collect();
    self
  }

  pub fn slide_thresholds(mut self, values: impl IntoIterator<Item = f64>) -> Self {
    self.slide_thresholds = values.into_iter().collect();
    self
  }

  /// Fill every axis from its [`ParamMeta::generate_grid`] range
  pub fn from_meta(base: MatchCriteria) -> Self {
    let grid = |name: &str| find_param(name).map(ParamMeta::generate_grid).unwrap_or_default();
    let lens = |name: &str| grid(name).into_iter().map(|v| v as usize).collect::<Vec<_>>();
    Self::new(base)
      .bump_lens(lens("bump.len"))
      .bump_thresholds(grid("bump.threshold"))
      .slide_lens(lens("slide.len"))
      .slide_thresholds(grid("slide.threshold"))
  }

  /// Number of combinations
  pub fn len(&self) -> usize {
    self.bump_lens.len()
      * self.bump_thresholds.len()
      * self.slide_lens.len()
      * self.slide_thresholds.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Every combination, bump length varying slowest. Invalid combinations are
  /// kept so a sweep reports them as errors.
  pub fn criteria(&self) -> Vec<MatchCriteria> {
    let mut out = Vec::with_capacity(self.len());
    for &bump_len in &self.bump_lens {
      for &bump_threshold in &self.bump_thresholds {
        for &slide_len in &self.slide_lens {
          for &slide_threshold in &self.slide_thresholds {
            let mut c = self.base.clone();
            c.bump.len = bump_len;
            c.bump.threshold = bump_threshold;
            c.slide.len = slide_len;
            c.slide.threshold = slide_threshold;
            out.push(c);
          }
        }
      }
    }
    out
  }
}

// ============================================================
// TESTS
// ============================================================
