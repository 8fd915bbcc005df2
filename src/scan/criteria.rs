//! Match criteria and their validation

use std::{fmt, str::FromStr};

use chrono::{NaiveTime, Weekday};

use crate::{PatternError, Result};

// ============================================================
// THRESHOLD TYPE
// ============================================================

/// How a phase move is measured against its threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdType {
    /// `|delta| / start_price`, expressed as a fraction (0.01 = 1%)
    #[default]
    Percent,
    /// `|delta|` in price units
    #[serde(alias = "value")]
    Absolute,
}

impl ThresholdType {
    pub fn as_str(self) -> &'static str {
        match self {
            ThresholdType::Percent => "percent",
            ThresholdType::Absolute => "absolute",
        }
    }
}

impl fmt::Display for ThresholdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThresholdType {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percent" | "pct" | "%" => Ok(ThresholdType::Percent),
            "absolute" | "value" => Ok(ThresholdType::Absolute),
            other => Err(PatternError::config(
                "threshold_type",
                format!("unknown threshold type '{other}'"),
            )),
        }
    }
}

// ============================================================
// PHASE CRITERIA
// ============================================================

/// Which half of the motif a [`PhaseCriteria`] describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Bump,
    Slide,
}

impl Phase {
    /// Field names used in configuration errors: `[len, threshold, min_volume]`
    fn fields(self) -> [&'static str; 3] {
        match self {
            Phase::Bump => ["bump.len", "bump.threshold", "bump.min_volume"],
            Phase::Slide => ["slide.len", "slide.threshold", "slide.min_volume"],
        }
    }
}

/// Length, move threshold and volume floor of one phase
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhaseCriteria {
    /// Number of bars the phase spans (>= 1)
    pub len: usize,
    /// Minimum move magnitude, inclusive
    pub threshold: f64,
    #[serde(default)]
    pub threshold_type: ThresholdType,
    /// Minimum summed volume over the phase's `len` bars, inclusive
    #[serde(default)]
    pub min_volume: i64,
}

impl PhaseCriteria {
    pub fn new(len: usize, threshold: f64, threshold_type: ThresholdType) -> Self {
        Self {
            len,
            threshold,
            threshold_type,
            min_volume: 0,
        }
    }

    pub fn with_min_volume(mut self, min_volume: i64) -> Self {
        self.min_volume = min_volume;
        self
    }

    pub fn validate(&self, phase: Phase) -> Result<()> {
        let [len, threshold, min_volume] = phase.fields();
        if self.len == 0 {
            return Err(PatternError::config(len, "must be >= 1"));
        }
        if !self.threshold.is_finite() {
            return Err(PatternError::config(threshold, "must be finite"));
        }
        if self.threshold < 0.0 {
            return Err(PatternError::config(
                threshold,
                format!("must be >= 0, got {}", self.threshold),
            ));
        }
        if self.min_volume < 0 {
            return Err(PatternError::config(
                min_volume,
                format!("must be >= 0, got {}", self.min_volume),
            ));
        }
        Ok(())
    }
}

// ============================================================
// TIME WINDOW
// ============================================================

/// Half-open `[start, end)` time-of-day range; wraps midnight when `start > end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= t && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }

    #[inline]
    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    pub fn validate(&self) -> Result<()> {
        if self.start == self.end {
            return Err(PatternError::config(
                "time_window",
                format!("empty window [{}, {})", self.start, self.end),
            ));
        }
        Ok(())
    }
}

// ============================================================
// MATCH CRITERIA
// ============================================================

/// Full scan configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MatchCriteria {
    pub bump: PhaseCriteria,
    pub slide: PhaseCriteria,
    /// Restricts the time of day at which a bump may start
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    /// Restricts the weekday on which a bump may start; empty means any day
    #[serde(default)]
    pub days_of_week: Option<Vec<Weekday>>,
}

impl Default for MatchCriteria {
    fn default() -> Self {
        Self {
            bump: PhaseCriteria::new(5, 0.0005, ThresholdType::Percent),
            slide: PhaseCriteria::new(3, 0.0005, ThresholdType::Percent),
            time_window: None,
            days_of_week: None,
        }
    }
}

impl MatchCriteria {
    /// Check every field. Runs before a scan touches the series.
    pub fn validate(&self) -> Result<()> {
        self.bump.validate(Phase::Bump)?;
        self.slide.validate(Phase::Slide)?;
        if self.bump.len.checked_add(self.slide.len).is_none() {
            return Err(PatternError::config(
                "slide.len",
                "bump.len + slide.len overflows",
            ));
        }
        if let Some(window) = &self.time_window {
            window.validate()?;
        }
        Ok(())
    }

    /// Bars spanned from bump start to slide end, exclusive of the start bar
    #[inline]
    pub fn span(&self) -> usize {
        self.bump.len.saturating_add(self.slide.len)
    }

    /// Number of start indices a series of `len` bars offers
    #[inline]
    pub fn candidates(&self, len: usize) -> usize {
        len.saturating_sub(self.span())
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`MatchCriteria`]
#[derive(Debug, Clone, Default)]
pub struct CriteriaBuilder {
    criteria: MatchCriteria,
}

impl CriteriaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_criteria(criteria: MatchCriteria) -> Self {
        Self { criteria }
    }

    pub fn bump(mut self, len: usize, threshold: f64, threshold_type: ThresholdType) -> Self {
        let min_volume = self.criteria.bump.min_volume;
        self.criteria.bump =
            PhaseCriteria::new(len, threshold, threshold_type).with_min_volume(min_volume);
        self
    }

    pub fn slide(mut self, len: usize, threshold: f64, threshold_type: ThresholdType) -> Self {
        let min_volume = self.criteria.slide.min_volume;
        self.criteria.slide =
            PhaseCriteria::new(len, threshold, threshold_type).with_min_volume(min_volume);
        self
    }

    pub fn min_bump_volume(mut self, volume: i64) -> Self {
        self.criteria.bump.min_volume = volume;
        self
    }

    pub fn min_slide_volume(mut self, volume: i64) -> Self {
        self.criteria.slide.min_volume = volume;
        self
    }

    /// Only bumps starting in `[start, end)` time of day
    pub fn time_window(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.criteria.time_window = Some(TimeWindow::new(start, end));
        self
    }

    /// Only bumps starting on the given weekdays
    pub fn days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.criteria.days_of_week = Some(days.into_iter().collect());
        self
    }

    /// Validate and return the criteria
    pub fn build(self) -> Result<MatchCriteria> {
        self.criteria.validate()?;
        Ok(self.criteria)
    }
}
