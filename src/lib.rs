//! # bumpslide - Bump & Slide pattern scanner
//!
//! Detects a two-phase "bump then slide" motif in long intraday bar series:
//! a directional price move over `bump.len` bars, immediately followed by a
//! reactive move over `slide.len` bars, gated by volume, time-of-day and
//! day-of-week filters.
//!
//! ## Quick Start
//!
//! ```rust
//! use bumpslide::prelude::*;
//! use chrono::{NaiveDate, TimeDelta};
//!
//! let t0 = NaiveDate::from_ymd_opt(2024, 3, 4)
//!     .unwrap()
//!     .and_hms_opt(9, 30, 0)
//!     .unwrap();
//! let bars: Vec<Bar> = (0..30)
//!     .map(|i| {
//!         let c = 100.0 + (i % 7) as f64;
//!         Bar::new(t0 + TimeDelta::minutes(i), c, c, c, c, 1_000)
//!     })
//!     .collect();
//!
//! // Clean and characterise the data first
//! let raw = BarSeries::new(bars);
//! let validated = validate(&raw, TimeDelta::minutes(1), &Continuous).unwrap();
//!
//! // Then scan it
//! let criteria = CriteriaBuilder::new()
//!     .bump(3, 0.02, ThresholdType::Percent)
//!     .slide(2, 0.01, ThresholdType::Percent)
//!     .build()
//!     .unwrap();
//! let matches = scan(&validated.series, &criteria).unwrap();
//! assert!(matches.iter().all(|m| m.slide_start_index == m.bump_end_index));
//! ```

pub mod params;
pub mod quality;
pub mod scan;
pub mod series;
pub mod trend;

use chrono::NaiveDateTime;

pub mod prelude {
    pub use crate::{
        // Parameters
        params::{CriteriaGrid, ParamMeta, ParamType},
        // Data quality
        quality::{
            validate, Continuous, DailySessions, DayCoverage, Gap, MissingMinute, QualityReport,
            QualityStatus, RegularHours, SessionCalendar, Validated, Validator, ValidatorConfig,
        },
        // Scanning
        scan::{
            dedup_overlapping, scan, scan_with_progress, CancelFlag, CriteriaBuilder,
            FilterPipeline, Keep, Match, MatchCriteria, MatchIter, NoProgress, PhaseCriteria,
            ProgressObserver, ScanControl, ThresholdType, TimeWindow, WindowIndex,
        },
        // Series
        series::{Bar, BarSeries},
        // Trend analysis
        trend::{chunk_trends, trend_table, ChunkTrend, Field, TrendDirection, TrendQuery, TrendRow},
        // Parallel
        sweep_parallel,
        Direction,
        OHLCVExt,
        // Errors
        PatternError,
        Result,
        SweepError,
        SweepResult,
        // Core traits
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors surfaced by validation and scanning
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    /// Malformed criteria or validator settings, raised before any series access.
    #[error("Invalid config: {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// The raw series holds a row the core refuses to clean around.
    #[error("Data integrity error at index {index}: {reason}")]
    DataIntegrity { index: usize, reason: String },

    #[error("Scan cancelled at index {index} of {total}")]
    Cancelled { index: usize, total: usize },
}

impl PatternError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        PatternError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's configuration rather than the data
    #[inline]
    pub fn is_config(&self) -> bool {
        matches!(self, PatternError::InvalidConfig { .. })
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core bar data trait
///
/// Anything exposing a timestamp, four prices and an integer volume can be
/// loaded into a [`series::BarSeries`].
pub trait OHLCV {
    fn timestamp(&self) -> NaiveDateTime;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> i64;
}

impl<T: OHLCV + ?Sized> OHLCV for &T {
    fn timestamp(&self) -> NaiveDateTime {
        (**self).timestamp()
    }

    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn volume(&self) -> i64 {
        (**self).volume()
    }
}

/// Extension trait with row-level checks used by the validator
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn prices(&self) -> [f64; 4] {
        [self.open(), self.high(), self.low(), self.close()]
    }

    /// Reason this row must never reach the scanner, if any.
    fn integrity_issue(&self) -> Option<&'static str> {
        let prices = self.prices();
        if prices.iter().any(|p| p.is_nan()) {
            return Some("NaN price");
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Some("infinite price");
        }
        if self.volume() < 0 {
            return Some("negative volume");
        }
        None
    }

    /// `low <= {open, close} <= high`
    #[inline]
    fn is_consistent(&self) -> bool {
        let (o, h, l, c) = (self.open(), self.high(), self.low(), self.close());
        l <= o && l <= c && o <= h && c <= h
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

// ============================================================
// DIRECTION
// ============================================================

/// Direction of a phase move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// `Up` for a strictly positive delta, `Down` otherwise (a flat move is `Down`).
    #[inline]
    pub fn of_delta(delta: f64) -> Self {
        if delta > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    #[inline]
    pub fn is_up(self) -> bool {
        matches!(self, Direction::Up)
    }

    #[inline]
    pub fn is_down(self) -> bool {
        matches!(self, Direction::Down)
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

// ============================================================
// PARALLEL SWEEP
// ============================================================

use rayon::prelude::*;

use crate::scan::{Match, MatchCriteria, WindowIndex};

/// Result of scanning a single criteria set
#[derive(Debug)]
pub struct SweepResult {
    pub criteria: MatchCriteria,
    pub matches: Vec<Match>,
}

/// Error from scanning a single criteria set
#[derive(Debug)]
pub struct SweepError {
    pub criteria: MatchCriteria,
    pub error: PatternError,
}

/// Scan one series against many criteria sets in parallel.
///
/// The rolling index is built once and shared read-only by every worker.
/// Results come back in the input order of `criteria`.
pub fn sweep_parallel<I>(index: &WindowIndex<'_>, criteria: I) -> (Vec<SweepResult>, Vec<SweepError>)
where
    I: IntoParallelIterator<Item = MatchCriteria>,
{
    let results: Vec<_> = criteria
        .into_par_iter()
        .map(|criteria| match index.scan(&criteria) {
            Ok(matches) => Ok(SweepResult { criteria, matches }),
            Err(error) => Err(SweepError { criteria, error }),
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    tracing::info!(
        succeeded = successes.len(),
        failed = errors.len(),
        "parameter sweep finished"
    );

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
