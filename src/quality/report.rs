//! Validation findings

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};

/// A raw row dropped because its timestamp repeats the previous kept bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DuplicateRow {
    /// Position in the raw series
    pub index: usize,
    pub timestamp: NaiveDateTime,
}

/// Unexpectedly long break between two consecutive bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Gap {
    pub previous: NaiveDateTime,
    pub next: NaiveDateTime,
    /// Missing trading instants times the interval, serialized as whole seconds
    #[serde(serialize_with = "serialize_secs")]
    pub missing_duration: TimeDelta,
}

fn serialize_secs<S: serde::Serializer>(d: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(d.num_seconds())
}

impl Gap {
    /// Number of whole intervals absent between the two bars
    pub fn missing_intervals(&self, interval: TimeDelta) -> i64 {
        let step = interval.num_milliseconds();
        if step <= 0 {
            return 0;
        }
        self.missing_duration.num_milliseconds() / step
    }
}

/// Expected-but-absent sample inside a trading session
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MissingMinute {
    pub timestamp: NaiveDateTime,
    /// Bar preceding the hole
    pub previous: NaiveDateTime,
    /// Bar following the hole
    pub next: NaiveDateTime,
}

/// Bars present and missing on one calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DayCoverage {
    pub date: NaiveDate,
    pub bars: usize,
    pub missing: usize,
}

impl DayCoverage {
    /// Present bars as a percentage of present + missing (100 for an empty day)
    pub fn completeness_pct(&self) -> f64 {
        let expected = self.bars + self.missing;
        if expected == 0 {
            return 100.0;
        }
        self.bars as f64 / expected as f64 * 100.0
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.missing == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum QualityStatus {
    /// No findings at all
    Passed,
    /// The series was cleaned or has holes; the report lists what was found
    Flagged,
}

/// Structured summary of one validation run
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize)]
pub struct QualityReport {
    pub duplicates: Vec<DuplicateRow>,
    pub gaps: Vec<Gap>,
    pub missing_minutes: Vec<MissingMinute>,
    /// Raw indices of rows violating `low <= {open, close} <= high`
    pub ohlc_violations: Vec<usize>,
    /// One entry per date present in the cleaned series, ascending
    pub coverage: Vec<DayCoverage>,
}

impl QualityReport {
    #[inline]
    pub fn duplicates_removed(&self) -> usize {
        self.duplicates.len()
    }

    pub fn status(&self) -> QualityStatus {
        if self.duplicates.is_empty()
            && self.gaps.is_empty()
            && self.missing_minutes.is_empty()
            && self.ohlc_violations.is_empty()
        {
            QualityStatus::Passed
        } else {
            QualityStatus::Flagged
        }
    }

    #[inline]
    pub fn passed(&self) -> bool {
        self.status() == QualityStatus::Passed
    }

    /// Removed duplicate rows per calendar year
    pub fn duplicates_by_year(&self) -> BTreeMap<i32, usize> {
        let mut by_year = BTreeMap::new();
        for dup in &self.duplicates {
            *by_year.entry(dup.timestamp.year()).or_insert(0) += 1;
        }
        by_year
    }

    /// Days with at least one missing minute
    pub fn incomplete_days(&self) -> impl Iterator<Item = &DayCoverage> {
        self.coverage.iter().filter(|d| !d.is_complete())
    }

    /// Missing minutes as a fraction of expected bars (present + missing)
    pub fn missing_ratio(&self) -> f64 {
        let (bars, missing) = self
            .coverage
            .iter()
            .fold((0usize, 0usize), |(b, m), d| (b + d.bars, m + d.missing));
        if bars + missing == 0 {
            return 0.0;
        }
        missing as f64 / (bars + missing) as f64
    }
}
