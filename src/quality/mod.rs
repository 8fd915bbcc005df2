//! Data-quality validation
//!
//! Establishes the precondition the scanner relies on: a duplicate-free,
//! strictly increasing series whose holes are characterised.
//!
//! # Example
//!
//! ```rust
//! use bumpslide::prelude::*;
//! use chrono::{NaiveDate, TimeDelta};
//!
//! let t0 = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(10, 0, 0).unwrap();
//! let bar = |m: i64| Bar::new(t0 + TimeDelta::minutes(m), 1.0, 1.0, 1.0, 1.0, 10);
//! let raw = BarSeries::new(vec![bar(0), bar(0), bar(1), bar(3)]);
//!
//! let validated = validate(&raw, TimeDelta::minutes(1), &RegularHours::default()).unwrap();
//! assert_eq!(validated.report.duplicates_removed(), 1);
//! assert_eq!(validated.report.missing_minutes.len(), 1);
//! assert_eq!(validated.series.len(), 3);
//! ```

mod calendar;
mod report;

pub use calendar::{Continuous, DailySessions, RegularHours, SessionCalendar};
pub use report::{DayCoverage, DuplicateRow, Gap, MissingMinute, QualityReport, QualityStatus};

use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeDelta};

use crate::{
    series::{Bar, BarSeries},
    OHLCVExt, PatternError, Result, OHLCV,
};

/// Share of expected bars that may be missing before a warning is logged.
pub const LARGE_GAP_RATIO: f64 = 0.05;

/// Validator settings
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Expected spacing between consecutive bars, in seconds
    pub interval_secs: i64,
    /// Extra spacing tolerated before a break is reported as a [`Gap`], in seconds
    pub gap_tolerance_secs: i64,
    pub large_gap_ratio: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            gap_tolerance_secs: 0,
            large_gap_ratio: LARGE_GAP_RATIO,
        }
    }
}

impl ValidatorConfig {
    pub fn with_interval(interval: TimeDelta) -> Self {
        Self {
            interval_secs: interval.num_seconds(),
            ..Self::default()
        }
    }

    /// Saturates at [`TimeDelta::MAX`] for out-of-range settings; [`Self::validate`]
    /// rejects those.
    #[inline]
    pub fn interval(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.interval_secs).unwrap_or(TimeDelta::MAX)
    }

    #[inline]
    pub fn gap_tolerance(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.gap_tolerance_secs).unwrap_or(TimeDelta::MAX)
    }

    pub fn validate(&self) -> Result<()> {
        self.deltas().map(|_| ())
    }

    /// Checked `(interval, gap_tolerance)`
    fn deltas(&self) -> Result<(TimeDelta, TimeDelta)> {
        if self.interval_secs <= 0 {
            return Err(PatternError::config("interval_secs", "must be > 0"));
        }
        if self.gap_tolerance_secs < 0 {
            return Err(PatternError::config("gap_tolerance_secs", "must be >= 0"));
        }
        if !self.large_gap_ratio.is_finite() || !(0.0..=1.0).contains(&self.large_gap_ratio) {
            return Err(PatternError::config("large_gap_ratio", "must be in [0, 1]"));
        }
        let interval = TimeDelta::try_seconds(self.interval_secs).ok_or_else(|| {
            PatternError::config("interval_secs", format!("{} s is out of range", self.interval_secs))
        })?;
        let tolerance = TimeDelta::try_seconds(self.gap_tolerance_secs).ok_or_else(|| {
            PatternError::config(
                "gap_tolerance_secs",
                format!("{} s is out of range", self.gap_tolerance_secs),
            )
        })?;
        if interval.checked_add(&tolerance).is_none() {
            return Err(PatternError::config(
                "gap_tolerance_secs",
                "interval + tolerance overflows",
            ));
        }
        Ok((interval, tolerance))
    }
}

/// Cleaned series plus the findings that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub series: BarSeries,
    pub report: QualityReport,
}

/// Validate `series` against `calendar`, sampling at `interval`.
///
/// # Errors
/// - [`PatternError::InvalidConfig`] when `interval` is not positive.
/// - [`PatternError::DataIntegrity`] on a non-finite price, a negative
///   volume, or a timestamp earlier than the previous bar's. No cleaned
///   series is produced in that case.
pub fn validate<C>(series: &BarSeries, interval: TimeDelta, calendar: &C) -> Result<Validated>
where
    C: SessionCalendar + ?Sized,
{
    Validator::new(ValidatorConfig::with_interval(interval))?.validate(series, calendar)
}

/// Reusable validator holding its configuration
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidatorConfig,
    interval: TimeDelta,
    tolerance: TimeDelta,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Result<Self> {
        let (interval, tolerance) = config.deltas()?;
        Ok(Self {
            config,
            interval,
            tolerance,
        })
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn validate<C>(&self, series: &BarSeries, calendar: &C) -> Result<Validated>
    where
        C: SessionCalendar + ?Sized,
    {
        let interval = self.interval;
        tracing::debug!(bars = series.len(), ?interval, "validating bar series");

        let mut report = QualityReport::default();
        let bars = self.dedup(series, &mut report)?;
        self.find_holes(&bars, calendar, &mut report);
        report.coverage = coverage(&bars, &report);

        let ratio = report.missing_ratio();
        if ratio > self.config.large_gap_ratio {
            tracing::warn!(
                "Large gaps detected: {} missing bars ({:.2}%)",
                report.missing_minutes.len(),
                ratio * 100.0
            );
        }

        tracing::info!(
            kept = bars.len(),
            duplicates = report.duplicates_removed(),
            gaps = report.gaps.len(),
            missing = report.missing_minutes.len(),
            ohlc_violations = report.ohlc_violations.len(),
            "validation finished"
        );

        Ok(Validated {
            series: BarSeries::with_interval(bars, interval),
            report,
        })
    }

    /// Integrity checks and first-occurrence duplicate removal in one pass
    fn dedup(&self, series: &BarSeries, report: &mut QualityReport) -> Result<Vec<Bar>> {
        let mut kept: Vec<Bar> = Vec::with_capacity(series.len());

        for (index, bar) in series.iter().enumerate() {
            if let Some(reason) = bar.integrity_issue() {
                return Err(PatternError::DataIntegrity {
                    index,
                    reason: reason.to_string(),
                });
            }

            if let Some(last) = kept.last() {
                if bar.timestamp() < last.timestamp() {
                    return Err(PatternError::DataIntegrity {
                        index,
                        reason: format!(
                            "timestamp {} precedes previous bar {}",
                            bar.timestamp(),
                            last.timestamp()
                        ),
                    });
                }
                if bar.timestamp() == last.timestamp() {
                    report.duplicates.push(DuplicateRow {
                        index,
                        timestamp: bar.timestamp(),
                    });
                    continue;
                }
            }

            if !bar.is_consistent() {
                report.ohlc_violations.push(index);
            }
            kept.push(*bar);
        }

        Ok(kept)
    }

    fn find_holes<C>(&self, bars: &[Bar], calendar: &C, report: &mut QualityReport)
    where
        C: SessionCalendar + ?Sized,
    {
        let interval = self.interval;

        for pair in bars.windows(2) {
            let (prev, next) = (pair[0].timestamp(), pair[1].timestamp());
            if next - prev <= interval || calendar.is_expected_gap(prev, next) {
                continue;
            }

            // Only in-session samples count, so a closure next to a hole adds nothing
            let before = report.missing_minutes.len();
            let mut cursor = prev.checked_add_signed(interval);
            while let Some(ts) = cursor.filter(|ts| *ts < next) {
                if calendar.is_trading_instant(ts) {
                    report.missing_minutes.push(MissingMinute {
                        timestamp: ts,
                        previous: prev,
                        next,
                    });
                }
                cursor = ts.checked_add_signed(interval);
            }

            let missing = (report.missing_minutes.len() - before) as i64;
            let missing_duration =
                TimeDelta::try_seconds(interval.num_seconds().saturating_mul(missing))
                    .unwrap_or(TimeDelta::MAX);
            if missing_duration > self.tolerance {
                report.gaps.push(Gap {
                    previous: prev,
                    next,
                    missing_duration,
                });
            }
        }
    }
}

fn coverage(bars: &[Bar], report: &QualityReport) -> Vec<DayCoverage> {
    let mut days: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
    for bar in bars {
        days.entry(bar.timestamp().date()).or_default().0 += 1;
    }
    for hole in &report.missing_minutes {
        days.entry(hole.timestamp.date()).or_default().1 += 1;
    }
    days.into_iter()
        .map(|(date, (bars, missing))| DayCoverage { date, bars, missing })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(min: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + TimeDelta::minutes(min)
    }

    fn bar(min: i64) -> Bar {
        Bar::new(ts(min), 100.0, 101.0, 99.0, 100.5, 1_000)
    }

    fn one_minute() -> TimeDelta {
        TimeDelta::minutes(1)
    }

    #[test]
    fn test_clean_series_passes() {
        let raw = BarSeries::new((0..10).map(bar).collect());
        let out = validate(&raw, one_minute(), &Continuous).unwrap();
        assert!(out.report.passed());
        assert_eq!(out.series, raw);
        assert_eq!(out.report.coverage.len(), 1);
        assert_eq!(out.report.coverage[0].bars, 10);
    }

    #[test]
    fn test_duplicate_run_keeps_first() {
        let repeat = Bar::new(ts(1), 200.0, 201.0, 199.0, 200.0, 5);
        let raw = BarSeries::new(vec![bar(0), bar(1), repeat, repeat, bar(2)]);
        let out = validate(&raw, one_minute(), &Continuous).unwrap();
        assert_eq!(out.report.duplicates_removed(), 2);
        assert_eq!(out.report.duplicates[0].index, 2);
        assert_eq!(out.series.len(), 3);
        assert_eq!(out.series[1], bar(1));
    }

    #[test]
    fn test_negative_volume_is_fatal() {
        let raw = BarSeries::new(vec![bar(0), Bar::new(ts(1), 1.0, 1.0, 1.0, 1.0, -5)]);
        let err = validate(&raw, one_minute(), &Continuous).unwrap_err();
        assert_eq!(
            err,
            PatternError::DataIntegrity {
                index: 1,
                reason: "negative volume".into()
            }
        );
    }

    #[test]
    fn test_non_finite_price_is_fatal() {
        let raw = BarSeries::new(vec![Bar::new(ts(0), 1.0, f64::INFINITY, 1.0, 1.0, 5)]);
        assert!(matches!(
            validate(&raw, one_minute(), &Continuous),
            Err(PatternError::DataIntegrity { index: 0, .. })
        ));
    }

    #[test]
    fn test_out_of_order_is_fatal() {
        let raw = BarSeries::new(vec![bar(0), bar(2), bar(1)]);
        assert!(matches!(
            validate(&raw, one_minute(), &Continuous),
            Err(PatternError::DataIntegrity { index: 2, .. })
        ));
    }

    #[test]
    fn test_ohlc_violation_is_reported_not_fatal() {
        let raw = BarSeries::new(vec![bar(0), Bar::new(ts(1), 105.0, 101.0, 99.0, 100.0, 5)]);
        let out = validate(&raw, one_minute(), &Continuous).unwrap();
        assert_eq!(out.report.ohlc_violations, vec![1]);
        assert_eq!(out.report.status(), QualityStatus::Flagged);
        assert_eq!(out.series.len(), 2);
    }

    #[test]
    fn test_multi_minute_hole() {
        let raw = BarSeries::new(vec![bar(0), bar(1), bar(5)]);
        let out = validate(&raw, one_minute(), &Continuous).unwrap();
        assert_eq!(out.report.gaps.len(), 1);
        assert_eq!(out.report.gaps[0].missing_duration, TimeDelta::minutes(3));
        let missing: Vec<_> = out.report.missing_minutes.iter().map(|m| m.timestamp).collect();
        assert_eq!(missing, vec![ts(2), ts(3), ts(4)]);
        assert_eq!(out.report.coverage[0].missing, 3);
    }

    #[test]
    fn test_tolerance_suppresses_short_gaps() {
        let config = ValidatorConfig {
            gap_tolerance_secs: 60,
            ..Default::default()
        };
        let validator = Validator::new(config).unwrap();
        let raw = BarSeries::new(vec![bar(0), bar(2), bar(6)]);
        let out = validator.validate(&raw, &Continuous).unwrap();
        // 2-minute spacing tolerated, 4-minute spacing not
        assert_eq!(out.report.gaps.len(), 1);
        assert_eq!(out.report.gaps[0].previous, ts(2));
        assert_eq!(out.report.missing_minutes.len(), 4);
    }

    #[test]
    fn test_expected_gap_is_silent() {
        let raw = BarSeries::new(vec![bar(0), bar(1), bar(600)]);
        let out = validate(&raw, one_minute(), &|_: NaiveDateTime, _: NaiveDateTime| true).unwrap();
        assert!(out.report.gaps.is_empty());
        assert!(out.report.missing_minutes.is_empty());
    }

    #[test]
    fn test_invalid_config() {
        assert!(Validator::new(ValidatorConfig {
            interval_secs: 0,
            ..Default::default()
        })
        .is_err());
        assert!(validate(&BarSeries::new(vec![]), TimeDelta::zero(), &Continuous)
            .unwrap_err()
            .is_config());
    }

    #[test]
    fn test_out_of_range_durations_rejected() {
        let huge_tolerance = ValidatorConfig {
            gap_tolerance_secs: i64::MAX,
            ..Default::default()
        };
        let err = Validator::new(huge_tolerance.clone()).unwrap_err();
        assert!(matches!(err, PatternError::InvalidConfig { field: "gap_tolerance_secs", .. }));
        assert!(huge_tolerance.validate().is_err());
        assert_eq!(huge_tolerance.gap_tolerance(), TimeDelta::MAX);

        let huge_interval = ValidatorConfig {
            interval_secs: i64::MAX,
            ..Default::default()
        };
        assert!(Validator::new(huge_interval).unwrap_err().is_config());

        let max = TimeDelta::MAX.num_seconds();
        let sum_overflows = ValidatorConfig {
            interval_secs: max,
            gap_tolerance_secs: max,
            ..Default::default()
        };
        assert!(Validator::new(sum_overflows).unwrap_err().is_config());

        let deserialized: ValidatorConfig =
            serde_json::from_str(&format!(r#"{{"gap_tolerance_secs": {}}}"#, i64::MAX)).unwrap();
        assert!(Validator::new(deserialized).is_err());
    }

    #[test]
    fn test_large_valid_tolerance_runs() {
        let validator = Validator::new(ValidatorConfig {
            gap_tolerance_secs: TimeDelta::MAX.num_seconds() - 60,
            ..Default::default()
        })
        .unwrap();
        let raw = BarSeries::new(vec![bar(0), bar(5)]);
        let out = validator.validate(&raw, &Continuous).unwrap();
        assert!(out.report.gaps.is_empty());
        assert_eq!(out.report.missing_minutes.len(), 4);
    }

    #[test]
    fn test_empty_series() {
        let out = validate(&BarSeries::new(vec![]), one_minute(), &Continuous).unwrap();
        assert!(out.series.is_empty());
        assert!(out.report.passed());
        assert!(out.report.coverage.is_empty());
    }
}
