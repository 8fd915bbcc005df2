//! Bump & slide scanner
//!
//! For every start index `i` the scanner checks, in order:
//!
//! 1. the start bar passes the [`FilterPipeline`],
//! 2. the bump, `close(i)` to `close(i + bump.len)`, meets its threshold and
//!    its `bump.len` bars meet the volume floor,
//! 3. the slide, anchored at `j = i + bump.len`, does the same.
//!
//! Every start is evaluated independently: overlapping matches are all
//! reported, and slide direction is not constrained relative to the bump.

mod criteria;
mod filters;
mod matches;
mod rolling;

pub use criteria::{CriteriaBuilder, MatchCriteria, Phase, PhaseCriteria, ThresholdType, TimeWindow};
pub use filters::FilterPipeline;
pub use matches::{dedup_overlapping, Keep, Match};
pub use rolling::{PrefixSums, WindowIndex};

use std::sync::atomic::{AtomicBool, Ordering};

use crate::{series::BarSeries, PatternError, Result, OHLCV};

use rolling::{phase_move, PhaseMove};

/// Start indices between two progress reports
pub const PROGRESS_STRIDE: usize = 10_000;

// ============================================================
// PROGRESS
// ============================================================

/// Observer's answer to a progress report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanControl {
    #[default]
    Continue,
    Stop,
}

/// Receives `(current, total)` start-index progress during a scan
///
/// Purely observational unless it returns [`ScanControl::Stop`], which
/// cancels the scan cooperatively at the next report.
pub trait ProgressObserver {
    fn on_progress(&mut self, current: usize, total: usize) -> ScanControl;
}

impl<F> ProgressObserver for F
where
    F: FnMut(usize, usize) -> ScanControl,
{
    fn on_progress(&mut self, current: usize, total: usize) -> ScanControl {
        self(current, total)
    }
}

/// Observer that ignores every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _current: usize, _total: usize) -> ScanControl {
        ScanControl::Continue
    }
}

/// Stops the scan once the shared flag is raised
#[derive(Debug, Clone, Copy)]
pub struct CancelFlag<'a>(pub &'a AtomicBool);

impl ProgressObserver for CancelFlag<'_> {
    fn on_progress(&mut self, _current: usize, _total: usize) -> ScanControl {
        if self.0.load(Ordering::Relaxed) {
            ScanControl::Stop
        } else {
            ScanControl::Continue
        }
    }
}

// ============================================================
// ENTRY POINTS
// ============================================================

/// Scan `series` for every match of `criteria`, in start-index order.
///
/// # Errors
/// [`PatternError::InvalidConfig`] when `criteria` fails validation; the
/// series is not read in that case.
pub fn scan(series: &BarSeries, criteria: &MatchCriteria) -> Result<Vec<Match>> {
    scan_with_progress(series, criteria, &mut NoProgress)
}

/// [`scan`] reporting progress to `observer`, which may cancel.
///
/// # Errors
/// - [`PatternError::InvalidConfig`] when `criteria` fails validation.
/// - [`PatternError::Cancelled`] when `observer` returns [`ScanControl::Stop`].
pub fn scan_with_progress<P>(
    series: &BarSeries,
    criteria: &MatchCriteria,
    observer: &mut P,
) -> Result<Vec<Match>>
where
    P: ProgressObserver + ?Sized,
{
    criteria.validate()?;
    WindowIndex::new(series).scan_with_progress(criteria, observer)
}

impl<'a> WindowIndex<'a> {
    /// Lazily iterate matches of `criteria`
    pub fn iter<'i>(&'i self, criteria: &'i MatchCriteria) -> Result<MatchIter<'i>> {
        criteria.validate()?;
        Ok(MatchIter::new(self, criteria))
    }

    pub fn scan(&self, criteria: &MatchCriteria) -> Result<Vec<Match>> {
        self.scan_with_progress(criteria, &mut NoProgress)
    }

    pub fn scan_with_progress<P>(&self, criteria: &MatchCriteria, observer: &mut P) -> Result<Vec<Match>>
    where
        P: ProgressObserver + ?Sized,
    {
        let mut iter = self.iter(criteria)?;
        let total = iter.end;
        tracing::debug!(bars = self.len(), candidates = total, "scanning for bump/slide matches");

        let mut matches = Vec::new();
        for i in 0..total {
            if i % PROGRESS_STRIDE == 0 && observer.on_progress(i, total) == ScanControl::Stop {
                tracing::info!("Scan cancelled at index {}/{}", i, total);
                return Err(PatternError::Cancelled { index: i, total });
            }
            if let Some(m) = iter.evaluate(i) {
                matches.push(m);
            }
        }
        // Completion report; a late stop request has nothing left to cancel
        let _ = observer.on_progress(total, total);

        if iter.degenerate_windows() > 0 {
            tracing::warn!(
                degenerate = iter.degenerate_windows(),
                "percent-mode windows with a zero start price were skipped"
            );
        }
        tracing::info!(candidates = total, matches = matches.len(), "scan finished");

        Ok(matches)
    }
}

// ============================================================
// MATCH ITERATOR
// ============================================================

/// Qualified phase of a candidate
struct PhaseHit {
    mv: PhaseMove,
    volume: i64,
}

/// Lazy, single-pass iterator over the matches of one criteria set
pub struct MatchIter<'a> {
    index: &'a WindowIndex<'a>,
    criteria: &'a MatchCriteria,
    filters: FilterPipeline,
    next: usize,
    end: usize,
    degenerate: usize,
}

impl<'a> MatchIter<'a> {
    fn new(index: &'a WindowIndex<'a>, criteria: &'a MatchCriteria) -> Self {
        Self {
            index,
            criteria,
            filters: FilterPipeline::from_criteria(criteria),
            next: 0,
            end: criteria.candidates(index.len()),
            degenerate: 0,
        }
    }

    /// Start indices not yet evaluated
    #[inline]
    pub fn remaining(&self) -> usize {
        self.end - self.next
    }

    /// Percent-mode phases skipped so far because their start price was zero
    #[inline]
    pub fn degenerate_windows(&self) -> usize {
        self.degenerate
    }

    fn evaluate(&mut self, i: usize) -> Option<Match> {
        let start_time = self.index.series()[i].timestamp();
        if !self.filters.admits(start_time) {
            return None;
        }

        let bump = self.criteria.bump;
        let slide = self.criteria.slide;
        let j = i + bump.len;

        let b = self.phase(i, &bump)?;
        let s = self.phase(j, &slide)?;

        Some(Match {
            bump_start_index: i,
            bump_end_index: j,
            slide_start_index: j,
            slide_end_index: j + slide.len,
            start_time,
            bump_move: b.mv.value,
            slide_move: s.mv.value,
            bump_direction: b.mv.direction,
            slide_direction: s.mv.direction,
            bump_volume: b.volume,
            slide_volume: s.volume,
        })
    }

    fn phase(&mut self, start: usize, phase: &PhaseCriteria) -> Option<PhaseHit> {
        let p0 = self.index.close(start);
        let p1 = self.index.close(start + phase.len);
        let Some(mv) = phase_move(p0, p1, phase.threshold_type) else {
            self.degenerate += 1;
            return None;
        };
        // Written so a NaN magnitude never qualifies
        if !(mv.value.abs() >= phase.threshold) {
            return None;
        }
        let volume = self.index.volume(start, phase.len);
        if volume < phase.min_volume {
            return None;
        }
        Some(PhaseHit { mv, volume })
    }
}

impl Iterator for MatchIter<'_> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        while self.next < self.end {
            let i = self.next;
            self.next += 1;
            if let Some(m) = self.evaluate(i) {
                return Some(m);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}

impl std::iter::FusedIterator for MatchIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{series::Bar, Direction};
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};

    fn t0() -> NaiveDateTime {
        // Monday
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn series_from(closes: &[f64], volume: i64) -> BarSeries {
        BarSeries::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar::new(t0() + TimeDelta::minutes(i as i64), c, c, c, c, volume))
                .collect(),
        )
    }

    fn abs_criteria(bump_len: usize, bump: f64, slide_len: usize, slide: f64) -> MatchCriteria {
        CriteriaBuilder::new()
            .bump(bump_len, bump, ThresholdType::Absolute)
            .slide(slide_len, slide, ThresholdType::Absolute)
            .build()
            .unwrap()
    }

    #[test]
    fn test_short_series_has_no_candidates() {
        let series = series_from(&[1.0, 2.0, 3.0], 10);
        let criteria = abs_criteria(2, 0.0, 1, 0.0);
        // len 3, span 3: zero start indices
        assert!(scan(&series, &criteria).unwrap().is_empty());
        let series = series_from(&[1.0, 2.0, 3.0, 4.0], 10);
        assert_eq!(scan(&series, &criteria).unwrap().len(), 1);
    }

    #[test]
    fn test_match_fields() {
        let series = series_from(&[10.0, 12.0, 13.0, 11.0, 11.5], 7);
        let matches = scan(&series, &abs_criteria(2, 3.0, 1, 2.0)).unwrap();
        assert_eq!(matches.len(), 1);
        let m = matches[0];
        assert_eq!((m.bump_start_index, m.bump_end_index), (0, 2));
        assert_eq!((m.slide_start_index, m.slide_end_index), (2, 3));
        assert_eq!(m.bump_move, 3.0);
        assert_eq!(m.slide_move, -2.0);
        assert_eq!(m.bump_direction, Direction::Up);
        assert_eq!(m.slide_direction, Direction::Down);
        assert_eq!(m.bump_volume, 14);
        assert_eq!(m.slide_volume, 7);
        assert_eq!(m.start_time, t0());
        assert!(m.is_reversal());
    }

    #[test]
    fn test_same_direction_slide_allowed() {
        let series = series_from(&[10.0, 12.0, 14.0], 1);
        let matches = scan(&series, &abs_criteria(1, 2.0, 1, 2.0)).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(!matches[0].is_reversal());
    }

    #[test]
    fn test_zero_start_price_is_skipped_not_fatal() {
        let series = series_from(&[0.0, 1.0, 2.0, 5.0, 1.0], 1);
        let criteria = CriteriaBuilder::new()
            .bump(1, 0.1, ThresholdType::Percent)
            .slide(1, 0.1, ThresholdType::Percent)
            .build()
            .unwrap();
        let index = WindowIndex::new(&series);
        let mut iter = index.iter(&criteria).unwrap();
        let starts: Vec<_> = iter.by_ref().map(|m| m.bump_start_index).collect();
        assert_eq!(starts, vec![1, 2]);
        assert_eq!(iter.degenerate_windows(), 1);
    }

    #[test]
    fn test_time_filter_uses_start_bar_only() {
        let series = series_from(&[10.0, 12.0, 10.0, 12.0, 10.0, 12.0], 1);
        let criteria = CriteriaBuilder::from_criteria(abs_criteria(1, 2.0, 1, 2.0))
            .time_window(
                NaiveTime::from_hms_opt(9, 31, 0).unwrap(),
                NaiveTime::from_hms_opt(9, 33, 0).unwrap(),
            )
            .build()
            .unwrap();
        let starts: Vec<_> = scan(&series, &criteria)
            .unwrap()
            .iter()
            .map(|m| m.bump_start_index)
            .collect();
        // Start at 09:32 qualifies even though its slide ends at 09:34
        assert_eq!(starts, vec![1, 2]);
    }

    #[test]
    fn test_day_filter() {
        let series = series_from(&[10.0, 12.0, 10.0, 12.0], 1);
        let monday = CriteriaBuilder::from_criteria(abs_criteria(1, 2.0, 1, 2.0))
            .days([Weekday::Mon])
            .build()
            .unwrap();
        assert_eq!(scan(&series, &monday).unwrap().len(), 2);
        let friday = CriteriaBuilder::from_criteria(monday).days([Weekday::Fri]).build().unwrap();
        assert!(scan(&series, &friday).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_criteria_rejected_before_scan() {
        let mut criteria = abs_criteria(1, 1.0, 1, 1.0);
        criteria.bump.len = 0;
        let err = scan(&BarSeries::new(vec![]), &criteria).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_progress_reports_completion() {
        let closes: Vec<f64> = (0..25).map(|i| 100.0 + (i % 2) as f64).collect();
        let series = series_from(&closes, 1);
        let mut seen = Vec::new();
        let mut observer = |current: usize, total: usize| {
            seen.push((current, total));
            ScanControl::Continue
        };
        let matches = scan_with_progress(&series, &abs_criteria(1, 1.0, 1, 1.0), &mut observer).unwrap();
        assert_eq!(matches.len(), 23);
        assert_eq!(seen, vec![(0, 23), (23, 23)]);
    }

    #[test]
    fn test_cancel_flag_stops_scan() {
        let series = series_from(&[1.0; 10], 1);
        let flag = AtomicBool::new(true);
        let err = scan_with_progress(&series, &abs_criteria(1, 0.0, 1, 0.0), &mut CancelFlag(&flag))
            .unwrap_err();
        assert_eq!(err, PatternError::Cancelled { index: 0, total: 8 });
    }

    #[test]
    fn test_iterator_matches_eager_scan() {
        let closes: Vec<f64> = (0..200).map(|i| 100.0 + ((i * 13) % 17) as f64).collect();
        let series = series_from(&closes, 3);
        let criteria = CriteriaBuilder::new()
            .bump(3, 0.05, ThresholdType::Percent)
            .slide(2, 0.03, ThresholdType::Percent)
            .min_bump_volume(9)
            .build()
            .unwrap();
        let index = WindowIndex::new(&series);
        let lazy: Vec<_> = index.iter(&criteria).unwrap().collect();
        assert_eq!(lazy, scan(&series, &criteria).unwrap());
        assert!(!lazy.is_empty());
    }
}
