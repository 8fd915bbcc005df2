//! Chunked monotonic-trend analysis
//!
//! Splits a series into consecutive, non-overlapping chunks of
//! `sample_size` bars and checks each chunk for a strictly increasing or
//! strictly decreasing run of one bar field, then whether the run carries
//! on over the following bars.

use std::{fmt, ops::RangeInclusive, str::FromStr};

use chrono::NaiveDateTime;

use crate::{
    series::{Bar, BarSeries},
    PatternError, Result, OHLCV,
};

// ============================================================
// FIELD / DIRECTION
// ============================================================

/// Bar field a trend is measured on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    #[default]
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    #[inline]
    pub fn value(self, bar: &Bar) -> f64 {
        match self {
            Field::Open => bar.open(),
            Field::High => bar.high(),
            Field::Low => bar.low(),
            Field::Close => bar.close(),
            Field::Volume => bar.volume() as f64,
        }
    }
}

impl FromStr for Field {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Field::Open),
            "high" => Ok(Field::High),
            "low" => Ok(Field::Low),
            "close" => Ok(Field::Close),
            "volume" => Ok(Field::Volume),
            other => Err(PatternError::config("field", format!("unknown bar field '{other}'"))),
        }
    }
}

/// Strict direction a chunk must follow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    #[default]
    Increase,
    Decrease,
}

impl TrendDirection {
    /// True when `a -> b` is a strict step in this direction
    #[inline]
    pub fn step(self, a: f64, b: f64) -> bool {
        match self {
            TrendDirection::Increase => a < b,
            TrendDirection::Decrease => a > b,
        }
    }

    /// True when every adjacent pair of `values` steps in this direction
    pub fn holds(self, values: &[f64]) -> bool {
        values.windows(2).all(|w| self.step(w[0], w[1]))
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrendDirection::Increase => "increase",
            TrendDirection::Decrease => "decrease",
        })
    }
}

impl FromStr for TrendDirection {
    type Err = PatternError;

    /// Accepts any case-insensitive prefix form: `inc`, `increasing`, `dec`, ...
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s.starts_with("inc") {
            Ok(TrendDirection::Increase)
        } else if s.starts_with("dec") {
            Ok(TrendDirection::Decrease)
        } else {
            Err(PatternError::config(
                "direction",
                format!("expected 'increase' or 'decrease', got '{s}'"),
            ))
        }
    }
}

// ============================================================
// CHUNK TRENDS
// ============================================================

/// Parameters of a chunk-trend pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TrendQuery {
    pub field: Field,
    pub direction: TrendDirection,
    /// Bars per chunk
    pub sample_size: usize,
    /// Bars after the chunk the trend must carry on over
    pub continuation: usize,
}

impl Default for TrendQuery {
    fn default() -> Self {
        Self {
            field: Field::Open,
            direction: TrendDirection::Increase,
            sample_size: 5,
            continuation: 1,
        }
    }
}

impl TrendQuery {
    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            return Err(PatternError::config("sample_size", "must be >= 1"));
        }
        if self.continuation == 0 {
            return Err(PatternError::config("continuation", "must be >= 1"));
        }
        Ok(())
    }
}

/// Outcome for one chunk
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChunkTrend {
    pub start_index: usize,
    /// Inclusive
    pub end_index: usize,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub start_value: f64,
    pub end_value: f64,
    pub matches_trend: bool,
    /// The chunk's last value followed by the next `continuation` values is
    /// strictly monotone. Evaluated whether or not the chunk itself matched;
    /// false when fewer than `continuation` bars follow.
    pub continues_trend: bool,
}

/// Evaluate every chunk of `series`.
///
/// A trailing partial chunk is included when it holds at least two bars.
pub fn chunk_trends(series: &BarSeries, query: &TrendQuery) -> Result<Vec<ChunkTrend>> {
    query.validate()?;
    let values: Vec<f64> = series.iter().map(|b| query.field.value(b)).collect();
    let n = values.len();

    let mut out = Vec::with_capacity(n / query.sample_size + 1);
    for start in (0..n).step_by(query.sample_size) {
        let end = (start + query.sample_size).min(n);
        let chunk = &values[start..end];
        if chunk.len() < 2 {
            continue;
        }
        let last = end - 1;

        let cont_end = end + query.continuation;
        let continues_trend = cont_end <= n && query.direction.holds(&values[last..cont_end]);

        out.push(ChunkTrend {
            start_index: start,
            end_index: last,
            start_time: series[start].timestamp(),
            end_time: series[last].timestamp(),
            start_value: chunk[0],
            end_value: chunk[chunk.len() - 1],
            matches_trend: query.direction.holds(chunk),
            continues_trend,
        });
    }

    let summary = TrendSummary::of(&out);
    tracing::debug!(
        windows = summary.windows,
        matches = summary.matches,
        continued = summary.continued,
        "chunk trend pass finished"
    );
    Ok(out)
}

/// Counts over a [`chunk_trends`] result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrendSummary {
    pub windows: usize,
    pub matches: usize,
    /// Chunks that matched and continued
    pub continued: usize,
}

impl TrendSummary {
    pub fn of(chunks: &[ChunkTrend]) -> Self {
        Self {
            windows: chunks.len(),
            matches: chunks.iter().filter(|c| c.matches_trend).count(),
            continued: chunks
                .iter()
                .filter(|c| c.matches_trend && c.continues_trend)
                .count(),
        }
    }

    /// Share of windows that matched, in percent
    pub fn pct_matches(&self) -> f64 {
        pct(self.matches, self.windows)
    }

    /// Share of matches that continued, in percent
    pub fn pct_continued(&self) -> f64 {
        pct(self.continued, self.matches)
    }
}

// ============================================================
// TREND TABLE
// ============================================================

/// One row of [`trend_table`]; percentages are in `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrendRow {
    pub sample_size: usize,
    /// Complete chunks evaluated
    pub total_samples: usize,
    pub match_count: usize,
    /// Matches whose next single bar extends the trend
    pub continued_count: usize,
    pub pct_matches: f64,
    pub pct_continued_total: f64,
    pub pct_continuation_relative: f64,
}

/// Trend statistics for each sample size in `sample_sizes`, with a
/// continuation of one bar.
///
/// Only complete chunks count, so sizes above the series length produce no
/// row. A reversed range is swapped. A one-bar chunk trivially matches.
pub fn trend_table(
    series: &BarSeries,
    field: Field,
    direction: TrendDirection,
    sample_sizes: RangeInclusive<usize>,
) -> Result<Vec<TrendRow>> {
    let (mut lo, mut hi) = sample_sizes.into_inner();
    if lo > hi {
        tracing::warn!(start = lo, end = hi, "sample size range reversed, swapping");
        std::mem::swap(&mut lo, &mut hi);
    }
    if lo == 0 {
        return Err(PatternError::config("sample_size", "must be >= 1"));
    }

    let values: Vec<f64> = series.iter().map(|b| field.value(b)).collect();
    let n = values.len();
    let hi = hi.min(n);
    if lo > hi {
        return Ok(Vec::new());
    }

    let rows = (lo..=hi)
        .map(|size| {
            let mut total = 0;
            let mut matched = 0;
            let mut continued = 0;
            for chunk in values.chunks_exact(size) {
                total += 1;
                if !direction.holds(chunk) {
                    continue;
                }
                matched += 1;
                let next = total * size;
                if next < n && direction.step(chunk[size - 1], values[next]) {
                    continued += 1;
                }
            }
            TrendRow {
                sample_size: size,
                total_samples: total,
                match_count: matched,
                continued_count: continued,
                pct_matches: pct(matched, total),
                pct_continued_total: pct(continued, total),
                pct_continuation_relative: pct(continued, matched),
            }
        })
        .collect();
    Ok(rows)
}

#[inline]
fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    fn series(opens: &[f64]) -> BarSeries {
        let t0 = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        BarSeries::new(
            opens
                .iter()
                .enumerate()
                .map(|(i, &o)| Bar::new(t0 + TimeDelta::minutes(i as i64), o, o, o, o, 100))
                .collect(),
        )
    }

    fn query(sample_size: usize, continuation: usize) -> TrendQuery {
        TrendQuery {
            sample_size,
            continuation,
            ..TrendQuery::default()
        }
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("Increasing".parse::<TrendDirection>().unwrap(), TrendDirection::Increase);
        assert_eq!("dec".parse::<TrendDirection>().unwrap(), TrendDirection::Decrease);
        assert!("sideways".parse::<TrendDirection>().is_err());
        assert_eq!("Close".parse::<Field>().unwrap(), Field::Close);
    }

    #[test]
    fn test_chunks_and_continuation() {
        // chunks: [1,2,3] [4,3,5] [6,7]
        let s = series(&[1.0, 2.0, 3.0, 4.0, 3.0, 5.0, 6.0, 7.0]);
        let chunks = chunk_trends(&s, &query(3, 1)).unwrap();
        assert_eq!(chunks.len(), 3);

        assert!(chunks[0].matches_trend);
        assert!(chunks[0].continues_trend);
        assert_eq!((chunks[0].start_value, chunks[0].end_value), (1.0, 3.0));

        assert!(!chunks[1].matches_trend);
        // 5 -> 6 continues even though the chunk did not match
        assert!(chunks[1].continues_trend);

        // Trailing two-bar chunk is kept; nothing follows it
        assert_eq!((chunks[2].start_index, chunks[2].end_index), (6, 7));
        assert!(chunks[2].matches_trend);
        assert!(!chunks[2].continues_trend);

        let summary = TrendSummary::of(&chunks);
        assert_eq!(summary, TrendSummary { windows: 3, matches: 2, continued: 1 });
        assert_eq!(summary.pct_continued(), 50.0);
    }

    #[test]
    fn test_single_bar_tail_dropped() {
        let s = series(&[1.0, 2.0, 3.0]);
        assert_eq!(chunk_trends(&s, &query(2, 1)).unwrap().len(), 1);
    }

    #[test]
    fn test_equal_values_break_strict_trend() {
        let s = series(&[1.0, 1.0, 2.0, 3.0]);
        let chunks = chunk_trends(&s, &query(2, 2)).unwrap();
        assert!(!chunks[0].matches_trend);
        // 1 -> 2 -> 3 strictly increases
        assert!(chunks[0].continues_trend);
    }

    #[test]
    fn test_decrease_on_volume() {
        let t0 = NaiveDate::from_ymd_opt(2023, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let s = BarSeries::new(
            [300, 200, 100, 50]
                .iter()
                .enumerate()
                .map(|(i, &v)| Bar::new(t0 + TimeDelta::minutes(i as i64), 1.0, 1.0, 1.0, 1.0, v))
                .collect(),
        );
        let q = TrendQuery {
            field: Field::Volume,
            direction: TrendDirection::Decrease,
            sample_size: 3,
            continuation: 1,
        };
        let chunks = chunk_trends(&s, &q).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].matches_trend && chunks[0].continues_trend);
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let s = series(&[1.0, 2.0]);
        assert!(chunk_trends(&s, &query(0, 1)).unwrap_err().is_config());
        assert!(chunk_trends(&s, &query(2, 0)).unwrap_err().is_config());
        assert!(trend_table(&s, Field::Open, TrendDirection::Increase, 0..=3).is_err());
    }

    #[test]
    fn test_trend_table() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 3.0, 5.0, 6.0, 7.0]);
        let rows = trend_table(&s, Field::Open, TrendDirection::Increase, 2..=3).unwrap();
        assert_eq!(rows.len(), 2);

        // size 2: [1,2] [3,4] [3,5] [6,7]; all match, continuations 3,3(no),6,none
        let r2 = rows[0];
        assert_eq!((r2.total_samples, r2.match_count, r2.continued_count), (4, 4, 2));
        assert_eq!(r2.pct_matches, 100.0);
        assert_eq!(r2.pct_continued_total, 50.0);
        assert_eq!(r2.pct_continuation_relative, 50.0);

        // size 3: [1,2,3] [4,3,5]; trailing [6,7] incomplete
        let r3 = rows[1];
        assert_eq!((r3.total_samples, r3.match_count, r3.continued_count), (2, 1, 1));
        assert_eq!(r3.pct_continuation_relative, 100.0);
    }

    #[test]
    fn test_trend_table_reversed_range_and_empty_series() {
        let s = series(&[]);
        assert!(trend_table(&s, Field::Close, TrendDirection::Decrease, 4..=2)
            .unwrap()
            .is_empty());

        let s = series(&[5.0, 4.0, 3.0, 2.0, 1.0]);
        let rows = trend_table(&s, Field::Open, TrendDirection::Decrease, 4..=2).unwrap();
        assert_eq!(rows.iter().map(|r| r.sample_size).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_trend_table_range_capped_at_series_length() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 3.0, 5.0, 6.0, 7.0]);
        let rows = trend_table(&s, Field::Open, TrendDirection::Increase, 1..=usize::MAX).unwrap();
        assert_eq!(rows.len(), 8);
        assert_eq!(rows.last().map(|r| r.sample_size), Some(8));
        assert!(rows.iter().all(|r| r.total_samples >= 1));

        assert!(trend_table(&s, Field::Open, TrendDirection::Increase, 9..=20)
            .unwrap()
            .is_empty());
    }
}
