//! Whole-series precomputation for the scanner
//!
//! Window aggregates come from an O(n) prefix-sum table and closes from a
//! flat column, so evaluating a start index is O(1) whatever the phase
//! lengths are.

use crate::{series::BarSeries, Direction, OHLCV};

use super::criteria::ThresholdType;

/// Prefix sums of an integer column; `sums[k]` is the total of the first `k` values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixSums {
    sums: Vec<i64>,
}

impl PrefixSums {
    pub fn new(values: impl IntoIterator<Item = i64>) -> Self {
        let values = values.into_iter();
        let mut sums = Vec::with_capacity(values.size_hint().0 + 1);
        let mut acc = 0i64;
        sums.push(acc);
        for v in values {
            acc = acc.saturating_add(v);
            sums.push(acc);
        }
        Self { sums }
    }

    /// Number of underlying values
    #[inline]
    pub fn len(&self) -> usize {
        self.sums.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the `len` values starting at `start`
    #[inline]
    pub fn window(&self, start: usize, len: usize) -> i64 {
        self.sums[start + len] - self.sums[start]
    }
}

/// Signed move and direction of one phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PhaseMove {
    /// Fraction of the start price (percent mode) or price delta (absolute mode)
    pub value: f64,
    pub direction: Direction,
}

/// Move from `p0` to `p1`; `None` for a zero start price in percent mode.
#[inline]
pub(crate) fn phase_move(p0: f64, p1: f64, kind: ThresholdType) -> Option<PhaseMove> {
    let delta = p1 - p0;
    let value = match kind {
        ThresholdType::Absolute => delta,
        ThresholdType::Percent => {
            if p0 == 0.0 {
                return None;
            }
            delta / p0
        }
    };
    Some(PhaseMove {
        value,
        direction: Direction::of_delta(delta),
    })
}

/// Closes and volume prefix sums of one series, built once and shared by scans
#[derive(Debug, Clone)]
pub struct WindowIndex<'a> {
    series: &'a BarSeries,
    closes: Vec<f64>,
    volumes: PrefixSums,
}

impl<'a> WindowIndex<'a> {
    pub fn new(series: &'a BarSeries) -> Self {
        Self {
            series,
            closes: series.iter().map(|b| b.close()).collect(),
            volumes: PrefixSums::new(series.iter().map(|b| b.volume())),
        }
    }

    #[inline]
    pub fn series(&self) -> &'a BarSeries {
        self.series
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    #[inline]
    pub fn close(&self, index: usize) -> f64 {
        self.closes[index]
    }

    /// Summed volume of the `len` bars starting at `start`
    #[inline]
    pub fn volume(&self, start: usize, len: usize) -> i64 {
        self.volumes.window(start, len)
    }
}
