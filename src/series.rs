//! Bar and bar-series containers
//!
//! A [`BarSeries`] is built once by the caller, passed by reference to the
//! validator and the scanner, and never mutated in place: cleaning produces
//! a fresh series.

use std::ops::Index;

use chrono::{Datelike, NaiveDateTime, TimeDelta};

use crate::OHLCV;

/// Sampling interval assumed when the caller does not supply one.
pub fn default_interval() -> TimeDelta {
    TimeDelta::minutes(1)
}

/// One fixed-interval OHLCV observation
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    timestamp: NaiveDateTime,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

impl Bar {
    /// Construction never validates; that is the validator's job.
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: i64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Copy any [`OHLCV`] row into an owned bar
    pub fn from_ohlcv<T: OHLCV>(row: &T) -> Self {
        Self::new(
            row.timestamp(),
            row.open(),
            row.high(),
            row.low(),
            row.close(),
            row.volume(),
        )
    }
}

impl OHLCV for Bar {
    #[inline]
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    #[inline]
    fn open(&self) -> f64 {
        self.open
    }

    #[inline]
    fn high(&self) -> f64 {
        self.high
    }

    #[inline]
    fn low(&self) -> f64 {
        self.low
    }

    #[inline]
    fn close(&self) -> f64 {
        self.close
    }

    #[inline]
    fn volume(&self) -> i64 {
        self.volume
    }
}

/// Ordered bar sequence plus its sampling interval
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    bars: Vec<Bar>,
    interval: TimeDelta,
}

impl BarSeries {
    /// Series sampled at the one-minute [`default_interval`]
    pub fn new(bars: Vec<Bar>) -> Self {
        Self::with_interval(bars, default_interval())
    }

    pub fn with_interval(bars: Vec<Bar>, interval: TimeDelta) -> Self {
        Self { bars, interval }
    }

    /// Build a series from foreign rows implementing [`OHLCV`]
    pub fn from_source<T: OHLCV>(rows: &[T], interval: TimeDelta) -> Self {
        Self::with_interval(rows.iter().map(Bar::from_ohlcv).collect(), interval)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    #[inline]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.bars.first().map(|b| b.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.bars.last().map(|b| b.timestamp)
    }

    /// True when every adjacent pair is strictly increasing in time.
    pub fn is_strictly_increasing(&self) -> bool {
        self.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
    }

    /// Bars whose timestamp falls in calendar year `year`
    pub fn in_year(&self, year: i32) -> BarSeries {
        BarSeries {
            bars: self.bars.iter().filter(|b| b.timestamp.year() == year).copied().collect(),
            interval: self.interval,
        }
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

impl Index<usize> for BarSeries {
    type Output = Bar;

    #[inline]
    fn index(&self, index: usize) -> &Bar {
        &self.bars[index]
    }
}

impl<'a> IntoIterator for &'a BarSeries {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}
