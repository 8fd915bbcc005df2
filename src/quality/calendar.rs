//! Session calendars
//!
//! The validator holds no market knowledge of its own. A calendar tells it
//! which breaks between consecutive bars are normal (overnight, weekend) and
//! which instants are supposed to carry a bar at all.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};

/// Market-specific knowledge the validator consults
pub trait SessionCalendar {
    /// True when the break between two consecutive bars is a normal closure.
    fn is_expected_gap(&self, prev: NaiveDateTime, next: NaiveDateTime) -> bool;

    /// True when a bar is expected at `ts`. Used to enumerate missing minutes.
    fn is_trading_instant(&self, _ts: NaiveDateTime) -> bool {
        true
    }
}

/// Any `Fn(prev, next) -> bool` closure is a calendar
impl<F> SessionCalendar for F
where
    F: Fn(NaiveDateTime, NaiveDateTime) -> bool,
{
    fn is_expected_gap(&self, prev: NaiveDateTime, next: NaiveDateTime) -> bool {
        self(prev, next)
    }
}

/// Round-the-clock market: every break is an anomaly
#[derive(Debug, Clone, Copy, Default)]
pub struct Continuous;

impl SessionCalendar for Continuous {
    fn is_expected_gap(&self, _prev: NaiveDateTime, _next: NaiveDateTime) -> bool {
        false
    }
}

/// Breaks that cross a calendar date are expected; intraday breaks are not
#[derive(Debug, Clone, Copy, Default)]
pub struct DailySessions;

impl SessionCalendar for DailySessions {
    fn is_expected_gap(&self, prev: NaiveDateTime, next: NaiveDateTime) -> bool {
        prev.date() != next.date()
    }
}

/// Weekday sessions between `open` and `close`, both inclusive
///
/// The default is the US cash session, 09:30 to 16:00 (391 one-minute bars).
/// A break is expected when it starts at or after the close (or outside a
/// session) and ends at or before the open (or outside a session). Holidays
/// need no listing: a break from one close to a later open is always normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RegularHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for RegularHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
        }
    }
}

impl RegularHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self { open, close }
    }

    #[inline]
    fn is_weekday(ts: NaiveDateTime) -> bool {
        !matches!(ts.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

impl SessionCalendar for RegularHours {
    fn is_expected_gap(&self, prev: NaiveDateTime, next: NaiveDateTime) -> bool {
        let leaves_session = prev.time() >= self.close || !self.is_trading_instant(prev);
        let enters_session = next.time() <= self.open || !self.is_trading_instant(next);
        leaves_session && enters_session
    }

    fn is_trading_instant(&self, ts: NaiveDateTime) -> bool {
        let t = ts.time();
        Self::is_weekday(ts) && t >= self.open && t <= self.close
    }
}
