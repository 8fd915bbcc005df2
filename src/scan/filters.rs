//! Start-bar eligibility filters
//!
//! Applied to the bump's first bar only: they govern when a bump may begin,
//! not the span of the whole window. Unset filters pass every bar; set
//! filters combine with AND.

use chrono::{Datelike, NaiveDateTime, Weekday};

use super::criteria::{MatchCriteria, TimeWindow};

/// Stateless time-of-day and day-of-week predicates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterPipeline {
    window: Option<TimeWindow>,
    /// Indexed by `num_days_from_monday`; `None` admits every day
    days: Option<[bool; 7]>,
}

impl FilterPipeline {
    pub fn new(window: Option<TimeWindow>, days: Option<&[Weekday]>) -> Self {
        let days = days.filter(|d| !d.is_empty()).map(|d| {
            let mut mask = [false; 7];
            for day in d {
                mask[day.num_days_from_monday() as usize] = true;
            }
            mask
        });
        Self { window, days }
    }

    pub fn from_criteria(criteria: &MatchCriteria) -> Self {
        Self::new(criteria.time_window, criteria.days_of_week.as_deref())
    }

    /// True when no predicate is set
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.window.is_none() && self.days.is_none()
    }

    #[inline]
    pub fn admits_time(&self, ts: NaiveDateTime) -> bool {
        match &self.window {
            Some(w) => w.contains(ts.time()),
            None => true,
        }
    }

    #[inline]
    pub fn admits_day(&self, ts: NaiveDateTime) -> bool {
        match &self.days {
            Some(mask) => mask[ts.weekday().num_days_from_monday() as usize],
            None => true,
        }
    }

    #[inline]
    pub fn admits(&self, ts: NaiveDateTime) -> bool {
        self.admits_time(ts) && self.admits_day(ts)
    }
}
