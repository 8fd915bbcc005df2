//! Match records and caller-side overlap handling

use chrono::NaiveDateTime;

use crate::Direction;

/// One detected bump-then-slide occurrence
///
/// Indices point into the scanned series. The slide starts on the bar the
/// bump ends on: `slide_start_index == bump_end_index`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Match {
    pub bump_start_index: usize,
    pub bump_end_index: usize,
    pub slide_start_index: usize,
    pub slide_end_index: usize,
    /// Timestamp of the bump's first bar
    pub start_time: NaiveDateTime,
    /// Signed: fraction of the start close in percent mode, price delta in absolute mode
    pub bump_move: f64,
    pub slide_move: f64,
    pub bump_direction: Direction,
    pub slide_direction: Direction,
    pub bump_volume: i64,
    pub slide_volume: i64,
}

impl Match {
    /// True when the slide moves against the bump
    #[inline]
    pub fn is_reversal(&self) -> bool {
        self.bump_direction != self.slide_direction
    }

    /// Inclusive bar range `[bump_start_index, slide_end_index]`
    #[inline]
    pub fn span(&self) -> std::ops::RangeInclusive<usize> {
        self.bump_start_index..=self.slide_end_index
    }

    #[inline]
    pub fn overlaps(&self, other: &Match) -> bool {
        self.bump_start_index <= other.slide_end_index
            && other.bump_start_index <= self.slide_end_index
    }
}

/// Which match survives in a cluster of overlapping matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Keep {
    /// Lowest `bump_start_index`
    #[default]
    Earliest,
    /// Largest `|bump_move|`, earliest on ties
    Strongest,
}

/// Collapse clusters of overlapping matches to one representative each.
///
/// A cluster is a maximal run of matches (ordered by start) in which every
/// match intersects the union of the windows before it. The scanner never
/// does this itself; it is a post-processing choice for callers.
pub fn dedup_overlapping(matches: &[Match], keep: Keep) -> Vec<Match> {
    let mut sorted = matches.to_vec();
    sorted.sort_by_key(|m| m.bump_start_index);

    let mut out: Vec<Match> = Vec::new();
    let mut cluster_end: Option<usize> = None;

    for m in sorted {
        if let (Some(end), Some(best)) = (cluster_end, out.last_mut()) {
            if m.bump_start_index <= end {
                cluster_end = Some(end.max(m.slide_end_index));
                if keep == Keep::Strongest && m.bump_move.abs() > best.bump_move.abs() {
                    *best = m;
                }
                continue;
            }
        }
        cluster_end = Some(m.slide_end_index);
        out.push(m);
    }

    out
}
