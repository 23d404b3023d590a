use chrono::{DateTime, Utc};

use crate::models::EvaluationWindow;

/// Half-open span `[start, end)` of downtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Interval {
    pub(crate) start: DateTime<Utc>,
    pub(crate) end: DateTime<Utc>,
}

impl Interval {
    pub(crate) fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub(crate) fn duration_millis(&self) -> i64 {
        (self.end - self.start).num_milliseconds().max(0)
    }

    /// Clips to the window; `None` when nothing of the interval remains.
    pub(crate) fn clamp_to(&self, window: &EvaluationWindow) -> Option<Interval> {
        let start = self.start.max(window.start);
        let end = self.end.min(window.end);
        (end > start).then_some(Interval { start, end })
    }
}

/// Clamps every interval to `window`, then merges overlapping or touching
/// ones. The result is sorted and disjoint, so its summed duration equals the
/// union of the input.
pub(crate) fn merge_intervals(intervals: &[Interval], window: &EvaluationWindow) -> Vec<Interval> {
    let mut clamped: Vec<Interval> = intervals
        .iter()
        .filter_map(|interval| interval.clamp_to(window))
        .collect();
    clamped.sort_by_key(|interval| interval.start);

    let mut merged: Vec<Interval> = Vec::with_capacity(clamped.len());
    for interval in clamped {
        match merged.last_mut() {
            Some(current) if interval.start <= current.end => {
                current.end = current.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

pub(crate) fn total_duration_millis(merged: &[Interval]) -> i64 {
    merged.iter().map(Interval::duration_millis).sum()
}
