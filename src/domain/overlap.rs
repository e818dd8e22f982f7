//! Interval sweep over the participants available on a single date.
//!
//! Intervals are half-open `[start, end)` in minutes of the day. A missing
//! start means `00:00`, a missing end means `23:59`.

use std::collections::BTreeSet;

use time::Time;

use crate::domain::clock::{END_OF_DAY, MINUTES_PER_DAY, minute_of_day, time_from_minutes};

/// One participant's availability on a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interval {
    pub start: Option<Time>,
    pub end: Option<Time>,
}

impl Interval {
    pub const ALL_DAY: Interval = Interval {
        start: None,
        end: None,
    };

    pub fn new(start: Option<Time>, end: Option<Time>) -> Self {
        Self { start, end }
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    fn bounds(&self) -> (u32, u32) {
        let start = self.start.map(minute_of_day).unwrap_or(0);
        let end = minute_of_day(self.end.unwrap_or(END_OF_DAY));
        (start, end)
    }

    fn covers(&self, from: u32, to: u32) -> bool {
        let (start, end) = self.bounds();
        start <= from && to <= end
    }
}

/// A contiguous range during which at least `threshold` participants overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: Time,
    pub end: Time,
    pub peak_count: u32,
}

/// Elementary sub-ranges between consecutive cut points, with their coverage.
fn sweep(intervals: &[Interval]) -> Vec<(u32, u32, u32)> {
    let cuts: BTreeSet<u32> = intervals
        .iter()
        .map(Interval::bounds)
        .filter(|(start, end)| start < end)
        .flat_map(|(start, end)| [start, end])
        .collect();
    let cuts: Vec<u32> = cuts.into_iter().collect();

    cuts.windows(2)
        .map(|pair| {
            let (from, to) = (pair[0], pair[1]);
            let count = intervals
                .iter()
                .filter(|interval| interval.covers(from, to))
                .count();
            (from, to, u32::try_from(count).unwrap_or(u32::MAX))
        })
        .collect()
}

/// Maximum number of intervals that are active at the same time.
pub fn max_simultaneous(intervals: &[Interval]) -> u32 {
    sweep(intervals)
        .into_iter()
        .map(|(_, _, count)| count)
        .max()
        .unwrap_or(0)
}

/// Merged ranges where coverage is at least `threshold`.
pub fn threshold_segments(intervals: &[Interval], threshold: u32) -> Vec<Segment> {
    let threshold = threshold.max(1);
    let mut merged: Vec<(u32, u32, u32)> = Vec::new();

    for (from, to, count) in sweep(intervals) {
        if count < threshold {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.1 == from => {
                last.1 = to;
                last.2 = last.2.max(count);
            }
            _ => merged.push((from, to, count)),
        }
    }

    merged
        .into_iter()
        .map(|(from, to, peak_count)| Segment {
            start: time_from_minutes(from),
            end: time_from_minutes(to),
            peak_count,
        })
        .collect()
}

/// Length of the window shared by every interval.
///
/// Latest start to earliest end; a full day when everyone is available all
/// day, zero for an empty set or disjoint intervals.
pub fn feasible_window_minutes(intervals: &[Interval]) -> u32 {
    if intervals.is_empty() {
        return 0;
    }
    if intervals.iter().all(Interval::is_all_day) {
        return MINUTES_PER_DAY;
    }

    let latest_start = intervals.iter().map(|i| i.bounds().0).max().unwrap_or(0);
    let earliest_end = intervals.iter().map(|i| i.bounds().1).min().unwrap_or(0);
    earliest_end.saturating_sub(latest_start)
}
