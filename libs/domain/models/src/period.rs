//! Half-open time periods: `[start, end)` with `end = None` meaning open-ended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    /// `None` means the period never closes.
    pub end: Option<DateTime<Utc>>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn closed(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end: Some(end) }
    }

    pub fn open_ended(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    /// `t ∈ [start, end) ⇔ start ≤ t < end`; an open end always contains.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && self.end.map_or(true, |end| t < end)
    }

    /// Whether `self` and `other` share any instant.
    pub fn overlaps(&self, other: &Period) -> bool {
        let starts_before_other_ends = other.end.map_or(true, |end| self.start < end);
        let other_starts_before_self_ends = self.end.map_or(true, |end| other.start < end);
        starts_before_other_ends && other_starts_before_self_ends
    }

    pub fn is_closed(&self) -> bool {
        self.end.is_some()
    }

    /// Iterates the interval-start ticks `[start, end)` at the given step,
    /// used to walk an hourly or quarter-hourly period one tick at a time.
    /// An open-ended period cannot be iterated and yields nothing.
    pub fn ticks(&self, step: chrono::Duration) -> Vec<DateTime<Utc>> {
        let Some(end) = self.end else { return Vec::new() };
        let mut ticks = Vec::new();
        let mut t = self.start;
        while t < end {
            ticks.push(t);
            t += step;
        }
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn boundary_start_is_contained_end_is_not() {
        let p = Period::closed(ts(0), ts(24));
        assert!(p.contains(ts(0)));
        assert!(!p.contains(ts(24)));
        assert!(p.contains(ts(23)));
    }

    #[test]
    fn open_ended_period_always_contains_after_start() {
        let p = Period::open_ended(ts(0));
        assert!(p.contains(ts(0)));
        assert!(p.contains(ts(1_000_000)));
    }

    #[test]
    fn ticks_cover_every_hour_start() {
        let p = Period::closed(ts(0), ts(3));
        let ticks = p.ticks(chrono::Duration::hours(1));
        assert_eq!(ticks, vec![ts(0), ts(1), ts(2)]);
    }

    #[test]
    fn overlap_detection() {
        let a = Period::closed(ts(0), ts(10));
        let b = Period::closed(ts(5), ts(15));
        let c = Period::closed(ts(10), ts(20));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
