//! Absolute time range queries are evaluated against.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// Range ending at `to`. `from` is clamped so it never passes `to`.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: from.min(to),
            to,
        }
    }

    /// The `lookback` window ending now.
    pub fn last(lookback: Duration) -> Self {
        Self::ending_at(Utc::now(), lookback)
    }

    pub fn ending_at(to: DateTime<Utc>, lookback: Duration) -> Self {
        let width = TimeDelta::from_std(lookback).unwrap_or(TimeDelta::hours(1));
        Self::new(to - width, to)
    }

    /// Same width, shifted to end now. Used when the host refreshes.
    pub fn refreshed(&self) -> Self {
        let width = self.to - self.from;
        let to = Utc::now();
        Self::new(to - width, to)
    }

    pub fn width(&self) -> TimeDelta {
        self.to - self.from
    }

    /// Seconds since the epoch, as the Prometheus HTTP API expects them.
    pub fn from_secs(&self) -> f64 {
        self.from.timestamp_millis() as f64 / 1000.0
    }

    pub fn to_secs(&self) -> f64 {
        self.to.timestamp_millis() as f64 / 1000.0
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::last(Duration::from_secs(60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ending_at_uses_lookback_width() {
        let to = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let range = TimeRange::ending_at(to, Duration::from_secs(300));
        assert_eq!(range.to, to);
        assert_eq!(range.width(), TimeDelta::minutes(5));
        assert_eq!(range.to_secs() - range.from_secs(), 300.0);
    }

    #[test]
    fn new_clamps_inverted_range() {
        let to = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let from = to + TimeDelta::hours(1);
        let range = TimeRange::new(from, to);
        assert_eq!(range.from, to);
        assert_eq!(range.width(), TimeDelta::zero());
    }

    #[test]
    fn refreshed_keeps_width() {
        let to = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let range = TimeRange::ending_at(to, Duration::from_secs(600));
        let refreshed = range.refreshed();
        assert_eq!(refreshed.width(), range.width());
        assert!(refreshed.to > range.to);
    }

    #[test]
    fn seconds_keep_millisecond_precision() {
        let to = Utc.timestamp_millis_opt(1_700_000_000_250).unwrap();
        let range = TimeRange::ending_at(to, Duration::from_secs(1));
        assert_eq!(range.to_secs(), 1_700_000_000.25);
    }
}
