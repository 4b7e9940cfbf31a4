//! FFmpeg `-progress` protocol parsing.
//!
//! With `-progress pipe:1` FFmpeg writes `key=value` lines to stdout. The
//! `out_time_ms` key carries the elapsed output time, compared against the
//! input duration in milliseconds.

/// Extract the elapsed marker from an exact `out_time_ms=<int>` line.
///
/// Any other line (other keys, empty or non-integer values) yields `None`.
pub fn parse_progress(line: &str) -> Option<i64> {
    let value = line.trim().strip_prefix("out_time_ms=")?;
    value.parse::<i64>().ok()
}

/// Turns elapsed markers into a monotonic completion fraction.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    /// Total input duration in milliseconds, 0 when unknown
    total_duration_ms: i64,
    /// Last fraction handed out
    last: f64,
}

impl ProgressTracker {
    pub fn new(total_seconds: f64) -> Self {
        let total_duration_ms = if total_seconds.is_finite() {
            (total_seconds * 1000.0) as i64
        } else {
            0
        };
        Self {
            total_duration_ms,
            last: 0.0,
        }
    }

    /// Fraction for a raw `out_time_ms` value, if it advances progress.
    ///
    /// Returns `None` for an unknown total duration, negative markers, and
    /// anything not strictly above the last published value.
    pub fn advance(&mut self, out_time: i64) -> Option<f64> {
        if self.total_duration_ms <= 0 || out_time < 0 {
            return None;
        }

        let fraction = (out_time as f64 / self.total_duration_ms as f64).min(1.0);

        if fraction <= self.last {
            return None;
        }

        self.last = fraction;
        Some(fraction)
    }

    /// Parse a line and advance in one step.
    pub fn observe_line(&mut self, line: &str) -> Option<f64> {
        parse_progress(line).and_then(|out_time| self.advance(out_time))
    }

    pub fn last(&self) -> f64 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress() {
        assert_eq!(parse_progress("out_time_ms=5000"), Some(5000));
        assert_eq!(parse_progress("out_time_ms=5000000\n"), Some(5_000_000));
        assert_eq!(parse_progress("out_time_ms="), None);
        assert_eq!(parse_progress("out_time_ms=abc"), None);
        assert_eq!(parse_progress("frame=100"), None);
        assert_eq!(parse_progress("out_time=00:00:05.000000"), None);
        assert_eq!(parse_progress("out_time_us=5000000"), None);
        assert_eq!(parse_progress(""), None);
    }

    #[test]
    fn test_tracker_fractions() {
        let mut tracker = ProgressTracker::new(10.0);
        assert_eq!(tracker.advance(2500), Some(0.25));
        assert_eq!(tracker.advance(5000), Some(0.5));
        assert_eq!(tracker.last(), 0.5);
    }

    #[test]
    fn test_tracker_is_monotonic() {
        let mut tracker = ProgressTracker::new(10.0);
        assert_eq!(tracker.advance(5000), Some(0.5));
        assert_eq!(tracker.advance(5000), None);
        assert_eq!(tracker.advance(1000), None);
        assert_eq!(tracker.advance(-1), None);
        assert_eq!(tracker.last(), 0.5);
    }

    #[test]
    fn test_tracker_clamps_overshoot() {
        let mut tracker = ProgressTracker::new(2.0);
        assert_eq!(tracker.advance(3000), Some(1.0));
        assert_eq!(tracker.advance(4000), None);
    }

    #[test]
    fn test_tracker_unknown_duration() {
        let mut tracker = ProgressTracker::new(0.0);
        assert_eq!(tracker.observe_line("out_time_ms=1000"), None);

        let mut tracker = ProgressTracker::new(f64::NAN);
        assert_eq!(tracker.observe_line("out_time_ms=1000"), None);
    }

    #[test]
    fn test_observe_line() {
        let mut tracker = ProgressTracker::new(4.0);
        assert_eq!(tracker.observe_line("frame=12"), None);
        assert_eq!(tracker.observe_line("out_time_ms=1000"), Some(0.25));
        assert_eq!(tracker.observe_line("progress=continue"), None);

        let mut tracker = ProgressTracker::new(10.0);
        assert_eq!(tracker.observe_line("out_time_ms=5000"), Some(0.5));
    }
}
