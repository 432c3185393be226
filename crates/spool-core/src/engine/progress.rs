//! Throttled progress reporting and end-of-track detection

/// Tolerance before the end at which a non-looping track counts as finished
pub const END_GUARD_SECONDS: f64 = 0.1;

/// Counts audible callbacks and fires once every `interval` of them
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    interval: u32,
    counter: u32,
}

impl ProgressReporter {
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            counter: 0,
        }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Count one callback; true when a report is due
    #[inline]
    pub fn tick(&mut self) -> bool {
        self.counter += 1;
        if self.counter >= self.interval {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

/// Whether a non-looping track should be marked as ended
///
/// `wrapped_at_eof` covers the case where the player already wrapped past
/// the end between two checks and its position is back near the start.
pub fn is_track_end(looping: bool, duration: f64, position: f64, wrapped_at_eof: bool) -> bool {
    if looping || duration <= 0.0 {
        return false;
    }
    wrapped_at_eof || position >= duration - END_GUARD_SECONDS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_exactly_once_per_interval() {
        let mut reporter = ProgressReporter::new(32);
        let fired = (0..320).filter(|_| reporter.tick()).count();
        assert_eq!(fired, 10);
    }

    #[test]
    fn test_first_report_after_full_interval() {
        let mut reporter = ProgressReporter::new(4);
        assert!(!reporter.tick());
        assert!(!reporter.tick());
        assert!(!reporter.tick());
        assert!(reporter.tick());
    }

    #[test]
    fn test_zero_interval_reports_every_callback() {
        let mut reporter = ProgressReporter::new(0);
        assert_eq!(reporter.interval(), 1);
        assert!(reporter.tick());
        assert!(reporter.tick());
    }

    #[test]
    fn test_end_detection() {
        assert!(!is_track_end(true, 10.0, 9.95, true));
        assert!(!is_track_end(false, 0.0, 5.0, true));
        assert!(!is_track_end(false, 10.0, 9.8, false));
        assert!(is_track_end(false, 10.0, 9.9, false));
        assert!(is_track_end(false, 10.0, 0.02, true));
    }
}
