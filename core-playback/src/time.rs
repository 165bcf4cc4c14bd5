//! Time and range helpers shared by the seek coordinator, navigation and the
//! player facade.

use bridge_traits::{MediaTime, TimeRange};
use std::time::Duration;

/// Restricts `time` to the bounds of `range`.
///
/// Times are returned unchanged when the range is invalid or empty, since
/// nothing meaningful can be said about allowed positions then.
pub fn clamp_to_range(time: MediaTime, range: &TimeRange) -> MediaTime {
    if !range.is_valid() || range.is_empty() {
        return time;
    }
    time.clamped(range.start(), range.end())
}

/// Whether playback has moved at least `threshold` past the start of `range`.
pub fn is_away_from_start(time: MediaTime, range: &TimeRange, threshold: Duration) -> bool {
    if !time.is_numeric() || !range.is_valid() || range.is_empty() {
        return false;
    }
    time - range.start() >= MediaTime::from_duration(threshold)
}

/// Whether `time` lies within the trailing `window` of `range`.
pub fn is_near_end(time: MediaTime, range: &TimeRange, window: Duration) -> bool {
    if !time.is_numeric() || !range.is_valid() {
        return false;
    }
    range.end() - time < MediaTime::from_duration(window)
}

/// First position at or after `time` outside every blocked range.
///
/// Returns `None` when `time` is not blocked. Overlapping and adjacent
/// ranges are crossed in one call.
pub fn unblocked_position(time: MediaTime, blocked: &[TimeRange]) -> Option<MediaTime> {
    let mut position = time;
    let mut moved = false;
    // Each pass moves past at least one range, so this terminates.
    for _ in 0..=blocked.len() {
        match blocked.iter().find(|range| range.contains(position)) {
            Some(range) => {
                position = range.end();
                moved = true;
            }
            None => break,
        }
    }
    moved.then_some(position)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: f64) -> MediaTime {
        MediaTime::from_seconds(value)
    }

    fn range(start: f64, end: f64) -> TimeRange {
        TimeRange::from_bounds(secs(start), secs(end))
    }

    #[test]
    fn test_clamp_to_range() {
        assert_eq!(clamp_to_range(secs(600.0), &range(0.0, 120.0)), secs(120.0));
        assert_eq!(clamp_to_range(secs(30.0), &range(0.0, 120.0)), secs(30.0));
        assert_eq!(clamp_to_range(secs(600.0), &TimeRange::ZERO), secs(600.0));
        assert_eq!(clamp_to_range(secs(600.0), &TimeRange::INVALID), secs(600.0));
    }

    #[test]
    fn test_is_away_from_start() {
        let seekable = range(0.0, 120.0);
        let threshold = Duration::from_secs(3);
        assert!(!is_away_from_start(secs(2.9), &seekable, threshold));
        assert!(is_away_from_start(secs(3.0), &seekable, threshold));
        assert!(!is_away_from_start(MediaTime::INVALID, &seekable, threshold));
        assert!(!is_away_from_start(secs(60.0), &TimeRange::ZERO, threshold));
        // DVR windows start later than zero
        assert!(!is_away_from_start(secs(101.0), &range(100.0, 400.0), threshold));
    }

    #[test]
    fn test_is_near_end() {
        let seekable = range(0.0, 120.0);
        let window = Duration::from_secs(18);
        assert!(is_near_end(secs(110.0), &seekable, window));
        assert!(!is_near_end(secs(100.0), &seekable, window));
        assert!(!is_near_end(secs(110.0), &TimeRange::INVALID, window));
    }

    #[test]
    fn test_unblocked_position() {
        let blocked = vec![range(10.0, 20.0), range(20.0, 25.0), range(50.0, 60.0)];
        assert_eq!(unblocked_position(secs(5.0), &blocked), None);
        assert_eq!(unblocked_position(secs(12.0), &blocked), Some(secs(25.0)));
        assert_eq!(unblocked_position(secs(20.0), &blocked), Some(secs(25.0)));
        assert_eq!(unblocked_position(secs(25.0), &blocked), None);
        assert_eq!(unblocked_position(secs(59.0), &blocked), Some(secs(60.0)));
    }

    #[test]
    fn test_unblocked_position_with_overlaps() {
        let blocked = vec![range(30.0, 45.0), range(10.0, 35.0)];
        assert_eq!(unblocked_position(secs(11.0), &blocked), Some(secs(45.0)));
    }
}
