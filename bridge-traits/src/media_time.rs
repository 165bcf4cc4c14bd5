//! Media Time Values
//!
//! Rational media time modelled after the native players' time type: a value
//! over a timescale, plus the non-numeric states native players report while
//! an item is still loading (invalid), for live streams without a known length
//! (indefinite), and for unbounded ranges (positive/negative infinity).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

/// Timescale used when converting from seconds or [`Duration`].
pub const DEFAULT_TIMESCALE: i32 = 600;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Repr {
    Invalid,
    Indefinite,
    PositiveInfinity,
    NegativeInfinity,
    Numeric { value: i64, timescale: i32 },
}

/// A point in media time.
///
/// Numeric times compare by value regardless of timescale, so `1/1` equals
/// `600/600`. Invalid and indefinite times are unordered.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaTime(Repr);

impl MediaTime {
    pub const ZERO: Self = Self(Repr::Numeric {
        value: 0,
        timescale: 1,
    });
    pub const INVALID: Self = Self(Repr::Invalid);
    pub const INDEFINITE: Self = Self(Repr::Indefinite);
    pub const POSITIVE_INFINITY: Self = Self(Repr::PositiveInfinity);
    pub const NEGATIVE_INFINITY: Self = Self(Repr::NegativeInfinity);

    /// Creates a numeric time. A non-positive timescale yields an invalid time.
    pub fn new(value: i64, timescale: i32) -> Self {
        if timescale <= 0 {
            return Self::INVALID;
        }
        Self(Repr::Numeric { value, timescale })
    }

    /// Creates a time from seconds using [`DEFAULT_TIMESCALE`].
    ///
    /// NaN maps to an invalid time and infinities to the matching infinite time.
    pub fn from_seconds(seconds: f64) -> Self {
        if seconds.is_nan() {
            return Self::INVALID;
        }
        if seconds == f64::INFINITY {
            return Self::POSITIVE_INFINITY;
        }
        if seconds == f64::NEG_INFINITY {
            return Self::NEGATIVE_INFINITY;
        }
        Self::new(
            (seconds * f64::from(DEFAULT_TIMESCALE)).round() as i64,
            DEFAULT_TIMESCALE,
        )
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self::from_seconds(duration.as_secs_f64())
    }

    /// Returns `false` only for [`MediaTime::INVALID`].
    pub fn is_valid(&self) -> bool {
        !matches!(self.0, Repr::Invalid)
    }

    /// Returns `true` for finite, well-formed times.
    pub fn is_numeric(&self) -> bool {
        matches!(self.0, Repr::Numeric { .. })
    }

    pub fn is_indefinite(&self) -> bool {
        matches!(self.0, Repr::Indefinite)
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self.0, Repr::PositiveInfinity | Repr::NegativeInfinity)
    }

    /// Value in seconds. Non-numeric times map to NaN or an infinity.
    pub fn seconds(&self) -> f64 {
        match self.0 {
            Repr::Numeric { value, timescale } => value as f64 / f64::from(timescale),
            Repr::PositiveInfinity => f64::INFINITY,
            Repr::NegativeInfinity => f64::NEG_INFINITY,
            Repr::Invalid | Repr::Indefinite => f64::NAN,
        }
    }

    /// Converts a non-negative numeric time into a [`Duration`].
    pub fn to_duration(&self) -> Option<Duration> {
        match self.0 {
            Repr::Numeric { value, .. } if value >= 0 => Some(Duration::from_secs_f64(self.seconds())),
            _ => None,
        }
    }

    /// Restricts a time to `[lower, upper]`. Non-numeric times are returned unchanged.
    pub fn clamped(self, lower: MediaTime, upper: MediaTime) -> MediaTime {
        if !self.is_numeric() {
            return self;
        }
        if self < lower {
            lower
        } else if self > upper {
            upper
        } else {
            self
        }
    }

    fn rank(&self) -> Option<u8> {
        match self.0 {
            Repr::NegativeInfinity => Some(0),
            Repr::Numeric { .. } => Some(1),
            Repr::PositiveInfinity => Some(2),
            Repr::Invalid | Repr::Indefinite => None,
        }
    }

    fn combine(self, rhs: Self, negate_rhs: bool) -> Self {
        let rhs = if negate_rhs { -rhs } else { rhs };
        match (self.0, rhs.0) {
            (Repr::Invalid, _) | (_, Repr::Invalid) => Self::INVALID,
            (Repr::Indefinite, _) | (_, Repr::Indefinite) => Self::INDEFINITE,
            (Repr::PositiveInfinity, Repr::NegativeInfinity)
            | (Repr::NegativeInfinity, Repr::PositiveInfinity) => Self::INVALID,
            (Repr::PositiveInfinity, _) | (_, Repr::PositiveInfinity) => Self::POSITIVE_INFINITY,
            (Repr::NegativeInfinity, _) | (_, Repr::NegativeInfinity) => Self::NEGATIVE_INFINITY,
            (
                Repr::Numeric {
                    value: lhs_value,
                    timescale: lhs_scale,
                },
                Repr::Numeric {
                    value: rhs_value,
                    timescale: rhs_scale,
                },
            ) => {
                if lhs_scale == rhs_scale {
                    if let Some(value) = lhs_value.checked_add(rhs_value) {
                        return Self::new(value, lhs_scale);
                    }
                }
                // Exact over the common timescale; rounded onto the finer of
                // the two when that does not fit.
                let common = lcm(lhs_scale, rhs_scale);
                if let Ok(timescale) = i32::try_from(common) {
                    let sum = rescale(lhs_value, lhs_scale, timescale)
                        + rescale(rhs_value, rhs_scale, timescale);
                    if let Ok(value) = i64::try_from(sum) {
                        return Self::new(value, timescale);
                    }
                }
                let timescale = lhs_scale.max(rhs_scale);
                let sum = rescale(lhs_value, lhs_scale, timescale)
                    + rescale(rhs_value, rhs_scale, timescale);
                match i64::try_from(sum) {
                    Ok(value) => Self::new(value, timescale),
                    Err(_) if sum > 0 => Self::POSITIVE_INFINITY,
                    Err(_) => Self::NEGATIVE_INFINITY,
                }
            }
        }
    }
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(lhs: i32, rhs: i32) -> i128 {
    let (lhs, rhs) = (i128::from(lhs), i128::from(rhs));
    lhs / gcd(lhs, rhs) * rhs
}

/// `value / from` expressed over `to`, rounded half away from zero.
fn rescale(value: i64, from: i32, to: i32) -> i128 {
    let scaled = i128::from(value) * i128::from(to);
    let from = i128::from(from);
    if scaled >= 0 {
        (scaled + from / 2) / from
    } else {
        (scaled - from / 2) / from
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::INVALID
    }
}

impl From<Duration> for MediaTime {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}

impl std::ops::Neg for MediaTime {
    type Output = Self;

    fn neg(self) -> Self {
        match self.0 {
            Repr::Numeric { value, timescale } => match value.checked_neg() {
                Some(value) => Self::new(value, timescale),
                None => Self::POSITIVE_INFINITY,
            },
            Repr::PositiveInfinity => Self::NEGATIVE_INFINITY,
            Repr::NegativeInfinity => Self::POSITIVE_INFINITY,
            _ => self,
        }
    }
}

impl Add for MediaTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.combine(rhs, false)
    }
}

impl Sub for MediaTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.combine(rhs, true)
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        match (self.0, other.0) {
            (Repr::Invalid, Repr::Invalid) | (Repr::Indefinite, Repr::Indefinite) => true,
            _ => self.partial_cmp(other) == Some(Ordering::Equal),
        }
    }
}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let (lhs_rank, rhs_rank) = (self.rank()?, other.rank()?);
        match (self.0, other.0) {
            (
                Repr::Numeric {
                    value: lhs_value,
                    timescale: lhs_scale,
                },
                Repr::Numeric {
                    value: rhs_value,
                    timescale: rhs_scale,
                },
            ) => {
                let lhs = i128::from(lhs_value) * i128::from(rhs_scale);
                let rhs = i128::from(rhs_value) * i128::from(lhs_scale);
                Some(lhs.cmp(&rhs))
            }
            _ => Some(lhs_rank.cmp(&rhs_rank)),
        }
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Numeric { .. } => write!(f, "{:.3}s", self.seconds()),
            Repr::Invalid => f.write_str("invalid"),
            Repr::Indefinite => f.write_str("indefinite"),
            Repr::PositiveInfinity => f.write_str("+inf"),
            Repr::NegativeInfinity => f.write_str("-inf"),
        }
    }
}

/// A range of media time expressed as a start and a duration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    start: MediaTime,
    duration: MediaTime,
}

impl TimeRange {
    pub const INVALID: Self = Self {
        start: MediaTime::INVALID,
        duration: MediaTime::INVALID,
    };
    pub const ZERO: Self = Self {
        start: MediaTime::ZERO,
        duration: MediaTime::ZERO,
    };

    pub fn new(start: MediaTime, duration: MediaTime) -> Self {
        Self { start, duration }
    }

    /// Creates a range from its bounds; `end` before `start` yields an invalid range.
    pub fn from_bounds(start: MediaTime, end: MediaTime) -> Self {
        if end < start {
            return Self::INVALID;
        }
        Self::new(start, end - start)
    }

    pub fn start(&self) -> MediaTime {
        self.start
    }

    pub fn duration(&self) -> MediaTime {
        self.duration
    }

    pub fn end(&self) -> MediaTime {
        self.start + self.duration
    }

    /// A range is valid when both start and duration are numeric and the
    /// duration is not negative.
    pub fn is_valid(&self) -> bool {
        self.start.is_numeric() && self.duration.is_numeric() && self.duration >= MediaTime::ZERO
    }

    /// Returns `true` for valid ranges of zero length.
    pub fn is_empty(&self) -> bool {
        self.is_valid() && self.duration == MediaTime::ZERO
    }

    /// Half-open containment: `start <= time < end`.
    pub fn contains(&self, time: MediaTime) -> bool {
        self.is_valid() && time.is_numeric() && self.start <= time && time < self.end()
    }

    /// Smallest range covering every valid range in `ranges`, or [`TimeRange::ZERO`]
    /// when there is none. Native players report seekable ranges this way.
    pub fn union(ranges: &[TimeRange]) -> TimeRange {
        let mut valid = ranges.iter().filter(|range| range.is_valid());
        let Some(first) = valid.next() else {
            return TimeRange::ZERO;
        };
        let (start, end) = valid.fold((first.start(), first.end()), |(start, end), range| {
            let start = if range.start() < start { range.start() } else { start };
            let end = if range.end() > end { range.end() } else { end };
            (start, end)
        });
        TimeRange::from_bounds(start, end)
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: f64) -> MediaTime {
        MediaTime::from_seconds(value)
    }

    #[test]
    fn numeric_equality_ignores_timescale() {
        assert_eq!(MediaTime::new(1, 1), MediaTime::new(600, 600));
        assert!(MediaTime::new(1, 2) < MediaTime::new(1, 1));
    }

    #[test]
    fn non_numeric_times_are_unordered() {
        assert_eq!(MediaTime::INVALID.partial_cmp(&MediaTime::ZERO), None);
        assert_eq!(MediaTime::INDEFINITE.partial_cmp(&MediaTime::ZERO), None);
        assert!(MediaTime::NEGATIVE_INFINITY < secs(-1e9));
        assert!(MediaTime::POSITIVE_INFINITY > secs(1e9));
        assert_eq!(MediaTime::INVALID, MediaTime::INVALID);
    }

    #[test]
    fn from_seconds_maps_special_values() {
        assert!(!MediaTime::from_seconds(f64::NAN).is_valid());
        assert_eq!(MediaTime::from_seconds(f64::INFINITY), MediaTime::POSITIVE_INFINITY);
        assert!(MediaTime::from_seconds(f64::NEG_INFINITY).is_infinite());
        assert_eq!(secs(1.5).seconds(), 1.5);
    }

    #[test]
    fn arithmetic_propagates_special_states() {
        assert_eq!(secs(10.0) - secs(4.0), secs(6.0));
        assert_eq!(MediaTime::new(1, 2) + MediaTime::new(1, 3), MediaTime::new(5, 6));
        assert!(!(MediaTime::INVALID + secs(1.0)).is_valid());
        assert!((MediaTime::INDEFINITE + secs(1.0)).is_indefinite());
        assert_eq!(MediaTime::POSITIVE_INFINITY + secs(1.0), MediaTime::POSITIVE_INFINITY);
        assert!(!(MediaTime::POSITIVE_INFINITY + MediaTime::NEGATIVE_INFINITY).is_valid());
    }

    #[test]
    fn mixed_timescales_add_exactly() {
        let sum = MediaTime::new(1, 3) + MediaTime::new(1, 2);
        assert_eq!(sum, MediaTime::new(5, 6));
        assert!((sum.seconds() - 5.0 / 6.0).abs() < 1e-12);

        assert_eq!(
            MediaTime::new(45_001, 90_000) - MediaTime::new(300, 600),
            MediaTime::new(1, 90_000)
        );

        // The common timescale of 3e9 does not fit, so nanoseconds are used
        // and 1/600 s rounds up to 1_666_667 ns.
        let nanos = MediaTime::new(1, 1_000_000_000) + MediaTime::new(1, 600);
        assert_eq!(nanos, MediaTime::new(1_666_668, 1_000_000_000));
    }

    #[test]
    fn clamped_keeps_time_inside_bounds() {
        assert_eq!(secs(600.0).clamped(MediaTime::ZERO, secs(120.0)), secs(120.0));
        assert_eq!(secs(-3.0).clamped(MediaTime::ZERO, secs(120.0)), MediaTime::ZERO);
        assert!(MediaTime::INDEFINITE
            .clamped(MediaTime::ZERO, secs(1.0))
            .is_indefinite());
    }

    #[test]
    fn range_validity_and_emptiness() {
        assert!(TimeRange::ZERO.is_valid());
        assert!(TimeRange::ZERO.is_empty());
        assert!(!TimeRange::INVALID.is_valid());
        assert!(!TimeRange::INVALID.is_empty());
        assert!(!TimeRange::new(MediaTime::ZERO, MediaTime::INDEFINITE).is_valid());
        assert!(!TimeRange::from_bounds(secs(5.0), secs(1.0)).is_valid());
    }

    #[test]
    fn range_containment_is_half_open() {
        let range = TimeRange::from_bounds(secs(10.0), secs(20.0));
        assert!(range.contains(secs(10.0)));
        assert!(range.contains(secs(19.9)));
        assert!(!range.contains(secs(20.0)));
        assert!(!range.contains(MediaTime::INVALID));
    }

    #[test]
    fn union_spans_all_valid_ranges() {
        let union = TimeRange::union(&[
            TimeRange::from_bounds(secs(30.0), secs(40.0)),
            TimeRange::INVALID,
            TimeRange::from_bounds(secs(5.0), secs(10.0)),
        ]);
        assert_eq!(union.start(), secs(5.0));
        assert_eq!(union.end(), secs(40.0));
        assert_eq!(TimeRange::union(&[]), TimeRange::ZERO);
    }

    #[test]
    fn serde_round_trips_special_states() {
        let json = serde_json::to_string(&MediaTime::INDEFINITE).unwrap();
        let decoded: MediaTime = serde_json::from_str(&json).unwrap();
        assert!(decoded.is_indefinite());
    }
}
