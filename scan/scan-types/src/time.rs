//! Pipeline time types.
//!
//! All scheduling in the pipeline (quality windows, backoff deadlines) is
//! expressed against these types rather than `std::time`, so the controller
//! can be driven deterministically in tests.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Nanosecond-precision timestamp.
///
/// Measured from an arbitrary epoch (session start in practice). Ordering and
/// arithmetic are what matter; absolute wall-clock meaning is the caller's.
///
/// # Example
///
/// ```
/// use scan_types::{Duration, Timestamp};
///
/// let t0 = Timestamp::from_millis(100);
/// let t1 = t0.saturating_add(Duration::from_millis(50));
/// assert_eq!(t1.abs_diff(t0), Duration::from_millis(50));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Timestamp {
    nanos: u64,
}

impl Timestamp {
    /// Creates a timestamp from nanoseconds since the epoch.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Creates a timestamp from milliseconds since the epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos: millis * 1_000_000,
        }
    }

    /// Creates a timestamp from seconds (floating point).
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn from_secs_f64(secs: f64) -> Self {
        Self {
            nanos: (secs * 1e9).max(0.0) as u64,
        }
    }

    /// Returns the timestamp as nanoseconds.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.nanos
    }

    /// Returns the timestamp as milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.nanos / 1_000_000
    }

    /// Returns the timestamp as seconds (floating point).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_secs_f64(self) -> f64 {
        self.nanos as f64 / 1e9
    }

    /// Returns the zero timestamp.
    #[must_use]
    pub const fn zero() -> Self {
        Self { nanos: 0 }
    }

    /// Adds a duration, saturating at the numeric limit.
    #[must_use]
    pub const fn saturating_add(self, duration: Duration) -> Self {
        Self {
            nanos: self.nanos.saturating_add(duration.as_nanos()),
        }
    }

    /// Subtracts a duration, saturating at zero.
    #[must_use]
    pub const fn saturating_sub(self, duration: Duration) -> Self {
        Self {
            nanos: self.nanos.saturating_sub(duration.as_nanos()),
        }
    }

    /// Returns the absolute difference between two timestamps.
    #[must_use]
    pub const fn abs_diff(self, other: Self) -> Duration {
        Duration::from_nanos(self.nanos.abs_diff(other.nanos))
    }
}

/// A nanosecond-precision time interval.
///
/// # Example
///
/// ```
/// use scan_types::Duration;
///
/// let backoff = Duration::from_secs(1);
/// let doubled = backoff.saturating_mul(2);
/// assert_eq!(doubled.as_millis(), 2000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Duration {
    nanos: u64,
}

impl Duration {
    /// Creates a duration from nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Creates a duration from milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos: millis * 1_000_000,
        }
    }

    /// Creates a duration from seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            nanos: secs * 1_000_000_000,
        }
    }

    /// Creates a duration from seconds (floating point).
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn from_secs_f64(secs: f64) -> Self {
        Self {
            nanos: (secs * 1e9).max(0.0) as u64,
        }
    }

    /// Returns the duration as nanoseconds.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.nanos
    }

    /// Returns the duration as milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.nanos / 1_000_000
    }

    /// Returns the duration as seconds (floating point).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_secs_f64(self) -> f64 {
        self.nanos as f64 / 1e9
    }

    /// Returns the zero duration.
    #[must_use]
    pub const fn zero() -> Self {
        Self { nanos: 0 }
    }

    /// Checks if this is a zero duration.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.nanos == 0
    }

    /// Multiplies by a scalar, saturating at the numeric limit.
    #[must_use]
    pub const fn saturating_mul(self, factor: u64) -> Self {
        Self {
            nanos: self.nanos.saturating_mul(factor),
        }
    }

    /// Returns the smaller of two durations.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if self.nanos <= other.nanos {
            self
        } else {
            other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_conversions() {
        let ts = Timestamp::from_secs_f64(1.5);
        assert_eq!(ts.as_nanos(), 1_500_000_000);
        assert_eq!(ts.as_millis(), 1500);
        assert!((ts.as_secs_f64() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn timestamp_saturating_ops() {
        let ts = Timestamp::from_millis(10);
        assert_eq!(
            ts.saturating_add(Duration::from_millis(5)),
            Timestamp::from_millis(15)
        );
        assert_eq!(
            ts.saturating_sub(Duration::from_millis(20)),
            Timestamp::zero()
        );
    }

    #[test]
    fn timestamp_abs_diff_symmetric() {
        let a = Timestamp::from_millis(300);
        let b = Timestamp::from_millis(100);
        assert_eq!(a.abs_diff(b), Duration::from_millis(200));
        assert_eq!(b.abs_diff(a), Duration::from_millis(200));
    }

    #[test]
    fn duration_doubling_sequence() {
        // The backoff uses repeated doubling; make sure it saturates
        // rather than wrapping.
        let mut d = Duration::from_secs(1);
        for _ in 0..80 {
            d = d.saturating_mul(2);
        }
        assert_eq!(d.as_nanos(), u64::MAX);
    }

    #[test]
    fn duration_min() {
        let a = Duration::from_secs(4);
        let b = Duration::from_secs(30);
        assert_eq!(a.min(b), a);
        assert_eq!(b.min(a), a);
    }
}
