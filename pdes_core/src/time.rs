//! Simulated time.
//!
//! Time advances only through the executive's loop. It carries no wall-clock
//! meaning.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A point in simulated time.
///
/// Backed by `f64` and totally ordered via [`f64::total_cmp`], so it can key
/// a heap. NaN is never admitted by the scheduling API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(f64);

impl SimTime {
    /// The epoch of every simulation.
    pub const ZERO: SimTime = SimTime(0.0);

    /// Later than every finite time.
    pub const INFINITY: SimTime = SimTime(f64::INFINITY);

    /// Wraps a raw value.
    #[inline]
    pub const fn new(value: f64) -> Self {
        SimTime(value)
    }

    /// Returns the raw value.
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// `self + delta`.
    #[inline]
    pub fn offset(self, delta: f64) -> SimTime {
        SimTime(self.0 + delta)
    }

    /// Returns `true` unless the value is NaN.
    #[inline]
    pub fn is_valid(self) -> bool {
        !self.0.is_nan()
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: SimTime) -> bool {
        self < other
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for SimTime {
    fn from(value: f64) -> Self {
        SimTime(value)
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t={}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero() {
        assert_eq!(SimTime::ZERO.value(), 0.0);
    }

    #[test]
    fn test_ordering() {
        let t1 = SimTime::new(1.5);
        let t2 = SimTime::new(2.0);
        assert!(t1 < t2);
        assert!(t1.is_before(t2));
        assert!(!t2.is_before(t1));
        assert!(t2 < SimTime::INFINITY);
        assert!(SimTime::new(-3.0) < SimTime::ZERO);
    }

    #[test]
    fn test_min_with_infinity() {
        let t = SimTime::new(4.0);
        assert_eq!(SimTime::INFINITY.min(t), t);
    }

    #[test]
    fn test_offset() {
        let t = SimTime::new(10.0).offset(-2.5);
        assert_eq!(t, SimTime::new(7.5));
    }

    #[test]
    fn test_nan_invalid() {
        assert!(!SimTime::new(f64::NAN).is_valid());
        assert!(SimTime::new(f64::INFINITY).is_valid());
    }

    #[test]
    fn test_display() {
        assert_eq!(SimTime::new(42.0).to_string(), "t=42");
        assert_eq!(SimTime::new(0.5).to_string(), "t=0.5");
    }
}
