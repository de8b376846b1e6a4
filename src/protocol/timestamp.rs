//! Logical tick timestamps

use std::cmp::Ordering;
use std::fmt;

/// A tick counter carried on the wire as an `i16`.
///
/// Wraps modulo 2^16. Two timestamps are compared by the sign of their
/// wrapping difference, so ordering is only meaningful for timestamps less
/// than half the range apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Timestamp(i16);

impl Timestamp {
    pub const fn new(raw: i16) -> Self {
        Self(raw)
    }

    /// Truncate a monotonically increasing tick count to its wire timestamp.
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks as u16 as i16)
    }

    pub const fn raw(self) -> i16 {
        self.0
    }

    /// The following tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Signed distance from `earlier` to `self` in ticks.
    pub const fn ticks_since(self, earlier: Self) -> i16 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Wrap-aware ordering.
    pub fn compare(self, other: Self) -> Ordering {
        self.ticks_since(other).cmp(&0)
    }

    /// Strictly later than `other`.
    pub fn is_after(self, other: Self) -> bool {
        self.ticks_since(other) > 0
    }

    pub fn is_at_or_before(self, other: Self) -> bool {
        !self.is_after(other)
    }
}

impl From<i16> for Timestamp {
    fn from(raw: i16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}
