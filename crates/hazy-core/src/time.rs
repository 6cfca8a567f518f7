//! Monotonic millisecond timestamps.
//!
//! The engine never subtracts two timestamps directly. Every operation is
//! saturating, so a clock that stalls (or a packet that is already overdue)
//! can never produce a wrapped duration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Milliseconds on a monotonic clock with an arbitrary epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The clock epoch.
    pub const ZERO: Self = Self(0);

    /// Create a timestamp from milliseconds since the clock epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the clock epoch.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// `self + millis`, pinned at `u64::MAX`.
    #[must_use]
    pub const fn saturating_add_ms(self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Milliseconds elapsed from `earlier` to `self`, or zero if `earlier` is
    /// in the future.
    pub const fn saturating_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
