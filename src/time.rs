// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Simulated time as a (seconds, nanoseconds) pair.
//!
//! The nanosecond component is always kept below one second; every
//! constructor and every arithmetic helper carries overflow into the
//! seconds component.

use std::fmt;

use serde::Serialize;

pub const NSEC_PER_SEC: u64 = 1_000_000_000;

/// A point in (or span of) simulated time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SimTime {
    secs: u64,
    nanos: u32,
}

impl SimTime {
    pub const ZERO: SimTime = SimTime { secs: 0, nanos: 0 };

    /// Build a time value, normalizing `nanos` overflow into seconds.
    pub fn new(secs: u64, nanos: u64) -> Self {
        SimTime {
            secs: secs + nanos / NSEC_PER_SEC,
            nanos: (nanos % NSEC_PER_SEC) as u32,
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        SimTime { secs, nanos: 0 }
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self::new(0, nanos)
    }

    pub fn secs(&self) -> u64 {
        self.secs
    }

    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// Total nanoseconds, saturating at `u64::MAX`.
    pub fn as_nanos(&self) -> u64 {
        self.secs
            .saturating_mul(NSEC_PER_SEC)
            .saturating_add(self.nanos as u64)
    }

    /// Add `ns` nanoseconds in place.
    pub fn add_nanos(&mut self, ns: u64) {
        let total = self.nanos as u64 + ns;
        self.secs += total / NSEC_PER_SEC;
        self.nanos = (total % NSEC_PER_SEC) as u32;
    }

    /// Span from `earlier` to `self`, or zero if `earlier` is later.
    pub fn saturating_sub(self, earlier: SimTime) -> SimTime {
        if self <= earlier {
            return SimTime::ZERO;
        }
        if self.nanos >= earlier.nanos {
            SimTime {
                secs: self.secs - earlier.secs,
                nanos: self.nanos - earlier.nanos,
            }
        } else {
            SimTime {
                secs: self.secs - earlier.secs - 1,
                nanos: (NSEC_PER_SEC as u32) + self.nanos - earlier.nanos,
            }
        }
    }
}

impl std::ops::Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime::new(self.secs + rhs.secs, self.nanos as u64 + rhs.nanos as u64)
    }
}

impl std::ops::AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        *self = *self + rhs;
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:09}", self.secs, self.nanos)
    }
}
