// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Shared simulated clock.
//!
//! Only the dispatcher advances the clock. Workers read it to snapshot
//! their admission time and to compute their time in system.

use std::sync::RwLock;

use crate::time::SimTime;

#[derive(Debug, Default)]
pub struct SimClock {
    now: RwLock<SimTime>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> SimTime {
        *self.now.read().unwrap()
    }

    /// Advance by `ns` nanoseconds and return the new time.
    pub fn advance_ns(&self, ns: u64) -> SimTime {
        let mut now = self.now.write().unwrap();
        now.add_nanos(ns);
        *now
    }

    /// Move the clock forward to `t`. Never moves it backwards.
    pub fn advance_to(&self, t: SimTime) -> SimTime {
        let mut now = self.now.write().unwrap();
        if t > *now {
            *now = t;
        }
        *now
    }

    pub(crate) fn reset(&self) {
        *self.now.write().unwrap() = SimTime::ZERO;
    }
}
