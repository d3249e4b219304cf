// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Run-scoped shared state: the simulated clock and the process table.
//!
//! One `SharedState` is allocated per run and handed to the dispatcher and
//! to each worker as an `Arc`. It is released exactly once at shutdown;
//! attaching afterwards fails.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use log::debug;

use crate::clock::SimClock;
use crate::pcb::ProcessTable;

#[derive(Debug)]
pub struct SharedState {
    clock: SimClock,
    table: ProcessTable,
    released: AtomicBool,
}

impl SharedState {
    /// Allocate a zeroed clock and a table with `capacity` slots.
    pub fn allocate(capacity: usize) -> Result<Arc<Self>> {
        if capacity == 0 {
            bail!("process table capacity must be at least 1");
        }
        Ok(Arc::new(SharedState {
            clock: SimClock::new(),
            table: ProcessTable::new(capacity),
            released: AtomicBool::new(false),
        }))
    }

    /// Obtain another handle to live shared state.
    pub fn attach(self: &Arc<Self>) -> Result<Arc<Self>> {
        if self.is_released() {
            bail!("shared state already released");
        }
        Ok(self.clone())
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Free every slot and zero the clock. Only the first call has any
    /// effect; returns whether this call performed the release.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        let live = self.table.release_all();
        self.clock.reset();
        debug!("Released shared state ({} slots were still occupied)", live);
        true
    }
}
