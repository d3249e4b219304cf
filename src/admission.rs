// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Admission control: when a new worker may be created, which slot it
//! gets and which priority class it lands in.

use anyhow::Result;
use log::debug;
use rand::Rng;

use crate::config::SimConfig;
use crate::pcb::Priority;
use crate::pcb::ProcessTable;
use crate::pcb::WorkerId;
use crate::time::SimTime;

/// Map an admission roll in `[1, 100]` to a priority class. Rolls in
/// `[1, high_pct]` are high priority.
pub fn priority_for_roll(roll: u32, high_pct: u32) -> Priority {
    if (1..=high_pct).contains(&roll) {
        Priority::High
    } else {
        Priority::Low
    }
}

/// A worker that has been given a slot and an initialized PCB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub worker: WorkerId,
    pub slot: usize,
    pub priority: Priority,
}

#[derive(Debug)]
pub struct AdmissionController {
    next_admission_secs: u64,
    total_created: u32,
    max_total: u32,
    interval_max_secs: u64,
    high_priority_percent: u32,
    next_id: u32,
}

impl AdmissionController {
    pub fn new(cfg: &SimConfig) -> Self {
        AdmissionController {
            next_admission_secs: 0,
            total_created: 0,
            max_total: cfg.max_total,
            interval_max_secs: cfg.admission_interval_max_secs,
            high_priority_percent: cfg.high_priority_percent,
            next_id: 1,
        }
    }

    pub fn total_created(&self) -> u32 {
        self.total_created
    }

    pub fn next_admission_secs(&self) -> u64 {
        self.next_admission_secs
    }

    /// The creation limit has been reached; no more admissions.
    pub fn exhausted(&self) -> bool {
        self.total_created >= self.max_total
    }

    /// Undo the creation count of an admission whose worker never
    /// started. The id is not reused.
    pub fn abandon(&mut self) {
        self.total_created = self.total_created.saturating_sub(1);
    }

    pub fn is_due(&self, now: SimTime) -> bool {
        now.secs() >= self.next_admission_secs
    }

    /// Admit a worker if one is due and a slot is free.
    ///
    /// On admission the lowest free slot is bound to a fresh worker id,
    /// its PCB is zeroed with the rolled priority and the next admission
    /// time is redrawn.
    pub fn try_admit<R: Rng>(
        &mut self,
        now: SimTime,
        table: &ProcessTable,
        rng: &mut R,
    ) -> Result<Option<Admission>> {
        if self.exhausted() || !self.is_due(now) {
            return Ok(None);
        }
        let slot = match table.first_free() {
            Some(slot) => slot,
            None => return Ok(None),
        };

        let roll = rng.random_range(1..=100);
        let priority = priority_for_roll(roll, self.high_priority_percent);
        let worker = WorkerId(self.next_id);
        table.occupy(slot, worker, priority, now)?;

        self.next_id += 1;
        self.total_created += 1;
        self.next_admission_secs = now.secs() + rng.random_range(0..=self.interval_max_secs);
        debug!(
            "admitted worker {} into slot {} (roll {}), next admission at {}s",
            worker, slot, roll, self.next_admission_secs
        );

        Ok(Some(Admission {
            worker,
            slot,
            priority,
        }))
    }
}
