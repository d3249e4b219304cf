// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Process control blocks and the fixed-capacity slot table.
//!
//! Slot occupancy is a bit vector: a set bit means the slot is bound to a
//! live worker. Free slots are handed out lowest index first, which keeps
//! runs deterministic for a given seed.

use std::fmt;
use std::sync::Mutex;

use anyhow::bail;
use anyhow::Result;
use bitvec::prelude::*;
use serde::Serialize;

use crate::time::SimTime;

/// Worker identity. Assigned sequentially at admission, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling class, fixed at admission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Priority {
    High,
    #[default]
    Low,
}

impl Priority {
    /// Ready queue number used in log output (1 = high, 0 = low).
    pub fn queue_nr(self) -> u32 {
        match self {
            Priority::High => 1,
            Priority::Low => 0,
        }
    }

    /// Per-dispatch CPU ceiling for this class.
    pub fn quantum_ns(self, base_quantum_ns: u64) -> u64 {
        match self {
            Priority::High => base_quantum_ns / 2,
            Priority::Low => base_quantum_ns,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "High"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

/// Per-slot bookkeeping record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pcb {
    pub index: usize,
    pub worker: Option<WorkerId>,
    pub priority: Priority,
    /// Cumulative CPU time granted across all bursts.
    pub cpu_time_used: SimTime,
    pub time_in_system: SimTime,
    pub last_burst_ns: u64,
    pub terminated: bool,
    /// Simulated time of admission.
    pub admitted_at: SimTime,
}

impl Pcb {
    fn empty(index: usize) -> Self {
        Pcb {
            index,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct TableInner {
    pcbs: Vec<Pcb>,
    occupied: BitVec,
}

/// Fixed-capacity PCB array shared by the dispatcher and every worker.
#[derive(Debug)]
pub struct ProcessTable {
    inner: Mutex<TableInner>,
}

impl ProcessTable {
    pub fn new(capacity: usize) -> Self {
        ProcessTable {
            inner: Mutex::new(TableInner {
                pcbs: (0..capacity).map(Pcb::empty).collect(),
                occupied: bitvec![0; capacity],
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().pcbs.len()
    }

    /// Lowest free slot index.
    pub fn first_free(&self) -> Option<usize> {
        self.inner.lock().unwrap().occupied.first_zero()
    }

    pub fn has_room(&self) -> bool {
        self.first_free().is_some()
    }

    pub fn occupied_count(&self) -> usize {
        self.inner.lock().unwrap().occupied.count_ones()
    }

    pub fn occupied_slots(&self) -> Vec<usize> {
        self.inner.lock().unwrap().occupied.iter_ones().collect()
    }

    pub fn is_occupied(&self, slot: usize) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.occupied.get(slot).map_or(false, |bit| *bit)
    }

    /// Bind `slot` to a newly admitted worker with zeroed counters.
    pub fn occupy(
        &self,
        slot: usize,
        worker: WorkerId,
        priority: Priority,
        now: SimTime,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if slot >= inner.pcbs.len() {
            bail!("slot {} out of range (capacity {})", slot, inner.pcbs.len());
        }
        if inner.occupied[slot] {
            bail!(
                "slot {} already occupied by worker {:?}",
                slot,
                inner.pcbs[slot].worker
            );
        }
        inner.occupied.set(slot, true);
        inner.pcbs[slot] = Pcb {
            index: slot,
            worker: Some(worker),
            priority,
            admitted_at: now,
            ..Default::default()
        };
        Ok(())
    }

    /// Reclaim `slot`, returning the final PCB of its occupant.
    pub fn free(&self, slot: usize) -> Result<Pcb> {
        let mut inner = self.inner.lock().unwrap();
        if slot >= inner.pcbs.len() || !inner.occupied[slot] {
            bail!("slot {} is not occupied", slot);
        }
        inner.occupied.set(slot, false);
        Ok(std::mem::replace(&mut inner.pcbs[slot], Pcb::empty(slot)))
    }

    /// Snapshot of the PCB in `slot`.
    pub fn get(&self, slot: usize) -> Option<Pcb> {
        self.inner.lock().unwrap().pcbs.get(slot).cloned()
    }

    /// Run `f` against the PCB of an occupied slot.
    pub fn with_pcb_mut<R>(&self, slot: usize, f: impl FnOnce(&mut Pcb) -> R) -> Result<R> {
        let mut inner = self.inner.lock().unwrap();
        if slot >= inner.pcbs.len() || !inner.occupied[slot] {
            bail!("slot {} is not occupied", slot);
        }
        Ok(f(&mut inner.pcbs[slot]))
    }

    /// Reset every slot to free. Returns how many were still occupied.
    pub(crate) fn release_all(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let live = inner.occupied.count_ones();
        inner.occupied.fill(false);
        for (i, pcb) in inner.pcbs.iter_mut().enumerate() {
            *pcb = Pcb::empty(i);
        }
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_free_is_lowest_index() {
        let table = ProcessTable::new(4);
        assert_eq!(table.first_free(), Some(0));
        table.occupy(0, WorkerId(1), Priority::Low, SimTime::ZERO).unwrap();
        table.occupy(1, WorkerId(2), Priority::Low, SimTime::ZERO).unwrap();
        table.occupy(2, WorkerId(3), Priority::High, SimTime::ZERO).unwrap();
        assert_eq!(table.first_free(), Some(3));

        table.free(1).unwrap();
        assert_eq!(table.first_free(), Some(1));
        assert_eq!(table.occupied_slots(), vec![0, 2]);
    }

    #[test]
    fn test_full_table_has_no_room() {
        let table = ProcessTable::new(2);
        table.occupy(0, WorkerId(1), Priority::Low, SimTime::ZERO).unwrap();
        table.occupy(1, WorkerId(2), Priority::Low, SimTime::ZERO).unwrap();
        assert!(!table.has_room());
        assert_eq!(table.occupied_count(), 2);
    }

    #[test]
    fn test_double_occupy_rejected() {
        let table = ProcessTable::new(2);
        table.occupy(0, WorkerId(1), Priority::Low, SimTime::ZERO).unwrap();
        assert!(table.occupy(0, WorkerId(2), Priority::Low, SimTime::ZERO).is_err());
        assert_eq!(table.get(0).unwrap().worker, Some(WorkerId(1)));
    }

    #[test]
    fn test_free_resets_pcb() {
        let table = ProcessTable::new(2);
        let at = SimTime::new(3, 5);
        table.occupy(1, WorkerId(9), Priority::High, at).unwrap();
        table
            .with_pcb_mut(1, |pcb| {
                pcb.last_burst_ns = 42;
                pcb.cpu_time_used.add_nanos(42);
            })
            .unwrap();

        let done = table.free(1).unwrap();
        assert_eq!(done.worker, Some(WorkerId(9)));
        assert_eq!(done.admitted_at, at);
        assert_eq!(done.cpu_time_used.as_nanos(), 42);

        let reset = table.get(1).unwrap();
        assert_eq!(reset.index, 1);
        assert_eq!(reset.worker, None);
        assert!(table.free(1).is_err());
        assert!(table.with_pcb_mut(1, |_| ()).is_err());
    }

    #[test]
    fn test_release_all() {
        let table = ProcessTable::new(3);
        for slot in 0..3 {
            table
                .occupy(slot, WorkerId(slot as u32 + 1), Priority::Low, SimTime::ZERO)
                .unwrap();
        }
        assert_eq!(table.release_all(), 3);
        assert_eq!(table.occupied_count(), 0);
        assert_eq!(table.first_free(), Some(0));
    }

    #[test]
    fn test_quantum_by_priority() {
        assert_eq!(Priority::High.quantum_ns(4), 2);
        assert_eq!(Priority::Low.quantum_ns(4), 4);
    }
}
