// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Ready queues.
//!
//! Two bounded FIFOs, one per priority class. Entries are worker ids only;
//! the PCB stays in the process table. Across queues the order is strict:
//! the low queue is only looked at when the high queue is empty.

use std::collections::VecDeque;

use anyhow::bail;
use anyhow::Result;

use crate::pcb::Priority;
use crate::pcb::WorkerId;

/// Bounded FIFO of worker ids.
#[derive(Debug)]
pub struct ReadyQueue {
    entries: VecDeque<WorkerId>,
    capacity: usize,
}

impl ReadyQueue {
    pub fn new(capacity: usize) -> Self {
        ReadyQueue {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `worker` at the tail.
    ///
    /// The slot table bounds the number of live workers by the queue
    /// capacity, so a full queue means the caller lost track of a worker.
    pub fn enqueue(&mut self, worker: WorkerId) -> Result<()> {
        if self.is_full() {
            bail!(
                "ready queue overflow enqueueing worker {} (capacity {})",
                worker,
                self.capacity
            );
        }
        self.entries.push_back(worker);
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<WorkerId> {
        self.entries.pop_front()
    }

    pub fn front(&self) -> Option<WorkerId> {
        self.entries.front().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn contains(&self, worker: WorkerId) -> bool {
        self.entries.contains(&worker)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The high/low queue pair.
#[derive(Debug)]
pub struct ReadyQueues {
    high: ReadyQueue,
    low: ReadyQueue,
}

impl ReadyQueues {
    pub fn new(capacity: usize) -> Self {
        ReadyQueues {
            high: ReadyQueue::new(capacity),
            low: ReadyQueue::new(capacity),
        }
    }

    pub fn queue(&self, prio: Priority) -> &ReadyQueue {
        match prio {
            Priority::High => &self.high,
            Priority::Low => &self.low,
        }
    }

    pub fn enqueue(&mut self, prio: Priority, worker: WorkerId) -> Result<()> {
        match prio {
            Priority::High => self.high.enqueue(worker),
            Priority::Low => self.low.enqueue(worker),
        }
    }

    /// Pop the next worker to run: high queue first, then low.
    pub fn pop_next(&mut self) -> Option<(Priority, WorkerId)> {
        if let Some(worker) = self.high.dequeue() {
            return Some((Priority::High, worker));
        }
        self.low.dequeue().map(|worker| (Priority::Low, worker))
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.low.is_empty()
    }

    pub fn clear(&mut self) {
        self.high.clear();
        self.low.clear();
    }
}
