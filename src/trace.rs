// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Scheduling event trace.
//!
//! Every admission, dispatch, response, requeue, retirement and idle tick
//! is recorded with the simulated time at which it happened.

use crate::pcb::Priority;
use crate::pcb::WorkerId;
use crate::time::SimTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub time: SimTime,
    pub kind: TraceKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceKind {
    Admitted {
        worker: WorkerId,
        slot: usize,
        priority: Priority,
    },
    /// `high_waiting` is the high queue length seen when the pick was made.
    Dispatched {
        worker: WorkerId,
        slot: usize,
        priority: Priority,
        high_waiting: usize,
    },
    Responded {
        worker: WorkerId,
        burst_ns: u64,
        quantum_ns: u64,
        /// Cumulative CPU time after this burst.
        cpu_time: SimTime,
        used_full_quantum: bool,
        terminated: bool,
    },
    Requeued {
        worker: WorkerId,
        priority: Priority,
    },
    Retired {
        worker: WorkerId,
        slot: usize,
        cpu_time: SimTime,
        time_in_system: SimTime,
    },
    Idle,
}

#[derive(Debug, Clone, Default)]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, time: SimTime, kind: TraceKind) {
        self.events.push(TraceEvent { time, kind });
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn dispatch_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Dispatched { .. }))
            .count()
    }

    /// Number of times `worker` was dispatched.
    pub fn dispatches_of(&self, worker: WorkerId) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Dispatched { worker: w, .. } if w == worker))
            .count()
    }

    pub fn idle_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Idle))
            .count()
    }

    /// Print the trace to stderr for debugging.
    pub fn dump(&self) {
        for event in &self.events {
            let desc = match &event.kind {
                TraceKind::Admitted {
                    worker,
                    slot,
                    priority,
                } => format!("ADMIT    w={} slot={} prio={}", worker, slot, priority),
                TraceKind::Dispatched {
                    worker,
                    slot,
                    priority,
                    high_waiting,
                } => format!(
                    "DISPATCH w={} slot={} prio={} high_waiting={}",
                    worker, slot, priority, high_waiting
                ),
                TraceKind::Responded {
                    worker,
                    burst_ns,
                    quantum_ns,
                    cpu_time,
                    used_full_quantum,
                    terminated,
                } => format!(
                    "RESPOND  w={} burst={}/{} cpu={} full={} term={}",
                    worker, burst_ns, quantum_ns, cpu_time, used_full_quantum, terminated
                ),
                TraceKind::Requeued { worker, priority } => {
                    format!("REQUEUE  w={} prio={}", worker, priority)
                }
                TraceKind::Retired {
                    worker,
                    slot,
                    cpu_time,
                    time_in_system,
                } => format!(
                    "RETIRE   w={} slot={} cpu={} sys={}",
                    worker, slot, cpu_time, time_in_system
                ),
                TraceKind::Idle => "IDLE".to_string(),
            };
            eprintln!("[{:>22}] {}", event.time.to_string(), desc);
        }
    }
}
