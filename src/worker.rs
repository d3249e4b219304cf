// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Worker state machine.
//!
//! A worker waits on its mailbox until dispatched, consumes part or all of
//! its quantum, decides whether to terminate and reports back. Only one
//! worker is ever running, so while running it is the sole writer of its
//! PCB's burst fields.
//!
//! ```text
//!   AwaitingDispatch --dispatch--> Running --+--> AwaitingDispatch
//!                                            +--> Terminated
//! ```

use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use crossbeam::channel::Receiver;
use crossbeam::channel::Sender;
use crossbeam::select;
use log::trace;
use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;

use crate::message::Dispatch;
use crate::message::Response;
use crate::pcb::Priority;
use crate::pcb::WorkerId;
use crate::shared::SharedState;
use crate::shutdown::Shutdown;
use crate::time::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    AwaitingDispatch,
    Running,
    Terminated,
}

/// How a worker thread ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Decided to terminate and reported it.
    Terminated,
    /// Cancelled while waiting, or its dispatcher went away.
    Interrupted,
}

/// Burst length and termination rules shared by every worker of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPolicy {
    pub base_quantum_ns: u64,
    /// Cumulative CPU time a worker needs before it may terminate.
    pub termination_threshold_ns: u64,
    /// Chance, in percent, of terminating on an eligible dispatch.
    pub termination_percent: u32,
}

impl WorkerPolicy {
    pub fn quantum_ns(&self, prio: Priority) -> u64 {
        prio.quantum_ns(self.base_quantum_ns)
    }

    pub fn eligible(&self, cpu_time_used: SimTime) -> bool {
        cpu_time_used.as_nanos() >= self.termination_threshold_ns
    }

    /// Decide whether this dispatch is the last one. Draws from `rng` only
    /// when the worker is eligible.
    pub fn roll_termination<R: Rng>(&self, cpu_time_used: SimTime, rng: &mut R) -> bool {
        if !self.eligible(cpu_time_used) {
            return false;
        }
        rng.random_range(0..100) < self.termination_percent
    }

    /// Either the whole quantum or a uniform share of it, on a coin flip.
    pub fn roll_burst<R: Rng>(&self, quantum_ns: u64, rng: &mut R) -> u64 {
        if rng.random_bool(0.5) {
            quantum_ns
        } else {
            rng.random_range(0..=quantum_ns)
        }
    }
}

/// Per-worker state, bound to one slot for its whole life.
#[derive(Debug)]
pub struct Worker {
    id: WorkerId,
    slot: usize,
    priority: Priority,
    quantum_ns: u64,
    admitted_at: SimTime,
    policy: WorkerPolicy,
    rng: SmallRng,
    state: WorkerState,
}

impl Worker {
    /// Attach to the shared state for `slot`. The PCB must already be
    /// initialized for `id`; priority is read from it once.
    pub fn attach(
        id: WorkerId,
        slot: usize,
        shared: &SharedState,
        policy: WorkerPolicy,
        seed: u64,
    ) -> Result<Self> {
        let pcb = shared
            .table()
            .get(slot)
            .with_context(|| format!("slot {} does not exist", slot))?;
        if pcb.worker != Some(id) {
            bail!(
                "slot {} belongs to {:?}, not worker {}",
                slot,
                pcb.worker,
                id
            );
        }

        Ok(Worker {
            id,
            slot,
            priority: pcb.priority,
            quantum_ns: policy.quantum_ns(pcb.priority),
            admitted_at: shared.clock().now(),
            policy,
            rng: SmallRng::seed_from_u64(seed),
            state: WorkerState::AwaitingDispatch,
        })
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn quantum_ns(&self) -> u64 {
        self.quantum_ns
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Handle one dispatch: pick a burst, account it in the PCB and build
    /// the response.
    pub fn run_burst(&mut self, shared: &SharedState) -> Result<Response> {
        if self.state != WorkerState::AwaitingDispatch {
            bail!("worker {} dispatched while {:?}", self.id, self.state);
        }
        self.state = WorkerState::Running;

        let table = shared.table();
        let cpu_before = table.with_pcb_mut(self.slot, |pcb| pcb.cpu_time_used)?;
        let terminating = self.policy.roll_termination(cpu_before, &mut self.rng);
        let burst_ns = self.policy.roll_burst(self.quantum_ns, &mut self.rng);
        let now = shared.clock().now();
        let admitted_at = self.admitted_at;

        table.with_pcb_mut(self.slot, |pcb| {
            pcb.last_burst_ns = burst_ns;
            pcb.cpu_time_used.add_nanos(burst_ns);
            if terminating {
                pcb.time_in_system = now.saturating_sub(admitted_at);
                pcb.terminated = true;
            }
        })?;

        trace!(
            "worker {} slot {}: burst {}/{}ns cpu {} -> {}{}",
            self.id,
            self.slot,
            burst_ns,
            self.quantum_ns,
            cpu_before,
            SimTime::from_nanos(cpu_before.as_nanos() + burst_ns),
            if terminating { " (terminating)" } else { "" }
        );

        self.state = if terminating {
            WorkerState::Terminated
        } else {
            WorkerState::AwaitingDispatch
        };

        Ok(Response {
            worker: self.id,
            slot: self.slot,
            used_full_quantum: burst_ns == self.quantum_ns,
            terminated: terminating,
        })
    }
}

/// Everything a worker needs to run on its own thread.
pub struct WorkerTask {
    pub worker: Worker,
    pub mailbox: Receiver<Dispatch>,
    pub responses: Sender<Response>,
    pub shared: Arc<SharedState>,
    pub shutdown: Shutdown,
}

impl WorkerTask {
    pub fn id(&self) -> WorkerId {
        self.worker.id()
    }

    /// Serve dispatches until the worker terminates or the run is
    /// cancelled. Waiting on the mailbox is the only suspension point.
    pub fn run(self) -> Result<WorkerExit> {
        let WorkerTask {
            mut worker,
            mailbox,
            responses,
            shared,
            shutdown,
        } = self;
        let stop = shutdown.receiver();

        loop {
            let dispatch = select! {
                recv(mailbox) -> msg => match msg {
                    Ok(dispatch) => dispatch,
                    Err(_) => return Ok(WorkerExit::Interrupted),
                },
                recv(stop) -> _ => return Ok(WorkerExit::Interrupted),
            };
            if dispatch.worker != worker.id() {
                bail!(
                    "worker {} received dispatch for worker {}",
                    worker.id(),
                    dispatch.worker
                );
            }

            let resp = worker.run_burst(&shared)?;
            if responses.send(resp).is_err() {
                return Ok(WorkerExit::Interrupted);
            }
            if resp.terminated {
                return Ok(WorkerExit::Terminated);
            }
        }
    }
}

/// Creates the execution context for a worker.
pub trait WorkerSpawner: Send {
    fn spawn(&mut self, task: WorkerTask) -> Result<JoinHandle<Result<WorkerExit>>>;
}

/// Runs each worker on a dedicated OS thread.
#[derive(Debug, Default)]
pub struct ThreadSpawner;

impl WorkerSpawner for ThreadSpawner {
    fn spawn(&mut self, task: WorkerTask) -> Result<JoinHandle<Result<WorkerExit>>> {
        let id = task.id();
        thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || task.run())
            .with_context(|| format!("Failed to spawn thread for worker {}", id))
    }
}
