// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! The scheduling loop.
//!
//! Each tick admits at most one new worker, picks the next worker by
//! strict priority, hands it the CPU and blocks until it answers. The
//! clock advances by the granted burst plus a small random dispatch
//! overhead. Only one worker runs at a time: the dispatcher does nothing
//! else while waiting for a response.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use crossbeam::channel::Receiver;
use crossbeam::select;
use log::debug;
use log::error;
use log::info;
use log::warn;
use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;

use crate::admission::AdmissionController;
use crate::config::SimConfig;
use crate::message::response_channel;
use crate::message::Mailbox;
use crate::message::Response;
use crate::pcb::Priority;
use crate::pcb::WorkerId;
use crate::queue::ReadyQueues;
use crate::shared::SharedState;
use crate::shutdown::Shutdown;
use crate::shutdown::ShutdownReason;
use crate::stats::RunReport;
use crate::stats::RunStats;
use crate::time::SimTime;
use crate::trace::Trace;
use crate::trace::TraceKind;
use crate::worker::ThreadSpawner;
use crate::worker::Worker;
use crate::worker::WorkerExit;
use crate::worker::WorkerSpawner;
use crate::worker::WorkerTask;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Dispatched { worker: WorkerId, terminated: bool },
    Idle,
    /// Shutdown was requested before or during the tick.
    Interrupted,
}

struct WorkerHandle {
    slot: usize,
    quantum_ns: u64,
    mailbox: Mailbox,
    responses: Receiver<Response>,
    join: Option<JoinHandle<Result<WorkerExit>>>,
}

/// Derive a per-worker RNG seed from the run seed.
fn worker_seed(seed: u64, worker: WorkerId) -> u64 {
    seed ^ (worker.0 as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

fn reap(worker: WorkerId, join: JoinHandle<Result<WorkerExit>>) -> Option<WorkerExit> {
    match join.join() {
        Ok(Ok(exit)) => Some(exit),
        Ok(Err(e)) => {
            warn!("Worker {} failed: {:#}", worker, e);
            None
        }
        Err(_) => {
            warn!("Worker {} panicked", worker);
            None
        }
    }
}

pub struct Dispatcher {
    cfg: SimConfig,
    shared: Arc<SharedState>,
    queues: ReadyQueues,
    admission: AdmissionController,
    workers: BTreeMap<WorkerId, WorkerHandle>,
    shutdown: Shutdown,
    spawner: Box<dyn WorkerSpawner>,
    rng: SmallRng,
    stats: RunStats,
    trace: Trace,
    report: Option<RunReport>,
}

impl Dispatcher {
    pub fn new(cfg: SimConfig, shutdown: Shutdown) -> Result<Self> {
        Self::with_spawner(cfg, shutdown, Box::new(ThreadSpawner))
    }

    /// Set up a run: validate `cfg` and allocate the shared state.
    pub fn with_spawner(
        cfg: SimConfig,
        shutdown: Shutdown,
        spawner: Box<dyn WorkerSpawner>,
    ) -> Result<Self> {
        cfg.validate().context("Invalid configuration")?;
        let shared = SharedState::allocate(cfg.max_concurrent)
            .context("Failed to allocate shared state")?;

        Ok(Dispatcher {
            queues: ReadyQueues::new(cfg.max_concurrent),
            admission: AdmissionController::new(&cfg),
            rng: SmallRng::seed_from_u64(cfg.seed),
            cfg,
            shared,
            workers: BTreeMap::new(),
            shutdown,
            spawner,
            stats: RunStats::default(),
            trace: Trace::new(),
            report: None,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn queues(&self) -> &ReadyQueues {
        &self.queues
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn now(&self) -> SimTime {
        self.shared.clock().now()
    }

    /// Number of admitted workers that have not terminated yet.
    pub fn live_workers(&self) -> usize {
        self.workers.len()
    }

    /// Creation limit reached and every admitted worker has terminated.
    pub fn is_done(&self) -> bool {
        self.admission.exhausted() && self.queues.is_empty()
    }

    fn admit(&mut self) -> Result<()> {
        let now = self.now();
        let adm = match self
            .admission
            .try_admit(now, self.shared.table(), &mut self.rng)?
        {
            Some(adm) => adm,
            None => return Ok(()),
        };

        let worker = Worker::attach(
            adm.worker,
            adm.slot,
            &self.shared,
            self.cfg.worker_policy(),
            worker_seed(self.cfg.seed, adm.worker),
        )?;
        let quantum_ns = worker.quantum_ns();
        let (mailbox, mailbox_rx) = Mailbox::new(adm.worker);
        let (responses_tx, responses) = response_channel();
        let task = WorkerTask {
            worker,
            mailbox: mailbox_rx,
            responses: responses_tx,
            shared: self.shared.attach()?,
            shutdown: self.shutdown.clone(),
        };

        let join = match self.spawner.spawn(task) {
            Ok(join) => join,
            Err(e) => {
                error!("Failed to spawn worker {}: {:#}", adm.worker, e);
                if let Err(free_err) = self.shared.table().free(adm.slot) {
                    warn!("Failed to free slot {}: {:#}", adm.slot, free_err);
                }
                self.admission.abandon();
                self.shutdown.trigger(ShutdownReason::SpawnFailed);
                return Err(e.context(format!("Failed to spawn worker {}", adm.worker)));
            }
        };
        self.workers.insert(
            adm.worker,
            WorkerHandle {
                slot: adm.slot,
                quantum_ns,
                mailbox,
                responses,
                join: Some(join),
            },
        );
        self.queues.enqueue(adm.priority, adm.worker)?;

        self.stats.on_admit(adm.priority);
        self.trace.record(
            now,
            TraceKind::Admitted {
                worker: adm.worker,
                slot: adm.slot,
                priority: adm.priority,
            },
        );
        info!(
            "Generating worker {} ({} priority) in slot {} and putting it in queue {} at time {}",
            adm.worker,
            adm.priority,
            adm.slot,
            adm.priority.queue_nr(),
            now
        );
        Ok(())
    }

    fn idle(&mut self) {
        let now = self.now();
        if !self.admission.exhausted() && !self.admission.is_due(now) {
            self.shared
                .clock()
                .advance_to(SimTime::from_secs(self.admission.next_admission_secs()));
        }
        self.stats.idle_ticks += 1;
        self.trace.record(now, TraceKind::Idle);
        debug!("No worker ready at time {}, CPU idle", now);
    }

    /// Hand the CPU to `worker` and wait for its response. Returns `None`
    /// if shutdown was requested while waiting.
    fn dispatch(
        &mut self,
        prio: Priority,
        worker: WorkerId,
        high_waiting: usize,
    ) -> Result<Option<TickOutcome>> {
        let (slot, quantum_ns, responses) = {
            let handle = self
                .workers
                .get(&worker)
                .with_context(|| format!("worker {} was queued but is unknown", worker))?;
            handle.mailbox.send()?;
            (handle.slot, handle.quantum_ns, handle.responses.clone())
        };
        let now = self.now();
        self.trace.record(
            now,
            TraceKind::Dispatched {
                worker,
                slot,
                priority: prio,
                high_waiting,
            },
        );
        debug!(
            "Dispatching worker {} from queue {} at time {}",
            worker,
            prio.queue_nr(),
            now
        );

        let stop = self.shutdown.receiver();
        let resp = select! {
            recv(responses) -> msg => msg.with_context(|| {
                format!("worker {} exited without responding", worker)
            })?,
            recv(stop) -> _ => return Ok(None),
        };
        if resp.worker != worker || resp.slot != slot {
            bail!(
                "expected response from worker {} in slot {}, got {:?}",
                worker,
                slot,
                resp
            );
        }

        let pcb = self
            .shared
            .table()
            .get(slot)
            .with_context(|| format!("slot {} vanished", slot))?;
        let now = self.shared.clock().advance_ns(pcb.last_burst_ns);
        self.stats.on_dispatch(prio, resp.used_full_quantum);
        self.trace.record(
            now,
            TraceKind::Responded {
                worker,
                burst_ns: pcb.last_burst_ns,
                quantum_ns,
                cpu_time: pcb.cpu_time_used,
                used_full_quantum: resp.used_full_quantum,
                terminated: resp.terminated,
            },
        );
        debug!(
            "Worker {} ran {}ns of {}ns{}",
            worker,
            pcb.last_burst_ns,
            quantum_ns,
            if resp.terminated { " and terminated" } else { "" }
        );

        if resp.terminated {
            let pcb = self.shared.table().free(slot)?;
            if let Some(mut handle) = self.workers.remove(&worker) {
                if let Some(join) = handle.join.take() {
                    reap(worker, join);
                }
            }
            self.stats.on_retire(&pcb);
            self.trace.record(
                now,
                TraceKind::Retired {
                    worker,
                    slot,
                    cpu_time: pcb.cpu_time_used,
                    time_in_system: pcb.time_in_system,
                },
            );
            info!(
                "Worker {} terminated at time {}: slot {} freed, cpu {} in system {}",
                worker, now, slot, pcb.cpu_time_used, pcb.time_in_system
            );
        } else {
            self.queues.enqueue(prio, worker)?;
            self.trace
                .record(now, TraceKind::Requeued { worker, priority: prio });
        }

        Ok(Some(TickOutcome::Dispatched {
            worker,
            terminated: resp.terminated,
        }))
    }

    /// Run one scheduling tick.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.shutdown.is_triggered() {
            return Ok(TickOutcome::Interrupted);
        }
        self.admit()?;

        let high_waiting = self.queues.queue(Priority::High).len();
        let outcome = match self.queues.pop_next() {
            Some((prio, worker)) => match self.dispatch(prio, worker, high_waiting)? {
                Some(outcome) => outcome,
                None => return Ok(TickOutcome::Interrupted),
            },
            None => {
                self.idle();
                TickOutcome::Idle
            }
        };

        let overhead = self.rng.random_range(0..=self.cfg.overhead_max_ns);
        self.shared.clock().advance_ns(overhead);
        Ok(outcome)
    }

    fn run_loop(&mut self) -> Result<()> {
        while !self.is_done() {
            if self.tick()? == TickOutcome::Interrupted {
                return Ok(());
            }
        }
        self.shutdown.trigger(ShutdownReason::Completed);
        Ok(())
    }

    /// Run until every admission has completed, the wall-clock cap fires
    /// or shutdown is requested, then clean up.
    pub fn run(&mut self) -> Result<RunReport> {
        info!(
            "Starting run: {} slots, {} workers total, base quantum {}ns, seed {}",
            self.cfg.max_concurrent, self.cfg.max_total, self.cfg.base_quantum_ns, self.cfg.seed
        );
        let alarm = match self.cfg.time_limit {
            Some(cap) => Some(self.shutdown.arm_alarm(cap)?),
            None => None,
        };

        let res = self.run_loop();
        if let Err(e) = &res {
            if self.shutdown.trigger(ShutdownReason::Error) {
                error!("Run aborted: {:#}", e);
            }
        }
        let report = self.cleanup();
        if let Some(alarm) = alarm {
            let _ = alarm.join();
        }
        res.map(|_| report)
    }

    /// Stop every remaining worker, release the shared state and flush
    /// the log. Safe to call any number of times; later calls return the
    /// report produced by the first.
    pub fn cleanup(&mut self) -> RunReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        let fallback = if self.is_done() {
            ShutdownReason::Completed
        } else {
            ShutdownReason::Interrupted
        };
        self.shutdown.trigger(fallback);
        let outcome = self.shutdown.reason().unwrap_or(fallback);
        let final_clock = self.now();

        let remaining = std::mem::take(&mut self.workers);
        let killed_workers = remaining.len();
        if killed_workers > 0 {
            info!("Stopping {} remaining workers", killed_workers);
        }
        for (worker, mut handle) in remaining {
            if let Some(join) = handle.join.take() {
                if let Some(exit) = reap(worker, join) {
                    debug!("Worker {} in slot {} exited: {:?}", worker, handle.slot, exit);
                }
            }
        }
        self.queues.clear();
        self.shared.release();

        let report = RunReport {
            outcome,
            seed: self.cfg.seed,
            final_clock,
            stats: self.stats.clone(),
            killed_workers,
        };
        report.log_summary();
        log::logger().flush();
        self.report = Some(report.clone());
        report
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.cleanup();
    }
}
