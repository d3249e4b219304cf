#![allow(dead_code)]

use std::collections::HashMap;
use std::thread;
use std::thread::JoinHandle;

use anyhow::anyhow;
use anyhow::Result;

use scx_ossim::*;

/// Install a test logger. Later calls in the same process are ignored.
pub fn setup_test() {
    let _ = simplelog::TestLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
    );
}

/// Default caps without the wall-clock cap, so runs always complete.
pub fn config(seed: u64) -> SimConfig {
    SimConfig {
        time_limit: None,
        seed,
        ..Default::default()
    }
}

/// Spawns the first `allowed` workers on threads, then fails.
pub struct FailingSpawner {
    allowed: usize,
    spawned: usize,
}

impl FailingSpawner {
    pub fn new(allowed: usize) -> Self {
        FailingSpawner {
            allowed,
            spawned: 0,
        }
    }
}

impl WorkerSpawner for FailingSpawner {
    fn spawn(&mut self, task: WorkerTask) -> Result<JoinHandle<Result<WorkerExit>>> {
        if self.spawned >= self.allowed {
            return Err(anyhow!("out of execution contexts"));
        }
        self.spawned += 1;
        ThreadSpawner.spawn(task)
    }
}

/// Workers that take their first dispatch and then never answer. They
/// exit once the run shuts down.
pub struct SilentSpawner;

impl WorkerSpawner for SilentSpawner {
    fn spawn(&mut self, task: WorkerTask) -> Result<JoinHandle<Result<WorkerExit>>> {
        Ok(thread::spawn(move || -> Result<WorkerExit> {
            let _ = task.mailbox.recv();
            task.shutdown.wait();
            Ok(WorkerExit::Interrupted)
        }))
    }
}

/// Workers that take their first dispatch and then fail without
/// answering.
pub struct FaultySpawner;

impl WorkerSpawner for FaultySpawner {
    fn spawn(&mut self, task: WorkerTask) -> Result<JoinHandle<Result<WorkerExit>>> {
        Ok(thread::spawn(move || -> Result<WorkerExit> {
            let _ = task.mailbox.recv();
            Err(anyhow!("worker {} lost its PCB", task.id()))
        }))
    }
}

/// Walk a trace and assert every scheduling invariant that can be checked
/// from the outside.
pub fn check_trace(trace: &Trace, cfg: &SimConfig) {
    let mut prev_time = SimTime::ZERO;
    let mut slot_owner: HashMap<usize, WorkerId> = HashMap::new();
    let mut prio_of: HashMap<WorkerId, Priority> = HashMap::new();
    let mut cpu_of: HashMap<WorkerId, SimTime> = HashMap::new();
    let mut created = 0;
    let mut terminated = 0;

    for ev in trace.events() {
        assert!(ev.time.subsec_nanos() < 1_000_000_000);
        assert!(ev.time >= prev_time, "clock went backwards at {:?}", ev);
        prev_time = ev.time;

        match &ev.kind {
            TraceKind::Admitted {
                worker,
                slot,
                priority,
            } => {
                assert!(*slot < cfg.max_concurrent);
                assert!(
                    slot_owner.insert(*slot, *worker).is_none(),
                    "slot {} reused while occupied",
                    slot
                );
                assert!(slot_owner.len() <= cfg.max_concurrent);
                prio_of.insert(*worker, *priority);
                created += 1;
            }
            TraceKind::Dispatched {
                worker,
                slot,
                priority,
                high_waiting,
            } => {
                assert_eq!(slot_owner.get(slot), Some(worker));
                assert_eq!(prio_of.get(worker), Some(priority), "priority changed");
                if *priority == Priority::Low {
                    assert_eq!(*high_waiting, 0, "low dispatched while high waiting");
                }
            }
            TraceKind::Responded {
                worker,
                burst_ns,
                quantum_ns,
                cpu_time,
                terminated: term,
                ..
            } => {
                let prio = prio_of[worker];
                assert_eq!(*quantum_ns, prio.quantum_ns(cfg.base_quantum_ns));
                assert!(burst_ns <= quantum_ns);
                let prev = cpu_of.get(worker).copied().unwrap_or(SimTime::ZERO);
                assert!(*cpu_time >= prev, "cpu time decreased for {}", worker);
                assert_eq!(cpu_time.as_nanos(), prev.as_nanos() + burst_ns);
                if *term {
                    assert!(
                        prev.as_nanos() >= cfg.termination_threshold_ns,
                        "worker {} terminated below threshold",
                        worker
                    );
                }
                cpu_of.insert(*worker, *cpu_time);
            }
            TraceKind::Retired { worker, slot, .. } => {
                assert_eq!(slot_owner.remove(slot), Some(*worker));
                terminated += 1;
                assert!(terminated <= created);
            }
            TraceKind::Requeued { worker, priority } => {
                assert_eq!(prio_of.get(worker), Some(priority));
            }
            TraceKind::Idle => {}
        }
    }
}
