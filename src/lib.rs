// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! scx_ossim - simulation of a single-CPU, two-level priority scheduler.
//!
//! A dispatcher admits synthetic workers over simulated time, keeps them in
//! high/low ready queues and hands the CPU to one worker at a time for at
//! most one quantum. Each worker runs on its own thread and talks to the
//! dispatcher through a synchronous dispatch/response rendezvous, so only
//! one of them ever consumes "CPU time".
//!
//! # Architecture
//!
//! - **Clock / table**: run-scoped [`SharedState`] holding the simulated
//!   clock and the PCB slot table
//! - **Admission**: decides when a worker is created, its slot and class
//! - **Ready queues**: bounded FIFOs drained in strict priority order
//! - **Dispatcher**: the scheduling loop and shutdown/cleanup
//! - **Worker**: burst length and termination decisions
//!
//! # Usage
//!
//! ```rust,no_run
//! use scx_ossim::*;
//!
//! let cfg = SimConfig {
//!     seed: 42,
//!     ..Default::default()
//! };
//! let mut dispatcher = Dispatcher::new(cfg, Shutdown::new()).unwrap();
//! let report = dispatcher.run().unwrap();
//! report.log_summary();
//! ```

pub mod admission;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod logsink;
pub mod message;
pub mod pcb;
pub mod queue;
pub mod shared;
pub mod shutdown;
pub mod stats;
pub mod time;
pub mod trace;
pub mod worker;

pub use admission::{priority_for_roll, Admission, AdmissionController};
pub use clock::SimClock;
pub use config::SimConfig;
pub use dispatcher::{Dispatcher, TickOutcome};
pub use logsink::LineCappedWriter;
pub use message::{Dispatch, Mailbox, Response};
pub use pcb::{Pcb, Priority, ProcessTable, WorkerId};
pub use queue::{ReadyQueue, ReadyQueues};
pub use shared::SharedState;
pub use shutdown::{Shutdown, ShutdownReason};
pub use stats::{ClassStats, RunReport, RunStats};
pub use time::{SimTime, NSEC_PER_SEC};
pub use trace::{Trace, TraceEvent, TraceKind};
pub use worker::{
    ThreadSpawner, Worker, WorkerExit, WorkerPolicy, WorkerSpawner, WorkerState, WorkerTask,
};
