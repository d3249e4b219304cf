// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Run accounting and the end-of-run report.

use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use log::info;
use serde::Serialize;

use crate::pcb::Pcb;
use crate::pcb::Priority;
use crate::shutdown::ShutdownReason;
use crate::time::SimTime;

/// Counters for one priority class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassStats {
    pub admitted: u32,
    pub terminated: u32,
    pub dispatches: u64,
    pub full_quantum_bursts: u64,
    /// CPU time of terminated workers.
    pub cpu_time: SimTime,
    /// Time in system of terminated workers.
    pub time_in_system: SimTime,
}

impl ClassStats {
    fn avg_ns(total: SimTime, n: u32) -> u64 {
        if n == 0 {
            0
        } else {
            total.as_nanos() / n as u64
        }
    }

    pub fn avg_cpu_time_ns(&self) -> u64 {
        Self::avg_ns(self.cpu_time, self.terminated)
    }

    pub fn avg_time_in_system_ns(&self) -> u64 {
        Self::avg_ns(self.time_in_system, self.terminated)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub high: ClassStats,
    pub low: ClassStats,
    pub idle_ticks: u64,
}

impl RunStats {
    pub fn class(&self, prio: Priority) -> &ClassStats {
        match prio {
            Priority::High => &self.high,
            Priority::Low => &self.low,
        }
    }

    fn class_mut(&mut self, prio: Priority) -> &mut ClassStats {
        match prio {
            Priority::High => &mut self.high,
            Priority::Low => &mut self.low,
        }
    }

    pub fn total_created(&self) -> u32 {
        self.high.admitted + self.low.admitted
    }

    pub fn total_terminated(&self) -> u32 {
        self.high.terminated + self.low.terminated
    }

    pub fn total_dispatches(&self) -> u64 {
        self.high.dispatches + self.low.dispatches
    }

    pub(crate) fn on_admit(&mut self, prio: Priority) {
        self.class_mut(prio).admitted += 1;
    }

    pub(crate) fn on_dispatch(&mut self, prio: Priority, used_full_quantum: bool) {
        let class = self.class_mut(prio);
        class.dispatches += 1;
        if used_full_quantum {
            class.full_quantum_bursts += 1;
        }
    }

    pub(crate) fn on_retire(&mut self, pcb: &Pcb) {
        let class = self.class_mut(pcb.priority);
        class.terminated += 1;
        class.cpu_time += pcb.cpu_time_used;
        class.time_in_system += pcb.time_in_system;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub outcome: ShutdownReason,
    pub seed: u64,
    pub final_clock: SimTime,
    pub stats: RunStats,
    /// Workers still alive when shutdown began.
    pub killed_workers: usize,
}

impl RunReport {
    pub fn log_summary(&self) {
        info!(
            "Run finished ({:?}) at simulated time {} seed={}",
            self.outcome, self.final_clock, self.seed
        );
        info!(
            "  created={} terminated={} killed={} dispatches={} idle_ticks={}",
            self.stats.total_created(),
            self.stats.total_terminated(),
            self.killed_workers,
            self.stats.total_dispatches(),
            self.stats.idle_ticks
        );
        for prio in [Priority::High, Priority::Low] {
            let c = self.stats.class(prio);
            info!(
                "  {:<4} admitted={:<3} terminated={:<3} dispatches={:<5} full={:<5} avg_cpu={}ns avg_sys={}ns",
                prio.to_string(),
                c.admitted,
                c.terminated,
                c.dispatches,
                c.full_quantum_bursts,
                c.avg_cpu_time_ns(),
                c.avg_time_in_system_ns()
            );
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, self).context("Failed to serialize run report")?;
        writeln!(w)?;
        w.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcb::WorkerId;

    #[test]
    fn test_retire_accumulates_per_class() {
        let mut stats = RunStats::default();
        stats.on_admit(Priority::High);
        stats.on_admit(Priority::Low);
        stats.on_admit(Priority::Low);
        stats.on_dispatch(Priority::Low, true);
        stats.on_dispatch(Priority::Low, false);

        let pcb = Pcb {
            worker: Some(WorkerId(2)),
            priority: Priority::Low,
            cpu_time_used: SimTime::from_nanos(300),
            time_in_system: SimTime::new(1, 0),
            ..Default::default()
        };
        stats.on_retire(&pcb);
        stats.on_retire(&Pcb {
            cpu_time_used: SimTime::from_nanos(100),
            ..pcb.clone()
        });

        assert_eq!(stats.total_created(), 3);
        assert_eq!(stats.total_terminated(), 2);
        assert_eq!(stats.low.full_quantum_bursts, 1);
        assert_eq!(stats.low.avg_cpu_time_ns(), 200);
        assert_eq!(stats.low.avg_time_in_system_ns(), 1_000_000_000);
        assert_eq!(stats.high.avg_cpu_time_ns(), 0);
    }

    #[test]
    fn test_report_json() {
        let report = RunReport {
            outcome: ShutdownReason::Completed,
            seed: 7,
            final_clock: SimTime::new(3, 4),
            stats: RunStats::default(),
            killed_workers: 0,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.write_json(&path).unwrap();

        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["outcome"], "Completed");
        assert_eq!(v["seed"], 7);
        assert_eq!(v["final_clock"]["secs"], 3);
        assert_eq!(v["final_clock"]["nanos"], 4);
    }
}
