// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Runtime caps for one simulation run.

use std::time::Duration;

use anyhow::bail;
use anyhow::Result;

use crate::worker::WorkerPolicy;

pub const DFL_MAX_CONCURRENT: usize = 18;
pub const DFL_MAX_TOTAL: u32 = 100;
pub const DFL_TIME_LIMIT: Duration = Duration::from_secs(2);
pub const DFL_BASE_QUANTUM_NS: u64 = 10_000_000;
pub const DFL_ADMISSION_INTERVAL_MAX_SECS: u64 = 2;
pub const DFL_OVERHEAD_MAX_NS: u64 = 1_000;
/// 50ms of cumulative CPU time.
pub const DFL_TERMINATION_THRESHOLD_NS: u64 = 50_000_000;
pub const DFL_TERMINATION_PERCENT: u32 = 25;
pub const DFL_HIGH_PRIORITY_PERCENT: u32 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Slot capacity, also the bound of each ready queue.
    pub max_concurrent: usize,
    /// Admissions stop once this many workers have been created.
    pub max_total: u32,
    /// Real-time cap on the whole run. `None` runs to completion.
    pub time_limit: Option<Duration>,
    pub base_quantum_ns: u64,
    /// Next admission is `now.secs + uniform{0..=max}`.
    pub admission_interval_max_secs: u64,
    /// Per-tick dispatch overhead is uniform in `[0, max]`.
    pub overhead_max_ns: u64,
    pub termination_threshold_ns: u64,
    pub termination_percent: u32,
    /// Admission rolls in `[1, pct]` out of `[1, 100]` are high priority.
    pub high_priority_percent: u32,
    /// Seed for every RNG in the run.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            max_concurrent: DFL_MAX_CONCURRENT,
            max_total: DFL_MAX_TOTAL,
            time_limit: Some(DFL_TIME_LIMIT),
            base_quantum_ns: DFL_BASE_QUANTUM_NS,
            admission_interval_max_secs: DFL_ADMISSION_INTERVAL_MAX_SECS,
            overhead_max_ns: DFL_OVERHEAD_MAX_NS,
            termination_threshold_ns: DFL_TERMINATION_THRESHOLD_NS,
            termination_percent: DFL_TERMINATION_PERCENT,
            high_priority_percent: DFL_HIGH_PRIORITY_PERCENT,
            seed: 0,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            bail!("max concurrent workers must be at least 1");
        }
        if self.max_total == 0 {
            bail!("max total workers must be at least 1");
        }
        if self.base_quantum_ns < 2 {
            bail!(
                "base quantum must be at least 2ns, got {}ns",
                self.base_quantum_ns
            );
        }
        if self.termination_percent > 100 {
            bail!(
                "termination percent must be within 0..=100, got {}",
                self.termination_percent
            );
        }
        if self.high_priority_percent > 100 {
            bail!(
                "high priority percent must be within 0..=100, got {}",
                self.high_priority_percent
            );
        }
        if self.time_limit == Some(Duration::ZERO) {
            bail!("time limit must be positive (use None to disable it)");
        }
        Ok(())
    }

    pub fn worker_policy(&self) -> WorkerPolicy {
        WorkerPolicy {
            base_quantum_ns: self.base_quantum_ns,
            termination_threshold_ns: self.termination_threshold_ns,
            termination_percent: self.termination_percent,
        }
    }
}
