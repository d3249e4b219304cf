// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use log::info;
use simplelog::CombinedLogger;
use simplelog::SharedLogger;

use scx_ossim::Dispatcher;
use scx_ossim::LineCappedWriter;
use scx_ossim::Shutdown;
use scx_ossim::ShutdownReason;
use scx_ossim::SimConfig;

/// scx_ossim: simulated single-CPU priority scheduler
///
/// A master dispatcher admits synthetic workers over simulated time and
/// schedules them on one simulated CPU. Workers are admitted at random
/// intervals into the lowest free slot of a fixed-size process table and
/// placed in either the high or the low priority ready queue. The high
/// queue is always drained first.
///
/// Each dispatch hands a worker its quantum (halved for high priority
/// workers). The worker uses either all of it or a random share, and once
/// it has accumulated enough CPU time it may decide to terminate. The
/// simulated clock advances by every granted burst plus a small random
/// dispatch overhead.
///
/// The run ends when the creation limit has been reached and every worker
/// has terminated, when the wall-clock cap elapses, or on Ctrl-C.
#[derive(Debug, Parser)]
struct Opts {
    /// Maximum number of workers alive at the same time.
    #[clap(short = 'c', long, default_value = "18")]
    max_concurrent: usize,

    /// Total number of workers to create over the run.
    #[clap(short = 'n', long, default_value = "100")]
    max_total: u32,

    /// Wall-clock cap on the run, in seconds. 0 disables the cap.
    #[clap(short = 't', long, default_value = "2.0")]
    time_limit: f64,

    /// Base scheduling quantum in nanoseconds. High priority workers get
    /// half of it.
    #[clap(short = 'q', long, default_value = "10000000")]
    base_quantum_ns: u64,

    /// Upper bound, in simulated seconds, of the random interval between
    /// two admissions.
    #[clap(long, default_value = "2")]
    admission_interval_max: u64,

    /// Upper bound, in nanoseconds, of the random dispatch overhead added
    /// to the clock every tick.
    #[clap(long, default_value = "1000")]
    overhead_max_ns: u64,

    /// CPU time, in nanoseconds, a worker must accumulate before it may
    /// terminate.
    #[clap(long, default_value = "50000000")]
    termination_threshold_ns: u64,

    /// Chance, in percent, that an eligible worker terminates on a
    /// dispatch.
    #[clap(long, default_value = "25")]
    termination_percent: u32,

    /// Chance, in percent, that a new worker is admitted as high priority.
    #[clap(long, default_value = "9")]
    high_priority_percent: u32,

    /// Seed for all random draws. A random seed is picked and logged if
    /// not given.
    #[clap(long)]
    seed: Option<u64>,

    /// Event log file.
    #[clap(short = 'l', long, default_value = "program.log")]
    log_file: PathBuf,

    /// Do not write the event log file.
    #[clap(long, action = clap::ArgAction::SetTrue, conflicts_with = "log_file")]
    no_log_file: bool,

    /// Maximum number of lines written to the event log file.
    #[clap(long, default_value = "10000")]
    log_max_lines: usize,

    /// Write the end-of-run report as JSON to this file.
    #[clap(long)]
    report: Option<PathBuf>,

    /// Enable verbose output. Specify multiple times to increase
    /// verbosity.
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Opts {
    fn sim_config(&self) -> Result<SimConfig> {
        let time_limit = if self.time_limit == 0.0 {
            None
        } else {
            Some(
                Duration::try_from_secs_f64(self.time_limit)
                    .with_context(|| format!("Invalid --time-limit {}", self.time_limit))?,
            )
        };
        Ok(SimConfig {
            max_concurrent: self.max_concurrent,
            max_total: self.max_total,
            time_limit,
            base_quantum_ns: self.base_quantum_ns,
            admission_interval_max_secs: self.admission_interval_max,
            overhead_max_ns: self.overhead_max_ns,
            termination_threshold_ns: self.termination_threshold_ns,
            termination_percent: self.termination_percent,
            high_priority_percent: self.high_priority_percent,
            seed: self.seed.unwrap_or_else(rand::random),
        })
    }
}

fn init_logging(opts: &Opts) -> Result<()> {
    let llv = match opts.verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    let lcfg = lcfg.build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(simplelog::TermLogger::new(
        llv,
        lcfg.clone(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    ));
    if !opts.no_log_file {
        let file = File::create(&opts.log_file)
            .with_context(|| format!("Failed to create log file {}", opts.log_file.display()))?;
        loggers.push(simplelog::WriteLogger::new(
            simplelog::LevelFilter::Info,
            lcfg,
            LineCappedWriter::new(BufWriter::new(file), opts.log_max_lines),
        ));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    init_logging(&opts)?;

    let cfg = opts.sim_config()?;
    cfg.validate().context("Invalid options")?;

    let shutdown = Shutdown::new();
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        if shutdown_clone.trigger(ShutdownReason::Interrupted) {
            info!("Signal to terminate received");
        }
    })
    .context("Error setting Ctrl-C handler")?;

    let mut dispatcher = Dispatcher::new(cfg, shutdown)?;
    let report = dispatcher.run()?;

    if let Some(path) = &opts.report {
        report.write_json(path)?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}
