use scx_ossim::*;

mod common;

/// Two low priority workers on two slots, each terminating on its first
/// dispatch: exactly one round trip per worker.
#[test]
fn test_two_low_workers_one_dispatch_each() {
    common::setup_test();
    let cfg = SimConfig {
        max_concurrent: 2,
        max_total: 2,
        base_quantum_ns: 4,
        high_priority_percent: 0,
        termination_threshold_ns: 0,
        termination_percent: 100,
        ..common::config(1)
    };
    let mut d = Dispatcher::new(cfg.clone(), Shutdown::new()).unwrap();
    let report = d.run().unwrap();
    d.trace().dump();

    assert_eq!(report.outcome, ShutdownReason::Completed);
    assert_eq!(report.stats.total_created(), 2);
    assert_eq!(report.stats.total_terminated(), 2);
    assert_eq!(report.stats.low.admitted, 2);
    assert_eq!(report.stats.high.admitted, 0);
    assert_eq!(d.trace().dispatch_count(), 2);
    assert_eq!(d.trace().dispatches_of(WorkerId(1)), 1);
    assert_eq!(d.trace().dispatches_of(WorkerId(2)), 1);
    assert_eq!(report.killed_workers, 0);
    common::check_trace(d.trace(), &cfg);
}

/// Same shape with a real threshold and a 25% termination chance: at least
/// one round trip per worker, and no slot is handed out while its occupant
/// is alive.
#[test]
fn test_two_low_workers_random_termination() {
    common::setup_test();
    for seed in 0..10 {
        let cfg = SimConfig {
            max_concurrent: 2,
            max_total: 2,
            base_quantum_ns: 4,
            high_priority_percent: 0,
            termination_threshold_ns: 8,
            termination_percent: 25,
            admission_interval_max_secs: 0,
            ..common::config(seed)
        };
        let mut d = Dispatcher::new(cfg.clone(), Shutdown::new()).unwrap();
        let report = d.run().unwrap();

        assert_eq!(report.outcome, ShutdownReason::Completed);
        assert_eq!(report.stats.total_terminated(), 2);
        assert!(d.trace().dispatch_count() >= 2);
        for w in [WorkerId(1), WorkerId(2)] {
            assert!(d.trace().dispatches_of(w) >= 1);
        }
        common::check_trace(d.trace(), &cfg);
    }
}

#[test]
fn test_high_priority_gets_half_quantum() {
    common::setup_test();
    let cfg = SimConfig {
        max_total: 5,
        base_quantum_ns: 4,
        high_priority_percent: 100,
        termination_threshold_ns: 8,
        ..common::config(7)
    };
    let mut d = Dispatcher::new(cfg.clone(), Shutdown::new()).unwrap();
    let report = d.run().unwrap();

    assert_eq!(report.stats.high.admitted, 5);
    assert_eq!(report.stats.low.admitted, 0);
    for ev in d.trace().events() {
        if let TraceKind::Responded {
            burst_ns,
            quantum_ns,
            ..
        } = ev.kind
        {
            assert_eq!(quantum_ns, 2);
            assert!(burst_ns <= 2);
        }
    }
    common::check_trace(d.trace(), &cfg);
}

#[test]
fn test_low_priority_gets_full_quantum() {
    common::setup_test();
    let cfg = SimConfig {
        max_total: 5,
        base_quantum_ns: 4,
        high_priority_percent: 0,
        termination_threshold_ns: 8,
        ..common::config(7)
    };
    let mut d = Dispatcher::new(cfg.clone(), Shutdown::new()).unwrap();
    d.run().unwrap();

    for ev in d.trace().events() {
        if let TraceKind::Responded { quantum_ns, .. } = ev.kind {
            assert_eq!(quantum_ns, 4);
        }
    }
    common::check_trace(d.trace(), &cfg);
}

/// A full run with the default caps admits and retires every worker and
/// leaves no slot occupied.
#[test]
fn test_default_run_completes() {
    common::setup_test();
    let cfg = common::config(42);
    let mut d = Dispatcher::new(cfg.clone(), Shutdown::new()).unwrap();
    let report = d.run().unwrap();

    assert_eq!(report.outcome, ShutdownReason::Completed);
    assert_eq!(report.stats.total_created(), 100);
    assert_eq!(report.stats.total_terminated(), 100);
    assert_eq!(report.killed_workers, 0);
    assert_eq!(d.live_workers(), 0);
    assert!(d.queues().is_empty());
    assert!(d.shared().is_released());
    assert_eq!(d.shared().table().occupied_count(), 0);
    assert!(report.final_clock > SimTime::ZERO);
    common::check_trace(d.trace(), &cfg);
}

#[test]
fn test_same_seed_same_trace() {
    common::setup_test();
    let cfg = SimConfig {
        max_total: 30,
        ..common::config(1234)
    };
    let mut a = Dispatcher::new(cfg.clone(), Shutdown::new()).unwrap();
    let mut b = Dispatcher::new(cfg, Shutdown::new()).unwrap();
    let ra = a.run().unwrap();
    let rb = b.run().unwrap();

    assert_eq!(ra, rb);
    assert_eq!(a.trace().events(), b.trace().events());
}

/// Idle ticks jump the clock to the next admission time instead of
/// crawling there one overhead at a time.
#[test]
fn test_idle_ticks_fast_forward() {
    common::setup_test();
    let cfg = SimConfig {
        max_total: 20,
        termination_threshold_ns: 0,
        termination_percent: 100,
        ..common::config(5)
    };
    let mut d = Dispatcher::new(cfg.clone(), Shutdown::new()).unwrap();
    let report = d.run().unwrap();

    assert_eq!(report.outcome, ShutdownReason::Completed);
    // Every admission after the first is preceded by at most one idle tick.
    assert!(report.stats.idle_ticks <= 20, "idle ticks: {}", report.stats.idle_ticks);
    common::check_trace(d.trace(), &cfg);
}
