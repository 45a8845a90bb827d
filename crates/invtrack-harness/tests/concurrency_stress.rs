//! The concurrency repro itself: registry churn racing a checked
//! insert+delete loop.
//!
//! Exactly two notifications per pair must arrive no matter how many
//! threads are concurrently registering and unregistering unrelated
//! observers. The churned observers share the checker's watched table,
//! so a tracker with a stale-snapshot race (registry snapshot taken on
//! the wrong side of the version read) fails this within a few hundred
//! iterations.

use invtrack_harness::{StressConfig, run_stress};

// === Test 1: no churn threads — the baseline must always pass ===
#[test]
fn test_stress_without_churn() {
    let report = run_stress(StressConfig {
        concurrency: 0,
        check_iterations: 50,
    })
    .unwrap();
    assert!(report.passed(), "{}", report.triage_line());
}

// === Test 2: the original workload shape (4 churn threads) ===
#[test]
fn test_stress_with_churn() {
    let report = run_stress(StressConfig {
        concurrency: 4,
        check_iterations: 200,
    })
    .unwrap();
    assert!(report.passed(), "{}", report.triage_line());
}

// === Test 3: heavier churn than the original report ===
#[test]
fn test_stress_with_heavy_churn() {
    let report = run_stress(StressConfig {
        concurrency: 8,
        check_iterations: 100,
    })
    .unwrap();
    assert!(report.passed(), "{}", report.triage_line());
}
