//! Stress harness reproducing the invalidation-tracker concurrency
//! bug class.
//!
//! The workload: several threads churn the observer registry
//! (register/unregister in a tight loop) while one checking thread
//! repeatedly wraps an insert+delete pair in register-before /
//! unregister-after of a counting observer. A race-free tracker
//! delivers exactly two notifications per pair; any other count is the
//! failure signal this harness exists to surface.

pub mod stress;

pub use stress::{
    CountingObserver, IterationFailure, StressConfig, StressReport, run_stress,
};
