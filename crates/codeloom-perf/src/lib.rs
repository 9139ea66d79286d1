//! Synthetic load harness for the Codeloom work queue.
//!
//! Drives a configurable number of messages through the full
//! enqueue → dequeue → ack path with simultaneous producers and consumers,
//! optionally injecting failures from a seeded generator so that runs are
//! reproducible, and reports aggregate throughput/latency/error-rate
//! metrics.
//!
//! # Main types
//!
//! - [`PerfConfig`] — Flat run configuration (TOML-loadable).
//! - [`PerformanceReport`] — Immutable aggregate metrics for one run.
//! - [`run_performance_test`] — Executes one bounded run.

/// Run configuration.
pub mod config;
/// The load generator and report.
pub mod harness;

pub use config::PerfConfig;
pub use harness::{run_performance_test, PerformanceReport};
