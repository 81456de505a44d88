//! bsb-metrics — observability for BSB Compute simulation runs.
//!
//! Aggregates completion records into per-run counters, turns them into
//! a persisted [`SimulationReport`], and summarizes repeated runs per
//! policy for the benchmark comparison.
//!
//! # Architecture
//!
//! ```text
//! MetricsCollector
//!   ├── record() ← called per completion drained by the orchestrator
//!   └── report() → SimulationReport → metrics.json
//!
//! Benchmark
//!   ├── PolicySummary::from_reports() → <policy>_stats.json
//!   └── render_markdown() → report.md
//! ```

pub mod collector;
pub mod report;
pub mod summary;

pub use collector::{MetricsCollector, RunCounters};
pub use report::{SimulationReport, format_report};
pub use summary::{PolicySummary, Stat, render_markdown};
