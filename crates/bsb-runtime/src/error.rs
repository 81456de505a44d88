//! Simulation error types.

use std::path::PathBuf;

use bsb_core::ConfigError;
use bsb_scheduler::SchedulerError;
use thiserror::Error;

/// Result type alias for simulation runs.
pub type SimResult<T> = Result<T, SimError>;

/// Errors that abort a simulation run.
///
/// Task execution itself never fails; what remains is a bad configuration,
/// a component task that panicked, or a report that could not be written.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("{component} task failed: {source}")]
    Join {
        component: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("failed to write report {path}: {reason}")]
    Report { path: PathBuf, reason: String },
}
