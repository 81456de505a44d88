//! Scheduler error types.

use bsb_core::ServerId;
use thiserror::Error;

/// Errors that can occur during scheduling operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("server not tracked by the load table: {0}")]
    UnknownServer(ServerId),

    #[error("no dispatch queue for server: {0}")]
    NoQueue(ServerId),

    #[error("server {0} has no load to transfer")]
    NoLoad(ServerId),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
