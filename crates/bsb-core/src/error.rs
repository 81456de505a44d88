//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{RequestTypeId, ServerId};

/// Result type alias for config loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating a cluster configuration.
///
/// All of these are fatal at startup: nothing is spawned until the
/// configuration validates.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown scheduling policy: {0}")]
    UnknownPolicy(String),

    #[error("no request types configured")]
    NoRequestTypes,

    #[error("no active server with positive capacity")]
    NoActiveCapacity,

    #[error("duplicate server id: {0}")]
    DuplicateServer(ServerId),

    #[error("duplicate request type id: {0}")]
    DuplicateRequestType(RequestTypeId),

    #[error("server {id} has invalid speed {value}")]
    InvalidSpeed { id: ServerId, value: f64 },

    #[error("request type {id} has invalid service time {value}")]
    InvalidServiceTime { id: RequestTypeId, value: f64 },

    #[error("invalid arrival interval [{min}, {max}]")]
    InvalidArrivalInterval { min: f64, max: f64 },

    #[error("invalid simulation duration: {0}")]
    InvalidDuration(f64),

    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}
