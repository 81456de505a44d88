//! Cluster configuration parser.
//!
//! A config document lists the servers, the request type templates, and a
//! `config` section with the simulation options. JSON and TOML are both
//! accepted; the format is chosen from the file extension.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Policy, RequestType, Server};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    pub servers: Vec<Server>,
    pub request_types: Vec<RequestType>,
    #[serde(default, rename = "config")]
    pub simulation: SimulationConfig,
}

/// Every recognized simulation option, with its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SimulationConfig {
    #[serde(alias = "politica")]
    pub policy: Policy,
    /// Lower bound of the inter-arrival gap, in seconds.
    pub arrival_interval_min: f64,
    /// Upper bound of the inter-arrival gap, in seconds.
    pub arrival_interval_max: f64,
    /// Admission window, in seconds.
    pub duration: f64,
    /// Control loop tick, in milliseconds.
    pub tick_interval_ms: u64,
    /// Run the load balancer every N ticks.
    pub migration_every: u32,
    /// Minimum relative-load gap that triggers a migration.
    pub migration_threshold: f64,
    /// Bounded receive timeout for idle workers, in seconds.
    pub worker_recv_timeout: f64,
    /// Seed for a reproducible arrival stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            policy: Policy::RoundRobin,
            arrival_interval_min: 0.5,
            arrival_interval_max: 2.0,
            duration: 15.0,
            tick_interval_ms: 100,
            migration_every: 5,
            migration_threshold: 0.5,
            worker_recv_timeout: 5.0,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn duration(&self) -> Duration {
        secs(self.duration)
    }

    /// Inter-arrival bounds as `(min, max)`.
    pub fn arrival_range(&self) -> (Duration, Duration) {
        (secs(self.arrival_interval_min), secs(self.arrival_interval_max))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn worker_recv_timeout(&self) -> Duration {
        secs(self.worker_recv_timeout)
    }

    fn validate(&self) -> ConfigResult<()> {
        let (min, max) = (self.arrival_interval_min, self.arrival_interval_max);
        if !fits_duration(min) || !fits_duration(max) || max <= 0.0 || min > max {
            return Err(ConfigError::InvalidArrivalInterval { min, max });
        }
        if !fits_duration(self.duration) || self.duration <= 0.0 {
            return Err(ConfigError::InvalidDuration(self.duration));
        }
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms", "must be positive"));
        }
        if self.migration_every == 0 {
            return Err(invalid("migration_every", "must be positive"));
        }
        if !self.migration_threshold.is_finite() || self.migration_threshold < 0.0 {
            return Err(invalid(
                "migration_threshold",
                format!("{} is not a non-negative number", self.migration_threshold),
            ));
        }
        if !fits_duration(self.worker_recv_timeout) || self.worker_recv_timeout <= 0.0 {
            return Err(invalid(
                "worker_recv_timeout",
                format!("{} is not a positive number of seconds", self.worker_recv_timeout),
            ));
        }
        Ok(())
    }
}

impl ClusterConfig {
    /// Load and validate a config file. `.toml` files are parsed as TOML,
    /// everything else as JSON.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let config: ClusterConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: ClusterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Servers that receive a dispatch queue and a worker.
    pub fn active_servers(&self) -> impl Iterator<Item = &Server> {
        self.servers.iter().filter(|s| s.is_active())
    }

    /// Check every record before anything is spawned.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut server_ids = HashSet::new();
        for server in &self.servers {
            if !server_ids.insert(server.id) {
                return Err(ConfigError::DuplicateServer(server.id));
            }
            if !server.speed.is_finite() || server.speed <= 0.0 {
                return Err(ConfigError::InvalidSpeed {
                    id: server.id,
                    value: server.speed,
                });
            }
        }
        if !self.active_servers().any(|s| s.capacity > 0) {
            return Err(ConfigError::NoActiveCapacity);
        }

        if self.request_types.is_empty() {
            return Err(ConfigError::NoRequestTypes);
        }
        let mut type_ids = HashSet::new();
        for rt in &self.request_types {
            if !type_ids.insert(rt.id) {
                return Err(ConfigError::DuplicateRequestType(rt.id));
            }
            if !fits_duration(rt.service_time) {
                return Err(ConfigError::InvalidServiceTime {
                    id: rt.id,
                    value: rt.service_time,
                });
            }
        }

        self.simulation.validate()
    }

}

/// Validated values always convert; anything else collapses to zero.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// True for a non-negative, finite number of seconds that a `Duration`
/// can hold.
fn fits_duration(value: f64) -> bool {
    Duration::try_from_secs_f64(value).is_ok()
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidSetting {
        key,
        reason: reason.into(),
    }
}
