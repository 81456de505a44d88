//! bsb-core — shared vocabulary for the BSB Compute cluster simulator.
//!
//! Holds the data model (servers, request types, tasks, completion
//! records), the scheduling [`Policy`] enum, the messages exchanged over
//! the admission and dispatch channels, and the [`ClusterConfig`] loader.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ClusterConfig, SimulationConfig};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
