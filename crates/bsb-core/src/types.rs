//! Shared types used across BSB Compute crates.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::ConfigError;

/// Stable identifier of a server in the cluster.
pub type ServerId = u32;

/// Monotonic, generator-scoped task identifier.
pub type TaskId = u64;

/// Identifier of a request type template.
pub type RequestTypeId = u32;

// ── Servers ────────────────────────────────────────────────────────

/// Whether a server takes part in the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    #[default]
    #[serde(alias = "ativo")]
    Active,
    #[serde(alias = "inativo")]
    Inactive,
}

/// A capacity-bounded execution node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Server {
    pub id: ServerId,
    /// Maximum number of tasks allowed in flight toward this server.
    pub capacity: u32,
    #[serde(default)]
    pub status: ServerStatus,
    /// Speed multiplier. Advisory only: execution always lasts `task.cost`.
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_speed() -> f64 {
    1.0
}

impl Server {
    pub fn new(id: ServerId, capacity: u32) -> Self {
        Self {
            id,
            capacity,
            status: ServerStatus::Active,
            speed: default_speed(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ServerStatus::Active
    }
}

// ── Request types and tasks ────────────────────────────────────────

/// Template the generator stamps new tasks from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestType {
    pub id: RequestTypeId,
    pub category: String,
    /// Priority value inherited by tasks. Lower = more urgent.
    pub weight: u32,
    /// Simulated execution time in seconds.
    pub service_time: f64,
}

impl RequestType {
    pub fn new(id: RequestTypeId, category: &str, weight: u32, service_time: f64) -> Self {
        Self {
            id,
            category: category.to_string(),
            weight,
            service_time,
        }
    }

    /// Service time as a `Duration`. Invalid values collapse to zero;
    /// `ClusterConfig::validate` rejects them before a run starts.
    pub fn service_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.service_time).unwrap_or(Duration::ZERO)
    }
}

/// A unit of work flowing through the cluster. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub category: String,
    /// Estimated (and simulated) execution cost.
    pub cost: Duration,
    pub created_at: Instant,
    /// Inherited from `RequestType::weight`. Lower = more urgent.
    pub priority: u32,
}

impl Task {
    /// Stamp a new task from a request type template.
    pub fn from_template(id: TaskId, template: &RequestType, created_at: Instant) -> Self {
        Self {
            id,
            category: template.category.clone(),
            cost: template.service_duration(),
            created_at,
            priority: template.weight,
        }
    }
}

/// Completion record emitted by a worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub server_id: ServerId,
    /// Time between task creation and the worker picking it up.
    pub wait: Duration,
    /// Measured execution time.
    pub exec: Duration,
}

impl TaskResult {
    /// End-to-end response time (wait + execution).
    pub fn response(&self) -> Duration {
        self.wait + self.exec
    }
}

// ── Channel messages ───────────────────────────────────────────────

/// Message on the generator → orchestrator admission channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Task(Task),
    /// The generator has stopped producing.
    Done,
}

/// Message on an orchestrator → worker dispatch queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Run(Task),
    /// Stop the receive loop.
    Shutdown,
}

// ── Scheduling policy ──────────────────────────────────────────────

/// Scheduling policy driving task and server selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    /// FIFO task order, rotating server pointer.
    #[default]
    #[serde(rename = "round_robin")]
    RoundRobin,
    /// Cheapest task first, least relatively loaded server.
    #[serde(rename = "sjf")]
    ShortestJobFirst,
    /// Lowest priority value first, least relatively loaded server.
    #[serde(rename = "prioridade", alias = "priority")]
    Priority,
}

impl Policy {
    pub const ALL: [Policy; 3] = [Policy::RoundRobin, Policy::ShortestJobFirst, Policy::Priority];

    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::RoundRobin => "round_robin",
            Policy::ShortestJobFirst => "sjf",
            Policy::Priority => "prioridade",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round_robin" | "round-robin" | "rr" => Ok(Policy::RoundRobin),
            "sjf" => Ok(Policy::ShortestJobFirst),
            "prioridade" | "priority" => Ok(Policy::Priority),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}
