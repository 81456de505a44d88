//! bsb-scheduler — policy dispatch and load rebalancing.
//!
//! Decides where every ready task goes and keeps per-server load in
//! check. The scheduler:
//!
//! - Picks the next task per policy (FIFO, shortest job, priority)
//! - Picks a target server (rotating pointer or least relative load)
//! - Tracks in-flight tasks per server in a [`LoadTable`]
//! - Moves one pending task from the busiest to the idlest server when
//!   their relative loads drift apart ([`LoadBalancer`])
//!
//! # Architecture
//!
//! ```text
//! Orchestrator (single control task)
//!   ├── LoadTable (server → in-flight count, owned, &mut access only)
//!   ├── Scheduler
//!   │     ├── RoundRobinCursor
//!   │     └── DispatchQueue per active server ──► Worker
//!   └── LoadBalancer (steals from one DispatchQueue, pushes to another)
//! ```

pub mod dispatch_queue;
pub mod error;
pub mod load_balancer;
pub mod load_table;
pub mod round_robin;
pub mod scheduler;

pub use dispatch_queue::{DispatchQueue, QueueMap};
pub use error::{SchedulerError, SchedulerResult};
pub use load_balancer::{LoadBalancer, Migration, MigrationPlan, plan_migration};
pub use load_table::LoadTable;
pub use round_robin::{RoundRobinCursor, Selection};
pub use scheduler::{Assignment, Scheduler, select_task};
