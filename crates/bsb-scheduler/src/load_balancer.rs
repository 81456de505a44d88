//! Load balancer — migrates queued work between servers.
//!
//! Runs every Nth control-loop tick, independent of the scheduler's
//! initial placement:
//!
//! ```text
//! rel(s)  = load(s) / capacity(s)      for every server with capacity > 0
//! max, min = servers with the highest / lowest rel (ties → lowest id)
//!
//! if rel(max) - rel(min) > threshold:
//!     steal one pending task from max's dispatch queue
//!     push it onto min's dispatch queue
//!     transfer one unit of load max → min
//! ```
//!
//! At most one task moves per invocation. Only tasks still waiting in a
//! queue can move; a task a worker has already picked up is never touched.

use bsb_core::{Dispatch, ServerId, TaskId};
use tracing::{debug, info, warn};

use crate::dispatch_queue::QueueMap;
use crate::load_table::LoadTable;

/// A rebalancing candidate: move one task `from` → `to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MigrationPlan {
    pub from: ServerId,
    pub to: ServerId,
    /// `rel(from) - rel(to)`.
    pub gap: f64,
}

/// A completed migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub task_id: TaskId,
    pub from: ServerId,
    pub to: ServerId,
}

/// Find the most and least relatively loaded servers and return a plan
/// if their gap exceeds `threshold`.
///
/// Needs at least two servers with positive capacity.
pub fn plan_migration(loads: &LoadTable, threshold: f64) -> Option<MigrationPlan> {
    let mut max: Option<(ServerId, f64)> = None;
    let mut min: Option<(ServerId, f64)> = None;
    let mut eligible = 0usize;

    for id in loads.server_ids() {
        let Some(rel) = loads.relative(id) else {
            continue;
        };
        eligible += 1;
        if max.is_none_or(|(_, m)| rel > m) {
            max = Some((id, rel));
        }
        if min.is_none_or(|(_, m)| rel < m) {
            min = Some((id, rel));
        }
    }

    if eligible < 2 {
        return None;
    }
    let ((from, hi), (to, lo)) = (max?, min?);
    let gap = hi - lo;
    (from != to && gap > threshold).then_some(MigrationPlan { from, to, gap })
}

/// Periodic migration of pending tasks between dispatch queues.
pub struct LoadBalancer {
    queues: QueueMap,
    threshold: f64,
    /// Rebalance every `every` ticks.
    every: u32,
    migrations: u64,
}

impl LoadBalancer {
    pub fn new(queues: QueueMap, threshold: f64, every: u32) -> Self {
        Self {
            queues,
            threshold,
            every: every.max(1),
            migrations: 0,
        }
    }

    /// True on every `every`-th tick (never on tick zero).
    pub fn is_due(&self, tick: u64) -> bool {
        tick > 0 && tick % u64::from(self.every) == 0
    }

    /// Migrations performed so far.
    pub fn migrations(&self) -> u64 {
        self.migrations
    }

    /// Move at most one pending task from the busiest to the idlest server.
    pub async fn rebalance(&mut self, loads: &mut LoadTable) -> Option<Migration> {
        let plan = plan_migration(loads, self.threshold)?;

        let (Some(source), Some(target)) = (self.queues.get(&plan.from), self.queues.get(&plan.to))
        else {
            warn!(from = plan.from, to = plan.to, "migration endpoints have no queue");
            return None;
        };

        let Some(task) = source.steal().await else {
            debug!(
                from = plan.from,
                gap = plan.gap,
                "no pending task to migrate, head of line already executing"
            );
            return None;
        };
        let task_id = task.id;

        if let Err(e) = loads.transfer(plan.from, plan.to) {
            // Put it back where it was charged.
            warn!(task_id, error = %e, "migration aborted");
            source.push(Dispatch::Run(task)).await;
            return None;
        }
        target.push(Dispatch::Run(task)).await;
        self.migrations += 1;

        info!(
            task_id,
            from = plan.from,
            to = plan.to,
            gap = plan.gap,
            from_load = loads.load(plan.from).unwrap_or_default(),
            to_load = loads.load(plan.to).unwrap_or_default(),
            "task migrated"
        );

        Some(Migration {
            task_id,
            from: plan.from,
            to: plan.to,
        })
    }
}
