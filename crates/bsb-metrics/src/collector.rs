//! Metrics collector — aggregates completion records for one run.
//!
//! Owned by the orchestrator and fed from its completion drain, so plain
//! fields are enough; nothing here is shared across tasks.

use std::collections::BTreeMap;
use std::time::Duration;

use bsb_core::{Policy, ServerId, TaskResult};
use tracing::debug;

use crate::report::{SimulationReport, round1, round2};

/// Counters owned by other components, folded into the final report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Tasks admitted into the ready queue.
    pub tasks_admitted: u64,
    pub migrations: u64,
    pub redirects: u64,
    pub load_underflows: u64,
}

/// Running totals over every completion of a run.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    processed: u64,
    wait_sum: Duration,
    exec_sum: Duration,
    response_sum: Duration,
    max_wait: Duration,
    /// server_id → accumulated execution time.
    busy: BTreeMap<ServerId, Duration>,
    /// server_id → completed task count.
    completed: BTreeMap<ServerId, u64>,
}

impl MetricsCollector {
    /// Create a collector that reports on the given servers even if they
    /// never complete a task.
    pub fn new(server_ids: impl IntoIterator<Item = ServerId>) -> Self {
        let ids: Vec<ServerId> = server_ids.into_iter().collect();
        Self {
            busy: ids.iter().map(|id| (*id, Duration::ZERO)).collect(),
            completed: ids.iter().map(|id| (*id, 0)).collect(),
            ..Self::default()
        }
    }

    /// Fold one completion into the totals.
    pub fn record(&mut self, result: &TaskResult) {
        self.processed += 1;
        self.wait_sum += result.wait;
        self.exec_sum += result.exec;
        self.response_sum += result.response();
        self.max_wait = self.max_wait.max(result.wait);
        *self.busy.entry(result.server_id).or_default() += result.exec;
        *self.completed.entry(result.server_id).or_default() += 1;
        debug!(
            task_id = result.task_id,
            server_id = result.server_id,
            processed = self.processed,
            "completion recorded"
        );
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn mean_wait(&self) -> Duration {
        self.mean(self.wait_sum)
    }

    pub fn mean_exec(&self) -> Duration {
        self.mean(self.exec_sum)
    }

    pub fn mean_response(&self) -> Duration {
        self.mean(self.response_sum)
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn busy_time(&self, server_id: ServerId) -> Duration {
        self.busy.get(&server_id).copied().unwrap_or_default()
    }

    /// Build the final report for a run that lasted `wall_time`.
    ///
    /// Utilization is `busy / wall` clamped to `[0, 1]`, reported as a
    /// percentage. Times are rounded to 2 decimals, percentages to 1.
    pub fn report(
        &self,
        policy: Policy,
        wall_time: Duration,
        counters: RunCounters,
    ) -> SimulationReport {
        let wall = wall_time.as_secs_f64();

        let utilization: BTreeMap<ServerId, f64> = self
            .busy
            .iter()
            .map(|(id, busy)| {
                let u = if wall > 0.0 {
                    (busy.as_secs_f64() / wall).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                (*id, u * 100.0)
            })
            .collect();
        let mean_utilization = if utilization.is_empty() {
            0.0
        } else {
            utilization.values().sum::<f64>() / utilization.len() as f64
        };

        let throughput = if wall > 0.0 {
            self.processed as f64 / wall
        } else {
            0.0
        };

        SimulationReport {
            policy,
            tasks_processed: self.processed,
            tasks_admitted: counters.tasks_admitted,
            total_simulation_time: round2(wall),
            mean_wait_time: round2(self.mean_wait().as_secs_f64()),
            max_wait_time: round2(self.max_wait.as_secs_f64()),
            mean_exec_time: round2(self.mean_exec().as_secs_f64()),
            mean_response_time: round2(self.mean_response().as_secs_f64()),
            throughput: round2(throughput),
            mean_cpu_utilization: round1(mean_utilization),
            per_server_utilization: utilization
                .into_iter()
                .map(|(id, u)| (id, round1(u)))
                .collect(),
            tasks_per_server: self.completed.clone(),
            migrations: counters.migrations,
            redirects: counters.redirects,
            load_underflows: counters.load_underflows,
        }
    }

    fn mean(&self, sum: Duration) -> Duration {
        match u32::try_from(self.processed) {
            Ok(0) => Duration::ZERO,
            Ok(n) => sum / n,
            Err(_) => Duration::from_secs_f64(sum.as_secs_f64() / self.processed as f64),
        }
    }
}
