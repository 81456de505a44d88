//! Orchestrator — the single control task of a simulation run.
//!
//! Owns the ready queue, the load table and the metrics collector, and
//! drives the scheduler and load balancer. Every wake-up runs the same
//! fixed sequence:
//!
//! ```text
//! 1. drain admissions   (Task → ready queue, Done → generator finished)
//! 2. drain completions  (metrics, load -= 1)
//! 3. dispatch           (scheduler, until empty or no capacity)
//! 4. rebalance          (load balancer, every Nth tick)
//! 5. wait               (next admission, completion or tick)
//! ```
//!
//! The loop exits on quiescence: the admission window has elapsed, the
//! generator is done, the ready queue is empty and no server has load.

use std::collections::VecDeque;
use std::time::Duration;

use bsb_core::{Admission, Dispatch, Server, SimulationConfig, Task, TaskResult};
use bsb_metrics::{MetricsCollector, RunCounters, SimulationReport};
use bsb_scheduler::{DispatchQueue, LoadBalancer, LoadTable, QueueMap, Scheduler};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::SimResult;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The generator may still admit tasks.
    Running,
    /// The generator is done; remaining work is being drained.
    Draining,
    /// Termination markers have been sent.
    Terminated,
}

pub struct Orchestrator {
    settings: SimulationConfig,
    start: Instant,
    phase: Phase,
    generator_active: bool,
    /// Admitted tasks awaiting dispatch, in arrival order.
    ready: VecDeque<Task>,
    loads: LoadTable,
    queues: QueueMap,
    scheduler: Scheduler,
    balancer: LoadBalancer,
    metrics: MetricsCollector,
    admitted: u64,
    ticks: u64,
}

impl Orchestrator {
    /// Set up state for the active servers in `servers`. One dispatch queue
    /// is created per active server; inactive servers get nothing.
    pub fn new(servers: &[Server], settings: &SimulationConfig, start: Instant) -> Self {
        let loads = LoadTable::new(servers);
        let queues = DispatchQueue::for_servers(loads.server_ids());
        let scheduler = Scheduler::new(settings.policy, queues.clone());
        let balancer = LoadBalancer::new(
            queues.clone(),
            settings.migration_threshold,
            settings.migration_every,
        );
        let metrics = MetricsCollector::new(loads.server_ids());

        Self {
            settings: settings.clone(),
            start,
            phase: Phase::Running,
            generator_active: true,
            ready: VecDeque::new(),
            loads,
            queues,
            scheduler,
            balancer,
            metrics,
            admitted: 0,
            ticks: 0,
        }
    }

    /// Dispatch queues by server, for spawning workers.
    pub fn queues(&self) -> &QueueMap {
        &self.queues
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn loads(&self) -> &LoadTable {
        &self.loads
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn admitted(&self) -> u64 {
        self.admitted
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Drive the control loop until quiescence.
    pub async fn run(
        &mut self,
        admissions: &mut UnboundedReceiver<Admission>,
        completions: &mut UnboundedReceiver<TaskResult>,
    ) -> SimResult<()> {
        let mut ticker = tokio::time::interval(self.settings.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut admissions_open = true;
        let mut completions_open = true;

        info!(
            policy = %self.settings.policy,
            servers = self.loads.len(),
            duration_secs = self.settings.duration,
            "orchestrator started"
        );

        loop {
            let ticked = tokio::select! {
                biased;
                msg = admissions.recv(), if admissions_open => {
                    match msg {
                        Some(msg) => self.admit(msg),
                        None => {
                            admissions_open = false;
                            self.generator_finished();
                        }
                    }
                    false
                }
                result = completions.recv(), if completions_open => {
                    match result {
                        Some(result) => self.complete(&result),
                        None => completions_open = false,
                    }
                    false
                }
                _ = ticker.tick() => true,
            };

            if admissions_open {
                admissions_open = self.drain_admissions(admissions);
            }
            if completions_open {
                completions_open = self.drain_completions(completions);
            }
            self.scheduler.dispatch(&mut self.ready, &mut self.loads).await?;
            if ticked {
                self.on_tick().await;
            }

            if self.is_quiescent() {
                info!(
                    elapsed_secs = self.start.elapsed().as_secs_f64(),
                    processed = self.metrics.processed(),
                    "cluster quiescent"
                );
                return Ok(());
            }
        }
    }

    /// Accept one admission message.
    pub fn admit(&mut self, msg: Admission) {
        match msg {
            Admission::Task(task) => {
                self.admitted += 1;
                debug!(
                    task_id = task.id,
                    ready = self.ready.len() + 1,
                    "task admitted"
                );
                self.ready.push_back(task);
            }
            Admission::Done => self.generator_finished(),
        }
    }

    /// Fold one completion into the metrics and release its load unit.
    pub fn complete(&mut self, result: &TaskResult) {
        self.metrics.record(result);
        match self.loads.decrement(result.server_id) {
            Ok(load) => debug!(
                task_id = result.task_id,
                server_id = result.server_id,
                load,
                "load released"
            ),
            Err(e) => warn!(task_id = result.task_id, error = %e, "completion from untracked server"),
        }
    }

    /// True once no more work can arrive, none is queued, and no server
    /// has load.
    pub fn is_quiescent(&self) -> bool {
        self.start.elapsed() >= self.settings.duration()
            && !self.generator_active
            && self.ready.is_empty()
            && self.loads.is_idle()
    }

    /// Send one termination marker to every dispatch queue.
    pub async fn shutdown(&mut self) {
        for queue in self.queues.values() {
            queue.push(Dispatch::Shutdown).await;
        }
        self.phase = Phase::Terminated;
        info!(workers = self.queues.len(), "termination markers sent");
    }

    /// Build the final report for a run that lasted `wall_time`.
    pub fn report(&self, wall_time: Duration) -> SimulationReport {
        let counters = RunCounters {
            tasks_admitted: self.admitted,
            migrations: self.balancer.migrations(),
            redirects: self.scheduler.redirects(),
            load_underflows: self.loads.underflows(),
        };
        self.metrics.report(self.settings.policy, wall_time, counters)
    }

    /// Returns false once the channel is closed.
    fn drain_admissions(&mut self, rx: &mut UnboundedReceiver<Admission>) -> bool {
        loop {
            match rx.try_recv() {
                Ok(msg) => self.admit(msg),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => {
                    self.generator_finished();
                    return false;
                }
            }
        }
    }

    fn drain_completions(&mut self, rx: &mut UnboundedReceiver<TaskResult>) -> bool {
        loop {
            match rx.try_recv() {
                Ok(result) => self.complete(&result),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    async fn on_tick(&mut self) {
        self.ticks += 1;
        if self.balancer.is_due(self.ticks) {
            self.balancer.rebalance(&mut self.loads).await;
        }
    }

    fn generator_finished(&mut self) {
        if !self.generator_active {
            return;
        }
        self.generator_active = false;
        self.phase = Phase::Draining;
        info!(
            admitted = self.admitted,
            ready = self.ready.len(),
            in_flight = self.loads.total_load(),
            "generator done, draining"
        );
    }
}
