//! Scheduler — policy-driven dispatch of ready tasks.
//!
//! Each call to [`Scheduler::dispatch`] repeatedly picks a task from the
//! ready queue and a target server, until the queue is empty or no server
//! has room. When nothing fits, the picked task goes back to the front of
//! the ready queue and dispatch halts for this cycle.
//!
//! Not reentrant: only the orchestrator's control task calls it.

use std::collections::{BTreeMap, VecDeque};

use bsb_core::{Dispatch, Policy, ServerId, Task};
use tracing::{debug, info, warn};

use crate::dispatch_queue::QueueMap;
use crate::error::{SchedulerError, SchedulerResult};
use crate::load_table::LoadTable;
use crate::round_robin::RoundRobinCursor;

/// A dispatch decision: `task` goes to `server_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub task: Task,
    pub server_id: ServerId,
    /// Set when round-robin skipped a full preferred server.
    pub redirected_from: Option<ServerId>,
}

/// Index of the next task to dispatch under `policy`.
///
/// SJF and priority use a stable minimum scan: on ties the earliest
/// arrival wins.
pub fn select_task(policy: Policy, ready: &VecDeque<Task>) -> Option<usize> {
    match policy {
        Policy::RoundRobin => (!ready.is_empty()).then_some(0),
        Policy::ShortestJobFirst => stable_min_by_key(ready, |t| t.cost),
        Policy::Priority => stable_min_by_key(ready, |t| t.priority),
    }
}

fn stable_min_by_key<K: Ord>(ready: &VecDeque<Task>, key: impl Fn(&Task) -> K) -> Option<usize> {
    let mut best: Option<(usize, K)> = None;
    for (idx, task) in ready.iter().enumerate() {
        let k = key(task);
        if best.as_ref().is_none_or(|(_, b)| k < *b) {
            best = Some((idx, k));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Dispatches ready tasks onto per-server queues under one policy.
pub struct Scheduler {
    policy: Policy,
    /// Active servers in dispatch order.
    servers: Vec<ServerId>,
    /// Dispatch queue per active server.
    queues: QueueMap,
    cursor: RoundRobinCursor,
    /// Round-robin picks that skipped a full preferred server.
    redirects: u64,
    /// Dispatch count per server.
    dispatched: BTreeMap<ServerId, u64>,
}

impl Scheduler {
    /// Create a scheduler over the servers that have a dispatch queue.
    pub fn new(policy: Policy, queues: QueueMap) -> Self {
        let servers: Vec<ServerId> = queues.keys().copied().collect();
        let dispatched = servers.iter().map(|id| (*id, 0)).collect();
        Self {
            policy,
            servers,
            queues,
            cursor: RoundRobinCursor::new(),
            redirects: 0,
            dispatched,
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn redirects(&self) -> u64 {
        self.redirects
    }

    /// Dispatch count per server since creation.
    pub fn dispatched(&self) -> &BTreeMap<ServerId, u64> {
        &self.dispatched
    }

    /// Decide assignments for as many ready tasks as capacity allows and
    /// charge them to the load table. Does not touch the dispatch queues.
    pub fn plan(&mut self, ready: &mut VecDeque<Task>, loads: &mut LoadTable) -> Vec<Assignment> {
        let mut assignments = Vec::new();

        while let Some(idx) = select_task(self.policy, ready) {
            let Some(task) = ready.remove(idx) else {
                break;
            };

            let Some((server_id, redirected_from)) = self.select_server(loads) else {
                debug!(
                    task_id = task.id,
                    waiting = ready.len() + 1,
                    "no server has capacity, dispatch halted"
                );
                ready.push_front(task);
                break;
            };

            let load = match loads.increment(server_id) {
                Ok(load) => load,
                Err(e) => {
                    warn!(task_id = task.id, error = %e, "dispatch target vanished");
                    ready.push_front(task);
                    break;
                }
            };

            if let Some(preferred) = redirected_from {
                self.redirects += 1;
                warn!(
                    task_id = task.id,
                    preferred_server = preferred,
                    server_id,
                    "preferred server overloaded, task redirected"
                );
            }
            *self.dispatched.entry(server_id).or_default() += 1;

            info!(
                task_id = task.id,
                server_id,
                policy = %self.policy,
                category = %task.category,
                cost_secs = task.cost.as_secs_f64(),
                priority = task.priority,
                load,
                capacity = loads.capacity(server_id).unwrap_or_default(),
                "task dispatched"
            );

            assignments.push(Assignment {
                task,
                server_id,
                redirected_from,
            });
        }

        assignments
    }

    /// Plan and push every assignment onto its server's dispatch queue.
    /// Returns the number of tasks dispatched.
    ///
    /// If a target has no queue, that assignment and every one after it is
    /// uncharged and returned to the front of `ready` in planned order.
    pub async fn dispatch(
        &mut self,
        ready: &mut VecDeque<Task>,
        loads: &mut LoadTable,
    ) -> SchedulerResult<usize> {
        let mut assignments = self.plan(ready, loads).into_iter();
        let mut count = 0;
        while let Some(assignment) = assignments.next() {
            let Some(queue) = self.queues.get(&assignment.server_id) else {
                let missing = assignment.server_id;
                let unqueued: Vec<_> = std::iter::once(assignment).chain(assignments).collect();
                warn!(
                    server_id = missing,
                    returned = unqueued.len(),
                    "dispatch target has no queue, tasks returned to ready"
                );
                for assignment in unqueued.into_iter().rev() {
                    self.uncharge(&assignment, loads);
                    ready.push_front(assignment.task);
                }
                return Err(SchedulerError::NoQueue(missing));
            };
            queue.push(Dispatch::Run(assignment.task)).await;
            count += 1;
        }
        Ok(count)
    }

    /// Undo the bookkeeping `plan` did for an assignment that was never queued.
    fn uncharge(&mut self, assignment: &Assignment, loads: &mut LoadTable) {
        if let Err(e) = loads.decrement(assignment.server_id) {
            warn!(task_id = assignment.task.id, error = %e, "could not release load");
        }
        if let Some(n) = self.dispatched.get_mut(&assignment.server_id) {
            *n = n.saturating_sub(1);
        }
        if assignment.redirected_from.is_some() {
            self.redirects = self.redirects.saturating_sub(1);
        }
    }

    /// Pick a target server, returning it and the preferred server it
    /// replaced (round-robin only).
    fn select_server(&mut self, loads: &LoadTable) -> Option<(ServerId, Option<ServerId>)> {
        match self.policy {
            Policy::RoundRobin => {
                let servers = &self.servers;
                let sel = self
                    .cursor
                    .select(servers.len(), |i| loads.has_room(servers[i]))?;
                let chosen = servers[sel.index];
                let preferred = sel.redirected().then(|| servers[sel.preferred]);
                Some((chosen, preferred))
            }
            Policy::ShortestJobFirst | Policy::Priority => {
                least_loaded(&self.servers, loads).map(|id| (id, None))
            }
        }
    }
}

/// The server with room and the smallest `load / capacity`. Ties go to the
/// earliest server in `servers`.
fn least_loaded(servers: &[ServerId], loads: &LoadTable) -> Option<ServerId> {
    let mut best: Option<(ServerId, f64)> = None;
    for &id in servers {
        if !loads.has_room(id) {
            continue;
        }
        let Some(rel) = loads.relative(id) else {
            continue;
        };
        if best.is_none_or(|(_, b)| rel < b) {
            best = Some((id, rel));
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use bsb_core::Server;
    use tokio::time::Instant;

    use crate::dispatch_queue::DispatchQueue;

    fn task(id: u64, cost_secs: u64, priority: u32) -> Task {
        Task {
            id,
            category: "nlp".to_string(),
            cost: Duration::from_secs(cost_secs),
            created_at: Instant::now(),
            priority,
        }
    }

    fn cluster(capacities: &[u32]) -> (QueueMap, LoadTable) {
        let servers: Vec<Server> = capacities
            .iter()
            .enumerate()
            .map(|(i, c)| Server::new(i as u32 + 1, *c))
            .collect();
        let queues = DispatchQueue::for_servers(servers.iter().map(|s| s.id));
        (queues, LoadTable::new(&servers))
    }

    fn ids(assignments: &[Assignment]) -> Vec<u64> {
        assignments.iter().map(|a| a.task.id).collect()
    }

    #[test]
    fn select_task_round_robin_is_fifo() {
        let ready: VecDeque<_> = [task(1, 5, 3), task(2, 1, 1)].into();
        assert_eq!(select_task(Policy::RoundRobin, &ready), Some(0));
        assert_eq!(select_task(Policy::RoundRobin, &VecDeque::new()), None);
    }

    #[test]
    fn select_task_sjf_breaks_ties_by_arrival() {
        let ready: VecDeque<_> = [task(1, 5, 1), task(2, 1, 1), task(3, 1, 1)].into();
        assert_eq!(select_task(Policy::ShortestJobFirst, &ready), Some(1));
    }

    #[test]
    fn select_task_priority_breaks_ties_by_arrival() {
        let ready: VecDeque<_> = [task(1, 1, 2), task(2, 1, 1), task(3, 1, 1)].into();
        assert_eq!(select_task(Policy::Priority, &ready), Some(1));
    }

    #[test]
    fn sjf_dispatches_cheapest_first() {
        let (queues, mut loads) = cluster(&[10]);
        let mut scheduler = Scheduler::new(Policy::ShortestJobFirst, queues);
        let mut ready: VecDeque<_> = [task(1, 5, 1), task(2, 1, 1), task(3, 3, 1)].into();

        let planned = scheduler.plan(&mut ready, &mut loads);
        assert_eq!(ids(&planned), vec![2, 3, 1]);
        assert!(ready.is_empty());
        assert_eq!(loads.load(1), Some(3));
    }

    #[test]
    fn priority_dispatches_lowest_weight_first() {
        let (queues, mut loads) = cluster(&[10]);
        let mut scheduler = Scheduler::new(Policy::Priority, queues);
        let mut ready: VecDeque<_> = [task(1, 1, 2), task(2, 1, 1), task(3, 1, 3)].into();

        let planned = scheduler.plan(&mut ready, &mut loads);
        assert_eq!(ids(&planned), vec![2, 1, 3]);
    }

    #[test]
    fn round_robin_spreads_evenly() {
        let (queues, mut loads) = cluster(&[10, 10, 10]);
        let mut scheduler = Scheduler::new(Policy::RoundRobin, queues);
        let mut ready: VecDeque<_> = (1..=9).map(|i| task(i, 1, 1)).collect();

        let planned = scheduler.plan(&mut ready, &mut loads);
        let targets: Vec<_> = planned.iter().map(|a| a.server_id).collect();
        assert_eq!(targets, vec![1, 2, 3, 1, 2, 3, 1, 2, 3]);
        assert!(scheduler.dispatched().values().all(|&n| n == 3));
        assert_eq!(scheduler.redirects(), 0);
    }

    #[test]
    fn round_robin_redirects_around_full_server() {
        let (queues, mut loads) = cluster(&[1, 5]);
        let mut scheduler = Scheduler::new(Policy::RoundRobin, queues);
        let mut ready: VecDeque<_> = (1..=3).map(|i| task(i, 1, 1)).collect();

        let planned = scheduler.plan(&mut ready, &mut loads);
        let targets: Vec<_> = planned.iter().map(|a| (a.server_id, a.redirected_from)).collect();
        // 1 → s1, 2 → s2, 3 → s1 is full so redirected to s2.
        assert_eq!(targets, vec![(1, None), (2, None), (2, Some(1))]);
        assert_eq!(scheduler.redirects(), 1);
    }

    #[test]
    fn no_capacity_requeues_at_front_and_halts() {
        let (queues, mut loads) = cluster(&[1, 1]);
        let mut scheduler = Scheduler::new(Policy::ShortestJobFirst, queues);
        let mut ready: VecDeque<_> = [task(1, 9, 1), task(2, 2, 1), task(3, 1, 1), task(4, 5, 1)].into();

        let planned = scheduler.plan(&mut ready, &mut loads);
        assert_eq!(ids(&planned), vec![3, 2]);
        // The next pick (cost 5) went back to the front.
        let left: Vec<_> = ready.iter().map(|t| t.id).collect();
        assert_eq!(left, vec![4, 1]);
        assert_eq!(loads.total_load(), 2);
    }

    #[test]
    fn never_exceeds_capacity() {
        let (queues, loads) = cluster(&[2, 3]);
        for policy in Policy::ALL {
            let mut loads = loads.clone();
            let mut scheduler = Scheduler::new(policy, queues.clone());
            let mut ready: VecDeque<_> = (1..=20).map(|i| task(i, i % 4, (i % 3) as u32)).collect();

            let planned = scheduler.plan(&mut ready, &mut loads);
            assert_eq!(planned.len(), 5, "{policy}");
            assert_eq!(ready.len(), 15, "{policy}");
            for (id, load, capacity) in loads.iter() {
                assert!(load <= capacity, "{policy}: server {id} at {load}/{capacity}");
            }
            assert_eq!(loads.total_load(), 5, "{policy}");
        }
    }

    #[test]
    fn least_loaded_prefers_lowest_relative_load() {
        let (queues, mut loads) = cluster(&[4, 2]);
        loads.increment(1).unwrap(); // 0.25
        loads.increment(2).unwrap(); // 0.5
        let mut scheduler = Scheduler::new(Policy::Priority, queues);
        let mut ready: VecDeque<_> = [task(1, 1, 1)].into();

        let planned = scheduler.plan(&mut ready, &mut loads);
        assert_eq!(planned[0].server_id, 1);
    }

    #[tokio::test]
    async fn dispatch_pushes_onto_queues() {
        let (queues, mut loads) = cluster(&[2, 2]);
        let mut scheduler = Scheduler::new(Policy::RoundRobin, queues.clone());
        let mut ready: VecDeque<_> = (1..=3).map(|i| task(i, 1, 1)).collect();

        let n = scheduler.dispatch(&mut ready, &mut loads).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(queues[&1].len().await, 2);
        assert_eq!(queues[&2].len().await, 1);
        match queues[&2].try_recv().await {
            Some(Dispatch::Run(t)) => assert_eq!(t.id, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_queue_returns_unqueued_tasks_uncharged() {
        let (queues, mut loads) = cluster(&[2, 2]);
        let mut scheduler = Scheduler::new(Policy::RoundRobin, queues.clone());
        scheduler.queues.remove(&2);
        let mut ready: VecDeque<_> = (1..=4).map(|i| task(i, 1, 1)).collect();

        let err = scheduler.dispatch(&mut ready, &mut loads).await.unwrap_err();
        assert_eq!(err, SchedulerError::NoQueue(2));

        // Task 1 reached server 1; tasks 2..=4 were planned after the gap.
        assert_eq!(queues[&1].len().await, 1);
        assert_eq!(queues[&2].len().await, 0);
        let left: Vec<_> = ready.iter().map(|t| t.id).collect();
        assert_eq!(left, vec![2, 3, 4]);
        assert_eq!(loads.load(1), Some(1));
        assert_eq!(loads.load(2), Some(0));
        assert_eq!(loads.underflows(), 0);
        assert_eq!(scheduler.dispatched()[&1], 1);
        assert_eq!(scheduler.dispatched()[&2], 0);
    }
}
