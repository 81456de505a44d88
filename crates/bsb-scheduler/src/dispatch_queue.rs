//! Per-server dispatch queue.
//!
//! The channel between the orchestrator and one worker. Unlike a plain
//! mpsc channel, the producer side can also take back a pending task,
//! which is what the load balancer needs to migrate queued work.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bsb_core::{Dispatch, ServerId, Task};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::trace;

/// Dispatch queues keyed by server id.
pub type QueueMap = BTreeMap<ServerId, Arc<DispatchQueue>>;

/// FIFO of dispatch messages for a single server.
///
/// One consumer (the server's worker); any number of producers.
#[derive(Debug)]
pub struct DispatchQueue {
    server_id: ServerId,
    /// Messages not yet picked up by the worker.
    pending: Mutex<VecDeque<Dispatch>>,
    notify: Notify,
}

impl DispatchQueue {
    pub fn new(server_id: ServerId) -> Self {
        Self {
            server_id,
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Build one queue per active server.
    pub fn for_servers(server_ids: impl IntoIterator<Item = ServerId>) -> QueueMap {
        server_ids
            .into_iter()
            .map(|id| (id, Arc::new(DispatchQueue::new(id))))
            .collect()
    }

    /// Append a message and wake the worker.
    pub async fn push(&self, msg: Dispatch) {
        self.pending.lock().await.push_back(msg);
        self.notify.notify_one();
    }

    /// Take the oldest pending task, if any, without blocking.
    ///
    /// Termination markers are never stolen. A task the worker has already
    /// picked up is no longer in the queue and cannot be taken.
    pub async fn steal(&self) -> Option<Task> {
        let mut pending = self.pending.lock().await;
        let idx = pending.iter().position(|m| matches!(m, Dispatch::Run(_)))?;
        match pending.remove(idx) {
            Some(Dispatch::Run(task)) => {
                trace!(server_id = self.server_id, task_id = task.id, "pending task taken");
                Some(task)
            }
            _ => None,
        }
    }

    /// Pop the next message without waiting.
    pub async fn try_recv(&self) -> Option<Dispatch> {
        self.pending.lock().await.pop_front()
    }

    /// Pop the next message, waiting up to `timeout`. `None` means the
    /// timeout elapsed with nothing to do.
    pub async fn recv_timeout(&self, timeout: Duration) -> Option<Dispatch> {
        // A timeout past the clock's range means waiting without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(msg) = self.try_recv().await {
                return Some(msg);
            }
            // A notify_one with no waiter leaves a permit behind, so a push
            // between the check above and this await is not lost.
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, self.notify.notified())
                        .await
                        .is_err()
                    {
                        return None;
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    /// Number of messages waiting.
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }
}
