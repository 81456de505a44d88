//! Server worker — executes dispatched tasks one at a time.
//!
//! Each worker is bound to a single server and drains that server's
//! dispatch queue. Execution is simulated by sleeping for `task.cost`.
//! Receives use a bounded timeout so an idle worker keeps looping; only
//! a [`Dispatch::Shutdown`] marker ends it.

use std::sync::Arc;
use std::time::Duration;

use bsb_core::{Dispatch, ServerId, TaskResult};
use bsb_scheduler::DispatchQueue;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Run the receive loop for `server_id` until a termination marker arrives.
/// Returns the number of tasks executed.
pub async fn run_worker(
    server_id: ServerId,
    queue: Arc<DispatchQueue>,
    completions: mpsc::UnboundedSender<TaskResult>,
    recv_timeout: Duration,
) -> u64 {
    let mut executed = 0u64;
    debug!(server_id, "worker started");

    loop {
        let task = match queue.recv_timeout(recv_timeout).await {
            None => {
                trace!(server_id, "worker idle");
                continue;
            }
            Some(Dispatch::Shutdown) => break,
            Some(Dispatch::Run(task)) => task,
        };

        let picked_up = Instant::now();
        let wait = picked_up.saturating_duration_since(task.created_at);
        info!(
            task_id = task.id,
            server_id,
            category = %task.category,
            wait_secs = wait.as_secs_f64(),
            "task started"
        );

        tokio::time::sleep(task.cost).await;
        let exec = picked_up.elapsed();
        executed += 1;

        info!(
            task_id = task.id,
            server_id,
            exec_secs = exec.as_secs_f64(),
            "task completed"
        );

        let result = TaskResult {
            task_id: task.id,
            server_id,
            wait,
            exec,
        };
        if completions.send(result).is_err() {
            debug!(server_id, "completion channel closed, worker stopping");
            break;
        }
    }

    info!(server_id, executed, "worker stopped");
    executed
}

/// Start a worker for `server_id` on its own task.
pub fn spawn_worker(
    server_id: ServerId,
    queue: Arc<DispatchQueue>,
    completions: mpsc::UnboundedSender<TaskResult>,
    recv_timeout: Duration,
) -> JoinHandle<u64> {
    tokio::spawn(run_worker(server_id, queue, completions, recv_timeout))
}
