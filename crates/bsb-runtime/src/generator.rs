//! Request generator — the randomized arrival stream.
//!
//! Stamps a task from a uniformly sampled request type, sleeps a uniform
//! gap in `[arrival_interval_min, arrival_interval_max]`, and repeats
//! until the admission window closes. Expiry is checked only at loop entry,
//! right before a task is stamped. Once the window is closed it emits one
//! [`Admission::Done`] per worker and returns.

use std::time::Duration;

use bsb_core::{Admission, RequestType, SimulationConfig, Task, TaskId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Produces tasks from a fixed set of request type templates.
pub struct RequestGenerator {
    templates: Vec<RequestType>,
    interval_min: Duration,
    interval_max: Duration,
    duration: Duration,
    rng: StdRng,
    next_id: TaskId,
}

impl RequestGenerator {
    /// Build a generator from the simulation settings. A configured seed
    /// makes the arrival stream reproducible.
    pub fn new(templates: Vec<RequestType>, settings: &SimulationConfig) -> Self {
        let (interval_min, interval_max) = settings.arrival_range();
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            templates,
            interval_min,
            interval_max,
            duration: settings.duration(),
            rng,
            next_id: 1,
        }
    }

    /// Stamp the next task, or `None` if there are no templates.
    pub fn next_task(&mut self, now: Instant) -> Option<Task> {
        let template = self.templates.choose(&mut self.rng)?;
        let task = Task::from_template(self.next_id, template, now);
        self.next_id += 1;
        Some(task)
    }

    /// Sample the gap before the next arrival.
    pub fn next_gap(&mut self) -> Duration {
        if self.interval_max <= self.interval_min {
            return self.interval_min;
        }
        let secs = self
            .rng
            .gen_range(self.interval_min.as_secs_f64()..=self.interval_max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Produce tasks until `start + duration`, then signal `workers` times.
    /// Returns the number of tasks emitted.
    pub async fn run(
        mut self,
        start: Instant,
        workers: usize,
        admissions: mpsc::UnboundedSender<Admission>,
    ) -> u64 {
        let mut emitted = 0u64;

        loop {
            let now = Instant::now();
            if now.duration_since(start) >= self.duration {
                break;
            }
            let Some(task) = self.next_task(now) else {
                break;
            };
            info!(
                task_id = task.id,
                category = %task.category,
                cost_secs = task.cost.as_secs_f64(),
                priority = task.priority,
                "task generated"
            );
            if admissions.send(Admission::Task(task)).is_err() {
                debug!("admission channel closed, generator stopping early");
                return emitted;
            }
            emitted += 1;

            tokio::time::sleep(self.next_gap()).await;
        }

        for _ in 0..workers.max(1) {
            if admissions.send(Admission::Done).is_err() {
                break;
            }
        }
        info!(emitted, "generator finished");
        emitted
    }
}

/// Start the generator on its own task.
pub fn spawn_generator(
    request_types: Vec<RequestType>,
    settings: &SimulationConfig,
    start: Instant,
    workers: usize,
    admissions: mpsc::UnboundedSender<Admission>,
) -> JoinHandle<u64> {
    let generator = RequestGenerator::new(request_types, settings);
    tokio::spawn(generator.run(start, workers, admissions))
}
