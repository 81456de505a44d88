//! bsb-runtime — runs a BSB Compute cluster simulation end to end.
//!
//! Wires the three concurrent pieces of a run together:
//!
//! - **Generator**: one task producing the randomized arrival stream
//! - **Workers**: one task per active server, executing serially
//! - **Orchestrator**: the control loop that admits, dispatches,
//!   rebalances and detects quiescence
//!
//! # Architecture
//!
//! ```text
//! Generator ──admission──► Orchestrator ──DispatchQueue──► Worker (per server)
//!                             ▲                              │
//!                             └──────────completion──────────┘
//! ```

pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod worker;

use std::path::Path;

use bsb_core::ClusterConfig;
use bsb_metrics::SimulationReport;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::info;

pub use error::{SimError, SimResult};
pub use generator::{RequestGenerator, spawn_generator};
pub use orchestrator::{Orchestrator, Phase};
pub use worker::{run_worker, spawn_worker};

/// Run one simulation to quiescence and return its report.
///
/// The configuration is validated before anything is spawned. Wall time
/// runs from start until every worker has exited.
pub async fn run_simulation(config: &ClusterConfig) -> SimResult<SimulationReport> {
    config.validate()?;
    let settings = &config.simulation;
    let start = Instant::now();

    let mut orchestrator = Orchestrator::new(&config.servers, settings, start);

    let (completion_tx, mut completion_rx) = mpsc::unbounded_channel();
    let workers: Vec<_> = orchestrator
        .queues()
        .iter()
        .map(|(id, queue)| {
            spawn_worker(
                *id,
                queue.clone(),
                completion_tx.clone(),
                settings.worker_recv_timeout(),
            )
        })
        .collect();
    drop(completion_tx);

    let (admission_tx, mut admission_rx) = mpsc::unbounded_channel();
    let generator = spawn_generator(
        config.request_types.clone(),
        settings,
        start,
        workers.len(),
        admission_tx,
    );

    info!(
        policy = %settings.policy,
        workers = workers.len(),
        request_types = config.request_types.len(),
        "simulation started"
    );

    let outcome = orchestrator.run(&mut admission_rx, &mut completion_rx).await;

    // Workers are stopped even when the control loop failed.
    orchestrator.shutdown().await;
    let mut executed = 0u64;
    for handle in workers {
        executed += handle.await.map_err(|source| SimError::Join {
            component: "worker",
            source,
        })?;
    }
    let wall_time = start.elapsed();
    drop(admission_rx);
    let emitted = generator.await.map_err(|source| SimError::Join {
        component: "generator",
        source,
    })?;
    outcome?;

    while let Ok(result) = completion_rx.try_recv() {
        orchestrator.complete(&result);
    }

    let report = orchestrator.report(wall_time);
    info!(
        emitted,
        executed,
        processed = report.tasks_processed,
        wall_secs = wall_time.as_secs_f64(),
        "simulation finished"
    );
    Ok(report)
}

/// Run one simulation and persist its report as JSON at `output`.
pub async fn run_simulation_to(
    config: &ClusterConfig,
    output: &Path,
) -> SimResult<SimulationReport> {
    let report = run_simulation(config).await?;
    report
        .write_json(output)
        .map_err(|e| SimError::Report {
            path: output.to_path_buf(),
            reason: format!("{e:#}"),
        })?;
    Ok(report)
}
