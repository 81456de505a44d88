use std::path::Path;

use bsb_metrics::format_report;
use tracing::info;

use super::{Overrides, load_config};

pub async fn run(config_path: &Path, overrides: &Overrides, output: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path, overrides)?;
    info!(
        config = %config_path.display(),
        policy = %config.simulation.policy,
        "starting simulation"
    );

    let report = bsb_runtime::run_simulation_to(&config, output).await?;

    println!("{}", format_report(&report));
    println!("✓ Metrics written to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsb_metrics::SimulationReport;

    #[tokio::test(start_paused = true)]
    async fn writes_metrics_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::commands::tests::write_sample(dir.path());
        let output = dir.path().join("metrics.json");
        let overrides = Overrides {
            policy: Some("sjf".to_string()),
            ..Overrides::default()
        };

        run(&config, &overrides, &output).await.unwrap();

        let report = SimulationReport::read_json(&output).unwrap();
        assert_eq!(report.policy.as_str(), "sjf");
        assert_eq!(report.tasks_processed, report.tasks_admitted);
        assert!(!report.per_server_utilization.contains_key(&2));
    }
}
