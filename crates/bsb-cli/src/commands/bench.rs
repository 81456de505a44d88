use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use bsb_core::{ClusterConfig, Policy};
use bsb_metrics::{PolicySummary, render_markdown};
use tracing::{info, warn};

use super::{Overrides, load_config};

pub async fn bench(
    config_path: &Path,
    rounds: u32,
    duration: Option<f64>,
    out_dir: &Path,
) -> anyhow::Result<()> {
    let overrides = Overrides {
        duration,
        ..Overrides::default()
    };
    let config = load_config(config_path, &overrides)?;

    let written = run_benchmark(&config, rounds, out_dir).await?;
    println!("✓ Benchmark complete:");
    for path in written {
        println!("    {}", path.display());
    }
    Ok(())
}

/// Run every policy `rounds` times, write `<policy>_stats.json` per policy
/// and `report.md`, and return the written paths.
pub async fn run_benchmark(
    config: &ClusterConfig,
    rounds: u32,
    out_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut summaries = Vec::new();
    let mut written = Vec::new();

    for policy in Policy::ALL {
        let mut reports = Vec::new();
        for round in 1..=rounds.max(1) {
            let round_config = round_config(config, policy, round);
            info!(%policy, round, rounds, "benchmark round starting");
            match bsb_runtime::run_simulation(&round_config).await {
                Ok(report) => reports.push(report),
                Err(e) => warn!(%policy, round, error = %e, "benchmark round failed"),
            }
        }
        if reports.is_empty() {
            warn!(%policy, "no successful rounds, policy skipped");
            continue;
        }

        let summary = PolicySummary::from_reports(policy, &reports);
        let path = out_dir.join(format!("{policy}_stats.json"));
        summary.write_json(&path)?;
        written.push(path);
        summaries.push(summary);
    }

    let generated_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let report_path = out_dir.join("report.md");
    std::fs::write(&report_path, render_markdown(&summaries, generated_at))
        .with_context(|| format!("writing {}", report_path.display()))?;
    info!(path = %report_path.display(), policies = summaries.len(), "comparison report written");
    written.push(report_path);

    Ok(written)
}

/// The config for one round: the policy under test, and a per-round seed
/// when the base config is seeded so rounds differ but stay reproducible.
fn round_config(base: &ClusterConfig, policy: Policy, round: u32) -> ClusterConfig {
    let mut config = base.clone();
    config.simulation.policy = policy;
    config.simulation.seed = base
        .simulation
        .seed
        .map(|seed| seed.wrapping_add(u64::from(round)));
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_get_distinct_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = crate::commands::tests::write_sample(dir.path());
        let base = load_config(&path, &Overrides::default()).unwrap();

        let a = round_config(&base, Policy::ShortestJobFirst, 1);
        let b = round_config(&base, Policy::ShortestJobFirst, 2);
        assert_eq!(a.simulation.policy, Policy::ShortestJobFirst);
        assert_eq!(a.simulation.seed, Some(6));
        assert_eq!(b.simulation.seed, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn writes_stats_and_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = crate::commands::tests::write_sample(dir.path());
        let config = load_config(&path, &Overrides::default()).unwrap();
        let out_dir = dir.path().join("results");

        let written = run_benchmark(&config, 2, &out_dir).await.unwrap();
        assert_eq!(written.len(), 4);

        for policy in Policy::ALL {
            let stats = out_dir.join(format!("{policy}_stats.json"));
            let summary: PolicySummary = read_summary(&stats);
            assert_eq!(summary.rounds, 2);
            assert_eq!(summary.policy, policy);
        }
        let md = std::fs::read_to_string(out_dir.join("report.md")).unwrap();
        assert!(md.contains("| sjf | 2 |"));
        assert!(md.contains("Best throughput"));
    }

    fn read_summary(path: &Path) -> PolicySummary {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }
}
