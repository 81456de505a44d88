//! Benchmark summaries across repeated runs of each policy.

use std::path::Path;

use bsb_core::Policy;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::report::{SimulationReport, round2};

/// Descriptive statistics of one metric over a set of runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Stat {
    /// Returns the zero stat for an empty sample.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            mean: round2(mean),
            std: round2(variance.sqrt()),
            min: round2(min),
            max: round2(max),
        }
    }
}

/// Per-policy statistics over all benchmark rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub policy: Policy,
    pub rounds: usize,
    pub tasks_processed: Stat,
    pub mean_response_time: Stat,
    pub throughput: Stat,
    pub mean_cpu_utilization: Stat,
    pub mean_wait_time: Stat,
    pub max_wait_time: Stat,
}

impl PolicySummary {
    pub fn from_reports(policy: Policy, reports: &[SimulationReport]) -> Self {
        let stat = |f: fn(&SimulationReport) -> f64| {
            let samples: Vec<f64> = reports.iter().map(f).collect();
            Stat::from_samples(&samples)
        };
        Self {
            policy,
            rounds: reports.len(),
            tasks_processed: stat(|r| r.tasks_processed as f64),
            mean_response_time: stat(|r| r.mean_response_time),
            throughput: stat(|r| r.throughput),
            mean_cpu_utilization: stat(|r| r.mean_cpu_utilization),
            mean_wait_time: stat(|r| r.mean_wait_time),
            max_wait_time: stat(|r| r.max_wait_time),
        }
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), policy = %self.policy, "policy summary written");
        Ok(())
    }
}

fn best_by(
    summaries: &[PolicySummary],
    key: impl Fn(&PolicySummary) -> f64,
    higher_is_better: bool,
) -> Option<&PolicySummary> {
    summaries.iter().reduce(|best, s| {
        let (a, b) = (key(s), key(best));
        let better = if higher_is_better { a > b } else { a < b };
        if better { s } else { best }
    })
}

/// Render the comparative benchmark report as Markdown.
pub fn render_markdown(summaries: &[PolicySummary], generated_at_epoch: u64) -> String {
    let mut md = String::new();

    md.push_str("# BSB Compute — Policy Comparison\n\n");
    md.push_str(&format!("Generated at (unix epoch): {generated_at_epoch}\n\n"));

    md.push_str("## Results\n\n");
    md.push_str(
        "| Policy | Rounds | Tasks | Response (s) | Throughput (tasks/s) | CPU (%) | Wait (s) | Max wait (s) |\n",
    );
    md.push_str("|---|---|---|---|---|---|---|---|\n");
    for s in summaries {
        md.push_str(&format!(
            "| {} | {} | {:.1} ± {:.1} | {:.2} ± {:.2} | {:.2} ± {:.2} | {:.1} ± {:.1} | {:.2} ± {:.2} | {:.2} |\n",
            s.policy,
            s.rounds,
            s.tasks_processed.mean,
            s.tasks_processed.std,
            s.mean_response_time.mean,
            s.mean_response_time.std,
            s.throughput.mean,
            s.throughput.std,
            s.mean_cpu_utilization.mean,
            s.mean_cpu_utilization.std,
            s.mean_wait_time.mean,
            s.mean_wait_time.std,
            s.max_wait_time.max,
        ));
    }

    let best_throughput = best_by(summaries, |s| s.throughput.mean, true);
    let best_response = best_by(summaries, |s| s.mean_response_time.mean, false);
    let best_utilization = best_by(summaries, |s| s.mean_cpu_utilization.mean, true);

    md.push_str("\n## Highlights\n\n");
    if let Some(s) = best_throughput {
        md.push_str(&format!(
            "- Best throughput: **{}** ({:.2} tasks/s)\n",
            s.policy, s.throughput.mean
        ));
    }
    if let Some(s) = best_response {
        md.push_str(&format!(
            "- Lowest mean response time: **{}** ({:.2}s)\n",
            s.policy, s.mean_response_time.mean
        ));
    }
    if let Some(s) = best_utilization {
        md.push_str(&format!(
            "- Best CPU utilization: **{}** ({:.1}%)\n",
            s.policy, s.mean_cpu_utilization.mean
        ));
    }

    md.push_str("\n## Recommendations\n\n");
    if summaries.is_empty() {
        md.push_str("No runs were recorded.\n");
        return md;
    }
    if let Some(s) = best_response {
        md.push_str(&format!(
            "- Latency-sensitive workloads: prefer `{}`.\n",
            s.policy
        ));
    }
    if let Some(s) = best_throughput {
        md.push_str(&format!("- Batch workloads: prefer `{}`.\n", s.policy));
    }
    if let Some(s) = summaries.iter().find(|s| s.policy == Policy::Priority) {
        md.push_str(&format!(
            "- Mixed criticality: `{}` keeps high-priority categories ahead (mean wait {:.2}s).\n",
            s.policy, s.mean_wait_time.mean
        ));
    }
    let noisy: Vec<String> = summaries
        .iter()
        .filter(|s| s.throughput.mean > 0.0 && s.throughput.std / s.throughput.mean > 0.25)
        .map(|s| s.policy.to_string())
        .collect();
    if !noisy.is_empty() {
        md.push_str(&format!(
            "- High run-to-run variance for {}; increase the round count before drawing conclusions.\n",
            noisy.join(", ")
        ));
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn report(policy: Policy, processed: u64, response: f64, throughput: f64, cpu: f64) -> SimulationReport {
        SimulationReport {
            policy,
            tasks_processed: processed,
            tasks_admitted: processed,
            total_simulation_time: 20.0,
            mean_wait_time: 1.0,
            max_wait_time: 3.0,
            mean_exec_time: 2.0,
            mean_response_time: response,
            throughput,
            mean_cpu_utilization: cpu,
            per_server_utilization: BTreeMap::new(),
            tasks_per_server: BTreeMap::new(),
            migrations: 0,
            redirects: 0,
            load_underflows: 0,
        }
    }

    #[test]
    fn stat_uses_population_std() {
        let s = Stat::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(s.mean, 5.0);
        assert_eq!(s.std, 2.0);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
    }

    #[test]
    fn stat_of_nothing_is_zero() {
        assert_eq!(Stat::from_samples(&[]), Stat::default());
    }

    #[test]
    fn summary_over_rounds() {
        let reports = vec![
            report(Policy::RoundRobin, 10, 3.0, 0.5, 40.0),
            report(Policy::RoundRobin, 14, 5.0, 0.7, 60.0),
        ];
        let s = PolicySummary::from_reports(Policy::RoundRobin, &reports);
        assert_eq!(s.rounds, 2);
        assert_eq!(s.tasks_processed.mean, 12.0);
        assert_eq!(s.tasks_processed.std, 2.0);
        assert_eq!(s.mean_response_time.min, 3.0);
        assert_eq!(s.mean_cpu_utilization.max, 60.0);
    }

    #[test]
    fn markdown_highlights_winners() {
        let summaries = vec![
            PolicySummary::from_reports(
                Policy::RoundRobin,
                &[report(Policy::RoundRobin, 10, 4.0, 0.5, 50.0)],
            ),
            PolicySummary::from_reports(
                Policy::ShortestJobFirst,
                &[report(Policy::ShortestJobFirst, 12, 2.5, 0.6, 45.0)],
            ),
            PolicySummary::from_reports(
                Policy::Priority,
                &[report(Policy::Priority, 11, 3.0, 0.55, 55.0)],
            ),
        ];
        let md = render_markdown(&summaries, 1_700_000_000);

        assert!(md.contains("1700000000"));
        assert!(md.contains("| round_robin | 1 |"));
        assert!(md.contains("Best throughput: **sjf**"));
        assert!(md.contains("Lowest mean response time: **sjf**"));
        assert!(md.contains("Best CPU utilization: **prioridade**"));
        assert!(md.contains("Mixed criticality"));
    }

    #[test]
    fn markdown_without_runs() {
        let md = render_markdown(&[], 0);
        assert!(md.contains("No runs were recorded."));
    }

    #[test]
    fn summary_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sjf_stats.json");
        let s = PolicySummary::from_reports(
            Policy::ShortestJobFirst,
            &[report(Policy::ShortestJobFirst, 5, 2.0, 0.25, 30.0)],
        );
        s.write_json(&path).unwrap();
        let back: PolicySummary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, s);
    }
}
