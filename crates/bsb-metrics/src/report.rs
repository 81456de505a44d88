//! Final run report — the metrics document persisted after shutdown.

use std::collections::BTreeMap;
use std::path::Path;

use bsb_core::{Policy, ServerId};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Aggregate metrics of one simulation run.
///
/// Times are in seconds, utilization in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub policy: Policy,
    pub tasks_processed: u64,
    #[serde(default)]
    pub tasks_admitted: u64,
    pub total_simulation_time: f64,
    pub mean_wait_time: f64,
    pub max_wait_time: f64,
    pub mean_exec_time: f64,
    pub mean_response_time: f64,
    /// Completed tasks per second of wall time.
    pub throughput: f64,
    pub mean_cpu_utilization: f64,
    pub per_server_utilization: BTreeMap<ServerId, f64>,
    #[serde(default)]
    pub tasks_per_server: BTreeMap<ServerId, u64>,
    #[serde(default)]
    pub migrations: u64,
    #[serde(default)]
    pub redirects: u64,
    #[serde(default)]
    pub load_underflows: u64,
}

impl SimulationReport {
    /// Persist the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), policy = %self.policy, "metrics report written");
        Ok(())
    }

    pub fn read_json(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Human-readable run summary for the console.
pub fn format_report(report: &SimulationReport) -> String {
    let mut out = String::new();

    out.push_str("\n╔══════════════════════════════════════════╗\n");
    out.push_str("║  BSB Compute — Final Report              ║\n");
    out.push_str("╠══════════════════════════════════════════╣\n");
    out.push_str(&format!("║  Policy:     {:<28}║\n", report.policy));
    out.push_str(&format!(
        "║  Processed:  {:<28}║\n",
        format!("{} of {} admitted", report.tasks_processed, report.tasks_admitted)
    ));
    out.push_str(&format!(
        "║  Wall time:  {:<28}║\n",
        format!("{:.2}s", report.total_simulation_time)
    ));
    out.push_str("╚══════════════════════════════════════════╝\n\n");

    out.push_str(&format!("  Mean wait:      {:.2}s\n", report.mean_wait_time));
    out.push_str(&format!("  Max wait:       {:.2}s\n", report.max_wait_time));
    out.push_str(&format!("  Mean exec:      {:.2}s\n", report.mean_exec_time));
    out.push_str(&format!("  Mean response:  {:.2}s\n", report.mean_response_time));
    out.push_str(&format!("  Throughput:     {:.2} tasks/s\n", report.throughput));
    out.push_str(&format!("  CPU (mean):     {:.1}%\n\n", report.mean_cpu_utilization));

    out.push_str("  Per server:\n");
    for (id, util) in &report.per_server_utilization {
        let done = report.tasks_per_server.get(id).copied().unwrap_or_default();
        out.push_str(&format!("    server {id:<4} {util:>5.1}%  {done} tasks\n"));
    }

    if report.migrations > 0 || report.redirects > 0 || report.load_underflows > 0 {
        out.push('\n');
        out.push_str(&format!(
            "  Migrations: {}  Redirects: {}  Load underflows: {}\n",
            report.migrations, report.redirects, report.load_underflows
        ));
    }

    out
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SimulationReport {
        SimulationReport {
            policy: Policy::Priority,
            tasks_processed: 12,
            tasks_admitted: 12,
            total_simulation_time: 18.4,
            mean_wait_time: 1.25,
            max_wait_time: 4.1,
            mean_exec_time: 2.0,
            mean_response_time: 3.25,
            throughput: 0.65,
            mean_cpu_utilization: 61.5,
            per_server_utilization: [(1, 70.0), (2, 53.0)].into(),
            tasks_per_server: [(1, 7), (2, 5)].into(),
            migrations: 2,
            redirects: 0,
            load_underflows: 0,
        }
    }

    #[test]
    fn json_uses_documented_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        for key in [
            "policy",
            "tasks_processed",
            "total_simulation_time",
            "mean_wait_time",
            "max_wait_time",
            "mean_exec_time",
            "mean_response_time",
            "throughput",
            "mean_cpu_utilization",
            "per_server_utilization",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["policy"], "prioridade");
        assert_eq!(value["per_server_utilization"]["1"], 70.0);
    }

    #[test]
    fn reads_minimal_document() {
        let json = r#"{
            "policy": "sjf",
            "tasks_processed": 3,
            "total_simulation_time": 15.2,
            "mean_wait_time": 0.4,
            "max_wait_time": 1.1,
            "mean_exec_time": 2.0,
            "mean_response_time": 2.4,
            "throughput": 0.2,
            "mean_cpu_utilization": 40.0,
            "per_server_utilization": {"1": 40.0}
        }"#;
        let r: SimulationReport = serde_json::from_str(json).unwrap();
        assert_eq!(r.policy, Policy::ShortestJobFirst);
        assert_eq!(r.per_server_utilization[&1], 40.0);
        assert_eq!(r.migrations, 0);
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        sample().write_json(&path).unwrap();
        assert_eq!(SimulationReport::read_json(&path).unwrap(), sample());
    }

    #[test]
    fn format_report_lists_servers() {
        let text = format_report(&sample());
        assert!(text.contains("prioridade"));
        assert!(text.contains("12 of 12 admitted"));
        assert!(text.contains("server 1"));
        assert!(text.contains("Migrations: 2"));
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(0.005), 0.01);
        assert_eq!(round1(33.333), 33.3);
    }
}
