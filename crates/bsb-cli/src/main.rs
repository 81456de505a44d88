//! bsb — command-line front end for the BSB Compute cluster simulator.
//!
//! # Usage
//!
//! ```text
//! bsb run   --config cluster.json --policy sjf --output metrics.json
//! bsb bench --config cluster.json --rounds 3 --out-dir results
//! bsb check --config cluster.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod logging;

#[derive(Parser)]
#[command(
    name = "bsb",
    about = "BSB Compute — cluster scheduling simulator",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines instead of text.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation and write its metrics report.
    Run {
        /// Cluster config file (.json or .toml)
        #[arg(short, long)]
        config: PathBuf,
        /// Scheduling policy: round_robin, sjf, prioridade
        #[arg(short, long)]
        policy: Option<String>,
        /// Admission window in seconds
        #[arg(short, long)]
        duration: Option<f64>,
        /// Seed for a reproducible arrival stream
        #[arg(long)]
        seed: Option<u64>,
        /// Where to write the metrics report
        #[arg(short, long, default_value = "metrics.json")]
        output: PathBuf,
    },
    /// Run every policy several times and compare them.
    Bench {
        #[arg(short, long)]
        config: PathBuf,
        /// Runs per policy
        #[arg(short, long, default_value = "3")]
        rounds: u32,
        #[arg(short, long)]
        duration: Option<f64>,
        /// Directory for per-policy statistics and report.md
        #[arg(long, default_value = "results")]
        out_dir: PathBuf,
    },
    /// Load and validate a config file without running it.
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json)?;

    match cli.command {
        Commands::Run {
            config,
            policy,
            duration,
            seed,
            output,
        } => {
            let overrides = commands::Overrides {
                policy,
                duration,
                seed,
            };
            commands::run::run(&config, &overrides, &output).await
        }
        Commands::Bench {
            config,
            rounds,
            duration,
            out_dir,
        } => commands::bench::bench(&config, rounds, duration, &out_dir).await,
        Commands::Check { config } => commands::check::check(&config),
    }
}
