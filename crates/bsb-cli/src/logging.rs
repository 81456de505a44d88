//! Console logging: `tracing` records stamped with `[mm:ss]` since start.

use std::fmt;
use std::time::Instant;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

/// Formats the time elapsed since the process started as `[mm:ss]`.
#[derive(Debug, Clone, Copy)]
pub struct Elapsed {
    start: Instant,
}

impl Elapsed {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for Elapsed {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", format_clock(self.start.elapsed().as_secs()))
    }
}

fn format_clock(secs: u64) -> String {
    format!("[{:02}:{:02}]", secs / 60, secs % 60)
}

/// Install the global subscriber. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(Elapsed::new())
        .with_target(true);

    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))
    }
}
