pub mod bench;
pub mod check;
pub mod run;

use std::path::Path;

use anyhow::Context;
use bsb_core::{ClusterConfig, Policy};

/// Command-line settings that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub policy: Option<String>,
    pub duration: Option<f64>,
    pub seed: Option<u64>,
}

/// Load a config file, apply overrides, and validate the result.
pub fn load_config(path: &Path, overrides: &Overrides) -> anyhow::Result<ClusterConfig> {
    let mut config = ClusterConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;

    if let Some(policy) = &overrides.policy {
        config.simulation.policy = policy.parse::<Policy>()?;
    }
    if let Some(duration) = overrides.duration {
        config.simulation.duration = duration;
    }
    if let Some(seed) = overrides.seed {
        config.simulation.seed = Some(seed);
    }

    config.validate()?;
    Ok(config)
}
