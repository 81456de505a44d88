use std::path::Path;

use super::{Overrides, load_config};

pub fn check(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path, &Overrides::default())?;
    println!("{}", describe(&config));
    Ok(())
}

fn describe(config: &bsb_core::ClusterConfig) -> String {
    let active: Vec<_> = config.active_servers().collect();
    let capacity: u32 = active.iter().map(|s| s.capacity).sum();
    let sim = &config.simulation;

    let mut out = String::new();
    out.push_str("✓ Configuration is valid\n\n");
    out.push_str(&format!(
        "  Servers:        {} ({} active, total capacity {})\n",
        config.servers.len(),
        active.len(),
        capacity
    ));
    for s in &config.servers {
        out.push_str(&format!(
            "    server {:<4} capacity {:<3} speed {:.1}  {:?}\n",
            s.id, s.capacity, s.speed, s.status
        ));
    }
    out.push_str(&format!("  Request types:  {}\n", config.request_types.len()));
    for r in &config.request_types {
        out.push_str(&format!(
            "    {:<12} weight {:<3} service {:.2}s\n",
            r.category, r.weight, r.service_time
        ));
    }
    out.push_str(&format!("  Policy:         {}\n", sim.policy));
    out.push_str(&format!(
        "  Arrivals:       every {:.2}s to {:.2}s for {:.1}s\n",
        sim.arrival_interval_min, sim.arrival_interval_max, sim.duration
    ));
    out.push_str(&format!(
        "  Rebalancing:    every {} ticks of {}ms, threshold {:.2}\n",
        sim.migration_every, sim.tick_interval_ms, sim.migration_threshold
    ));
    out
}
