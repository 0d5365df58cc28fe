//! Snapshot command implementation.
//!
//! Runs the baseline pass plus a few cycles in-process and prints the
//! latest snapshots or one history stream.

use anyhow::{Context, Result};
use herakles_live_monitor::snapshot::ProcessSortKey;
use herakles_live_monitor::{MetricStream, Monitor};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::cli::OutputFormat;
use crate::config::Config;

fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).context("failed to encode JSON output")?
        }
        OutputFormat::Yaml => serde_yaml::to_string(value).context("failed to encode YAML output")?,
    })
}

/// Samples `cycles` cycles and prints the result.
pub async fn command_snapshot(
    config: &Config,
    cycles: u64,
    format: OutputFormat,
    history: Option<MetricStream>,
    top: Option<usize>,
) -> Result<()> {
    let monitor = Monitor::new(config.monitor_config());
    let interval = Duration::from_millis(config.sampling.interval_ms);

    monitor.run_baseline().await;
    for _ in 0..cycles {
        tokio::time::sleep(interval).await;
        let plan = monitor.run_cycle().await;
        debug!("Cycle {} sampled {:?}", plan.cycle, plan.samplers);
    }

    let output = match history {
        Some(stream) => render(&monitor.history(stream), format)?,
        None => {
            let mut latest = monitor.latest();
            if let Some(list) = latest.processes.as_mut() {
                list.sort_by(ProcessSortKey::Cpu);
                if let Some(n) = top {
                    list.processes.truncate(n);
                }
            }
            render(&latest, format)?
        }
    };

    println!("{output}");

    for stats in monitor.sampler_stats() {
        if let Some(err) = stats.last_error {
            eprintln!("⚠️  {}: {}", stats.sampler, err);
        }
    }
    Ok(())
}
