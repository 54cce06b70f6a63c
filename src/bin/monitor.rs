//! borlacam_monitor - production monitoring loop
//!
//! Polls a deployed inference API, logs alerts, and writes a metrics
//! snapshot each cycle.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use borlacam::monitor::{Monitor, MonitorConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// API URL to monitor.
    #[arg(long, default_value = "http://localhost:8000")]
    url: String,
    /// Monitoring interval in seconds.
    #[arg(long, default_value_t = 300)]
    interval: u64,
    /// Run one cycle and print the report instead of looping.
    #[arg(long)]
    once: bool,
    /// Metrics snapshot path.
    #[arg(long, default_value = "logs/metrics.json")]
    metrics: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut monitor = Monitor::new(MonitorConfig {
        api_url: args.url.trim_end_matches('/').to_string(),
        metrics_path: args.metrics,
        ..MonitorConfig::default()
    });

    if args.once {
        let report = monitor.run_cycle();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    log::info!(
        "starting continuous monitoring (interval: {}s)",
        args.interval
    );
    loop {
        monitor.run_cycle();
        std::thread::sleep(Duration::from_secs(args.interval));
    }
}
