//! Vitals Monitor - streams synthetic vital signs to stdout

mod app;
mod config;
mod logging;

use app::{MonitorApp, RunEnd};
use clap::Parser;
use config::MonitorConfig;
use logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MonitorConfig::parse();
    init_tracing(config.json_logs);

    let app = MonitorApp::new(config)?;
    if app.run().await? == RunEnd::WorkerExited {
        anyhow::bail!(
            "data stream ended after {} output failure(s)",
            app.simulator().stats().observer_failures
        );
    }

    Ok(())
}
