//! Monitor application: wires one simulator to an output stream

use crate::config::{MonitorConfig, OutputFormat};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use vitals_core::{Reading, VitalsResult};
use vitals_simulation::MedicalDeviceSimulator;

/// Render one reading for the output stream
pub fn render_reading(format: OutputFormat, reading: &Reading) -> VitalsResult<String> {
    match format {
        OutputFormat::Json => Ok(format!("Received: {}", reading.to_json()?)),
        OutputFormat::Text => Ok(format!(
            "[{}] HR {} bpm | BP {} mmHg | SpO2 {}%",
            format_timestamp(reading.timestamp),
            reading.heart_rate,
            reading.blood_pressure,
            reading.spo2
        )),
    }
}

fn format_timestamp(timestamp: f64) -> String {
    let secs = timestamp.trunc() as i64;
    let nanos = (timestamp.fract() * 1e9) as u32;
    match DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => format!("{:.3}", timestamp),
    }
}

/// Why the run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    DurationElapsed,
    Interrupted,
    /// The worker ended itself after an output failure
    WorkerExited,
}

pub struct MonitorApp {
    config: MonitorConfig,
    simulator: MedicalDeviceSimulator,
    /// Held for the length of a run
    run_lock: tokio::sync::Mutex<()>,
}

impl MonitorApp {
    pub fn new(config: MonitorConfig) -> anyhow::Result<Self> {
        let simulator_config = config.simulator_config()?;
        let simulator = MedicalDeviceSimulator::new(simulator_config)
            .context("failed to create simulator")?;

        Ok(MonitorApp {
            config,
            simulator,
            run_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn simulator(&self) -> &MedicalDeviceSimulator {
        &self.simulator
    }

    /// Stream readings to stdout until the run ends
    pub async fn run(&self) -> anyhow::Result<RunEnd> {
        let run_for = self.config.run_seconds.map(Duration::from_secs);
        self.run_with_writer(std::io::stdout(), run_for).await
    }

    /// Stream readings to `writer` for `run_for`, or until Ctrl-C when `None`
    pub async fn run_with_writer<W>(&self, mut writer: W, run_for: Option<Duration>) -> anyhow::Result<RunEnd>
    where
        W: Write + Send + 'static,
    {
        // Nothing else may own the stream when the writer goes in.
        let Ok(_run) = self.run_lock.try_lock() else {
            anyhow::bail!("monitor is already running");
        };
        if self.simulator.is_running() {
            anyhow::bail!("data stream is already running");
        }

        let format = self.config.format;
        self.simulator.set_callback(move |reading| {
            writeln!(writer, "{}", render_reading(format, reading)?)?;
            writer.flush()?;
            Ok(())
        });

        if let Err(e) = self.simulator.start() {
            self.simulator.clear_callback();
            return Err(e).context("failed to start data stream");
        }

        let end = tokio::select! {
            _ = sleep_or_forever(run_for) => RunEnd::DurationElapsed,
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl-C")?;
                RunEnd::Interrupted
            }
            _ = self.simulator.stopped() => RunEnd::WorkerExited,
        };

        self.simulator.stop().await.context("data stream ended abnormally")?;
        self.simulator.clear_callback();

        let stats = self.simulator.stats();
        match end {
            RunEnd::WorkerExited => warn!(
                readings_generated = stats.readings_generated,
                observer_failures = stats.observer_failures,
                "Data stream ended after an output failure"
            ),
            _ => info!(
                readings_generated = stats.readings_generated,
                history_len = stats.history_len,
                reason = ?end,
                "Run complete"
            ),
        }

        if let Some(path) = &self.config.plot_out {
            self.write_plot(path)?;
        }

        Ok(end)
    }

    /// Write the current plot view as JSON
    pub fn write_plot(&self, path: &Path) -> anyhow::Result<()> {
        let plot = self.simulator.plot();
        let json = plot.to_json().context("failed to serialize plot")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write plot to {}", path.display()))?;
        info!(path = %path.display(), panels = plot.panels.len(), "Plot written");
        Ok(())
    }
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}
