use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use vitals_simulation::{ObserverErrorPolicy, SimulatorConfig};

/// How each reading is written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `Received: {json}` per reading
    Json,
    /// Human-readable data log line
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ErrorPolicyArg {
    Stop,
    Continue,
}

impl From<ErrorPolicyArg> for ObserverErrorPolicy {
    fn from(arg: ErrorPolicyArg) -> Self {
        match arg {
            ErrorPolicyArg::Stop => ObserverErrorPolicy::Stop,
            ErrorPolicyArg::Continue => ObserverErrorPolicy::Continue,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "vitals-monitor",
    version,
    about = "Synthetic medical device vital-signs stream",
    after_help = "ENVIRONMENT VARIABLES:\n    RUST_LOG    Set log filter (e.g., RUST_LOG=debug,vitals_simulation=trace)"
)]
pub struct MonitorConfig {
    /// Run for a fixed duration then exit [default: until Ctrl-C]
    #[arg(long, value_name = "SECS")]
    pub run_seconds: Option<u64>,

    /// Period between readings in milliseconds [default: 1000]
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Readings kept in history [default: 100]
    #[arg(long, value_name = "N", conflicts_with = "no_history")]
    pub max_history: Option<usize>,

    /// Disable history tracking (the plot stays empty)
    #[arg(long)]
    pub no_history: bool,

    /// Random seed for a reproducible stream
    #[arg(long)]
    pub seed: Option<u64>,

    /// What to do when writing a reading fails [default: stop]
    #[arg(long, value_enum, value_name = "POLICY")]
    pub on_output_error: Option<ErrorPolicyArg>,

    /// Simulator configuration file (JSON); flags override its values
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the final plot view as JSON to this file
    #[arg(long, value_name = "PATH")]
    pub plot_out: Option<PathBuf>,

    /// Reading output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Output logs in JSON format (for log aggregation)
    #[arg(long)]
    pub json_logs: bool,
}

impl MonitorConfig {
    /// Simulator configuration from the config file, then flag overrides
    pub fn simulator_config(&self) -> anyhow::Result<SimulatorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                SimulatorConfig::from_json(&text)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => SimulatorConfig::default(),
        };

        if let Some(interval_ms) = self.interval_ms {
            config.tick_interval_ms = interval_ms;
        }
        if self.no_history {
            config.max_history = None;
        } else if let Some(max_history) = self.max_history {
            config.max_history = Some(max_history);
        }
        if let Some(seed) = self.seed {
            config.generator.seed = Some(seed);
        }
        if let Some(policy) = self.on_output_error {
            config.observer_error_policy = policy.into();
        }

        config.validate().context("invalid simulator configuration")?;
        Ok(config)
    }
}
