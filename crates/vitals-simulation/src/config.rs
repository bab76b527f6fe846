//! Simulator configuration

use crate::history::DEFAULT_MAX_HISTORY;
use crate::vitals_generator::GeneratorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vitals_core::{VitalsError, VitalsResult};

/// What the worker does when the observer returns an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverErrorPolicy {
    /// Log the error and end the generation loop
    #[default]
    Stop,
    /// Log the error and keep generating
    Continue,
}

/// Configuration for [`crate::MedicalDeviceSimulator`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Readings kept in history; `None` disables history tracking
    pub max_history: Option<usize>,
    /// Period between readings in milliseconds
    pub tick_interval_ms: u64,
    pub observer_error_policy: ObserverErrorPolicy,
    pub generator: GeneratorConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_history: Some(DEFAULT_MAX_HISTORY),
            tick_interval_ms: 1000,
            observer_error_policy: ObserverErrorPolicy::Stop,
            generator: GeneratorConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Validate configuration
    pub fn validate(&self) -> VitalsResult<()> {
        if self.max_history == Some(0) {
            return Err(VitalsError::config(
                "max_history must be at least 1, use null to disable history",
            ));
        }

        if self.tick_interval_ms == 0 {
            return Err(VitalsError::config("tick_interval_ms must be positive"));
        }

        self.generator.ranges.validate()
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> VitalsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Import configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> VitalsResult<Self> {
        let config: SimulatorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
