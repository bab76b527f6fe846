//! Error handling for the vitals simulator
//!
//! One error type shared by every crate in the workspace. Binaries wrap it
//! in `anyhow` at the edges.

use thiserror::Error;

/// Result type alias for vitals operations
pub type VitalsResult<T> = Result<T, VitalsError>;

/// Error type for all vitals simulator operations
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum VitalsError {
    /// Simulator configuration rejected during validation
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error
        reason: String,
    },

    /// A vital-sign range whose bounds are inverted
    #[error("Invalid range for {field}: min {min} is greater than max {max}")]
    InvalidRange {
        /// Field the range applies to
        field: &'static str,
        /// Lower bound
        min: u16,
        /// Upper bound
        max: u16,
    },

    /// Blood pressure text that is not `systolic/diastolic`
    #[error("Invalid blood pressure '{input}': {reason}")]
    InvalidBloodPressure {
        /// Offending input
        input: String,
        /// What was wrong with it
        reason: &'static str,
    },

    /// `start()` called while the worker is alive
    #[error("Simulator is already running")]
    AlreadyRunning,

    /// `start()` called outside a tokio runtime
    #[error("No tokio runtime available to spawn the simulator worker")]
    NoRuntime,

    /// The worker task panicked, usually inside the observer
    #[error("Simulator worker panicked: {reason}")]
    WorkerPanicked {
        /// Panic or join error description
        reason: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {reason}")]
    Serialization {
        /// Serializer error description
        reason: String,
    },
}

impl VitalsError {
    /// Shorthand for [`VitalsError::InvalidConfig`]
    pub fn config(reason: impl Into<String>) -> Self {
        VitalsError::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for VitalsError {
    fn from(err: serde_json::Error) -> Self {
        VitalsError::Serialization {
            reason: err.to_string(),
        }
    }
}
