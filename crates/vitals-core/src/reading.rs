//! Vital-sign reading types and their value ranges

use crate::error::{VitalsError, VitalsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Blood pressure pair, serialized as `"systolic/diastolic"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BloodPressure {
    /// Systolic pressure in mmHg
    pub systolic: u16,
    /// Diastolic pressure in mmHg
    pub diastolic: u16,
}

impl BloodPressure {
    pub const fn new(systolic: u16, diastolic: u16) -> Self {
        Self {
            systolic,
            diastolic,
        }
    }
}

impl fmt::Display for BloodPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.systolic, self.diastolic)
    }
}

impl FromStr for BloodPressure {
    type Err = VitalsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| VitalsError::InvalidBloodPressure {
            input: s.to_string(),
            reason,
        };

        let (systolic, diastolic) = s
            .split_once('/')
            .ok_or_else(|| invalid("expected 'systolic/diastolic'"))?;
        let systolic = systolic
            .trim()
            .parse::<u16>()
            .map_err(|_| invalid("systolic is not an integer"))?;
        let diastolic = diastolic
            .trim()
            .parse::<u16>()
            .map_err(|_| invalid("diastolic is not an integer"))?;

        Ok(BloodPressure::new(systolic, diastolic))
    }
}

impl From<BloodPressure> for String {
    fn from(bp: BloodPressure) -> Self {
        bp.to_string()
    }
}

impl TryFrom<String> for BloodPressure {
    type Error = VitalsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One sampled vital-signs observation
///
/// Serializes as a flat JSON object:
/// `{"timestamp": 1700000000.25, "heart_rate": 72, "blood_pressure": "120/80", "spo2": 98}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    /// Beats per minute
    pub heart_rate: u16,
    pub blood_pressure: BloodPressure,
    /// Oxygen saturation in percent
    pub spo2: u16,
}

impl Reading {
    /// Serialize to a single-line JSON object
    pub fn to_json(&self) -> VitalsResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a reading from its JSON form
    pub fn from_json(json: &str) -> VitalsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Inclusive integer range for one vital sign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: u16,
    pub max: u16,
}

impl ValueRange {
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        (self.min..=self.max).contains(&value)
    }

    fn validate(&self, field: &'static str) -> VitalsResult<()> {
        if self.min > self.max {
            return Err(VitalsError::InvalidRange {
                field,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Bounds every generated reading must fall within
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalRanges {
    pub heart_rate: ValueRange,
    pub systolic: ValueRange,
    pub diastolic: ValueRange,
    pub spo2: ValueRange,
}

impl Default for VitalRanges {
    fn default() -> Self {
        Self {
            heart_rate: ValueRange::new(60, 100),
            systolic: ValueRange::new(90, 140),
            diastolic: ValueRange::new(60, 90),
            spo2: ValueRange::new(95, 100),
        }
    }
}

impl VitalRanges {
    /// Check bounds are ordered and that a diastolic value below every
    /// possible systolic value exists.
    pub fn validate(&self) -> VitalsResult<()> {
        self.heart_rate.validate("heart_rate")?;
        self.systolic.validate("systolic")?;
        self.diastolic.validate("diastolic")?;
        self.spo2.validate("spo2")?;

        if self.systolic.min <= self.diastolic.min {
            return Err(VitalsError::config(format!(
                "systolic minimum {} must be above diastolic minimum {}",
                self.systolic.min, self.diastolic.min
            )));
        }

        Ok(())
    }

    /// Whether every field of `reading` lies inside these ranges
    pub fn contains(&self, reading: &Reading) -> bool {
        self.heart_rate.contains(reading.heart_rate)
            && self.systolic.contains(reading.blood_pressure.systolic)
            && self.diastolic.contains(reading.blood_pressure.diastolic)
            && self.spo2.contains(reading.spo2)
    }
}
