//! Random vital-signs generator

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use vitals_core::{BloodPressure, MonotonicWallClock, Reading, VitalRanges, VitalsResult};

/// Configuration for reading generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Inclusive bounds for every field
    #[serde(default)]
    pub ranges: VitalRanges,
    /// Random seed for reproducibility
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Draws uniformly distributed readings within [`VitalRanges`]
pub struct VitalsGenerator {
    ranges: VitalRanges,
    rng: StdRng,
    clock: MonotonicWallClock,
}

impl VitalsGenerator {
    /// Create new generator with configuration
    pub fn new(config: &GeneratorConfig) -> VitalsResult<Self> {
        config.ranges.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(VitalsGenerator {
            ranges: config.ranges,
            rng,
            clock: MonotonicWallClock::new(),
        })
    }

    /// Generate the next reading, stamped with the current wall-clock time
    pub fn next_reading(&mut self) -> Reading {
        let ranges = self.ranges;

        let heart_rate = self.rng.gen_range(ranges.heart_rate.min..=ranges.heart_rate.max);
        let systolic = self.rng.gen_range(ranges.systolic.min..=ranges.systolic.max);
        // Diastolic stays strictly below systolic. Validation guarantees
        // systolic.min > diastolic.min, so the range is never empty.
        let diastolic_max = ranges.diastolic.max.min(systolic - 1);
        let diastolic = self.rng.gen_range(ranges.diastolic.min..=diastolic_max);
        let spo2 = self.rng.gen_range(ranges.spo2.min..=ranges.spo2.max);

        Reading {
            timestamp: self.clock.now(),
            heart_rate,
            blood_pressure: BloodPressure::new(systolic, diastolic),
            spo2,
        }
    }

    pub fn ranges(&self) -> &VitalRanges {
        &self.ranges
    }
}
