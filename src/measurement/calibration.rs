//! Linear calibration from raw sensor units to physical units.

use serde::{Deserialize, Serialize};

/// `calibrated = raw * scale_factor + offset`.
///
/// Immutable for the duration of a session. The force defaults are the values the
/// stand's load cell was tuned to (HX711, channel A, gain 64).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Physical units per raw unit.
    pub scale_factor: f64,
    /// Added after scaling.
    pub offset: f64,
}

impl Calibration {
    /// Default load-cell scale, Newtons per ADC count.
    pub const FORCE_SCALE: f64 = 0.000458;
    /// Default load-cell offset, Newtons.
    pub const FORCE_OFFSET: f64 = -6.0;

    /// `raw * scale_factor + offset`.
    pub const fn new(scale_factor: f64, offset: f64) -> Self {
        Self {
            scale_factor,
            offset,
        }
    }

    /// Pass-through calibration.
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0)
    }

    /// Apply the transform to a raw reading.
    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.scale_factor + self.offset
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::identity()
    }
}

/// One calibration per channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelCalibrations {
    #[serde(default = "default_force")]
    pub force: Calibration,
    #[serde(default)]
    pub voltage: Calibration,
    #[serde(default)]
    pub current: Calibration,
}

fn default_force() -> Calibration {
    Calibration::new(Calibration::FORCE_SCALE, Calibration::FORCE_OFFSET)
}

impl Default for ChannelCalibrations {
    fn default() -> Self {
        Self {
            force: default_force(),
            voltage: Calibration::identity(),
            current: Calibration::identity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_is_exact_linear_transform() {
        let cal = Calibration::new(0.000458, -6.0);
        for raw in [-8_388_608i32, -12_345, -1, 0, 1, 100, 8_388_607] {
            let raw = f64::from(raw);
            assert_eq!(cal.apply(raw), raw * 0.000458 + -6.0);
        }
    }

    #[test]
    fn negative_raw_values_are_not_clamped() {
        let cal = Calibration::new(2.0, 1.0);
        assert_eq!(cal.apply(-10.0), -19.0);
    }

    #[test]
    fn identity_passes_values_through() {
        assert_eq!(Calibration::identity().apply(16.8), 16.8);
    }

    #[test]
    fn force_default_uses_stand_constants() {
        let cals = ChannelCalibrations::default();
        assert_eq!(cals.force.scale_factor, 0.000458);
        assert_eq!(cals.force.offset, -6.0);
        assert_eq!(cals.voltage, Calibration::identity());
        assert_eq!(cals.current, Calibration::identity());
    }
}
