//! Measurement types shared by every stage of the acquisition pipeline.
//!
//! - [`Sample`]: one timestamped, calibrated record produced per scheduler tick.
//! - [`Calibration`] / [`ChannelCalibrations`]: the linear raw-to-physical transform.
//! - [`AcquisitionMode`]: which channels a session records, and therefore which
//!   columns the CSV output and telemetry messages carry.

pub mod calibration;
pub mod sample;

pub use calibration::{Calibration, ChannelCalibrations};
pub use sample::{Sample, SampleFlags};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single measured quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Load-cell force, Newtons.
    Force,
    /// Power-monitor bus voltage, Volts.
    Voltage,
    /// Power-monitor current, Amps.
    Current,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Force => "force",
            Channel::Voltage => "voltage",
            Channel::Current => "current",
        };
        f.write_str(name)
    }
}

/// Which sensors are sampled during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMode {
    /// Load cell only; power fields stay at `0.0`.
    #[default]
    LoadCell,
    /// Load cell plus the bus voltage/current monitor.
    LoadCellAndPower,
}

impl AcquisitionMode {
    /// Whether the power monitor is read in this mode.
    pub fn includes_power(self) -> bool {
        matches!(self, AcquisitionMode::LoadCellAndPower)
    }

    /// CSV header columns for this mode.
    pub fn columns(self) -> &'static [&'static str] {
        const LOAD_CELL: &[&str] = &["Timestamp (ms)", "Force (N)"];
        const LOAD_CELL_AND_POWER: &[&str] = &[
            "Timestamp (ms)",
            "Force (N)",
            "Voltage (V)",
            "Current (A)",
            "Power (W)",
        ];
        match self {
            AcquisitionMode::LoadCell => LOAD_CELL,
            AcquisitionMode::LoadCellAndPower => LOAD_CELL_AND_POWER,
        }
    }
}
