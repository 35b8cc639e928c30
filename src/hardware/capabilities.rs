//! Device capability traits
//!
//! The acquisition core never talks to a bus directly. It reads sensors through
//! these small traits, one per device role:
//!
//! - A load-cell amplifier (e.g. HX711) implements [`ForceSensor`]
//! - A bus voltage/current monitor (e.g. INA228) implements [`PowerMonitor`]
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Uses anyhow::Result for errors
//! - Focuses on ONE thing
//!
//! Reads are expected to be fast relative to the sample period. A failed read is a
//! communication error for that channel only; the caller decides how to record it.

use anyhow::Result;
use async_trait::async_trait;

/// Capability: Raw Force Readout
///
/// Devices that digitize a load-cell bridge.
///
/// # Contract
/// - Returns the latest raw ADC count, sign-extended to `i32`
/// - No calibration is applied here; see [`crate::measurement::Calibration`]
/// - Err on bus/communication failure
#[async_trait]
pub trait ForceSensor: Send + Sync {
    /// Read the latest raw sample.
    async fn read_raw_force(&self) -> Result<i32>;
}

/// Capability: Power Monitoring
///
/// Devices that measure the supply bus feeding the motor.
///
/// # Contract
/// - Voltage in Volts, current in Amps, already converted from register LSBs
/// - Each method is an independent bus transaction
/// - Err on bus/communication failure
#[async_trait]
pub trait PowerMonitor: Send + Sync {
    /// Read the bus voltage.
    async fn read_bus_voltage(&self) -> Result<f64>;

    /// Read the current through the shunt.
    async fn read_current(&self) -> Result<f64>;
}
