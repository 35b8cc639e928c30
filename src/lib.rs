//! # Thrust Stand DAQ Library
//!
//! This crate is the core library for the `thrust-daq` recorder. It runs a fixed
//! duration recording session on a thrust stand: a load cell (and optionally a bus
//! voltage/current monitor) is sampled on a fixed period, every sample is calibrated
//! and stored in a pre-allocated buffer, the latest value is streamed to a wireless
//! peer while recording, and the full set is written to CSV when the run ends.
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: the periodic read → calibrate → timestamp → append loop.
//! - **`config`**: `Settings` loaded from TOML and environment variables with `figment`.
//! - **`data`**: the lock-free sample buffer and CSV persistence with fallback.
//! - **`error`**: the `DaqError` enum and the small error types of the pipeline.
//! - **`hardware`**: capability traits for the sensors, plus mock devices.
//! - **`logging`**: `tracing-subscriber` setup.
//! - **`measurement`**: `Sample`, calibration and acquisition modes.
//! - **`session`**: the session state machine that ties everything together.
//! - **`shutdown`**: the idempotent, shared stop signal.
//! - **`telemetry`**: best-effort streaming of the latest sample.
//! - **`transport`**: the fire-and-forget link the telemetry travels over.

pub mod acquisition;
pub mod config;
pub mod data;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod measurement;
pub mod session;
pub mod shutdown;
pub mod telemetry;
pub mod transport;

pub use error::{AppResult, DaqError};
pub use session::{
    Devices, RecordingSummary, SessionController, SessionSettings, SessionState, TelemetrySettings,
};
