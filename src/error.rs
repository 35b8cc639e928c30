//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, together with the small,
//! purpose-built error types that the acquisition pipeline passes around. Using the
//! `thiserror` crate, it provides a centralized and consistent way to handle the
//! different kinds of failure a test-stand session can run into.
//!
//! ## Error Taxonomy
//!
//! - **`SensorReadError`**: a communication failure with one device channel. The
//!   acquisition scheduler recovers from it in the same tick by marking the channel
//!   as skipped; it never stops acquisition of the other channels.
//! - **`BufferFull`**: not a fault. It is the normal termination signal returned by
//!   the sample buffer once every pre-allocated slot has been written.
//! - **`SendError`**: lives in [`crate::transport`]. Telemetry is advisory, so send
//!   failures are always logged and dropped, never escalated.
//! - **`PersistError`**: both the primary and the fallback CSV writes failed. The
//!   samples stay in memory so the caller can retry.
//! - **`DaqError`**: the crate-level error for everything that does reach the
//!   caller: configuration, a persist that failed twice, a misuse of the session
//!   lifecycle, or a runtime task that died.
//!
//! Sensor and send errors are handled where they occur and never become a
//! `DaqError`. `PersistError` and figment errors convert with `?`.

use std::path::PathBuf;
use thiserror::Error;

use crate::measurement::Channel;
use crate::session::SessionState;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Errors returned to callers of the session API.
#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("Invalid session transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("Acquisition task failed: {0}")]
    Task(String),
}

impl From<figment::Error> for DaqError {
    fn from(value: figment::Error) -> Self {
        DaqError::Config(Box::new(value))
    }
}

/// A single device channel could not be read.
#[derive(Error, Debug)]
#[error("Failed to read {channel} channel: {source}")]
pub struct SensorReadError {
    /// The channel whose read failed.
    pub channel: Channel,
    #[source]
    pub source: anyhow::Error,
}

/// Every pre-allocated slot of the sample buffer has been written.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Sample buffer is full ({capacity} samples)")]
pub struct BufferFull {
    /// Slots in the buffer.
    pub capacity: usize,
}

/// Neither the primary nor the fallback output file could be written.
#[derive(Error, Debug)]
#[error(
    "Failed to persist samples to '{}' ({primary}) and to fallback '{}' ({fallback})",
    .primary_path.display(),
    .fallback_path.display()
)]
pub struct PersistError {
    pub primary_path: PathBuf,
    /// Why the primary write failed.
    pub primary: std::io::Error,
    pub fallback_path: PathBuf,
    /// Why the fallback write failed.
    pub fallback: std::io::Error,
}
