//! Configuration loading using Figment
//!
//! Settings are loaded from:
//! 1. `config/thrust_daq.toml` (base configuration, optional)
//! 2. Environment variables prefixed with `THRUST_DAQ_`, nested keys split on `__`
//!
//! Every field has a default, so an empty or missing file yields a valid load-cell
//! session of 10 s at 50 ms. Command-line flags are applied on top by the binary.
//!
//! # Example
//! ```no_run
//! use thrust_daq::config::Settings;
//!
//! let settings = Settings::load()?;
//! settings.validate()?;
//! println!("{} samples per session", settings.session.capacity());
//! # Ok::<(), thrust_daq::error::DaqError>(())
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::data::storage::DEFAULT_FALLBACK_FILENAME;
use crate::error::{AppResult, DaqError};
use crate::measurement::{AcquisitionMode, ChannelCalibrations};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/thrust_daq.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub calibration: ChannelCalibrations,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Stand name, included in the startup log
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Recording parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_sample_period_ms")]
    pub sample_period_ms: u64,
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u64,
    /// Channels to record
    #[serde(default)]
    pub mode: AcquisitionMode,
}

/// Telemetry link configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Off unless a peer is also set
    #[serde(default)]
    pub enabled: bool,
    /// Receiver address, `host:port`
    #[serde(default)]
    pub peer: Option<String>,
    /// Forwarding period; defaults to the sample period
    #[serde(default)]
    pub period_ms: Option<u64>,
}

/// Output file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory relative output names are resolved against
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Written when the primary output file cannot be
    #[serde(default = "default_fallback_filename")]
    pub fallback_filename: String,
}

// Default value functions
fn default_name() -> String {
    "Thrust Stand DAQ".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sample_period_ms() -> u64 {
    50
}

fn default_duration_seconds() -> u64 {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_fallback_filename() -> String {
    DEFAULT_FALLBACK_FILENAME.to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: default_sample_period_ms(),
            duration_seconds: default_duration_seconds(),
            mode: AcquisitionMode::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            fallback_filename: default_fallback_filename(),
        }
    }
}

impl SessionConfig {
    /// Number of samples the session records: `floor(duration * 1000 / period)`.
    pub fn capacity(&self) -> usize {
        if self.sample_period_ms == 0 {
            return 0;
        }
        let samples = self.duration_seconds.saturating_mul(1000) / self.sample_period_ms;
        usize::try_from(samples).unwrap_or(usize::MAX)
    }

    /// `sample_period_ms` as a `Duration`.
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }
}

impl TelemetryConfig {
    /// Forwarding period, falling back to `sample_period`.
    pub fn period(&self, sample_period: Duration) -> Duration {
        self.period_ms
            .map(Duration::from_millis)
            .unwrap_or(sample_period)
    }
}

impl StorageConfig {
    /// Resolve an output name against `output_dir`; absolute names are kept.
    pub fn resolve(&self, name: impl AsRef<Path>) -> PathBuf {
        self.output_dir.join(name)
    }

    /// `fallback_filename` resolved against `output_dir`.
    pub fn fallback_path(&self) -> PathBuf {
        self.resolve(&self.fallback_filename)
    }
}

impl Settings {
    /// Load configuration from the default file and environment variables
    ///
    /// Environment variables override the file with prefix `THRUST_DAQ_`.
    /// Example: `THRUST_DAQ_SESSION__SAMPLE_PERIOD_MS=20`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path; a missing file is not an error.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("THRUST_DAQ_").split("__"))
            .extract()?;
        Ok(settings)
    }

    /// Validate configuration after loading and after CLI overrides
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let session = &self.session;
        if session.sample_period_ms == 0 {
            return Err(DaqError::Configuration(
                "sample_period_ms must be greater than 0".to_string(),
            ));
        }
        if session.duration_seconds == 0 {
            return Err(DaqError::Configuration(
                "duration_seconds must be greater than 0".to_string(),
            ));
        }
        if session.capacity() == 0 {
            return Err(DaqError::Configuration(format!(
                "A {} ms period does not fit in {} s; no samples would be recorded",
                session.sample_period_ms, session.duration_seconds
            )));
        }

        if self.telemetry.enabled {
            match self.telemetry.peer.as_deref() {
                None | Some("") => {
                    return Err(DaqError::Configuration(
                        "telemetry is enabled but no peer is configured".to_string(),
                    ))
                }
                Some(_) => {}
            }
            if self.telemetry.period_ms == Some(0) {
                return Err(DaqError::Configuration(
                    "telemetry period_ms must be greater than 0".to_string(),
                ));
            }
        }

        if self.storage.fallback_filename.trim().is_empty() {
            return Err(DaqError::Configuration(
                "fallback_filename must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
