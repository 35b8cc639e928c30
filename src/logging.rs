//! Tracing setup
//!
//! Structured logging via `tracing` and `tracing-subscriber`:
//! - Multiple output formats (pretty, compact, JSON)
//! - `RUST_LOG` filtering, falling back to the configured level
//! - Idempotent initialization, safe to call from tests
//!
//! # Example
//! ```no_run
//! use thrust_daq::{config::Settings, logging::{self, TracingConfig}};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load()?;
//! logging::init(TracingConfig::from_settings(&settings)?)?;
//! tracing::info!("stand ready");
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

use crate::config::Settings;
use crate::error::{AppResult, DaqError};

/// Output format for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Pretty-printed format with colors (for development)
    Pretty,
    /// Single-line format without colors (for the bench terminal)
    #[default]
    Compact,
    /// JSON format for structured logging
    Json,
}

impl FromStr for OutputFormat {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(OutputFormat::Pretty),
            "compact" => Ok(OutputFormat::Compact),
            "json" => Ok(OutputFormat::Json),
            other => Err(DaqError::Configuration(format!(
                "Invalid log format '{other}'. Must be one of: pretty, compact, json"
            ))),
        }
    }
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Fallback level when `RUST_LOG` is unset
    pub level: Level,
    pub format: OutputFormat,
    /// Only honored by the pretty format
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Compact,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// Level from `[application] log_level`, everything else default.
    pub fn from_settings(settings: &Settings) -> AppResult<Self> {
        let level = parse_log_level(&settings.application.log_level)?;
        Ok(Self::new(level))
    }

    /// Default configuration at `level`.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Select the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable color codes in the pretty format.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Initialize tracing with custom configuration
///
/// If a global subscriber is already installed this returns `Ok(())`.
pub fn init(config: TracingConfig) -> AppResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_string(config.level)));

    let result = match config.format {
        OutputFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_ansi(config.with_ansi)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()
        }
        OutputFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_ansi(false)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()
        }
        OutputFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_filter(env_filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()
        }
    };

    tolerate_existing_subscriber(result)
}

fn tolerate_existing_subscriber(result: Result<(), TryInitError>) -> AppResult<()> {
    match result {
        Ok(()) => Ok(()),
        // Tests and embedding applications may already have installed one.
        Err(e)
            if e.to_string()
                .contains("a global default trace dispatcher has already been set") =>
        {
            Ok(())
        }
        Err(e) => Err(DaqError::Configuration(format!(
            "Failed to initialize tracing: {e}"
        ))),
    }
}

/// Parse log level string into tracing Level
pub fn parse_log_level(level: &str) -> AppResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(DaqError::Configuration(format!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        ))),
    }
}

fn level_to_filter_string(level: Level) -> String {
    match level {
        Level::TRACE => "trace".to_string(),
        Level::DEBUG => "debug".to_string(),
        Level::INFO => "info".to_string(),
        Level::WARN => "warn".to_string(),
        Level::ERROR => "error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(matches!(parse_log_level("Debug"), Ok(Level::DEBUG)));
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_tracing_config_from_settings() {
        let mut settings = Settings::default();
        settings.application.log_level = "debug".to_string();

        let config = TracingConfig::from_settings(&settings).unwrap();
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, OutputFormat::Compact);
        assert!(config.with_ansi);
    }

    #[test]
    fn test_builder_sets_format_and_color() {
        let config = TracingConfig::new(Level::INFO)
            .with_format(OutputFormat::Pretty)
            .with_ansi(false);
        assert_eq!(config.format, OutputFormat::Pretty);
        assert!(!config.with_ansi);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "pretty".parse::<OutputFormat>().unwrap(),
            OutputFormat::Pretty
        );
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_init_is_idempotent() {
        assert!(init(TracingConfig::new(Level::WARN)).is_ok());
        assert!(init(TracingConfig::new(Level::DEBUG).with_format(OutputFormat::Json)).is_ok());
    }
}
