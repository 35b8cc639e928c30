//! Session controller: one recording run of the thrust stand.
//!
//! A session owns the sample buffer and the periodic tasks for its whole lifetime:
//!
//! ```text
//! Configured ──record()──▶ Recording ──stop──▶ Draining ──persist()──▶ Persisted
//!                                                  │                      ▲
//!                                                  └──▶ PersistFailed ────┘ (retry)
//! ```
//!
//! `record()` starts the acquisition scheduler (and the telemetry forwarder when a
//! peer is configured), then waits in a bounded poll loop until the buffer fills or
//! someone calls `stop_all` through [`SessionController::stop_handle`]. Both tasks
//! are joined before the samples are drained, so the drained set is final.
//!
//! `persist()` writes the CSV, retrying once at the fallback path. If both writes
//! fail the samples stay in memory and `persist()` may be called again.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::acquisition::{AcquisitionContext, AcquisitionScheduler, AcquisitionStats};
use crate::config::Settings;
use crate::data::{CsvStorage, SampleBuffer};
use crate::error::{AppResult, DaqError};
use crate::hardware::{ForceSensor, PowerMonitor};
use crate::measurement::{AcquisitionMode, ChannelCalibrations, Sample};
use crate::shutdown::{StopReason, StopSignal};
use crate::telemetry::{ForwarderContext, ForwarderStats, TelemetryForwarder};
use crate::transport::{PeerId, WirelessTransport};

/// Controller wait-loop interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing started.
    Configured,
    /// Scheduler (and forwarder) running.
    Recording,
    /// Tasks joined, samples drained and waiting to be written.
    Draining,
    /// CSV written.
    Persisted,
    /// Both CSV writes failed; samples are still held.
    PersistFailed,
}

impl SessionState {
    /// Whether `self -> next` is an edge of the lifecycle.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Configured, Recording)
                | (Recording, Draining)
                | (Draining, Persisted)
                | (Draining, PersistFailed)
                | (PersistFailed, Persisted)
                | (PersistFailed, PersistFailed)
        )
    }
}

/// Where and how often telemetry is forwarded.
#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    /// Destination of every telemetry message.
    pub peer: PeerId,
    /// Forwarding period, independent of the sample period.
    pub period: Duration,
}

/// Immutable parameters of one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub mode: AcquisitionMode,
    pub sample_period: Duration,
    /// Total recording time; with `sample_period` this fixes the capacity.
    pub duration: Duration,
    pub calibrations: ChannelCalibrations,
    /// `None` disables the forwarder.
    pub telemetry: Option<TelemetrySettings>,
    /// Written when the primary CSV path fails.
    pub fallback_path: PathBuf,
    /// How often `record()` checks for completion.
    pub poll_interval: Duration,
}

impl SessionSettings {
    /// Load-cell session with stand defaults and no telemetry.
    pub fn new(sample_period: Duration, duration: Duration) -> Self {
        let defaults = Settings::default();
        Self {
            mode: AcquisitionMode::LoadCell,
            sample_period,
            duration,
            calibrations: ChannelCalibrations::default(),
            telemetry: None,
            fallback_path: defaults.storage.fallback_path(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Derive session parameters from validated settings.
    pub fn from_settings(settings: &Settings) -> AppResult<Self> {
        settings.validate()?;

        let sample_period = settings.session.sample_period();
        let telemetry = match (&settings.telemetry.peer, settings.telemetry.enabled) {
            (Some(peer), true) => Some(TelemetrySettings {
                peer: PeerId::new(peer.clone()),
                period: settings.telemetry.period(sample_period),
            }),
            _ => None,
        };

        Ok(Self {
            mode: settings.session.mode,
            sample_period,
            duration: Duration::from_secs(settings.session.duration_seconds),
            calibrations: settings.calibration,
            telemetry,
            fallback_path: settings.storage.fallback_path(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// `floor(duration / sample_period)`; zero for a zero period.
    pub fn capacity(&self) -> usize {
        let period = self.sample_period.as_millis();
        if period == 0 {
            return 0;
        }
        usize::try_from(self.duration.as_millis() / period).unwrap_or(usize::MAX)
    }
}

/// The sensors a session reads.
#[derive(Clone)]
pub struct Devices {
    /// Always present.
    pub force_sensor: Arc<dyn ForceSensor>,
    /// Required by, and only used in, power sessions.
    pub power_monitor: Option<Arc<dyn PowerMonitor>>,
}

impl Devices {
    /// Load cell only.
    pub fn load_cell(force_sensor: Arc<dyn ForceSensor>) -> Self {
        Self {
            force_sensor,
            power_monitor: None,
        }
    }

    /// Attach a bus voltage/current monitor.
    pub fn with_power_monitor(mut self, monitor: Arc<dyn PowerMonitor>) -> Self {
        self.power_monitor = Some(monitor);
        self
    }
}

/// What `record()` observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingSummary {
    /// Samples drained from the buffer.
    pub samples: usize,
    pub capacity: usize,
    /// First stop reason recorded on the signal.
    pub reason: StopReason,
    pub acquisition: AcquisitionStats,
    /// `None` when telemetry was disabled.
    pub telemetry: Option<ForwarderStats>,
}

/// Owns one recording run from configuration to a persisted CSV.
pub struct SessionController {
    settings: SessionSettings,
    devices: Devices,
    transport: Arc<dyn WirelessTransport>,
    storage: CsvStorage,
    state: SessionState,
    stop: StopSignal,
    capacity: usize,
    samples: Vec<Sample>,
}

impl SessionController {
    /// Validates the settings against the devices; nothing is started yet.
    pub fn new(
        settings: SessionSettings,
        mut devices: Devices,
        transport: Arc<dyn WirelessTransport>,
    ) -> AppResult<Self> {
        if settings.sample_period.is_zero() {
            return Err(DaqError::Configuration(
                "sample period must be greater than 0".to_string(),
            ));
        }
        let capacity = settings.capacity();
        if capacity == 0 {
            return Err(DaqError::Configuration(format!(
                "session of {:?} at {:?} would record no samples",
                settings.duration, settings.sample_period
            )));
        }
        if let Some(telemetry) = &settings.telemetry {
            if telemetry.period.is_zero() {
                return Err(DaqError::Configuration(
                    "telemetry period must be greater than 0".to_string(),
                ));
            }
        }
        match (settings.mode, &devices.power_monitor) {
            (AcquisitionMode::LoadCellAndPower, None) => {
                return Err(DaqError::Configuration(
                    "load_cell_and_power mode needs a power monitor".to_string(),
                ))
            }
            (AcquisitionMode::LoadCell, Some(_)) => devices.power_monitor = None,
            _ => {}
        }

        let storage = CsvStorage::new(settings.mode, settings.fallback_path.clone());
        tracing::debug!(capacity, mode = ?settings.mode, "session configured");

        Ok(Self {
            settings,
            devices,
            transport,
            storage,
            state: SessionState::Configured,
            stop: StopSignal::new(),
            capacity,
            samples: Vec::new(),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of samples a full run holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Channels recorded by this session.
    pub fn mode(&self) -> AcquisitionMode {
        self.settings.mode
    }

    /// Handle for aborting the session from outside, e.g. a Ctrl-C handler.
    pub fn stop_handle(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Samples drained after recording, oldest first.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    fn transition(&mut self, next: SessionState) -> AppResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(DaqError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
        Ok(())
    }

    /// Record until the buffer is full or the session is stopped.
    ///
    /// The wait also ends if the acquisition task exits on its own (a panicking
    /// sensor driver); that case is reported as [`DaqError::Task`] once the
    /// samples collected so far have been drained.
    pub async fn record(&mut self) -> AppResult<RecordingSummary> {
        if !self.state.can_transition_to(SessionState::Recording) {
            return Err(DaqError::InvalidTransition {
                from: self.state,
                to: SessionState::Recording,
            });
        }

        let (writer, reader) = SampleBuffer::with_capacity(self.capacity);
        let scheduler = AcquisitionScheduler::new(AcquisitionContext {
            writer,
            force_sensor: self.devices.force_sensor.clone(),
            power_monitor: self.devices.power_monitor.clone(),
            calibrations: self.settings.calibrations,
            period: self.settings.sample_period,
            stop: self.stop.clone(),
        })?;
        let forwarder = match self.settings.telemetry.as_ref() {
            Some(telemetry) => Some(TelemetryForwarder::new(ForwarderContext {
                reader: reader.clone(),
                transport: self.transport.clone(),
                peer: telemetry.peer.clone(),
                mode: self.settings.mode,
                period: telemetry.period,
                stop: self.stop.clone(),
            })?),
            None => None,
        };

        self.transition(SessionState::Recording)?;
        tracing::info!(
            duration_ms = self.settings.duration.as_millis() as u64,
            period_ms = self.settings.sample_period.as_millis() as u64,
            capacity = self.capacity,
            "recording started"
        );

        let acquisition = tokio::spawn(scheduler.run());
        let forwarder = forwarder.map(|forwarder| tokio::spawn(forwarder.run()));

        while !reader.is_full() && !self.stop.is_stopped() && !acquisition.is_finished() {
            tokio::time::sleep(self.settings.poll_interval).await;
        }
        let reason = if reader.is_full() {
            StopReason::BufferFull
        } else {
            StopReason::External
        };
        if acquisition.is_finished() && !self.stop.is_stopped() {
            tracing::error!("acquisition task exited before the session stopped");
        }
        self.stop.stop_all(reason);

        let acquisition = acquisition.await;
        let telemetry = match forwarder {
            Some(handle) => Some(handle.await),
            None => None,
        };

        self.samples = reader.drain();
        self.transition(SessionState::Draining)?;

        let acquisition = acquisition.map_err(|e| DaqError::Task(e.to_string()))?;
        let telemetry = telemetry
            .transpose()
            .map_err(|e| DaqError::Task(e.to_string()))?;

        let summary = RecordingSummary {
            samples: self.samples.len(),
            capacity: self.capacity,
            reason: self.stop.reason().unwrap_or(reason),
            acquisition,
            telemetry,
        };
        tracing::info!(
            samples = summary.samples,
            capacity = summary.capacity,
            reason = ?summary.reason,
            "recording finished"
        );
        Ok(summary)
    }

    /// Write the drained samples to `primary`, or to the fallback path if that fails.
    ///
    /// Returns the path actually written.
    pub fn persist(&mut self, primary: &Path) -> AppResult<PathBuf> {
        if !matches!(
            self.state,
            SessionState::Draining | SessionState::PersistFailed
        ) {
            return Err(DaqError::InvalidTransition {
                from: self.state,
                to: SessionState::Persisted,
            });
        }

        match self.storage.persist(primary, &self.samples) {
            Ok(path) => {
                self.transition(SessionState::Persisted)?;
                Ok(path)
            }
            Err(e) => {
                self.transition(SessionState::PersistFailed)?;
                Err(e.into())
            }
        }
    }
}
