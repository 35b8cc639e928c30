//! Acquisition scheduler: the periodic read → calibrate → timestamp → append loop.
//!
//! One tick reads the load cell (and the power monitor, when one is attached),
//! applies the per-channel calibration, stamps the sample with
//! `previous_timestamp + period` and appends it to the sample buffer.
//!
//! # Timing
//!
//! Timestamps are additive, never sampled from the wall clock, so timer jitter does
//! not leak into the recorded time base. If a tick takes longer than the period the
//! late ticks are dropped (`MissedTickBehavior::Skip`), never queued; the overrun is
//! logged and counted.
//!
//! # Termination
//!
//! When an append fills the last slot, or finds the buffer already full, the
//! scheduler calls [`StopSignal::stop_all`] in that same tick. That single call stops
//! every task of the session. A failed read on one channel only marks that channel
//! skipped in the sample; the other channels are still read and stored.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::data::SampleWriter;
use crate::error::{AppResult, BufferFull, DaqError, SensorReadError};
use crate::hardware::{ForceSensor, PowerMonitor};
use crate::measurement::{AcquisitionMode, Channel, ChannelCalibrations, Sample, SampleFlags};
use crate::shutdown::{StopReason, StopSignal};

/// Everything the scheduler needs, passed in explicitly.
pub struct AcquisitionContext {
    /// The buffer's only write handle.
    pub writer: SampleWriter,
    /// Load-cell amplifier.
    pub force_sensor: Arc<dyn ForceSensor>,
    /// Present only in [`AcquisitionMode::LoadCellAndPower`] sessions.
    pub power_monitor: Option<Arc<dyn PowerMonitor>>,
    /// Raw-to-physical transform per channel.
    pub calibrations: ChannelCalibrations,
    /// Sample period; must be non-zero.
    pub period: Duration,
    /// Session-wide stop signal, raised here when the buffer fills.
    pub stop: StopSignal,
}

/// Result of one successful tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Sample stored; there is room for more.
    Stored(Sample),
    /// Sample stored into the last free slot; all tasks have been told to stop.
    Filled(Sample),
}

impl TickOutcome {
    /// The sample this tick stored.
    pub fn sample(&self) -> &Sample {
        match self {
            TickOutcome::Stored(sample) | TickOutcome::Filled(sample) => sample,
        }
    }
}

/// Counters reported when the scheduler exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    /// Samples appended to the buffer.
    pub stored: usize,
    /// Ticks whose load-cell read failed.
    pub force_skipped: usize,
    /// Ticks whose bus voltage read failed.
    pub voltage_skipped: usize,
    /// Ticks whose current read failed.
    pub current_skipped: usize,
    /// Ticks that took longer than one period.
    pub overruns: usize,
}

/// Periodic sampler owning the write side of a session's buffer.
pub struct AcquisitionScheduler {
    ctx: AcquisitionContext,
    last_timestamp_ms: u64,
    stats: AcquisitionStats,
}

impl AcquisitionScheduler {
    /// Fails with [`DaqError::Configuration`] for a zero period.
    pub fn new(ctx: AcquisitionContext) -> AppResult<Self> {
        if ctx.period.is_zero() {
            return Err(DaqError::Configuration(
                "acquisition period must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            ctx,
            last_timestamp_ms: 0,
            stats: AcquisitionStats::default(),
        })
    }

    /// Channels read each tick, derived from whether a power monitor is attached.
    pub fn mode(&self) -> AcquisitionMode {
        if self.ctx.power_monitor.is_some() {
            AcquisitionMode::LoadCellAndPower
        } else {
            AcquisitionMode::LoadCell
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    fn period_ms(&self) -> u64 {
        u64::try_from(self.ctx.period.as_millis()).unwrap_or(u64::MAX)
    }

    async fn read_force(&self) -> Result<f64, SensorReadError> {
        let raw = self
            .ctx
            .force_sensor
            .read_raw_force()
            .await
            .map_err(|source| SensorReadError {
                channel: Channel::Force,
                source,
            })?;
        Ok(self.ctx.calibrations.force.apply(f64::from(raw)))
    }

    async fn read_voltage(&self, monitor: &dyn PowerMonitor) -> Result<f64, SensorReadError> {
        let voltage = monitor
            .read_bus_voltage()
            .await
            .map_err(|source| SensorReadError {
                channel: Channel::Voltage,
                source,
            })?;
        Ok(self.ctx.calibrations.voltage.apply(voltage))
    }

    async fn read_current(&self, monitor: &dyn PowerMonitor) -> Result<f64, SensorReadError> {
        let current = monitor
            .read_current()
            .await
            .map_err(|source| SensorReadError {
                channel: Channel::Current,
                source,
            })?;
        Ok(self.ctx.calibrations.current.apply(current))
    }

    /// Build the sample for the next timestamp, isolating per-channel failures.
    async fn acquire(&mut self, timestamp_ms: u64) -> Sample {
        let mut sample = match self.read_force().await {
            Ok(force) => Sample::force(timestamp_ms, force),
            Err(e) => {
                tracing::warn!(timestamp_ms, error = %e, "force sample skipped");
                self.stats.force_skipped += 1;
                let mut sample = Sample::force(timestamp_ms, 0.0);
                sample.flags |= SampleFlags::FORCE_SKIPPED;
                sample
            }
        };

        if let Some(monitor) = self.ctx.power_monitor.clone() {
            // Each register is its own channel; one failing never discards the other.
            let voltage = match self.read_voltage(monitor.as_ref()).await {
                Ok(voltage) => Some(voltage),
                Err(e) => {
                    tracing::warn!(timestamp_ms, error = %e, "voltage sample skipped");
                    self.stats.voltage_skipped += 1;
                    None
                }
            };
            let current = match self.read_current(monitor.as_ref()).await {
                Ok(current) => Some(current),
                Err(e) => {
                    tracing::warn!(timestamp_ms, error = %e, "current sample skipped");
                    self.stats.current_skipped += 1;
                    None
                }
            };
            sample = sample.with_partial_power(voltage, current);
        }

        sample
    }

    /// Run one acquisition step.
    ///
    /// Returns [`BufferFull`] if the buffer had no free slot; that, like filling
    /// the last slot, stops all of the session's tasks.
    pub async fn tick(&mut self) -> Result<TickOutcome, BufferFull> {
        if self.ctx.writer.is_full() {
            self.ctx.stop.stop_all(StopReason::BufferFull);
            return Err(BufferFull {
                capacity: self.ctx.writer.capacity(),
            });
        }

        let timestamp_ms = self.last_timestamp_ms.saturating_add(self.period_ms());
        let sample = self.acquire(timestamp_ms).await;

        let index = match self.ctx.writer.append(sample) {
            Ok(index) => index,
            Err(full) => {
                self.ctx.stop.stop_all(StopReason::BufferFull);
                return Err(full);
            }
        };
        self.last_timestamp_ms = timestamp_ms;
        self.stats.stored += 1;
        tracing::trace!(index, timestamp_ms, force = sample.force_newtons, "sample stored");

        if self.ctx.writer.is_full() {
            tracing::info!(samples = index + 1, "sample buffer full, data collection complete");
            self.ctx.stop.stop_all(StopReason::BufferFull);
            Ok(TickOutcome::Filled(sample))
        } else {
            Ok(TickOutcome::Stored(sample))
        }
    }

    /// Tick every period until the buffer fills or the session is stopped.
    ///
    /// The first tick fires one period after the call, like a hardware timer.
    pub async fn run(mut self) -> AcquisitionStats {
        let period = self.ctx.period;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let stop = self.ctx.stop.clone();

        tracing::info!(
            period_ms = self.period_ms(),
            capacity = self.ctx.writer.capacity(),
            mode = ?self.mode(),
            "acquisition started"
        );

        loop {
            tokio::select! {
                biased;
                reason = stop.stopped() => {
                    tracing::debug!(?reason, "acquisition scheduler observed stop");
                    break;
                }
                _ = ticker.tick() => {
                    let started = Instant::now();
                    let outcome = self.tick().await;
                    if started.elapsed() > period {
                        self.stats.overruns += 1;
                        tracing::warn!(
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            period_ms = self.period_ms(),
                            "tick overran sample period, late ticks dropped"
                        );
                    }
                    if !matches!(outcome, Ok(TickOutcome::Stored(_))) {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            stored = self.stats.stored,
            force_skipped = self.stats.force_skipped,
            voltage_skipped = self.stats.voltage_skipped,
            current_skipped = self.stats.current_skipped,
            overruns = self.stats.overruns,
            "acquisition stopped"
        );
        self.stats
    }
}
