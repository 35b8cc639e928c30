//! Telemetry forwarder: periodic, best-effort streaming of the latest sample.
//!
//! The forwarder runs on its own period, independent of the acquisition scheduler.
//! Each poll it looks at the sample buffer through a read-only handle and:
//!
//! - buffer empty: sends nothing (no sample exists yet)
//! - buffer filling: sends the latest sample as a short text line
//! - buffer full: sends [`FINISHED_MESSAGE`] once and stops itself
//!
//! It learns about completion by polling the buffer, not by being told. The stop
//! signal is only used to leave early when a session is aborted, in which case no
//! terminal message is sent. Send failures are logged and forgotten.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::data::SampleReader;
use crate::error::{AppResult, DaqError};
use crate::measurement::{AcquisitionMode, Sample};
use crate::shutdown::StopSignal;
use crate::transport::{PeerId, TelemetryMessage, WirelessTransport};

/// Sent once when the forwarder starts.
pub const START_MESSAGE: &str = "Starting . . . ";
/// Sent once when the buffer has been filled.
pub const FINISHED_MESSAGE: &str = "Finished Data Collection";
/// End marker understood by older receivers.
pub const LEGACY_END_MESSAGE: &str = "end";

/// Render one sample as a telemetry line.
///
/// Each value is right-aligned in seven columns with two decimals; channels skipped
/// after a read failure show `---`.
pub fn format_sample(mode: AcquisitionMode, sample: &Sample) -> TelemetryMessage {
    fn value(v: f64, skipped: bool) -> String {
        if skipped {
            format!("{:>7}", "---")
        } else {
            format!("{v:7.2}")
        }
    }

    let force = value(sample.force_newtons, sample.force_skipped());
    let text = match mode {
        AcquisitionMode::LoadCell => format!("{force} N"),
        AcquisitionMode::LoadCellAndPower => format!(
            "{force} N, {} V, {} A, {} W",
            value(sample.voltage_volts, sample.voltage_skipped()),
            value(sample.current_amps, sample.current_skipped()),
            value(sample.power_watts, sample.power_skipped()),
        ),
    };
    TelemetryMessage::new(text)
}

/// What a single forwarder poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwarderStep {
    /// The latest sample was sent.
    Sent,
    /// Nothing to send yet; the buffer is empty.
    Suppressed,
    /// A send was attempted and failed; the message is gone.
    Dropped,
    /// The terminal message was attempted; the forwarder is done.
    Finished,
}

/// Counters reported when the forwarder exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    /// Messages the transport accepted.
    pub sent: u64,
    /// Messages the transport refused.
    pub dropped: u64,
}

/// Everything the forwarder needs, passed in explicitly.
pub struct ForwarderContext {
    /// Read-only view of the session buffer.
    pub reader: SampleReader,
    pub transport: Arc<dyn WirelessTransport>,
    pub peer: PeerId,
    /// Selects the line format.
    pub mode: AcquisitionMode,
    /// Poll period; must be non-zero.
    pub period: Duration,
    /// Observed only to leave early on abort.
    pub stop: StopSignal,
}

/// Periodic sender of the latest sample to one peer.
pub struct TelemetryForwarder {
    ctx: ForwarderContext,
    stats: ForwarderStats,
}

impl TelemetryForwarder {
    /// Fails with [`DaqError::Configuration`] for a zero period.
    pub fn new(ctx: ForwarderContext) -> AppResult<Self> {
        if ctx.period.is_zero() {
            return Err(DaqError::Configuration(
                "telemetry period must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            ctx,
            stats: ForwarderStats::default(),
        })
    }

    /// Counters so far.
    pub fn stats(&self) -> ForwarderStats {
        self.stats
    }

    fn send(&mut self, message: &TelemetryMessage) -> bool {
        match self.ctx.transport.send(&self.ctx.peer, message) {
            Ok(()) => {
                self.stats.sent += 1;
                true
            }
            Err(e) => {
                self.stats.dropped += 1;
                tracing::debug!(peer = %self.ctx.peer, error = %e, "telemetry message dropped");
                false
            }
        }
    }

    /// One forwarder period's worth of work.
    pub fn poll_once(&mut self) -> ForwarderStep {
        if self.ctx.reader.is_full() {
            self.send(&TelemetryMessage::new(FINISHED_MESSAGE));
            return ForwarderStep::Finished;
        }

        let Some(sample) = self.ctx.reader.latest() else {
            return ForwarderStep::Suppressed;
        };

        let message = format_sample(self.ctx.mode, &sample);
        if self.send(&message) {
            ForwarderStep::Sent
        } else {
            ForwarderStep::Dropped
        }
    }

    /// Announce the session, then poll until the buffer is full or the session aborts.
    pub async fn run(mut self) -> ForwarderStats {
        self.send(&TelemetryMessage::new(START_MESSAGE));

        let mut ticker = tokio::time::interval(self.ctx.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let stop = self.ctx.stop.clone();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.poll_once() == ForwarderStep::Finished {
                        break;
                    }
                }
                reason = stop.stopped() => {
                    if self.ctx.reader.is_full() {
                        self.poll_once();
                    }
                    tracing::debug!(?reason, "telemetry forwarder observed stop");
                    break;
                }
            }
        }

        tracing::info!(
            sent = self.stats.sent,
            dropped = self.stats.dropped,
            "telemetry forwarder finished"
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleBuffer;
    use crate::measurement::SampleFlags;
    use crate::shutdown::StopReason;
    use crate::transport::RecordingTransport;

    fn forwarder(
        reader: SampleReader,
        mode: AcquisitionMode,
        link: Arc<RecordingTransport>,
        stop: StopSignal,
    ) -> TelemetryForwarder {
        TelemetryForwarder::new(ForwarderContext {
            reader,
            transport: link,
            peer: PeerId::new("127.0.0.1:4210"),
            mode,
            period: Duration::from_millis(50),
            stop,
        })
        .unwrap()
    }

    fn texts(link: &RecordingTransport) -> Vec<String> {
        link.messages()
            .iter()
            .map(|m| m.as_str().to_string())
            .collect()
    }

    #[test]
    fn formats_load_cell_line() {
        let msg = format_sample(AcquisitionMode::LoadCell, &Sample::force(50, -5.9542));
        assert_eq!(msg.as_str(), "  -5.95 N");
    }

    #[test]
    fn formats_power_line() {
        let sample = Sample::force(50, 12.25).with_power(16.8, 10.0);
        let msg = format_sample(AcquisitionMode::LoadCellAndPower, &sample);
        assert_eq!(msg.as_str(), "  12.25 N,   16.80 V,   10.00 A,  168.00 W");
    }

    #[test]
    fn formats_skipped_channels() {
        let mut sample = Sample::force(50, 1.0);
        sample.flags = SampleFlags::POWER_SKIPPED
            | SampleFlags::VOLTAGE_SKIPPED
            | SampleFlags::CURRENT_SKIPPED;
        let msg = format_sample(AcquisitionMode::LoadCellAndPower, &sample);
        assert_eq!(msg.as_str(), "   1.00 N,     --- V,     --- A,     --- W");
    }

    #[test]
    fn formats_each_power_channel_on_its_own() {
        let sample = Sample::force(50, 1.0).with_partial_power(None, Some(2.5));
        let msg = format_sample(AcquisitionMode::LoadCellAndPower, &sample);
        assert_eq!(msg.as_str(), "   1.00 N,     --- V,    2.50 A,     --- W");

        let sample = Sample::force(50, 1.0).with_partial_power(Some(16.0), None);
        let msg = format_sample(AcquisitionMode::LoadCellAndPower, &sample);
        assert_eq!(msg.as_str(), "   1.00 N,   16.00 V,     --- A,     --- W");
    }

    #[test]
    fn zero_period_is_rejected() {
        let (_writer, reader) = SampleBuffer::with_capacity(4);
        let result = TelemetryForwarder::new(ForwarderContext {
            reader,
            transport: Arc::new(RecordingTransport::new()),
            peer: PeerId::new("127.0.0.1:4210"),
            mode: AcquisitionMode::LoadCell,
            period: Duration::ZERO,
            stop: StopSignal::new(),
        });
        assert!(matches!(result, Err(DaqError::Configuration(_))));
    }

    #[test]
    fn empty_buffer_is_suppressed() {
        let (_writer, reader) = SampleBuffer::with_capacity(4);
        let link = Arc::new(RecordingTransport::new());
        let mut fwd = forwarder(reader, AcquisitionMode::LoadCell, link.clone(), StopSignal::new());

        assert_eq!(fwd.poll_once(), ForwarderStep::Suppressed);
        assert!(link.messages().is_empty());
    }

    #[test]
    fn sends_latest_then_finished() {
        let (mut writer, reader) = SampleBuffer::with_capacity(2);
        let link = Arc::new(RecordingTransport::new());
        let mut fwd = forwarder(reader, AcquisitionMode::LoadCell, link.clone(), StopSignal::new());

        writer.append(Sample::force(50, 1.0)).unwrap();
        assert_eq!(fwd.poll_once(), ForwarderStep::Sent);
        writer.append(Sample::force(100, 2.0)).unwrap();
        assert_eq!(fwd.poll_once(), ForwarderStep::Finished);

        assert_eq!(texts(&link), ["   1.00 N", FINISHED_MESSAGE]);
    }

    #[test]
    fn send_failures_are_dropped_without_retry() {
        let (mut writer, reader) = SampleBuffer::with_capacity(4);
        let link = Arc::new(RecordingTransport::new());
        let mut fwd = forwarder(reader, AcquisitionMode::LoadCell, link.clone(), StopSignal::new());

        writer.append(Sample::force(50, 1.0)).unwrap();
        link.fail_next(1);
        assert_eq!(fwd.poll_once(), ForwarderStep::Dropped);
        assert_eq!(fwd.poll_once(), ForwarderStep::Sent);

        assert_eq!(fwd.stats(), ForwarderStats { sent: 1, dropped: 1 });
        assert_eq!(link.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_announces_and_stops_on_full_buffer() {
        let (mut writer, reader) = SampleBuffer::with_capacity(1);
        let link = Arc::new(RecordingTransport::new());
        let fwd = forwarder(reader, AcquisitionMode::LoadCell, link.clone(), StopSignal::new());
        let task = tokio::spawn(fwd.run());

        tokio::time::sleep(Duration::from_millis(120)).await;
        writer.append(Sample::force(50, 3.0)).unwrap();

        let stats = task.await.unwrap();
        let sent = texts(&link);
        assert_eq!(sent.first().map(String::as_str), Some(START_MESSAGE));
        assert_eq!(sent.last().map(String::as_str), Some(FINISHED_MESSAGE));
        // Empty-buffer polls before the append sent nothing.
        assert_eq!(stats.sent as usize, sent.len());
        assert_eq!(sent.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_exits_quietly_on_abort() {
        let (mut writer, reader) = SampleBuffer::with_capacity(10);
        let link = Arc::new(RecordingTransport::new());
        let stop = StopSignal::new();
        let fwd = forwarder(reader, AcquisitionMode::LoadCell, link.clone(), stop.clone());
        let task = tokio::spawn(fwd.run());

        writer.append(Sample::force(50, 3.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(75)).await;
        stop.stop_all(StopReason::External);
        task.await.unwrap();

        assert!(!texts(&link).iter().any(|t| t == FINISHED_MESSAGE));
    }
}
