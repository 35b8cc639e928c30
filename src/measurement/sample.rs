use bitflags::bitflags;

bitflags! {
    /// Per-sample status markers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SampleFlags: u8 {
        /// The load cell could not be read this tick; `force_newtons` is neutral.
        const FORCE_SKIPPED = 1 << 0;
        /// Power was not derived this tick because voltage or current is missing.
        const POWER_SKIPPED = 1 << 1;
        /// The bus voltage register could not be read; `voltage_volts` is neutral.
        const VOLTAGE_SKIPPED = 1 << 2;
        /// The current register could not be read; `current_amps` is neutral.
        const CURRENT_SKIPPED = 1 << 3;
    }
}

/// One timestamped record, created exactly once per scheduler tick.
///
/// Fields that the session's [`AcquisitionMode`](super::AcquisitionMode) does not
/// record, or that were skipped after a read failure, hold `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    /// Milliseconds since the session started, `index * period`.
    pub timestamp_ms: u64,
    pub force_newtons: f64,
    pub voltage_volts: f64,
    pub current_amps: f64,
    /// `voltage_volts * current_amps`.
    pub power_watts: f64,
    pub flags: SampleFlags,
}

impl Sample {
    /// A load-cell-only sample.
    pub fn force(timestamp_ms: u64, force_newtons: f64) -> Self {
        Self {
            timestamp_ms,
            force_newtons,
            ..Default::default()
        }
    }

    /// Attach power-monitor readings; power is derived as `voltage * current`.
    pub fn with_power(mut self, voltage_volts: f64, current_amps: f64) -> Self {
        self.voltage_volts = voltage_volts;
        self.current_amps = current_amps;
        self.power_watts = voltage_volts * current_amps;
        self
    }

    /// Record power-monitor readings, keeping whichever register succeeded.
    ///
    /// Power is derived only when both are present; otherwise it stays neutral and
    /// [`SampleFlags::POWER_SKIPPED`] is raised alongside the failed channel's flag.
    pub fn with_partial_power(self, voltage_volts: Option<f64>, current_amps: Option<f64>) -> Self {
        match (voltage_volts, current_amps) {
            (Some(voltage), Some(current)) => self.with_power(voltage, current),
            (voltage, current) => {
                let mut sample = self;
                sample.voltage_volts = voltage.unwrap_or(0.0);
                sample.current_amps = current.unwrap_or(0.0);
                sample.power_watts = 0.0;
                sample.flags |= SampleFlags::POWER_SKIPPED;
                if voltage.is_none() {
                    sample.flags |= SampleFlags::VOLTAGE_SKIPPED;
                }
                if current.is_none() {
                    sample.flags |= SampleFlags::CURRENT_SKIPPED;
                }
                sample
            }
        }
    }

    /// The load cell read failed this tick.
    pub fn force_skipped(&self) -> bool {
        self.flags.contains(SampleFlags::FORCE_SKIPPED)
    }

    /// The bus voltage read failed this tick.
    pub fn voltage_skipped(&self) -> bool {
        self.flags.contains(SampleFlags::VOLTAGE_SKIPPED)
    }

    /// The current read failed this tick.
    pub fn current_skipped(&self) -> bool {
        self.flags.contains(SampleFlags::CURRENT_SKIPPED)
    }

    /// `power_watts` was not derived this tick.
    pub fn power_skipped(&self) -> bool {
        self.flags.contains(SampleFlags::POWER_SKIPPED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_is_voltage_times_current() {
        let sample = Sample::force(50, 1.5).with_power(16.0, 2.5);
        assert_eq!(sample.power_watts, 40.0);
        assert_eq!(sample.force_newtons, 1.5);
        assert_eq!(sample.timestamp_ms, 50);
    }

    #[test]
    fn default_sample_is_neutral() {
        let sample = Sample::default();
        assert_eq!(sample.timestamp_ms, 0);
        assert_eq!(sample.force_newtons, 0.0);
        assert_eq!(sample.power_watts, 0.0);
        assert!(sample.flags.is_empty());
    }

    #[test]
    fn partial_power_keeps_the_good_register() {
        let sample = Sample::force(50, 1.0).with_partial_power(None, Some(2.5));
        assert_eq!(sample.current_amps, 2.5);
        assert_eq!(sample.voltage_volts, 0.0);
        assert_eq!(sample.power_watts, 0.0);
        assert!(sample.voltage_skipped());
        assert!(!sample.current_skipped());
        assert!(sample.power_skipped());
    }

    #[test]
    fn partial_power_with_both_registers_is_full_power() {
        let sample = Sample::force(50, 1.0).with_partial_power(Some(16.0), Some(2.5));
        assert_eq!(sample, Sample::force(50, 1.0).with_power(16.0, 2.5));
        assert!(sample.flags.is_empty());
    }

    #[test]
    fn skip_markers() {
        let mut sample = Sample::force(100, 0.0);
        sample.flags |= SampleFlags::POWER_SKIPPED;
        assert!(sample.power_skipped());
        assert!(!sample.force_skipped());
    }
}
