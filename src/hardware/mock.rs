//! Mock Hardware Implementations
//!
//! Provides simulated devices for running sessions without the test stand attached.
//! All mock devices use async-safe operations (tokio::time::sleep, not std::thread::sleep).
//!
//! # Available Mocks
//!
//! - `MockLoadCell` - Constant raw ADC reading with injectable failures
//! - `MockPowerMonitor` - Constant bus voltage/current with injectable failures
//!
//! Both can be given a per-read latency to exercise tick overruns.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};

use crate::hardware::capabilities::{ForceSensor, PowerMonitor};

/// Consume one pending injected failure, if any.
fn take_failure(pending: &AtomicUsize) -> bool {
    pending
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

// =============================================================================
// MockLoadCell - Simulated Load-Cell Amplifier
// =============================================================================

/// Mock load-cell amplifier
///
/// # Example
///
/// ```rust,ignore
/// let cell = MockLoadCell::new(100);
/// assert_eq!(cell.read_raw_force().await?, 100);
/// cell.fail_next(1);
/// assert!(cell.read_raw_force().await.is_err());
/// ```
pub struct MockLoadCell {
    raw: Arc<RwLock<i32>>,
    pending_failures: AtomicUsize,
    reads: AtomicU64,
    latency: Option<Duration>,
}

impl MockLoadCell {
    /// Create a load cell that always reports `raw`
    pub fn new(raw: i32) -> Self {
        Self {
            raw: Arc::new(RwLock::new(raw)),
            pending_failures: AtomicUsize::new(0),
            reads: AtomicU64::new(0),
            latency: None,
        }
    }

    /// Delay every read by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Change the reported raw value
    pub async fn set_raw(&self, raw: i32) {
        *self.raw.write().await = raw;
    }

    /// Make the next `count` reads fail with a communication error
    pub fn fail_next(&self, count: usize) {
        self.pending_failures.fetch_add(count, Ordering::AcqRel);
    }

    /// Number of read attempts so far, failed ones included
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Acquire)
    }
}

impl Default for MockLoadCell {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl ForceSensor for MockLoadCell {
    async fn read_raw_force(&self) -> Result<i32> {
        self.reads.fetch_add(1, Ordering::AcqRel);
        if let Some(latency) = self.latency {
            sleep(latency).await;
        }
        if take_failure(&self.pending_failures) {
            return Err(anyhow!("load cell data line not ready"));
        }
        Ok(*self.raw.read().await)
    }
}

// =============================================================================
// MockPowerMonitor - Simulated Voltage/Current Monitor
// =============================================================================

/// Mock bus voltage/current monitor
///
/// A failure injected with `fail_next` affects one whole read cycle: the next
/// voltage read and the next current read both fail. `fail_next_voltage` and
/// `fail_next_current` target a single register.
pub struct MockPowerMonitor {
    voltage: Arc<RwLock<f64>>,
    current: Arc<RwLock<f64>>,
    pending_voltage_failures: AtomicUsize,
    pending_current_failures: AtomicUsize,
    reads: AtomicU64,
    latency: Option<Duration>,
}

impl MockPowerMonitor {
    /// Create a monitor reporting fixed voltage (V) and current (A)
    pub fn new(voltage: f64, current: f64) -> Self {
        Self {
            voltage: Arc::new(RwLock::new(voltage)),
            current: Arc::new(RwLock::new(current)),
            pending_voltage_failures: AtomicUsize::new(0),
            pending_current_failures: AtomicUsize::new(0),
            reads: AtomicU64::new(0),
            latency: None,
        }
    }

    /// Delay every read by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn set_voltage(&self, voltage: f64) {
        *self.voltage.write().await = voltage;
    }

    pub async fn set_current(&self, current: f64) {
        *self.current.write().await = current;
    }

    /// Make the next `count` read cycles fail
    pub fn fail_next(&self, count: usize) {
        self.pending_voltage_failures
            .fetch_add(count, Ordering::AcqRel);
        self.pending_current_failures
            .fetch_add(count, Ordering::AcqRel);
    }

    /// Make only the next `count` bus voltage reads fail
    pub fn fail_next_voltage(&self, count: usize) {
        self.pending_voltage_failures
            .fetch_add(count, Ordering::AcqRel);
    }

    /// Make only the next `count` current reads fail
    pub fn fail_next_current(&self, count: usize) {
        self.pending_current_failures
            .fetch_add(count, Ordering::AcqRel);
    }

    /// Number of voltage+current read attempts so far
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Acquire)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            sleep(latency).await;
        }
    }
}

impl Default for MockPowerMonitor {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

#[async_trait]
impl PowerMonitor for MockPowerMonitor {
    async fn read_bus_voltage(&self) -> Result<f64> {
        self.reads.fetch_add(1, Ordering::AcqRel);
        self.delay().await;
        if take_failure(&self.pending_voltage_failures) {
            return Err(anyhow!("power monitor NACK on bus voltage register"));
        }
        Ok(*self.voltage.read().await)
    }

    async fn read_current(&self) -> Result<f64> {
        self.reads.fetch_add(1, Ordering::AcqRel);
        self.delay().await;
        if take_failure(&self.pending_current_failures) {
            return Err(anyhow!("power monitor NACK on current register"));
        }
        Ok(*self.current.read().await)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
