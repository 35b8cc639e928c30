//! Fixed-capacity, pre-allocated sample store with a single writer and many readers.
//!
//! The buffer is allocated once, before acquisition starts, with exactly `capacity`
//! slots set to neutral values. Writing is only possible through the one
//! [`SampleWriter`], which the acquisition scheduler owns; telemetry and the session
//! controller get cloneable [`SampleReader`]s.
//!
//! # Memory Ordering
//!
//! Each slot stores its fields in atomics. The writer stores the fields of slot `i`
//! with `Relaxed` ordering and then publishes `data_index = i + 1` with `Release`.
//! Readers load `data_index` with `Acquire` and only touch slots below it. Because
//! `data_index` never decreases and a published slot is never written again, readers
//! always observe complete samples without a lock.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::BufferFull;
use crate::measurement::{Sample, SampleFlags};

#[derive(Default)]
struct Slot {
    timestamp_ms: AtomicU64,
    force_newtons: AtomicU64,
    voltage_volts: AtomicU64,
    current_amps: AtomicU64,
    power_watts: AtomicU64,
    flags: AtomicU8,
}

impl Slot {
    fn store(&self, sample: &Sample) {
        self.timestamp_ms
            .store(sample.timestamp_ms, Ordering::Relaxed);
        self.force_newtons
            .store(sample.force_newtons.to_bits(), Ordering::Relaxed);
        self.voltage_volts
            .store(sample.voltage_volts.to_bits(), Ordering::Relaxed);
        self.current_amps
            .store(sample.current_amps.to_bits(), Ordering::Relaxed);
        self.power_watts
            .store(sample.power_watts.to_bits(), Ordering::Relaxed);
        self.flags.store(sample.flags.bits(), Ordering::Relaxed);
    }

    fn load(&self) -> Sample {
        Sample {
            timestamp_ms: self.timestamp_ms.load(Ordering::Relaxed),
            force_newtons: f64::from_bits(self.force_newtons.load(Ordering::Relaxed)),
            voltage_volts: f64::from_bits(self.voltage_volts.load(Ordering::Relaxed)),
            current_amps: f64::from_bits(self.current_amps.load(Ordering::Relaxed)),
            power_watts: f64::from_bits(self.power_watts.load(Ordering::Relaxed)),
            flags: SampleFlags::from_bits_retain(self.flags.load(Ordering::Relaxed)),
        }
    }
}

struct Shared {
    slots: Box<[Slot]>,
    /// Number of published samples; only the writer advances it.
    data_index: AtomicUsize,
}

impl Shared {
    fn len(&self) -> usize {
        self.data_index.load(Ordering::Acquire)
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Constructor namespace for the writer/reader pair.
pub struct SampleBuffer;

impl SampleBuffer {
    /// Pre-allocate storage for exactly `capacity` samples.
    ///
    /// # Example
    /// ```
    /// use thrust_daq::data::sample_buffer::SampleBuffer;
    /// use thrust_daq::measurement::Sample;
    ///
    /// let (mut writer, reader) = SampleBuffer::with_capacity(2);
    /// assert_eq!(reader.latest(), None);
    /// writer.append(Sample::force(50, 1.0)).unwrap();
    /// assert_eq!(reader.latest().map(|s| s.timestamp_ms), Some(50));
    /// ```
    pub fn with_capacity(capacity: usize) -> (SampleWriter, SampleReader) {
        let slots: Box<[Slot]> = (0..capacity).map(|_| Slot::default()).collect();
        let shared = Arc::new(Shared {
            slots,
            data_index: AtomicUsize::new(0),
        });
        tracing::debug!(capacity, "allocated sample buffer");
        (
            SampleWriter {
                shared: Arc::clone(&shared),
            },
            SampleReader { shared },
        )
    }
}

/// The only handle that can write into a sample buffer. Deliberately not `Clone`.
pub struct SampleWriter {
    shared: Arc<Shared>,
}

impl SampleWriter {
    /// Write `sample` at the current index and advance it.
    ///
    /// Returns the index written, or [`BufferFull`] once every slot is taken. A full
    /// buffer stays full: later calls keep failing and never overwrite.
    pub fn append(&mut self, sample: Sample) -> Result<usize, BufferFull> {
        let index = self.shared.data_index.load(Ordering::Relaxed);
        let Some(slot) = self.shared.slots.get(index) else {
            return Err(BufferFull {
                capacity: self.shared.capacity(),
            });
        };
        slot.store(&sample);
        self.shared.data_index.store(index + 1, Ordering::Release);
        Ok(index)
    }

    /// A new read handle onto the same storage.
    pub fn reader(&self) -> SampleReader {
        SampleReader {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Samples published so far.
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// `true` until the first append.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots allocated at construction.
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// `true` once every slot has been written.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }
}

/// Read-only, lock-free view of a sample buffer.
#[derive(Clone)]
pub struct SampleReader {
    shared: Arc<Shared>,
}

impl SampleReader {
    /// The most recently written sample, or `None` while the buffer is empty.
    pub fn latest(&self) -> Option<Sample> {
        let len = self.shared.len();
        let index = len.checked_sub(1)?;
        Some(self.shared.slots[index].load())
    }

    /// Copies of the written samples `[0, data_index)`, in order.
    ///
    /// Pre-allocated slots that were never written are excluded. The buffer itself
    /// is left untouched, so persistence can be retried from the same reader.
    pub fn drain(&self) -> Vec<Sample> {
        let len = self.shared.len();
        self.shared.slots[..len].iter().map(Slot::load).collect()
    }

    /// Samples published so far.
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// `true` until the first append.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots allocated at construction.
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// `true` once every slot has been written.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }
}

impl std::fmt::Debug for SampleReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleReader")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
