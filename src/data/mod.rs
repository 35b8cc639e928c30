//! Sample storage: the in-memory acquisition buffer and its CSV persistence.
pub mod sample_buffer;
pub mod storage;

pub use sample_buffer::{SampleBuffer, SampleReader, SampleWriter};
pub use storage::CsvStorage;
