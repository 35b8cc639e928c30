//! Hardware access for the test stand.
//!
//! - [`capabilities`]: the async traits the acquisition core reads through
//! - [`mock`]: simulated devices for bench-top runs and tests

pub mod capabilities;
pub mod mock;

pub use capabilities::{ForceSensor, PowerMonitor};
pub use mock::{MockLoadCell, MockPowerMonitor};
