//! Best-effort wireless link used by the telemetry forwarder.
//!
//! The link is fire-and-forget: [`WirelessTransport::send`] must not block, gives no
//! delivery guarantee and reports failure only so the caller can log it. There is no
//! retry, acknowledgment or backpressure anywhere in this module.

pub mod udp;

pub use udp::{TelemetryReceiver, UdpTransport};

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Largest payload the link carries in one datagram.
pub const MAX_MESSAGE_LEN: usize = 250;

/// Human-readable text no longer than [`MAX_MESSAGE_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryMessage(String);

impl TelemetryMessage {
    /// Wrap `text`, truncating on a char boundary if it is too long.
    pub fn new(text: impl Into<String>) -> Self {
        let mut text = text.into();
        if text.len() > MAX_MESSAGE_LEN {
            let mut end = MAX_MESSAGE_LEN;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TelemetryMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of the receiving peer, resolved by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PeerId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a telemetry message was not handed to the link.
#[derive(Error, Debug)]
pub enum SendError {
    /// The transport cannot resolve this peer.
    #[error("Unknown peer '{0}'")]
    UnknownPeer(PeerId),

    /// The link could not take the message without blocking.
    #[error("Link busy")]
    WouldBlock,

    /// Any other socket error.
    #[error("Link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-blocking, best-effort message send to a peer.
pub trait WirelessTransport: Send + Sync {
    fn send(&self, peer: &PeerId, message: &TelemetryMessage) -> Result<(), SendError>;
}

/// Discards everything; used when telemetry is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl WirelessTransport for NullTransport {
    fn send(&self, _peer: &PeerId, _message: &TelemetryMessage) -> Result<(), SendError> {
        Ok(())
    }
}

/// Keeps every successfully sent message in memory.
///
/// `fail_next` makes upcoming sends fail with [`SendError::WouldBlock`], which is
/// how a busy link looks to the forwarder.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(PeerId, TelemetryMessage)>>,
    pending_failures: Mutex<usize>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` sends.
    pub fn fail_next(&self, count: usize) {
        *self
            .pending_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += count;
    }

    /// Messages sent so far, oldest first.
    pub fn messages(&self) -> Vec<TelemetryMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Peers addressed so far, oldest first.
    pub fn peers(&self) -> Vec<PeerId> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(peer, _)| peer.clone())
            .collect()
    }
}

impl WirelessTransport for RecordingTransport {
    fn send(&self, peer: &PeerId, message: &TelemetryMessage) -> Result<(), SendError> {
        {
            let mut pending = self
                .pending_failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *pending > 0 {
                *pending -= 1;
                return Err(SendError::WouldBlock);
            }
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((peer.clone(), message.clone()));
        Ok(())
    }
}
