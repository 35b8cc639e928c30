//! UDP datagrams as the short-range link.
//!
//! Peers are addressed as `host:port` socket addresses. Sending uses
//! `try_send_to`, so a full socket buffer shows up as [`SendError::WouldBlock`]
//! instead of stalling the forwarder.

use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

use super::{PeerId, SendError, TelemetryMessage, WirelessTransport, MAX_MESSAGE_LEN};
use crate::telemetry::{FINISHED_MESSAGE, LEGACY_END_MESSAGE};

/// Sending side of the link.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind a local socket for sending; use `0.0.0.0:0` for an ephemeral port.
    ///
    /// Waits for the socket's first write readiness, since `try_send_to` reports
    /// `WouldBlock` until the runtime has observed it.
    pub async fn bind(local: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        socket.writable().await?;
        tracing::debug!(local = %socket.local_addr()?, "telemetry link bound");
        Ok(Self { socket })
    }

    /// Address the link sends from.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl WirelessTransport for UdpTransport {
    fn send(&self, peer: &PeerId, message: &TelemetryMessage) -> Result<(), SendError> {
        let addr: SocketAddr = peer
            .as_str()
            .parse()
            .map_err(|_| SendError::UnknownPeer(peer.clone()))?;

        match self.socket.try_send_to(message.as_bytes(), addr) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(SendError::WouldBlock),
            Err(e) => Err(SendError::Io(e)),
        }
    }
}

/// Receiving side of the link: prints what the stand forwards.
#[derive(Debug)]
pub struct TelemetryReceiver {
    socket: UdpSocket,
    finished: bool,
}

impl TelemetryReceiver {
    /// Listen on `local` for stand telemetry.
    pub async fn bind(local: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        Ok(Self {
            socket,
            finished: false,
        })
    }

    /// Address the receiver listens on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Wait for the next message.
    ///
    /// Returns `Ok(None)` once the terminal message (or the legacy `end` marker)
    /// has been received; the terminal message itself is returned first.
    pub async fn recv(&mut self) -> io::Result<Option<(SocketAddr, String)>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        let text = String::from_utf8_lossy(&buf[..len]).into_owned();

        if text == FINISHED_MESSAGE || text == LEGACY_END_MESSAGE {
            self.finished = true;
        }
        Ok(Some((from, text)))
    }
}
