//! Transport binding contract.
//!
//! The state machines never touch sockets directly.  They see a channel as
//! two halves:
//! - [`PacketReader`] — bounded-time receive of one [`Packet`],
//! - [`PacketWriter`] — send one [`Packet`], idempotent close,
//!
//! obtained from a [`Transport`] via [`Transport::into_split`] so the sender
//! can hand the reader to its acknowledgment listener task while keeping the
//! writer.  A transport is owned by exactly one sender or one receiver.
//!
//! Implementations:
//! - [`crate::socket::TcpTransport`] — a tokio `TcpStream`,
//! - [`crate::simulator::SimTransport`] — an in-memory, fault-injecting pair.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::packet::{Packet, PacketError};

/// Which side of the point-to-point channel to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Actively connect to the peer.
    Outbound,
    /// Bind, listen for exactly one peer, accept it.
    Inbound,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors surfaced by transports and the transfer drivers.
#[derive(Error, Debug)]
pub enum ConnError {
    /// Bind, connect or accept failed.  Fatal; never retried.
    #[error("connection setup failed: {0}")]
    Setup(#[source] io::Error),

    /// One read did not hold a whole header.  Discarded by the state machines.
    #[error("malformed packet: {0}")]
    Malformed(#[from] PacketError),

    /// No data arrived within the read timeout.  Not a failure of the peer.
    #[error("read timed out")]
    TimedOut,

    /// The peer closed the channel before the transfer completed.
    #[error("peer closed the connection mid-transfer")]
    PeerClosed,

    /// The configured window cannot be used with 8-bit sequence numbers.
    #[error("window size {0} outside 1..=255")]
    InvalidWindow(usize),

    /// Underlying I/O error after the connection was established.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Receiving half of a transport.
#[async_trait]
pub trait PacketReader: Send + 'static {
    /// Bound every subsequent [`recv`](Self::recv); `None` waits forever.
    fn set_read_timeout(&mut self, timeout: Option<Duration>);

    /// Receive the next packet.
    ///
    /// - `Ok(Some(packet))` — one packet,
    /// - `Ok(None)` — the peer closed the channel (zero-length read),
    /// - `Err(ConnError::TimedOut)` — nothing arrived within the read timeout,
    /// - `Err(ConnError::Malformed)` — a short read; the channel is still usable.
    async fn recv(&mut self) -> Result<Option<Packet>, ConnError>;
}

/// Sending half of a transport.
#[async_trait]
pub trait PacketWriter: Send + 'static {
    /// Write the full encoding of `packet`.
    async fn send(&mut self, packet: &Packet) -> Result<(), ConnError>;

    /// Release the channel.  Safe to call more than once.
    async fn close(&mut self) -> Result<(), ConnError>;
}

/// A connected point-to-point packet channel.
pub trait Transport: Send + 'static {
    type Reader: PacketReader;
    type Writer: PacketWriter;

    fn into_split(self) -> (Self::Reader, Self::Writer);
}
