//! TCP transport binding.
//!
//! [`TcpTransport`] is a thin wrapper around `tokio::net::TcpStream` that
//! speaks [`Packet`] instead of raw bytes.  All protocol logic lives
//! elsewhere; this module owns only byte I/O.
//!
//! A receive is one bounded read of at most [`MAX_PACKET`] bytes, decoded as
//! one packet.  Writes go out with `TCP_NODELAY` so every packet leaves in
//! its own segment.
//!
//! # Limitation
//!
//! The wire format carries no length field, so a read boundary is the only
//! packet boundary.  If a short packet (the final fragment) and a
//! retransmission of it are both queued when the receiver reads, one read
//! returns both and the second packet's bytes are decoded as payload of the
//! first.  Full-size packets (71 bytes, every ACK included) never straddle
//! reads this way.  A retransmit timeout comfortably above the link's round
//! trip keeps the short fragment from being resent behind itself.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::connection::{ConnError, PacketReader, PacketWriter, Role, Transport};
use crate::packet::{Packet, MAX_PACKET};

// ---------------------------------------------------------------------------
// TcpTransport
// ---------------------------------------------------------------------------

/// A connected TCP stream carrying packets.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    /// Address of the remote end.
    pub peer_addr: SocketAddr,
}

impl TcpTransport {
    /// Open the channel in the given role.
    ///
    /// [`Role::Outbound`] connects to `addr:port`.  [`Role::Inbound`] binds
    /// `addr:port`, waits for exactly one peer and accepts it.
    pub async fn open(role: Role, addr: &str, port: u16) -> Result<Self, ConnError> {
        match role {
            Role::Outbound => Self::connect(addr, port).await,
            Role::Inbound => {
                let listener = Self::bind(addr, port).await?;
                Self::accept(listener).await
            }
        }
    }

    /// Connect to `addr:port`.
    pub async fn connect(addr: &str, port: u16) -> Result<Self, ConnError> {
        let stream = TcpStream::connect((addr, port))
            .await
            .map_err(ConnError::Setup)?;
        let transport = Self::from_stream(stream)?;
        log::info!("Connected to {}", transport.peer_addr);
        Ok(transport)
    }

    /// Bind a listener on `addr:port`.  Port 0 lets the OS choose.
    pub async fn bind(addr: &str, port: u16) -> Result<TcpListener, ConnError> {
        let listener = TcpListener::bind((addr, port))
            .await
            .map_err(ConnError::Setup)?;
        if let Ok(local) = listener.local_addr() {
            log::info!("Listening on {} port {}", local.ip(), local.port());
        }
        Ok(listener)
    }

    /// Accept exactly one peer from `listener`, then drop the listener.
    pub async fn accept(listener: TcpListener) -> Result<Self, ConnError> {
        let (stream, remote) = listener.accept().await.map_err(ConnError::Setup)?;
        log::info!(
            "Accepted connection from {} port {}",
            remote.ip(),
            remote.port()
        );
        Self::from_stream(stream)
    }

    fn from_stream(stream: TcpStream) -> Result<Self, ConnError> {
        stream.set_nodelay(true).map_err(ConnError::Setup)?;
        let peer_addr = stream.peer_addr().map_err(ConnError::Setup)?;
        Ok(Self { stream, peer_addr })
    }
}

impl Transport for TcpTransport {
    type Reader = TcpReader;
    type Writer = TcpWriter;

    fn into_split(self) -> (TcpReader, TcpWriter) {
        let (read, write) = self.stream.into_split();
        (
            TcpReader {
                inner: read,
                read_timeout: None,
                buf: [0u8; MAX_PACKET],
            },
            TcpWriter { inner: Some(write) },
        )
    }
}

// ---------------------------------------------------------------------------
// Halves
// ---------------------------------------------------------------------------

/// Receiving half of a [`TcpTransport`].
#[derive(Debug)]
pub struct TcpReader {
    inner: OwnedReadHalf,
    read_timeout: Option<Duration>,
    buf: [u8; MAX_PACKET],
}

#[async_trait]
impl PacketReader for TcpReader {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    async fn recv(&mut self) -> Result<Option<Packet>, ConnError> {
        let read = self.inner.read(&mut self.buf);
        let n = match self.read_timeout {
            Some(limit) => timeout(limit, read)
                .await
                .map_err(|_elapsed| ConnError::TimedOut)??,
            None => read.await?,
        };
        Ok(Packet::decode(&self.buf[..n])?)
    }
}

/// Sending half of a [`TcpTransport`].
#[derive(Debug)]
pub struct TcpWriter {
    /// `None` once closed.
    inner: Option<OwnedWriteHalf>,
}

#[async_trait]
impl PacketWriter for TcpWriter {
    async fn send(&mut self, packet: &Packet) -> Result<(), ConnError> {
        let writer = self.inner.as_mut().ok_or_else(|| {
            ConnError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "transport already closed",
            ))
        })?;
        writer.write_all(&packet.encode()).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ConnError> {
        if let Some(mut writer) = self.inner.take() {
            match writer.shutdown().await {
                Ok(()) => {}
                // The peer may already be gone; the channel is released either way.
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected_pair() -> (TcpTransport, TcpTransport) {
        let listener = TcpTransport::bind("127.0.0.1", 0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (server, client) = tokio::join!(
            TcpTransport::accept(listener),
            TcpTransport::connect("127.0.0.1", port)
        );
        (server.unwrap(), client.unwrap())
    }

    #[tokio::test]
    async fn packet_crosses_the_stream() {
        let (server, client) = connected_pair().await;
        let (mut rx, _server_tx) = server.into_split();
        let (_client_rx, mut tx) = client.into_split();

        let pkt = Packet::data(5, b"over tcp".to_vec());
        tx.send(&pkt).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Some(pkt));
    }

    #[tokio::test]
    async fn close_reads_as_none_and_is_idempotent() {
        let (server, client) = connected_pair().await;
        let (mut rx, _server_tx) = server.into_split();
        let (_client_rx, mut tx) = client.into_split();

        tx.close().await.unwrap();
        tx.close().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), None);
        assert!(tx.send(&Packet::ack(0)).await.is_err());
    }

    #[tokio::test]
    async fn read_timeout_is_reported() {
        let (server, _client) = connected_pair().await;
        let (mut rx, _tx) = server.into_split();
        rx.set_read_timeout(Some(Duration::from_millis(20)));
        assert!(matches!(rx.recv().await, Err(ConnError::TimedOut)));
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_setup_error() {
        let listener = TcpTransport::bind("127.0.0.1", 0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = TcpTransport::open(Role::Outbound, "127.0.0.1", port)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnError::Setup(_)));
    }
}
