//! Go-Back-N transfer drivers: the state machines wired to a transport.
//!
//! # Architecture
//!
//! ```text
//!  send_stream(data)                               receive_stream()
//!      │ packet::chunk                                   ▲ reassembled bytes
//!      ▼                                                 │
//!  transmit loop ──────────── DATA ─────────────▶  receiver loop
//!    ├── GbnSender (window)                          └── GbnReceiver
//!    ├── RetransmitTimer
//!    └── events (mpsc) ◀── ack listener task ◀── ACK ──┘
//! ```
//!
//! The sender's window state has a single owner, the transmit loop.  The
//! acknowledgment listener owns the reading half of the transport and only
//! forwards what it reads as [`SenderEvent`]s, so no lock guards the window.
//! Each loop iteration is one `tokio::select!` that handles, in priority
//! order, an incoming ACK, the retransmit deadline, or one packet send.
//!
//! The receiver needs no concurrency: it alternates one blocking receive
//! with one acknowledgment until the peer closes the channel.

use tokio::sync::mpsc;

use crate::config::{GbnConfig, MAX_WINDOW};
use crate::connection::{ConnError, PacketReader, PacketWriter, Role, Transport};
use crate::gbn_receiver::GbnReceiver;
use crate::gbn_sender::{AckOutcome, GbnSender};
use crate::packet::{self, Packet};
use crate::socket::TcpTransport;
use crate::timer::RetransmitTimer;

/// Capacity of the listener → transmit loop event queue.
const EVENT_QUEUE: usize = 64;

/// What the acknowledgment listener reports to the transmit loop.
#[derive(Debug)]
enum SenderEvent {
    Ack(u8),
    /// The peer closed its side.
    Closed,
    Failed(ConnError),
}

/// Counters for one completed outbound transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    /// Distinct packets in the transfer.
    pub packets: usize,
    /// Data packets written, retransmissions included.
    pub transmissions: usize,
    /// Retransmit timer expiries.
    pub timeouts: usize,
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Connect to `addr:port` and reliably deliver `data`.
///
/// Returns once the peer has acknowledged every fragment.
pub async fn send_stream(data: &[u8], addr: &str, port: u16) -> Result<(), ConnError> {
    let transport = TcpTransport::open(Role::Outbound, addr, port).await?;
    send_stream_with(transport, data, &GbnConfig::default()).await?;
    Ok(())
}

/// Accept one peer on `addr:port` and return everything it sends.
///
/// Returns once the peer closes the connection.
pub async fn receive_stream(addr: &str, port: u16) -> Result<Vec<u8>, ConnError> {
    let transport = TcpTransport::open(Role::Inbound, addr, port).await?;
    receive_stream_with(transport).await
}

/// Deliver `data` over an already-open transport.
pub async fn send_stream_with<T: Transport>(
    transport: T,
    data: &[u8],
    config: &GbnConfig,
) -> Result<SendStats, ConnError> {
    send_packets(transport, packet::chunk(data), config).await
}

/// Reassemble the byte stream arriving on an already-open transport.
pub async fn receive_stream_with<T: Transport>(transport: T) -> Result<Vec<u8>, ConnError> {
    let (mut reader, mut writer) = transport.into_split();
    let result = receive_loop(&mut reader, &mut writer).await;
    let closed = writer.close().await;
    let data = result?;
    closed?;
    log::info!("[gbn:recv] transfer complete: {} byte(s)", data.len());
    Ok(data)
}

/// Deliver a pre-chunked packet sequence over `transport`, then close it.
///
/// Fails with [`ConnError::InvalidWindow`] before touching the transport
/// unless `config.window_size` is in `1..=255`.
pub async fn send_packets<T: Transport>(
    transport: T,
    packets: Vec<Packet>,
    config: &GbnConfig,
) -> Result<SendStats, ConnError> {
    if !(1..=MAX_WINDOW).contains(&config.window_size) {
        return Err(ConnError::InvalidWindow(config.window_size));
    }
    let (mut reader, mut writer) = transport.into_split();
    reader.set_read_timeout(Some(config.read_timeout));

    let (events_tx, mut events) = mpsc::channel(EVENT_QUEUE);
    let listener = tokio::spawn(ack_listener(reader, events_tx));

    let result = transmit_loop(&mut writer, &mut events, packets, config).await;

    // Closing the writer lets the peer finish; dropping the queue tells the
    // listener to stop at its next read timeout if the peer stays silent.
    let closed = writer.close().await;
    drop(events);
    if let Err(e) = listener.await {
        log::warn!("[gbn:send] ack listener ended abnormally: {e}");
    }

    let stats = result?;
    closed?;
    log::info!(
        "[gbn:send] transfer complete: {} packet(s), {} transmission(s), {} timeout(s)",
        stats.packets,
        stats.transmissions,
        stats.timeouts
    );
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Sender activities
// ---------------------------------------------------------------------------

/// Read acknowledgments and forward them until shutdown.
async fn ack_listener<R: PacketReader>(mut reader: R, events: mpsc::Sender<SenderEvent>) {
    loop {
        let event = match reader.recv().await {
            Ok(Some(ack)) => SenderEvent::Ack(ack.ack),
            Ok(None) => SenderEvent::Closed,
            Err(ConnError::TimedOut) => {
                if events.is_closed() {
                    break;
                }
                continue;
            }
            Err(ConnError::Malformed(e)) => {
                log::warn!("[gbn:send] discarding malformed packet: {e}");
                continue;
            }
            Err(e) => SenderEvent::Failed(e),
        };

        let last = !matches!(event, SenderEvent::Ack(_));
        if events.send(event).await.is_err() || last {
            break;
        }
    }
}

/// Own the window: send, process ACKs, go back N on timeout.
async fn transmit_loop<W: PacketWriter>(
    writer: &mut W,
    events: &mut mpsc::Receiver<SenderEvent>,
    packets: Vec<Packet>,
    config: &GbnConfig,
) -> Result<SendStats, ConnError> {
    let mut sender = GbnSender::new(packets, config.window_size);
    let mut timer = RetransmitTimer::new(config.rto);
    let mut stats = SendStats {
        packets: sender.total(),
        ..SendStats::default()
    };

    while !sender.is_done() {
        tokio::select! {
            biased;

            event = events.recv() => match event {
                Some(SenderEvent::Ack(ack)) => match sender.on_ack(ack) {
                    AckOutcome::Advanced { acked, window_empty } => {
                        if window_empty {
                            timer.cancel();
                        } else {
                            timer.arm();
                        }
                        log::debug!(
                            "[gbn:send] ← ACK ack={ack} slid={acked} base={}",
                            sender.base()
                        );
                    }
                    AckOutcome::Ignored => {
                        log::debug!("[gbn:send] ← ACK ack={ack} ignored (base={})", sender.base());
                    }
                },
                Some(SenderEvent::Failed(e)) => return Err(e),
                Some(SenderEvent::Closed) | None => return Err(ConnError::PeerClosed),
            },

            _ = timer.expired() => {
                let resend = sender.on_timeout();
                timer.cancel();
                stats.timeouts += 1;
                log::debug!(
                    "[gbn:send] timeout — going back to base={} ({resend} packet(s))",
                    sender.base()
                );
            }

            _ = std::future::ready(()), if sender.can_send() => {
                if let Some(tx) = sender.next_packet() {
                    writer.send(tx.packet).await?;
                    log::debug!("[gbn:send] → {}", tx.packet);
                    if tx.arm_timer {
                        timer.arm();
                    }
                    stats.transmissions += 1;
                }
            }
        }
    }

    Ok(stats)
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

async fn receive_loop<R: PacketReader, W: PacketWriter>(
    reader: &mut R,
    writer: &mut W,
) -> Result<Vec<u8>, ConnError> {
    let mut receiver = GbnReceiver::new();

    loop {
        let packet = match reader.recv().await {
            Ok(Some(packet)) => packet,
            Ok(None) => break,
            Err(ConnError::Malformed(e)) => {
                log::warn!("[gbn:recv] discarding malformed packet: {e}");
                continue;
            }
            Err(ConnError::TimedOut) => continue,
            Err(e) => return Err(e),
        };

        let delivery = receiver.on_packet(&packet);
        log::debug!(
            "[gbn:recv] ← {packet} accepted={}; → ACK ack={}",
            delivery.is_accepted(),
            delivery.ack().ack
        );
        if let Err(e) = writer.send(delivery.ack()).await {
            log::warn!("[gbn:recv] failed to send ACK ack={}: {e}", delivery.ack().ack);
        }
    }

    Ok(receiver.into_data())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::{self, SimConfig};
    use std::time::Duration;

    #[tokio::test]
    async fn hello_world_one_data_packet_one_ack() {
        let (a, b, monitor) = simulator::pair(SimConfig::lossless());
        // Nothing is lost, so no deadline may expire before the ACK lands.
        let config = GbnConfig {
            rto: Duration::from_secs(5),
            ..GbnConfig::default()
        };

        let (sent, received) = tokio::join!(
            send_stream_with(a, b"hello world", &config),
            receive_stream_with(b)
        );
        let stats = sent.unwrap();
        assert_eq!(received.unwrap(), b"hello world");
        assert_eq!(stats.packets, 1);
        assert_eq!(stats.transmissions, 1);
        assert_eq!(stats.timeouts, 0);
        assert_eq!(monitor.stats().data_sent, 1);
        assert_eq!(monitor.stats().acks_sent, 1);
    }

    #[tokio::test]
    async fn zero_window_is_rejected() {
        let (a, _b, monitor) = simulator::pair(SimConfig::lossless());
        let config = GbnConfig {
            window_size: 0,
            ..GbnConfig::default()
        };

        let err = send_stream_with(a, b"data", &config).await.unwrap_err();
        assert!(matches!(err, ConnError::InvalidWindow(0)), "got {err:?}");
        assert_eq!(monitor.stats().data_sent, 0);
    }

    #[tokio::test]
    async fn oversized_window_is_rejected() {
        let (a, _b, _monitor) = simulator::pair(SimConfig::lossless());
        let config = GbnConfig {
            window_size: 256,
            ..GbnConfig::default()
        };

        let err = send_stream_with(a, b"data", &config).await.unwrap_err();
        assert!(matches!(err, ConnError::InvalidWindow(256)));
    }

    #[tokio::test]
    async fn receiver_discards_malformed_reads() {
        let (a, b, _monitor) = simulator::pair(SimConfig::lossless());
        let (_a_rx, mut a_tx) = a.into_split();

        a_tx.send_raw(vec![0, 0, 0]).unwrap();
        a_tx.send(&Packet::data(0, b"ok".to_vec())).await.unwrap();
        a_tx.close().await.unwrap();

        let data = receive_stream_with(b).await.unwrap();
        assert_eq!(data, b"ok");
    }

    #[tokio::test]
    async fn sender_reports_peer_closed() {
        let (a, b, _monitor) = simulator::pair(SimConfig::lossless());
        let (_b_rx, mut b_tx) = b.into_split();
        b_tx.close().await.unwrap();

        let err = send_stream_with(a, b"never acked", &GbnConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnError::PeerClosed));
    }

    #[tokio::test]
    async fn empty_payload_round_trips() {
        let (a, b, _monitor) = simulator::pair(SimConfig::lossless());
        let config = GbnConfig::default();
        let (sent, received) = tokio::join!(
            send_stream_with(a, b"", &config),
            receive_stream_with(b)
        );
        assert_eq!(sent.unwrap().packets, 1);
        assert!(received.unwrap().is_empty());
    }
}
