//! In-memory network simulator for deterministic testing.
//!
//! Real channels drop and duplicate packets.  To exercise the reliability
//! mechanisms without depending on actual network conditions, [`pair`]
//! returns two connected [`SimTransport`] endpoints backed by tokio channels.
//! Each message is exactly one packet, and every send passes through a
//! shared fault model:
//!
//! | Fault            | Description                                          |
//! |------------------|------------------------------------------------------|
//! | Random loss      | Drop any packet with probability `loss_rate`, drawn  |
//! |                  | from a `StdRng` seeded with `seed`.                  |
//! | Targeted ACK     | Drop the first acknowledgment carrying each number   |
//! |                  | in `drop_acks_once`.                                 |
//! | Targeted data    | Drop the first data packet carrying each sequence    |
//! |                  | number in `drop_seqs_once`.                          |
//!
//! Data packets are told apart from acknowledgments by their header length
//! field, which only data packets set.  Closing (or dropping) one endpoint's
//! writer makes the other endpoint read `Ok(None)`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::connection::{ConnError, PacketReader, PacketWriter, Transport};
use crate::packet::{Packet, HEADER_LEN};

/// Configuration for the fault-injection model.
#[derive(Debug, Clone, Default)]
pub struct SimConfig {
    /// Probability in `[0.0, 1.0]` that any packet is silently dropped.
    pub loss_rate: f64,
    /// Seed for the loss RNG, so failures are reproducible.
    pub seed: u64,
    /// Acknowledgment numbers whose first occurrence is dropped.
    pub drop_acks_once: Vec<u8>,
    /// Data sequence numbers whose first occurrence is dropped.
    pub drop_seqs_once: Vec<u8>,
}

impl SimConfig {
    /// A pass-through channel (no faults).
    pub fn lossless() -> Self {
        Self::default()
    }
}

/// Counters collected across both directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Data packets handed to the channel, including retransmissions.
    pub data_sent: usize,
    /// Data packets sent with the retransmission flag set.
    pub retransmissions: usize,
    /// Acknowledgments handed to the channel.
    pub acks_sent: usize,
    /// Packets the fault model discarded.
    pub dropped: usize,
}

#[derive(Debug)]
struct FaultModel {
    loss_rate: f64,
    rng: StdRng,
    pending_ack_drops: Vec<u8>,
    pending_seq_drops: Vec<u8>,
    stats: SimStats,
    retransmitted: Vec<u8>,
}

impl FaultModel {
    fn new(config: SimConfig) -> Self {
        Self {
            loss_rate: config.loss_rate.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(config.seed),
            pending_ack_drops: config.drop_acks_once,
            pending_seq_drops: config.drop_seqs_once,
            stats: SimStats::default(),
            retransmitted: Vec::new(),
        }
    }

    /// Record `packet` and decide whether it reaches the peer.
    fn admit(&mut self, packet: &Packet) -> bool {
        let is_data = packet.data_off == HEADER_LEN as u8;
        let targeted = if is_data {
            self.stats.data_sent += 1;
            if packet.is_retransmit() {
                self.stats.retransmissions += 1;
                self.retransmitted.push(packet.seq);
            }
            take_first(&mut self.pending_seq_drops, packet.seq)
        } else {
            self.stats.acks_sent += 1;
            take_first(&mut self.pending_ack_drops, packet.ack)
        };

        let lost = targeted || (self.loss_rate > 0.0 && self.rng.random_bool(self.loss_rate));
        if lost {
            self.stats.dropped += 1;
            log::debug!("[sim] dropped {packet}");
        }
        !lost
    }
}

/// Remove the first occurrence of `value`; `true` if one was present.
fn take_first(pending: &mut Vec<u8>, value: u8) -> bool {
    match pending.iter().position(|&v| v == value) {
        Some(i) => {
            pending.remove(i);
            true
        }
        None => false,
    }
}

type SharedModel = Arc<Mutex<FaultModel>>;

fn lock(model: &SharedModel) -> MutexGuard<'_, FaultModel> {
    model.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read-only view of the counters of a simulated link.
#[derive(Debug, Clone)]
pub struct SimMonitor {
    model: SharedModel,
}

impl SimMonitor {
    pub fn stats(&self) -> SimStats {
        lock(&self.model).stats
    }

    /// Sequence numbers of flagged data packets, in send order.
    pub fn retransmitted_seqs(&self) -> Vec<u8> {
        lock(&self.model).retransmitted.clone()
    }
}

/// Create two connected endpoints sharing one fault model.
pub fn pair(config: SimConfig) -> (SimTransport, SimTransport, SimMonitor) {
    let model: SharedModel = Arc::new(Mutex::new(FaultModel::new(config)));
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();

    let a = SimTransport {
        reader: SimReader { inner: a_rx, read_timeout: None },
        writer: SimWriter { inner: Some(a_tx), model: Arc::clone(&model) },
    };
    let b = SimTransport {
        reader: SimReader { inner: b_rx, read_timeout: None },
        writer: SimWriter { inner: Some(b_tx), model: Arc::clone(&model) },
    };
    (a, b, SimMonitor { model })
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// One end of a simulated link.
#[derive(Debug)]
pub struct SimTransport {
    reader: SimReader,
    writer: SimWriter,
}

impl Transport for SimTransport {
    type Reader = SimReader;
    type Writer = SimWriter;

    fn into_split(self) -> (SimReader, SimWriter) {
        (self.reader, self.writer)
    }
}

#[derive(Debug)]
pub struct SimReader {
    inner: mpsc::UnboundedReceiver<Vec<u8>>,
    read_timeout: Option<Duration>,
}

#[async_trait]
impl PacketReader for SimReader {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    async fn recv(&mut self) -> Result<Option<Packet>, ConnError> {
        let message = match self.read_timeout {
            Some(limit) => timeout(limit, self.inner.recv())
                .await
                .map_err(|_elapsed| ConnError::TimedOut)?,
            None => self.inner.recv().await,
        };
        // A closed channel reads as zero bytes.
        let bytes = message.unwrap_or_default();
        Ok(Packet::decode(&bytes)?)
    }
}

#[derive(Debug)]
pub struct SimWriter {
    /// `None` once closed.
    inner: Option<mpsc::UnboundedSender<Vec<u8>>>,
    model: SharedModel,
}

impl SimWriter {
    /// Push raw bytes past the fault model, e.g. to inject a malformed read.
    pub fn send_raw(&mut self, bytes: Vec<u8>) -> Result<(), ConnError> {
        self.deliver(bytes)
    }

    fn deliver(&mut self, bytes: Vec<u8>) -> Result<(), ConnError> {
        let Some(tx) = self.inner.as_ref() else {
            return Err(closed());
        };
        // The peer hanging up mid-send is indistinguishable from loss.
        let _ = tx.send(bytes);
        Ok(())
    }
}

fn closed() -> ConnError {
    ConnError::Io(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "transport already closed",
    ))
}

#[async_trait]
impl PacketWriter for SimWriter {
    async fn send(&mut self, packet: &Packet) -> Result<(), ConnError> {
        if self.inner.is_none() {
            return Err(closed());
        }
        if lock(&self.model).admit(packet) {
            self.deliver(packet.encode())?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ConnError> {
        self.inner = None;
        Ok(())
    }
}
