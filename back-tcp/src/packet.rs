//! Wire-format definitions for protocol packets.
//!
//! Every message exchanged between peers is a [`Packet`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (seven one-byte header fields, payload).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`].
//! - Splitting application data into sequenced packets ([`chunk`]).
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! ```text
//!  0       1       2       3       4       5       6       7
//! +-------+-------+-------+-------+-------+-------+-------+----------------
//! | sport | dport |  seq  |  ack  |  off  |  win  | flag  | payload ...
//! +-------+-------+-------+-------+-------+-------+-------+----------------
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 7 bytes.  The payload is "everything
//! after the seventh byte": there is no length prefix, no padding and no
//! checksum.  At most [`MAX_PAYLOAD`] payload bytes travel in one packet.

use std::fmt;

use thiserror::Error;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 7;

/// Largest payload carried by a single packet.
pub const MAX_PAYLOAD: usize = 64;

/// Largest encoded packet; also the size of one bounded transport read.
pub const MAX_PACKET: usize = HEADER_LEN + MAX_PAYLOAD;

/// Byte used to pad acknowledgment payloads to [`MAX_PAYLOAD`].
pub const ACK_FILLER: u8 = b'n';

/// Only the retransmission bit of the flag byte is meaningful.
const FLAG_MASK: u8 = 0b0000_0001;

// Byte offsets of each field within the serialised header.
const OFF_SPORT: usize = 0;
const OFF_DPORT: usize = 1;
const OFF_SEQ: usize = 2;
const OFF_ACK: usize = 3;
const OFF_DATA_OFF: usize = 4;
const OFF_WIN: usize = 5;
const OFF_FLAG: usize = 6;

/// A complete protocol packet: seven header fields plus payload bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    /// Source port identifier (carried, not interpreted).
    pub sport: u8,
    /// Destination port identifier (carried, not interpreted).
    pub dport: u8,
    /// Sequence number of this fragment, modulo 256.
    pub seq: u8,
    /// Cumulative acknowledgment number, modulo 256.
    pub ack: u8,
    /// Header length; [`HEADER_LEN`] on data packets.
    pub data_off: u8,
    /// Advertised window.  Carried for extensibility only.
    pub win_size: u8,
    /// Retransmission flag.  Only bit 0 survives encoding.
    pub flag: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a data packet carrying `payload` under sequence number `seq`.
    pub fn data(seq: u8, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Self {
            seq,
            data_off: HEADER_LEN as u8,
            payload,
            ..Self::default()
        }
    }

    /// Build an acknowledgment for sequence number `ack`.
    ///
    /// The payload is [`MAX_PAYLOAD`] filler bytes so acknowledgments are
    /// always [`MAX_PACKET`] bytes long on the wire.
    pub fn ack(ack: u8) -> Self {
        Self {
            ack,
            payload: vec![ACK_FILLER; MAX_PAYLOAD],
            ..Self::default()
        }
    }

    /// `true` when the retransmission flag is set.
    pub fn is_retransmit(&self) -> bool {
        self.flag & FLAG_MASK != 0
    }

    /// Clamp every field to its declared width.
    pub fn regulate(&mut self) {
        self.flag &= FLAG_MASK;
    }

    /// Number of bytes [`encode`](Self::encode) will produce.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Serialise this packet into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&[
            self.sport,
            self.dport,
            self.seq,
            self.ack,
            self.data_off,
            self.win_size,
            self.flag & FLAG_MASK,
        ]);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Packet`] from the bytes of one transport read.
    ///
    /// Returns `Ok(None)` for an empty buffer: a zero-length read means the
    /// peer closed the channel.  A non-empty buffer shorter than the header
    /// is [`PacketError::Truncated`].  Everything past the header is payload.
    pub fn decode(buf: &[u8]) -> Result<Option<Self>, PacketError> {
        if buf.is_empty() {
            return Ok(None);
        }
        if buf.len() < HEADER_LEN {
            return Err(PacketError::Truncated { len: buf.len() });
        }

        Ok(Some(Packet {
            sport: buf[OFF_SPORT],
            dport: buf[OFF_DPORT],
            seq: buf[OFF_SEQ],
            ack: buf[OFF_ACK],
            data_off: buf[OFF_DATA_OFF],
            win_size: buf[OFF_WIN],
            flag: buf[OFF_FLAG],
            payload: buf[HEADER_LEN..].to_vec(),
        }))
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet(seq={}, ack={}, win={}, flag={}, data=",
            self.seq, self.ack, self.win_size, self.flag
        )?;
        match self.payload.len() {
            0 => write!(f, "<empty>)"),
            1 => write!(f, "<1 byte>)"),
            n => write!(f, "<{n} bytes>)"),
        }
    }
}

/// Errors that can arise when parsing a raw read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Fewer bytes than the fixed header arrived in one read.
    #[error("short read: {len} byte(s), header needs {HEADER_LEN}")]
    Truncated { len: usize },
}

/// Split `data` into data packets of at most [`MAX_PAYLOAD`] bytes.
///
/// Fragment `i` carries `seq = i mod 256`.  Empty input still yields one
/// packet with an empty payload so the peer observes a complete transfer.
pub fn chunk(data: &[u8]) -> Vec<Packet> {
    if data.is_empty() {
        return vec![Packet::data(0, Vec::new())];
    }
    data.chunks(MAX_PAYLOAD)
        .enumerate()
        .map(|(i, part)| Packet::data(i as u8, part.to_vec()))
        .collect()
}
