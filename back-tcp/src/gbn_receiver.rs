//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the receiver side of Go-Back-N:
//!
//! - Only the **in-order** packet (seq == `expected_seq`) is accepted; its
//!   payload is appended to the reassembly buffer and acknowledged.
//! - Out-of-order and duplicate packets are discarded without buffering and
//!   answered with the previous acknowledgment, unchanged.
//! - Before anything is accepted that previous acknowledgment is `ack = 255`,
//!   one before sequence number 0.
//!
//! This module only manages state; all transport I/O is the caller's
//! responsibility.

use crate::packet::Packet;

/// What the caller should do with a received packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// In-order packet; payload appended.  Send this fresh acknowledgment.
    Accepted(Packet),
    /// Out-of-order or duplicate; nothing appended.  Resend this
    /// acknowledgment (the last one sent).
    Rejected(Packet),
}

impl Delivery {
    /// The acknowledgment to put on the wire.
    pub fn ack(&self) -> &Packet {
        match self {
            Delivery::Accepted(ack) | Delivery::Rejected(ack) => ack,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Delivery::Accepted(_))
    }
}

/// Go-Back-N receive-side state for one inbound transfer.
#[derive(Debug)]
pub struct GbnReceiver {
    /// Next sequence number accepted.
    expected_seq: u8,

    /// Acknowledgment resent verbatim on every rejected packet.
    last_ack: Packet,

    /// In-order payload bytes reassembled so far.
    data: Vec<u8>,
}

impl Default for GbnReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl GbnReceiver {
    pub fn new() -> Self {
        Self {
            expected_seq: 0,
            last_ack: Packet::ack(u8::MAX),
            data: Vec::new(),
        }
    }

    pub fn expected_seq(&self) -> u8 {
        self.expected_seq
    }

    pub fn last_ack(&self) -> &Packet {
        &self.last_ack
    }

    /// Bytes reassembled so far.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Process an inbound packet and decide which acknowledgment answers it.
    pub fn on_packet(&mut self, packet: &Packet) -> Delivery {
        if packet.seq != self.expected_seq {
            return Delivery::Rejected(self.last_ack.clone());
        }

        self.data.extend_from_slice(&packet.payload);
        self.last_ack = Packet::ack(self.expected_seq);
        self.expected_seq = self.expected_seq.wrapping_add(1);
        Delivery::Accepted(self.last_ack.clone())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{chunk, MAX_PAYLOAD};

    #[test]
    fn initial_state() {
        let r = GbnReceiver::new();
        assert_eq!(r.expected_seq(), 0);
        assert_eq!(r.last_ack().ack, 255);
        assert_eq!(r.last_ack().payload.len(), MAX_PAYLOAD);
        assert!(r.data().is_empty());
    }

    #[test]
    fn in_order_packet_accepted() {
        let mut r = GbnReceiver::new();
        let d = r.on_packet(&Packet::data(0, b"hello".to_vec()));
        assert!(d.is_accepted());
        assert_eq!(d.ack().ack, 0);
        assert_eq!(r.expected_seq(), 1);
        assert_eq!(r.data(), b"hello");
    }

    #[test]
    fn out_of_order_packet_before_anything_resends_255() {
        let mut r = GbnReceiver::new();
        let d = r.on_packet(&Packet::data(3, b"future".to_vec()));
        assert_eq!(d, Delivery::Rejected(Packet::ack(255)));
        assert_eq!(r.expected_seq(), 0);
        assert!(r.data().is_empty());
    }

    #[test]
    fn duplicate_packet_discarded() {
        let mut r = GbnReceiver::new();
        r.on_packet(&Packet::data(0, b"hello".to_vec()));

        let dup = r.on_packet(&Packet::data(0, b"hello".to_vec()));
        assert!(!dup.is_accepted());
        assert_eq!(dup.ack().ack, 0);
        assert_eq!(r.data(), b"hello");
    }

    #[test]
    fn gap_resends_last_ack_verbatim() {
        let mut r = GbnReceiver::new();
        r.on_packet(&Packet::data(0, b"a".to_vec()));
        r.on_packet(&Packet::data(1, b"b".to_vec()));
        let last = r.last_ack().clone();

        let d = r.on_packet(&Packet::data(3, b"d".to_vec()));
        assert_eq!(d, Delivery::Rejected(last));
        assert_eq!(r.expected_seq(), 2);
    }

    #[test]
    fn reordered_stream_reassembles_in_order() {
        let input: Vec<u8> = (0..=255u8).cycle().take(300).collect();
        let packets = chunk(&input);
        let mut r = GbnReceiver::new();

        // 0, 2 (dropped), 1, 1 (dup), 2, 4 (dropped), 3, 4
        for idx in [0usize, 2, 1, 1, 2, 4, 3, 4] {
            r.on_packet(&packets[idx]);
        }
        assert_eq!(r.expected_seq(), 5);
        assert_eq!(r.into_data(), input);
    }

    #[test]
    fn retransmit_flag_does_not_matter() {
        let mut r = GbnReceiver::new();
        let mut p = Packet::data(0, b"x".to_vec());
        p.flag = 1;
        assert!(r.on_packet(&p).is_accepted());
    }

    #[test]
    fn seq_wrap_around() {
        let mut r = GbnReceiver::new();
        for i in 0..=256usize {
            assert!(r.on_packet(&Packet::data(i as u8, vec![i as u8])).is_accepted());
        }
        assert_eq!(r.expected_seq(), 1);
        assert_eq!(r.last_ack().ack, 0);
        assert_eq!(r.data().len(), 257);
    }
}
