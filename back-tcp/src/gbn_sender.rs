//! Go-Back-N send-side state machine.
//!
//! [`GbnSender`] maintains a sliding window of up to `N` in-flight packets
//! over an ordered, pre-chunked packet list.
//!
//! # Protocol contract
//!
//! - At most `window_size` packets may be in flight at once.
//! - ACKs are **cumulative**: `ack = K` means the receiver has accepted every
//!   packet up to and including sequence number `K`.
//! - On timeout, every packet from `base` up to `next_to_send` is flagged as
//!   a retransmission and `next_to_send` rewinds to `base` (go back to N).
//! - Sequence numbers are `u8` on the wire.  Window positions are kept as
//!   absolute indices here; an ACK is matched against them by its wrapping
//!   distance from `base`, which is unambiguous while the window is smaller
//!   than the 256-value sequence space.
//!
//! This module only manages state; all transport I/O and the timer itself
//! are the caller's responsibility.  Each method tells the caller what to do
//! with the timer.

use crate::config::MAX_WINDOW;
use crate::packet::Packet;

/// Wrapping distance from sequence number `from` forward to `to`.
#[inline]
pub fn seq_offset(from: u8, to: u8) -> u8 {
    to.wrapping_sub(from)
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// One packet released by [`GbnSender::next_packet`].
#[derive(Debug)]
pub struct Transmit<'a> {
    pub packet: &'a Packet,
    /// The window was empty before this packet: start the retransmit timer.
    pub arm_timer: bool,
}

/// Result of feeding an acknowledgment to [`GbnSender::on_ack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Duplicate, stale, or never-sent sequence number.  Nothing changes.
    Ignored,
    /// `base` advanced by `acked` packets.
    ///
    /// `window_empty` tells the caller to cancel the timer (`true`) or to
    /// restart it for the new oldest packet (`false`).
    Advanced { acked: usize, window_empty: bool },
}

// ---------------------------------------------------------------------------
// GbnSender
// ---------------------------------------------------------------------------

/// Go-Back-N send-side state for one outbound transfer.
///
/// ```text
///     base          next_to_send
///      │                  │
///  ────┼──────────────────┼──────────────────▶ packet index
///      │ <── in flight ──▶│ <── sendable ───▶
/// ```
#[derive(Debug)]
pub struct GbnSender {
    packets: Vec<Packet>,

    /// Index of the **oldest** unacknowledged packet (left window edge).
    base: usize,

    /// Index of the next packet to put on the wire.
    next_to_send: usize,

    /// One past the highest index ever transmitted.  Survives a timeout
    /// rewind so late ACKs for the abandoned tail still count.
    sent_high: usize,

    /// Maximum number of packets that may be in flight simultaneously (N).
    window_size: usize,
}

impl GbnSender {
    /// Create a sender for `packets` with window size `window_size`.
    ///
    /// # Panics
    ///
    /// Panics unless `1 <= window_size <= 255`: a window as large as the
    /// sequence space would make ACKs ambiguous.
    pub fn new(packets: Vec<Packet>, window_size: usize) -> Self {
        assert!(
            (1..=MAX_WINDOW).contains(&window_size),
            "window_size must be in 1..=255, got {window_size}"
        );
        Self {
            packets,
            base: 0,
            next_to_send: 0,
            sent_high: 0,
            window_size,
        }
    }

    /// Total number of packets in this transfer.
    pub fn total(&self) -> usize {
        self.packets.len()
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn next_to_send(&self) -> usize {
        self.next_to_send
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Packets between `base` and `next_to_send`.
    pub fn in_flight(&self) -> usize {
        self.next_to_send - self.base
    }

    /// The full packet list, including retransmission flags set so far.
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// `true` once every packet has been acknowledged.
    pub fn is_done(&self) -> bool {
        self.base >= self.packets.len()
    }

    /// `true` when the window has room and unsent packets remain.
    pub fn can_send(&self) -> bool {
        self.next_to_send < self.base + self.window_size && self.next_to_send < self.packets.len()
    }

    /// Release the packet at `next_to_send` and advance past it.
    ///
    /// Returns `None` when [`can_send`](Self::can_send) is false.
    pub fn next_packet(&mut self) -> Option<Transmit<'_>> {
        if !self.can_send() {
            return None;
        }
        let arm_timer = self.next_to_send == self.base;
        let index = self.next_to_send;
        self.next_to_send += 1;
        self.sent_high = self.sent_high.max(self.next_to_send);
        Some(Transmit {
            packet: &self.packets[index],
            arm_timer,
        })
    }

    /// Process a cumulative ACK.
    ///
    /// An ACK for `base` slides the window by one.  An ACK naming a later
    /// transmitted packet confirms everything up to it.  Anything else is a
    /// no-op.
    pub fn on_ack(&mut self, ack: u8) -> AckOutcome {
        let outstanding = self.sent_high - self.base;
        if outstanding == 0 {
            return AckOutcome::Ignored;
        }

        let offset = seq_offset(self.base as u8, ack) as usize;
        if offset >= outstanding {
            return AckOutcome::Ignored;
        }

        let acked = offset + 1;
        self.base += acked;
        self.next_to_send = self.next_to_send.max(self.base);
        AckOutcome::Advanced {
            acked,
            window_empty: self.base == self.next_to_send,
        }
    }

    /// The retransmit timer expired.
    ///
    /// Flags every packet in `base..next_to_send` for retransmission and
    /// rewinds `next_to_send` to `base`.  Returns the number of packets that
    /// will be resent; the caller disarms the timer and the next transmission
    /// re-arms it.
    pub fn on_timeout(&mut self) -> usize {
        let count = self.in_flight();
        for packet in &mut self.packets[self.base..self.next_to_send] {
            packet.flag = 1;
        }
        self.next_to_send = self.base;
        count
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::chunk;

    fn sender(total: usize, window: usize) -> GbnSender {
        GbnSender::new(chunk(&vec![0u8; total * 64]), window)
    }

    /// Send until the window is full; return the sequence numbers sent.
    fn fill(s: &mut GbnSender) -> Vec<u8> {
        let mut sent = Vec::new();
        while let Some(tx) = s.next_packet() {
            sent.push(tx.packet.seq);
        }
        sent
    }

    #[test]
    fn initial_state() {
        let s = sender(4, 8);
        assert_eq!(s.base(), 0);
        assert_eq!(s.next_to_send(), 0);
        assert_eq!(s.total(), 4);
        assert!(s.can_send());
        assert!(!s.is_done());
    }

    #[test]
    fn first_packet_arms_timer_only() {
        let mut s = sender(3, 8);
        assert!(s.next_packet().unwrap().arm_timer);
        assert!(!s.next_packet().unwrap().arm_timer);
        assert!(!s.next_packet().unwrap().arm_timer);
        assert!(s.next_packet().is_none());
    }

    #[test]
    fn window_full_blocks_send() {
        let mut s = sender(20, 8);
        assert_eq!(fill(&mut s), (0..8).collect::<Vec<u8>>());
        assert!(!s.can_send());
        assert_eq!(s.in_flight(), 8);
    }

    #[test]
    fn ack_slides_window_by_one() {
        let mut s = sender(20, 8);
        fill(&mut s);
        assert_eq!(
            s.on_ack(0),
            AckOutcome::Advanced { acked: 1, window_empty: false }
        );
        assert_eq!(s.base(), 1);
        assert_eq!(fill(&mut s), vec![8]);
    }

    #[test]
    fn cumulative_ack_slides_multiple() {
        let mut s = sender(4, 8);
        fill(&mut s);
        assert_eq!(
            s.on_ack(3),
            AckOutcome::Advanced { acked: 4, window_empty: true }
        );
        assert!(s.is_done());
    }

    #[test]
    fn duplicate_ack_ignored() {
        let mut s = sender(4, 8);
        fill(&mut s);
        s.on_ack(0);
        assert_eq!(s.on_ack(0), AckOutcome::Ignored);
        assert_eq!(s.base(), 1);
    }

    #[test]
    fn initial_receiver_ack_ignored() {
        let mut s = sender(4, 8);
        fill(&mut s);
        assert_eq!(s.on_ack(255), AckOutcome::Ignored);
        assert_eq!(s.base(), 0);
    }

    #[test]
    fn ack_beyond_sent_ignored() {
        let mut s = sender(20, 4);
        fill(&mut s);
        assert_eq!(s.on_ack(6), AckOutcome::Ignored);
        assert_eq!(s.base(), 0);
    }

    #[test]
    fn ack_before_anything_sent_ignored() {
        let mut s = sender(4, 8);
        assert_eq!(s.on_ack(0), AckOutcome::Ignored);
    }

    #[test]
    fn timeout_flags_window_and_rewinds() {
        let mut s = sender(6, 4);
        fill(&mut s);
        s.on_ack(0);
        assert_eq!(s.on_timeout(), 3);
        assert_eq!(s.next_to_send(), 1);
        let flags: Vec<u8> = s.packets().iter().map(|p| p.flag).collect();
        assert_eq!(flags, vec![0, 1, 1, 1, 0, 0]);

        // Resend starts at base and re-arms the timer.
        let tx = s.next_packet().unwrap();
        assert_eq!(tx.packet.seq, 1);
        assert!(tx.arm_timer);
        assert!(tx.packet.is_retransmit());
    }

    #[test]
    fn timeout_on_empty_window_is_noop() {
        let mut s = sender(2, 4);
        assert_eq!(s.on_timeout(), 0);
        assert_eq!(s.next_to_send(), 0);
    }

    #[test]
    fn late_ack_after_rewind_still_counts() {
        let mut s = sender(4, 8);
        fill(&mut s);
        s.on_timeout();
        assert_eq!(s.in_flight(), 0);
        assert_eq!(
            s.on_ack(2),
            AckOutcome::Advanced { acked: 3, window_empty: true }
        );
        assert_eq!(s.next_to_send(), 3);
        assert_eq!(fill(&mut s), vec![3]);
    }

    #[test]
    fn window_bound_holds_throughout() {
        let mut s = sender(40, 8);
        let mut acks = 0u8;
        while !s.is_done() {
            while s.next_packet().is_some() {
                assert!(s.in_flight() <= 8);
            }
            if acks % 5 == 4 {
                s.on_timeout();
            }
            s.on_ack(s.base() as u8);
            acks = acks.wrapping_add(1);
            assert!(s.in_flight() <= 8);
        }
    }

    #[test]
    fn seq_wrap_around() {
        let mut s = sender(300, 8);
        while s.base() < 248 {
            fill(&mut s);
            let last = (s.next_to_send() - 1) as u8;
            s.on_ack(last);
        }
        assert_eq!(s.base(), 248);
        fill(&mut s);
        s.on_ack(251);
        assert_eq!(s.base(), 252);

        // Indices 256..260 go out as seq 0..3.
        assert_eq!(fill(&mut s), vec![0, 1, 2, 3]);
        assert_eq!(
            s.on_ack(1),
            AckOutcome::Advanced { acked: 6, window_empty: false }
        );
        assert_eq!(s.base(), 258);
        assert_eq!(s.in_flight(), 2);
    }

    #[test]
    #[should_panic]
    fn zero_window_rejected() {
        GbnSender::new(Vec::new(), 0);
    }

    #[test]
    fn empty_transfer_is_done() {
        let s = GbnSender::new(Vec::new(), 8);
        assert!(s.is_done());
        assert!(!s.can_send());
    }
}
