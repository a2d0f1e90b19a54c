//! Protocol tunables.

use std::time::Duration;

/// Go-Back-N window size N.
pub const WINDOW_SIZE: usize = 8;

/// Largest usable window: one less than the 8-bit sequence space.
pub const MAX_WINDOW: usize = u8::MAX as usize;

/// Retransmission deadline measured from the last (re)arm of the timer.
pub const RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(10);

/// How long the acknowledgment listener blocks before re-checking for shutdown.
pub const ACK_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Parameters for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GbnConfig {
    /// Packets allowed in flight at once; `1..=255`.
    pub window_size: usize,
    /// Retransmission timeout.
    pub rto: Duration,
    /// Read timeout of the sender's acknowledgment listener.
    pub read_timeout: Duration,
}

impl Default for GbnConfig {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            rto: RETRANSMIT_TIMEOUT,
            read_timeout: ACK_READ_TIMEOUT,
        }
    }
}
