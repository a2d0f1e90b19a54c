//! Retransmission timer.
//!
//! Go-Back-N runs a single timer for the whole window, not one per packet.
//! [`RetransmitTimer`] holds at most one deadline:
//! - [`arm`](RetransmitTimer::arm) sets it to `now + rto` (re-arming resets it),
//! - [`cancel`](RetransmitTimer::cancel) clears it,
//! - [`expired`](RetransmitTimer::expired) is a future that completes at the
//!   deadline and never completes while disarmed, so it can sit in a
//!   `tokio::select!` branch without a guard spinning the loop.

use std::future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Single cancellable retransmission deadline.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    rto: Duration,
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    /// Create a disarmed timer that fires `rto` after each arming.
    pub fn new(rto: Duration) -> Self {
        Self {
            rto,
            deadline: None,
        }
    }

    pub fn rto(&self) -> Duration {
        self.rto
    }

    /// Start (or restart) the countdown from now.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.rto);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Completes when the armed deadline passes; pending forever otherwise.
    ///
    /// The future captures the deadline at creation, so re-arming or
    /// cancelling takes effect on the next call.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => future::pending().await,
        }
    }
}
