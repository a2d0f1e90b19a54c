//! `back-tcp` — a reliable, ordered byte stream using Go-Back-N ARQ over a
//! point-to-point stream channel.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐   DATA (≤64 B)   ┌──────────┐
//!  │  Sender  │─────────────────▶│ Receiver │
//!  └────┬─────┘                  └─────┬────┘
//!       │        cumulative ACKs       │
//!       │◀─────────────────────────────┘
//!       │
//!  ┌────▼──────────────────────────────┐
//!  │         Transport binding         │
//!  │  (PacketReader / PacketWriter)    │
//!  └────┬──────────────────────────────┘
//!       │ 7-byte header + payload
//!  ┌────▼──────────┐  ┌──────────────┐
//!  │  TCP socket   │  │  Simulator   │
//!  └───────────────┘  └──────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]          — wire format (serialise / deserialise, chunking)
//! - [`gbn_sender`]      — GBN outbound window state machine
//! - [`gbn_receiver`]    — GBN inbound cumulative-ACK state machine
//! - [`timer`]           — the single retransmission timer
//! - [`connection`]      — transport binding traits and errors
//! - [`socket`]          — TCP transport binding
//! - [`simulator`]       — in-memory fault-injecting transport for testing
//! - [`gbn_connection`]  — drivers tying the state machines to a transport
//! - [`config`]          — protocol tunables

pub mod config;
pub mod connection;
pub mod gbn_connection;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod packet;
pub mod simulator;
pub mod socket;
pub mod timer;

pub use config::GbnConfig;
pub use connection::{ConnError, Role};
pub use gbn_connection::{
    receive_stream, receive_stream_with, send_packets, send_stream, send_stream_with, SendStats,
};
pub use packet::{Packet, PacketError};
