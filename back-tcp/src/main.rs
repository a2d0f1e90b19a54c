//! Entry point for `back-tcp`.
//!
//! Parses CLI arguments and dispatches into either **send** or **recv** mode.
//! All protocol work is delegated to the library; `main.rs` owns only
//! process setup (logging, argument parsing, file I/O).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use back_tcp::socket::TcpTransport;
use back_tcp::{receive_stream_with, send_stream_with, GbnConfig, Role};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Reliable byte stream over TCP using Go-Back-N.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    tuning: Tuning,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Args)]
struct Tuning {
    /// Packets allowed in flight at once.
    #[arg(long, global = true, default_value_t = 8, value_parser = clap::value_parser!(u8).range(1..))]
    window: u8,

    /// Retransmission timeout in milliseconds.
    #[arg(long, global = true, default_value_t = 10)]
    rto_ms: u64,

    /// Acknowledgment listener read timeout in milliseconds.
    #[arg(long, global = true, default_value_t = 50)]
    read_timeout_ms: u64,
}

impl From<&Tuning> for GbnConfig {
    fn from(t: &Tuning) -> Self {
        GbnConfig {
            window_size: usize::from(t.window),
            rto: Duration::from_millis(t.rto_ms),
            read_timeout: Duration::from_millis(t.read_timeout_ms),
        }
    }
}

#[derive(Subcommand)]
enum Mode {
    /// Connect to a receiver and send a file (or stdin).
    Send {
        /// Receiver host.
        #[arg(short, long, default_value = "127.0.0.1")]
        addr: String,
        #[arg(short, long, default_value_t = 9000)]
        port: u16,
        /// File to send; stdin when omitted.
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Accept one sender and write what it sends to a file (or stdout).
    Recv {
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0")]
        addr: String,
        #[arg(short, long, default_value_t = 9000)]
        port: u16,
        /// Destination file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let config = GbnConfig::from(&cli.tuning);

    match cli.mode {
        Mode::Send { addr, port, input } => {
            let data = match &input {
                Some(path) => tokio::fs::read(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut buf = Vec::new();
                    tokio::io::stdin()
                        .read_to_end(&mut buf)
                        .await
                        .context("reading stdin")?;
                    buf
                }
            };
            log::info!("Sending {} byte(s) to {addr}:{port}", data.len());
            let transport = TcpTransport::open(Role::Outbound, &addr, port)
                .await
                .with_context(|| format!("connecting to {addr}:{port}"))?;
            send_stream_with(transport, &data, &config)
                .await
                .context("transfer failed")?;
        }
        Mode::Recv { addr, port, output } => {
            let transport = TcpTransport::open(Role::Inbound, &addr, port)
                .await
                .with_context(|| format!("accepting on {addr}:{port}"))?;
            let data = receive_stream_with(transport)
                .await
                .context("transfer failed")?;
            match &output {
                Some(path) => tokio::fs::write(path, &data)
                    .await
                    .with_context(|| format!("writing {}", path.display()))?,
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&data).await.context("writing stdout")?;
                    stdout.flush().await.context("flushing stdout")?;
                }
            }
        }
    }

    Ok(())
}
