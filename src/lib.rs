//! A stop-and-wait ARQ data-link protocol for unreliable serial channels.
//!
//! `linklayer` implements an HDLC-style framed, byte-stuffed link layer with
//! alternating-bit sequence numbering, REJ/RR acknowledgment, and a three-way
//! SET/UA open and DISC/UA close handshake. It guarantees in-order,
//! duplicate-free, integrity-checked delivery of opaque payloads across a
//! lossy byte channel, as long as retransmissions stay within a configured
//! budget.
//!
//! # Example
//! This example opens a connection to a peer over a serial port in the
//! transmitter role and sends a single payload.
//!
//! ```no_run
//! # fn example() -> linklayer::LinkResult<()> {
//! use linklayer::LinkLayerBuilder;
//!
//! let mut link = LinkLayerBuilder::new()
//!     .transmitter("/dev/ttyUSB0")
//!     .baud(9600)
//!     .build()?;
//! link.write(b"hello")?;
//! link.close(true)?;
//! # Ok(())
//! # }
//! ```
use thiserror::Error;

pub mod builder;
pub mod config;
pub mod connection;
pub mod frame;
pub mod protocol;
pub mod stats;
pub(crate) mod supervision;
pub(crate) mod timer;
pub mod transport;
pub(crate) mod transfer;

pub use builder::LinkLayerBuilder;
pub use config::{LinkLayerConfig, Role};
pub use connection::LinkLayer;
pub use stats::{ChannelModel, Statistics};
pub use transport::{SerialPortTransport, SerialTransport};

/// Errors surfaced by the link layer to its caller.
///
/// Only device errors, invalid arguments, and retry exhaustion ever reach
/// this level: header mismatches, BCC2 corruption, and duplicate sequence
/// numbers are recovered locally inside the receive state machines (see
/// [`connection`] and [`supervision`]) and never propagate as an `Error`.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    InvalidParams(String),
    #[error("retry budget exhausted after {attempts} retransmission(s) during {operation}")]
    RetryExhausted {
        operation: &'static str,
        attempts: u8,
    },
}

/// Crate-wide result alias, named to avoid shadowing `std::result::Result`
/// at call sites that also `use linklayer::*`.
pub type LinkResult<T> = std::result::Result<T, Error>;
