//! Byte I/O adapter: the serial-device boundary the rest of the crate is
//! built against.
//!
//! [`SerialTransport`] is deliberately narrow — a single-byte bounded read
//! and a bulk write, plus the two buffer-discard calls the handshake uses to
//! resynchronize after a timeout — so that the frame codec and state
//! machines above it never see a real device at all in tests.

use std::io;
use std::time::{Duration, Instant};

use serial2::SerialPort;

/// Poll granularity for a single blocking read: the longest any individual
/// `read_byte` call sits in the OS read syscall before returning control to
/// the caller to re-check its own deadline (a retransmission timer, or
/// nothing at all for a free-running wait).
pub(crate) const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Abstraction over the byte source/sink a [`crate::connection::LinkLayer`]
/// talks through.
///
/// `read_byte` never blocks past `deadline`: on a benign timeout (no byte
/// arrived before then) it returns `Ok(None)`, which callers must tolerate
/// and retry. This is the only suspension point in the crate, and the
/// bounded wait is what lets the retransmission timer be a plain polled
/// deadline instead of a signal handler (see [`crate::timer`]).
pub trait SerialTransport: std::fmt::Debug + Send {
    /// Reads one byte, waiting no later than `deadline`.
    fn read_byte(&mut self, deadline: Instant) -> io::Result<Option<u8>>;
    /// Writes `buf` in full, returning the number of bytes written.
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize>;
    /// Discards any bytes the device has buffered but not yet delivered.
    fn discard_input(&mut self) -> io::Result<()>;
    /// Discards any bytes queued for transmission but not yet sent.
    fn discard_output(&mut self) -> io::Result<()>;
}

/// A real serial port, backed by [`serial2::SerialPort`].
pub struct SerialPortTransport {
    port: SerialPort,
}

impl SerialPortTransport {
    /// Opens `device` at `baud_rate` and configures it for the bounded,
    /// poll-driven reads [`SerialTransport::read_byte`] needs.
    pub fn open(device: &str, baud_rate: u32) -> io::Result<Self> {
        let port = SerialPort::open(device, baud_rate)?;
        port.set_read_timeout(READ_POLL_INTERVAL)?;
        Ok(Self { port })
    }
}

impl std::fmt::Debug for SerialPortTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortTransport").finish_non_exhaustive()
    }
}

impl SerialTransport for SerialPortTransport {
    fn read_byte(&mut self, deadline: Instant) -> io::Result<Option<u8>> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        // Never block longer than the poll granularity, even if the
        // deadline itself is further out, so a far-future deadline (used by
        // free-running waits) still returns control periodically.
        self.port.set_read_timeout(remaining.min(READ_POLL_INTERVAL))?;

        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port.discard_input_buffer()
    }

    fn discard_output(&mut self) -> io::Result<()> {
        self.port.discard_output_buffer()
    }
}

/// A deadline far enough out to behave as "no timeout" for the handshake
/// steps that free-run until a matching frame arrives, without giving the
/// trait a second, optional-deadline code path.
pub(crate) fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(10 * 365 * 24 * 3600)
}
