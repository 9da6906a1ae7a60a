//! The supervision engine: one reusable header state machine, shared by
//! every supervision-frame exchange (SET/UA, DISC/UA, RR/REJ) and by the
//! information-frame receiver in [`crate::connection`], rather than a
//! hand-forked copy per exchange.

use std::time::Instant;

use log::{debug, trace, warn};

use crate::Error;
use crate::frame::supervision_frame;
use crate::protocol::{A_R, A_T, FLAG, bcc1};
use crate::stats::Statistics;
use crate::timer::Timer;
use crate::transport::{SerialTransport, far_future};

/// Wire size of every supervision/unnumbered frame: `FLAG A C A^C FLAG`.
const SUPERVISION_FRAME_LEN: usize = 5;

/// Which address byte(s) a header scan will accept.
#[derive(Debug, Clone, Copy)]
pub(crate) enum AddrSet {
    One(u8),
    Either(u8, u8),
}

impl AddrSet {
    fn contains(&self, b: u8) -> bool {
        match *self {
            AddrSet::One(a) => b == a,
            AddrSet::Either(a, b2) => b == a || b == b2,
        }
    }
}

/// Which control byte(s) a header scan will accept.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CtrlSet {
    One(u8),
    /// Matches any of RR(0), RR(1), REJ(0), REJ(1) — used by the write
    /// engine's acknowledgment wait.
    RrOrRej,
    /// Matches an I-frame control byte of either sequence, or a DISC
    /// (used by the read engine, which special-cases DISC as an
    /// early-termination shortcut).
    InfoOrDisc,
}

impl CtrlSet {
    fn contains(&self, c: u8) -> bool {
        match *self {
            CtrlSet::One(expected) => c == expected,
            CtrlSet::RrOrRej => {
                crate::protocol::is_rr(c) || crate::protocol::is_rej(c)
            }
            CtrlSet::InfoOrDisc => crate::protocol::is_info(c) || c == crate::protocol::C_DISC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderState {
    Start,
    FlagRcv,
    ARcv,
    CRcv,
}

/// Outcome of feeding one byte to a [`HeaderScanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderStep {
    /// Still scanning; no decision yet.
    Continue,
    /// Header and BCC1 validated: a frame with this address/control pair is
    /// confirmed. The scanner has already reset to `Start` for reuse.
    HeaderOk { a: u8, c: u8 },
    /// FLAG/A/C matched but BCC1 did not: a corrupted header. The scanner
    /// has resynced to `Start`.
    HeaderMismatch,
}

/// The shared FLAG/A/C/BCC1 header scanner.
///
/// Table (common to every supervision receive and to the I-frame header):
///
/// | State | FLAG | addr match | ctrl match | BCC1 match | other |
/// |-------|------|------------|------------|------------|-------|
/// | Start | → FlagRcv | stay | stay | stay | stay |
/// | FlagRcv | stay | → ARcv | — | — | → Start |
/// | ARcv | → FlagRcv | — | → CRcv | — | → Start |
/// | CRcv | → FlagRcv | — | — | → `HeaderOk`, reset to Start | → Start |
#[derive(Debug)]
pub(crate) struct HeaderScanner {
    state: HeaderState,
    addr: AddrSet,
    ctrl: CtrlSet,
    seen_a: u8,
    seen_c: u8,
}

impl HeaderScanner {
    pub(crate) fn new(addr: AddrSet, ctrl: CtrlSet) -> Self {
        Self {
            state: HeaderState::Start,
            addr,
            ctrl,
            seen_a: 0,
            seen_c: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.state = HeaderState::Start;
    }

    pub(crate) fn step(&mut self, byte: u8) -> HeaderStep {
        match self.state {
            HeaderState::Start => {
                if byte == FLAG {
                    self.state = HeaderState::FlagRcv;
                }
                HeaderStep::Continue
            }
            HeaderState::FlagRcv => {
                if byte == FLAG {
                    // stay: second flag resyncs the header start
                } else if self.addr.contains(byte) {
                    self.seen_a = byte;
                    self.state = HeaderState::ARcv;
                } else {
                    self.state = HeaderState::Start;
                }
                HeaderStep::Continue
            }
            HeaderState::ARcv => {
                if byte == FLAG {
                    self.state = HeaderState::FlagRcv;
                } else if self.ctrl.contains(byte) {
                    self.seen_c = byte;
                    self.state = HeaderState::CRcv;
                } else {
                    self.state = HeaderState::Start;
                }
                HeaderStep::Continue
            }
            HeaderState::CRcv => {
                if byte == bcc1(self.seen_a, self.seen_c) {
                    let (a, c) = (self.seen_a, self.seen_c);
                    self.state = HeaderState::Start;
                    HeaderStep::HeaderOk { a, c }
                } else if byte == FLAG {
                    self.state = HeaderState::FlagRcv;
                    HeaderStep::HeaderMismatch
                } else {
                    self.state = HeaderState::Start;
                    HeaderStep::HeaderMismatch
                }
            }
        }
    }
}

/// Sends a 5-byte supervision/unnumbered frame: `FLAG A C A^C FLAG`.
pub(crate) fn send_command(
    transport: &mut dyn SerialTransport,
    a: u8,
    c: u8,
) -> LinkResult<()> {
    let frame = supervision_frame(a, c);
    transport.write_bytes(&frame)?;
    trace!("sent supervision frame A={a:#04x} C={c:#04x}");
    Ok(())
}

/// Runs the header scanner, plus the trailing-FLAG close, until one
/// supervision frame matching `(a_expected, c_expected)` is fully accepted.
/// Free-running: no timer, no retransmission. Used by the receiver side of
/// both handshakes, which has no better use for its time than to wait.
pub(crate) fn expect_frame(
    transport: &mut dyn SerialTransport,
    a_expected: u8,
    c_expected: u8,
    stats: &mut Statistics,
) -> LinkResult<()> {
    let mut scanner = HeaderScanner::new(AddrSet::One(a_expected), CtrlSet::One(c_expected));
    // After HeaderOk the last remaining byte of the 5-byte frame must be the
    // closing FLAG; anything else resyncs all the way back to Start.
    let mut awaiting_close = false;

    loop {
        let Some(byte) = transport.read_byte(far_future())? else {
            continue;
        };

        if awaiting_close {
            if byte == FLAG {
                debug!("accepted supervision frame A={a_expected:#04x} C={c_expected:#04x}");
                stats.record_good_frame();
                stats.record_bytes_read(SUPERVISION_FRAME_LEN);
                return Ok(());
            }
            awaiting_close = false;
            scanner.reset();
            // Re-feed: the byte that broke the close might itself start a
            // new frame.
            if let HeaderStep::HeaderOk { .. } = scanner.step(byte) {
                awaiting_close = true;
            }
            continue;
        }

        if let HeaderStep::HeaderOk { .. } = scanner.step(byte) {
            awaiting_close = true;
        }
    }
}

/// Combines [`send_command`] and [`expect_frame`] with retransmission:
/// sends `(a_send, c_send)`, arms `timer`, and resends on every expiry until
/// a matching `(a_expected, c_expected)` arrives or the retry budget is
/// exhausted.
pub(crate) fn expect_frame_with_retx(
    transport: &mut dyn SerialTransport,
    timer: &mut Timer,
    timeout: std::time::Duration,
    a_expected: u8,
    c_expected: u8,
    a_send: u8,
    c_send: u8,
    operation: &'static str,
    stats: &mut Statistics,
) -> LinkResult<()> {
    send_command(transport, a_send, c_send)?;
    timer.arm(timeout);

    let mut scanner = HeaderScanner::new(AddrSet::One(a_expected), CtrlSet::One(c_expected));
    let mut awaiting_close = false;

    while !timer.exhausted() {
        let Some(byte) = transport.read_byte(Instant::now() + crate::transport::READ_POLL_INTERVAL)?
        else {
            maybe_retransmit(transport, timer, timeout, a_send, c_send, stats)?;
            continue;
        };

        if awaiting_close {
            if byte == FLAG {
                timer.disable();
                debug!("accepted supervision frame A={a_expected:#04x} C={c_expected:#04x} during {operation}");
                stats.record_good_frame();
                stats.record_bytes_read(SUPERVISION_FRAME_LEN);
                return Ok(());
            }
            awaiting_close = false;
            scanner.reset();
        } else if let HeaderStep::HeaderOk { .. } = scanner.step(byte) {
            awaiting_close = true;
        }

        maybe_retransmit(transport, timer, timeout, a_send, c_send, stats)?;
    }

    timer.disable();
    warn!("retry budget exhausted during {operation}");
    Err(Error::RetryExhausted {
        operation,
        attempts: timer.alarm_count(),
    })
}

fn maybe_retransmit(
    transport: &mut dyn SerialTransport,
    timer: &mut Timer,
    timeout: std::time::Duration,
    a_send: u8,
    c_send: u8,
    stats: &mut Statistics,
) -> LinkResult<()> {
    if timer.poll() {
        if timer.exhausted() {
            return Ok(());
        }
        warn!("timeout waiting for response to A={a_send:#04x} C={c_send:#04x}, resending");
        send_command(transport, a_send, c_send)?;
        timer.arm(timeout);
        stats.record_retransmission();
    }
    Ok(())
}

pub(crate) use crate::LinkResult;

/// Address constants re-exported for callers that build [`AddrSet`]/[`CtrlSet`]
/// values for the I-frame and RR/REJ matchers in [`crate::connection`].
pub(crate) const ADDR_EITHER: AddrSet = AddrSet::Either(A_T, A_R);
