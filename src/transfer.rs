//! The data transfer engine: `write` (stop-and-wait send with REJ/RR
//! handling) and `read` (ordered receive with duplicate detection).
//!
//! Both reuse [`HeaderScanner`] from [`crate::supervision`] for the header
//! portion of their respective frames; `read` extends it with the Data/Esc
//! accumulation the table in the module docs of that file describes, rather
//! than forking a second copy of the header logic.

use std::time::Instant;

use bytes::{BufMut, BytesMut};
use log::{debug, warn};

use crate::Error;
use crate::LinkResult;
use crate::frame::{Destuffer, information_frame};
use crate::protocol::{A_R, A_T, C_DISC, FLAG, bcc2, c_info, c_rej, c_rr, seq_of};
use crate::stats::Statistics;
use crate::supervision::{self, ADDR_EITHER, AddrSet, CtrlSet, HeaderScanner, HeaderStep};
use crate::timer::Timer;
use crate::transport::{READ_POLL_INTERVAL, SerialTransport};

/// Sends one payload reliably, blocking until it is acknowledged.
///
/// `ns` is the caller's current send sequence number; on success it has
/// already been toggled in place.
pub(crate) fn write(
    transport: &mut dyn SerialTransport,
    timer: &mut Timer,
    timeout: std::time::Duration,
    ns: &mut u8,
    payload: &[u8],
    stats: &mut Statistics,
) -> LinkResult<usize> {
    let frame = information_frame(A_T, c_info(*ns), payload);

    transport.write_bytes(&frame)?;
    timer.arm(timeout);

    let mut scanner = HeaderScanner::new(ADDR_EITHER, CtrlSet::RrOrRej);

    loop {
        if timer.exhausted() {
            timer.disable();
            warn!("retry budget exhausted sending I-frame ns={ns}");
            return Err(Error::RetryExhausted {
                operation: "write",
                attempts: timer.alarm_count(),
            });
        }

        let Some(byte) =
            transport.read_byte(Instant::now() + READ_POLL_INTERVAL)?
        else {
            if retransmit_on_expiry(transport, timer, timeout, &frame)? {
                stats.record_retransmission();
            }
            continue;
        };

        match scanner.step(byte) {
            HeaderStep::Continue | HeaderStep::HeaderMismatch => {}
            HeaderStep::HeaderOk { c, .. } => {
                if crate::protocol::is_rej(c) {
                    debug!("REJ received for ns={ns}, resending immediately");
                    timer.reset_count();
                    transport.write_bytes(&frame)?;
                    timer.arm(timeout);
                } else {
                    timer.disable();
                    stats.record_good_frame();
                    *ns ^= 1;
                    debug!("I-frame acknowledged, ns now {ns}");
                    return Ok(payload.len());
                }
            }
        }

        if retransmit_on_expiry(transport, timer, timeout, &frame)? {
            stats.record_retransmission();
        }
    }
}

fn retransmit_on_expiry(
    transport: &mut dyn SerialTransport,
    timer: &mut Timer,
    timeout: std::time::Duration,
    frame: &[u8],
) -> LinkResult<bool> {
    if timer.poll() {
        if timer.exhausted() {
            return Ok(false);
        }
        warn!("timeout waiting for acknowledgment, resending I-frame");
        transport.write_bytes(frame)?;
        timer.arm(timeout);
        return Ok(true);
    }
    Ok(false)
}

/// Blocks until one payload is delivered into `buffer`, the peer initiates a
/// DISC (returns `Ok(0)`), or a fatal device error occurs.
///
/// `nr` is the caller's current expected receive sequence number; advanced
/// in place exactly when a fresh, intact frame is delivered.
pub(crate) fn read(
    transport: &mut dyn SerialTransport,
    nr: &mut u8,
    buffer: &mut [u8],
    stats: &mut Statistics,
) -> LinkResult<usize> {
    let mut scanner = HeaderScanner::new(AddrSet::One(A_T), CtrlSet::InfoOrDisc);

    loop {
        let Some(byte) = transport.read_byte(crate::transport::far_future())? else {
            continue;
        };

        let step = scanner.step(byte);
        if matches!(step, HeaderStep::HeaderMismatch) {
            stats.record_error_frame();
            continue;
        }
        let HeaderStep::HeaderOk { c, .. } = step else {
            continue;
        };

        if c == C_DISC {
            debug!("peer-initiated DISC observed during read");
            supervision::send_command(transport, A_R, C_DISC)?;
            return Ok(0);
        }

        let seq = seq_of(c);
        match accumulate_frame(transport)? {
            Some((payload, bcc2_received)) => {
                let computed = bcc2(&payload);
                if computed == bcc2_received && seq == *nr {
                    let ack = c_rr(1 - *nr);
                    supervision::send_command(transport, A_R, ack)?;
                    stats.record_good_frame();
                    // Fixed per-frame overhead: FLAG, A, C, BCC1, BCC2,
                    // closing FLAG (6 bytes) around the payload.
                    stats.record_bytes_read(payload.len() + 6);
                    *nr ^= 1;
                    let n = payload.len().min(buffer.len());
                    buffer[..n].copy_from_slice(&payload[..n]);
                    debug!("delivered {n} byte payload, nr now {nr}");
                    return Ok(n);
                } else if computed == bcc2_received {
                    debug!("duplicate frame seq={seq} (expected {nr}), re-acknowledging");
                    supervision::send_command(transport, A_R, c_rr(*nr))?;
                } else if seq == *nr {
                    warn!("BCC2 mismatch on expected sequence {nr}, rejecting");
                    stats.record_error_frame();
                    supervision::send_command(transport, A_R, c_rej(*nr))?;
                } else {
                    debug!("corrupt duplicate frame seq={seq} (expected {nr}), re-acknowledging");
                    supervision::send_command(transport, A_R, c_rr(*nr))?;
                }
            }
            None => {
                // Frame closed with no BCC2 byte at all; neither a
                // REJ-producing event nor a header/BCC1 failure, so it is
                // not counted (see `HeaderStep::HeaderMismatch` above for
                // the header-level failure this is distinct from).
                debug!("frame closed with an empty body, discarding");
            }
        }

        scanner.reset();
    }
}

/// Consumes bytes from `transport` from just after a validated I-frame
/// header until the closing FLAG, destuffing as it goes. Returns the
/// payload and the trailing (destuffed) BCC2 byte, or `None` if the frame
/// ended without even a BCC2 byte (malformed, locally recovered by the
/// caller resetting its scanner).
fn accumulate_frame(
    transport: &mut dyn SerialTransport,
) -> LinkResult<Option<(BytesMut, u8)>> {
    let mut destuffer = Destuffer::new();
    let mut acc = BytesMut::with_capacity(crate::protocol::MAX_PAYLOAD_SIZE + 1);

    loop {
        let Some(byte) = transport.read_byte(crate::transport::far_future())? else {
            continue;
        };

        if byte == FLAG {
            if acc.is_empty() {
                return Ok(None);
            }
            let bcc2_received = acc[acc.len() - 1];
            acc.truncate(acc.len() - 1);
            return Ok(Some((acc, bcc2_received)));
        }

        if let Some(destuffed) = destuffer.feed(byte) {
            acc.put_u8(destuffed);
        }
    }
}
