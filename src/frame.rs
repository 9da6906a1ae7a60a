//! Frame assembly, byte stuffing, and destuffing.
//!
//! Supervision/unnumbered frames are always exactly 5 bytes; information
//! frames are built in a single pass into a buffer sized to a safe upper
//! bound (`2 * (payload.len() + 1) + 6`) rather than grown byte-by-byte, so
//! there is no quadratic reallocation on the stuffing path.

use crate::protocol::{ESC, FLAG, SUF_ESC, SUF_FLAG, bcc1, bcc2};

/// Builds a 5-byte supervision/unnumbered frame: `FLAG A C A^C FLAG`.
pub fn supervision_frame(a: u8, c: u8) -> [u8; 5] {
    [FLAG, a, c, bcc1(a, c), FLAG]
}

/// Builds a complete information frame for `payload`, addressed `a` with
/// control byte `c`. Returns the full wire bytes, header through closing
/// flag, with the payload-and-BCC2 region byte-stuffed.
pub fn information_frame(a: u8, c: u8, payload: &[u8]) -> Vec<u8> {
    let bcc2 = bcc2(payload);
    let mut frame = Vec::with_capacity(2 * (payload.len() + 1) + 6);
    frame.push(FLAG);
    frame.push(a);
    frame.push(c);
    frame.push(bcc1(a, c));
    stuff_into(payload, &mut frame);
    stuff_byte_into(bcc2, &mut frame);
    frame.push(FLAG);
    frame
}

/// Appends the byte-stuffed form of `data` to `out`.
fn stuff_into(data: &[u8], out: &mut Vec<u8>) {
    for &b in data {
        stuff_byte_into(b, out);
    }
}

fn stuff_byte_into(b: u8, out: &mut Vec<u8>) {
    match b {
        FLAG => {
            out.push(ESC);
            out.push(SUF_FLAG);
        }
        ESC => {
            out.push(ESC);
            out.push(SUF_ESC);
        }
        _ => out.push(b),
    }
}

/// Destuffs a single byte fed one at a time by a receive state machine.
///
/// Tracks whether the previous byte was an unconsumed [`ESC`]; callers drive
/// this incrementally as bytes arrive off the wire rather than buffering the
/// raw stuffed region first.
#[derive(Debug, Default, Clone, Copy)]
pub struct Destuffer {
    pending_esc: bool,
}

impl Destuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw (possibly stuffed) byte. Returns `Some(byte)` if it
    /// completed a destuffed output byte, or `None` if it only consumed an
    /// [`ESC`] and is awaiting its successor.
    pub fn feed(&mut self, raw: u8) -> Option<u8> {
        if self.pending_esc {
            self.pending_esc = false;
            return Some(match raw {
                SUF_FLAG => FLAG,
                SUF_ESC => ESC,
                other => other, // tolerant: unknown successor passes through
            });
        }
        if raw == ESC {
            self.pending_esc = true;
            None
        } else {
            Some(raw)
        }
    }
}

/// Destuffs a complete stuffed byte string in one pass (used by tests and by
/// the stuffing-bijection property; production code destuffs incrementally
/// with [`Destuffer`] as bytes arrive off the wire).
pub fn destuff_all(stuffed: &[u8]) -> Vec<u8> {
    let mut destuffer = Destuffer::new();
    let mut out = Vec::with_capacity(stuffed.len());
    for &b in stuffed {
        if let Some(byte) = destuffer.feed(b) {
            out.push(byte);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{A_T, C_SET, bcc1};

    #[test]
    fn supervision_frame_matches_spec_trace() {
        // "Clean open" trace: TX sends 7E 03 03 00 7E
        assert_eq!(supervision_frame(A_T, C_SET), [0x7E, 0x03, 0x03, 0x00, 0x7E]);
    }

    #[test]
    fn stuffing_is_bijective() {
        for payload in [
            &b""[..],
            &b"ABC"[..],
            &[FLAG][..],
            &[ESC][..],
            &[FLAG, ESC, FLAG, ESC][..],
            &[0x00, 0x7E, 0x41, 0x7D, 0xFF][..],
        ] {
            let mut stuffed = Vec::new();
            stuff_into(payload, &mut stuffed);
            assert_eq!(destuff_all(&stuffed), payload);
        }
    }

    #[test]
    fn information_frame_matches_spec_trace() {
        // Single 3-byte payload 0x41 0x42 0x43: BCC2 = 0x40, no stuffing needed.
        let frame = information_frame(A_T, crate::protocol::c_info(0), &[0x41, 0x42, 0x43]);
        assert_eq!(
            frame,
            vec![0x7E, 0x03, 0x00, bcc1(A_T, 0x00), 0x41, 0x42, 0x43, 0x40, 0x7E]
        );
    }

    #[test]
    fn information_frame_stuffs_flag_and_esc_in_payload() {
        // Payload 0x7E 0x7D: BCC2 = 0x7E ^ 0x7D = 0x03 (unstuffed), and 0x03
        // itself needs no stuffing.
        let frame = information_frame(A_T, crate::protocol::c_info(1), &[FLAG, ESC]);
        let body = &frame[4..frame.len() - 1];
        assert_eq!(body, [ESC, SUF_FLAG, ESC, SUF_ESC, 0x03]);
        assert_eq!(destuff_all(body), vec![FLAG, ESC, 0x03]);
    }

    #[test]
    fn destuffer_is_tolerant_of_unknown_successor() {
        let mut d = Destuffer::new();
        assert_eq!(d.feed(ESC), None);
        assert_eq!(d.feed(0xAB), Some(0xAB));
    }
}
