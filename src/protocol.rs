//! Wire-level constants for the link protocol.
//!
//! Bit-exact values per the protocol's frame layout: addresses, control
//! codes, the flag/escape bytes used for byte stuffing, and the maximum
//! payload size accepted by [`crate::connection::LinkLayer::write`].

/// Frame delimiter.
pub const FLAG: u8 = 0x7E;
/// Escape byte introducing a stuffed sequence.
pub const ESC: u8 = 0x7D;
/// Stuffed substitute for a literal [`FLAG`] byte.
pub const SUF_FLAG: u8 = 0x5E;
/// Stuffed substitute for a literal [`ESC`] byte.
pub const SUF_ESC: u8 = 0x5D;

/// Address used for commands sent by the transmitter and responses sent to it.
pub const A_T: u8 = 0x03;
/// Address used for commands sent by the receiver and responses sent to it.
pub const A_R: u8 = 0x01;

/// Connection-setup command.
pub const C_SET: u8 = 0x03;
/// Unnumbered acknowledgment.
pub const C_UA: u8 = 0x07;
/// Disconnect command.
pub const C_DISC: u8 = 0x0B;

/// Control byte for an information frame carrying sequence number `n` (0 or 1).
pub const fn c_info(n: u8) -> u8 {
    if n & 1 == 0 { 0x00 } else { 0x80 }
}

/// Control byte for a receive-ready acknowledgment expecting sequence `n`.
pub const fn c_rr(n: u8) -> u8 {
    0xAA | (n & 1)
}

/// Control byte for a reject requesting retransmission of sequence `n`.
pub const fn c_rej(n: u8) -> u8 {
    0x54 | (n & 1)
}

/// `true` if `c` is an RR control byte (either sequence).
pub const fn is_rr(c: u8) -> bool {
    c == c_rr(0) || c == c_rr(1)
}

/// `true` if `c` is a REJ control byte (either sequence).
pub const fn is_rej(c: u8) -> bool {
    c == c_rej(0) || c == c_rej(1)
}

/// `true` if `c` is an I-frame control byte (either sequence).
pub const fn is_info(c: u8) -> bool {
    c == c_info(0) || c == c_info(1)
}

/// The sequence number (0 or 1) carried by an RR/REJ/I-frame control byte.
pub const fn seq_of(c: u8) -> u8 {
    c & 1
}

/// BCC1: the header checksum, the XOR of the address and control fields.
pub const fn bcc1(a: u8, c: u8) -> u8 {
    a ^ c
}

/// BCC2: the body checksum, the XOR of every unstuffed payload byte.
pub fn bcc2(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Largest payload `write` accepts, per the protocol's frame-size bound.
pub const MAX_PAYLOAD_SIZE: usize = 1024;

/// Longest serial device path a [`crate::config::LinkLayerConfig`] accepts.
pub const MAX_DEVICE_LEN: usize = 49;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_byte_roundtrip() {
        assert_eq!(c_info(0), 0x00);
        assert_eq!(c_info(1), 0x80);
        assert_eq!(c_rr(0), 0xAA);
        assert_eq!(c_rr(1), 0xAB);
        assert_eq!(c_rej(0), 0x54);
        assert_eq!(c_rej(1), 0x55);
    }

    #[test]
    fn classification_helpers() {
        assert!(is_rr(c_rr(0)) && is_rr(c_rr(1)));
        assert!(is_rej(c_rej(0)) && is_rej(c_rej(1)));
        assert!(is_info(c_info(0)) && is_info(c_info(1)));
        assert!(!is_rr(c_rej(0)));
        assert_eq!(seq_of(c_rr(1)), 1);
        assert_eq!(seq_of(c_rej(0)), 0);
    }

    #[test]
    fn bcc1_is_xor_of_address_and_control() {
        assert_eq!(bcc1(A_T, C_SET), A_T ^ C_SET);
        assert_eq!(bcc1(A_T, C_SET), 0x00);
    }

    #[test]
    fn bcc2_matches_spec_example() {
        // "ABC" example from the frame traces: 0x41 ^ 0x42 ^ 0x43 == 0x40.
        assert_eq!(bcc2(&[0x41, 0x42, 0x43]), 0x40);
    }
}
