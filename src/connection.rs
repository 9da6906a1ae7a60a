//! The connection state machine: role-aware open/close handshakes, and the
//! owned `LinkLayer` object that replaces the original's process-wide
//! mutable state with a single value the caller threads through `open` →
//! `write`/`read` → `close`.

use log::info;

use crate::LinkResult;
use crate::config::{LinkLayerConfig, Role, validate_payload_len};
use crate::protocol::{A_R, A_T, C_DISC, C_SET, C_UA};
use crate::stats::{ChannelModel, Statistics};
use crate::supervision::{expect_frame, expect_frame_with_retx, send_command};
use crate::timer::Timer;
use crate::transport::SerialTransport;
use crate::{transfer, transport};

/// An open, role-aware data-link connection over `T`.
///
/// Owns the transport and all connection state (sequence numbers, timer,
/// statistics); there is no process-wide singleton, and nothing else in the
/// crate accesses this state concurrently — see the crate's concurrency
/// model in its top-level docs.
pub struct LinkLayer<T: SerialTransport> {
    transport: T,
    config: LinkLayerConfig,
    ns: u8,
    nr: u8,
    timer: Timer,
    stats: Statistics,
    /// Set once `read`'s early-DISC shortcut (see `transfer::read`) has
    /// already accepted the peer's DISC and sent our response. `close`
    /// checks this so the receiver never waits on `expect_frame` for a
    /// second DISC that will never arrive.
    peer_disconnected: bool,
}

impl<T: SerialTransport> LinkLayer<T> {
    /// Performs the role-aware SET/UA handshake over an already-opened
    /// transport and returns the established connection.
    pub fn open(config: LinkLayerConfig, mut transport: T) -> LinkResult<Self> {
        let mut timer = Timer::new(config.max_retransmissions());
        let mut stats = Statistics::new(config.role());

        match config.role() {
            Role::Transmitter => {
                expect_frame_with_retx(
                    &mut transport,
                    &mut timer,
                    config.timeout(),
                    A_T,
                    C_UA,
                    A_T,
                    C_SET,
                    "open",
                    &mut stats,
                )?;
            }
            Role::Receiver => {
                expect_frame(&mut transport, A_T, C_SET, &mut stats)?;
                send_command(&mut transport, A_T, C_UA)?;
            }
        }

        stats.mark_start();
        info!("link established as {}", config.role());

        Ok(Self {
            transport,
            config,
            ns: 0,
            nr: 0,
            timer,
            stats,
            peer_disconnected: false,
        })
    }

    /// Transmits `payload` reliably, blocking until acknowledged.
    ///
    /// `payload.len()` must be in `1..=MAX_PAYLOAD_SIZE`.
    pub fn write(&mut self, payload: &[u8]) -> LinkResult<usize> {
        validate_payload_len(payload.len())?;
        transfer::write(
            &mut self.transport,
            &mut self.timer,
            self.config.timeout(),
            &mut self.ns,
            payload,
            &mut self.stats,
        )
    }

    /// Blocks until one payload is delivered into `buffer` (returning its
    /// length), the peer initiates a DISC (returns `Ok(0)`), or a fatal
    /// device error occurs.
    pub fn read(&mut self, buffer: &mut [u8]) -> LinkResult<usize> {
        let n = transfer::read(&mut self.transport, &mut self.nr, buffer, &mut self.stats)?;
        if n == 0 {
            // `transfer::read` already accepted the peer's DISC and sent
            // our response; `close` must not run the handshake again.
            self.peer_disconnected = true;
        }
        Ok(n)
    }

    /// Performs the role-aware DISC/UA teardown, optionally logging
    /// statistics, and consumes the connection.
    pub fn close(mut self, show_stats: bool) -> LinkResult<()> {
        match self.config.role() {
            Role::Transmitter => {
                expect_frame_with_retx(
                    &mut self.transport,
                    &mut self.timer,
                    self.config.timeout(),
                    A_R,
                    C_DISC,
                    A_T,
                    C_DISC,
                    "close",
                    &mut self.stats,
                )?;
                send_command(&mut self.transport, A_R, C_UA)?;
                self.stats.record_good_frame();
            }
            Role::Receiver if self.peer_disconnected => {
                // `read`'s early-DISC shortcut already accepted the DISC
                // and sent our response on the wire; credit the same two
                // good frames the handshake below would have recorded,
                // without touching the transport again.
                self.stats.record_good_frame();
                self.stats.record_good_frame();
            }
            Role::Receiver => {
                expect_frame(&mut self.transport, A_T, C_DISC, &mut self.stats)?;
                send_command(&mut self.transport, A_R, C_DISC)?;
                self.stats.record_good_frame();
            }
        }

        self.stats.mark_end();
        info!("link closed as {}", self.config.role());
        if show_stats {
            info!("{}", self.stats);
        }

        self.transport.discard_output()?;
        Ok(())
    }

    /// Connection statistics gathered so far.
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Derived efficiency metrics for `model`, computed against the
    /// statistics gathered so far and a maximum-size frame at the
    /// connection's configured baud rate.
    pub fn optimal_efficiency(&self, model: &ChannelModel) -> f64 {
        let frame_bits =
            (2 * (crate::protocol::MAX_PAYLOAD_SIZE + 1) + 6) as f64 * 8.0;
        Statistics::optimal_efficiency(model, frame_bits, self.config.baud_rate())
    }
}

impl LinkLayer<transport::SerialPortTransport> {
    /// Convenience wrapper: opens the real serial device named by `config`
    /// and performs the handshake, equivalent to
    /// `LinkLayer::open(config, SerialPortTransport::open(..)?)`.
    pub fn connect(config: LinkLayerConfig) -> LinkResult<Self> {
        let transport = transport::SerialPortTransport::open(config.device(), config.baud_rate())?;
        Self::open(config, transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use std::time::Duration;

    fn config(role: Role) -> LinkLayerConfig {
        LinkLayerConfig::new("/dev/mock", role, 9600, 3, Duration::from_millis(50)).unwrap()
    }

    #[test]
    fn transmitter_open_sends_set_and_accepts_ua() {
        let mut t = MockTransport::new();
        t.feed(&[0x7E, 0x03, 0x07, 0x04, 0x7E]); // UA
        let link = LinkLayer::open(config(Role::Transmitter), t).unwrap();
        // The accepted UA is a good supervision frame.
        assert_eq!(link.stats().frames_good(), 1);
    }

    #[test]
    fn receiver_open_waits_for_set_then_sends_ua() {
        let mut t = MockTransport::new();
        t.feed(&[0x7E, 0x03, 0x03, 0x00, 0x7E]); // SET
        let link = LinkLayer::open(config(Role::Receiver), t).unwrap();
        assert_eq!(link.transport.last_write(), Some(&[0x7E, 0x03, 0x07, 0x04, 0x7E][..]));
        // The accepted SET is a good supervision frame; the receiver's own
        // UA response is not separately counted (it has no acknowledgment
        // of its own to confirm delivery).
        assert_eq!(link.stats().frames_good(), 1);
    }

    #[test]
    fn write_rejects_empty_payload() {
        let mut t = MockTransport::new();
        t.feed(&[0x7E, 0x03, 0x07, 0x04, 0x7E]);
        let mut link = LinkLayer::open(config(Role::Transmitter), t).unwrap();
        let err = link.write(&[]).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidParams(_)));
    }

    #[test]
    fn full_round_trip_write_then_close() {
        let mut t = MockTransport::new();
        t.feed(&[0x7E, 0x03, 0x07, 0x04, 0x7E]); // UA for open
        t.feed(&[0x7E, 0x01, 0xAB, 0xAA, 0x7E]); // RR(1) for write
        t.feed(&[0x7E, 0x01, 0x0B, 0x0A, 0x7E]); // DISC for close
        let mut link = LinkLayer::open(config(Role::Transmitter), t).unwrap();
        let n = link.write(&[0x41, 0x42, 0x43]).unwrap();
        assert_eq!(n, 3);
        link.close(false).unwrap();
    }

    #[test]
    fn transmitter_close_counts_accepted_disc_and_sent_ua_as_good_frames() {
        let mut t = MockTransport::new();
        t.feed(&[0x7E, 0x03, 0x07, 0x04, 0x7E]); // UA for open
        t.feed(&[0x7E, 0x01, 0x0B, 0x0A, 0x7E]); // DISC for close
        let link = LinkLayer::open(config(Role::Transmitter), t).unwrap();
        let before = link.stats().frames_good();
        link.close(false).unwrap();
        // before: the open UA. close adds the accepted DISC and the sent UA.
        assert_eq!(before, 1);
    }

    #[test]
    fn receiver_close_counts_accepted_disc_and_sent_disc_as_good_frames() {
        let mut t = MockTransport::new();
        t.feed(&[0x7E, 0x03, 0x03, 0x00, 0x7E]); // SET for open
        t.feed(&[0x7E, 0x03, 0x0B, 0x08, 0x7E]); // DISC for close
        let link = LinkLayer::open(config(Role::Receiver), t).unwrap();
        assert_eq!(link.stats().frames_good(), 1);
        link.close(false).unwrap();
    }

    #[test]
    fn receiver_close_after_read_observed_disc_does_not_wait_for_a_second_one() {
        // `read`'s early-DISC shortcut already completes the receiver's
        // half of the teardown; `close` must not block on `expect_frame`
        // waiting for a DISC the peer will never send again.
        let mut t = MockTransport::new();
        t.feed(&[0x7E, 0x03, 0x03, 0x00, 0x7E]); // SET for open
        t.feed(&[0x7E, A_T, C_DISC, A_T ^ C_DISC, 0x7E]); // peer-initiated DISC
        let mut link = LinkLayer::open(config(Role::Receiver), t).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(link.read(&mut buf).unwrap(), 0);
        // UA (open) + DISC response (read's early-DISC shortcut); close()
        // must not add a third write.
        assert_eq!(link.transport.written.len(), 2);
        // Only the accepted SET from open; `read`'s DISC handling records
        // no good frame of its own.
        assert_eq!(link.stats().frames_good(), 1);
        // Does not hang waiting for a second DISC the peer never sends.
        link.close(false).unwrap();
    }
}
