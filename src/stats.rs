//! Statistics collection and the derived efficiency metrics reported at
//! [`crate::connection::LinkLayer::close`].

use std::fmt;
use std::time::Instant;

use crate::config::Role;

/// The channel characteristics behind the derived efficiency metrics.
///
/// This implementation never injects synthetic line errors itself (that is
/// a test-harness concern, confined to `MockTransport`), so these values are
/// supplied by the caller rather than measured. Default values reproduce a
/// lossless, zero-latency channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelModel {
    /// One-way propagation delay, in seconds.
    pub t_propagation: f64,
    /// Probability a frame's BCC1 (header) is corrupted in transit.
    pub bcc1_error_rate: f64,
    /// Probability a frame's BCC2 (payload) is corrupted in transit.
    pub bcc2_error_rate: f64,
}

impl Default for ChannelModel {
    fn default() -> Self {
        Self {
            t_propagation: 0.0,
            bcc1_error_rate: 0.0,
            bcc2_error_rate: 0.0,
        }
    }
}

/// Running counters for one connection's lifetime, plus the derived metrics
/// reported on close.
#[derive(Debug)]
pub struct Statistics {
    role: Role,
    frames_good: u64,
    frames_error: u64,
    retransmissions: u64,
    bytes_read: u64,
    start: Option<Instant>,
    end: Option<Instant>,
}

impl Statistics {
    pub(crate) fn new(role: Role) -> Self {
        Self {
            role,
            frames_good: 0,
            frames_error: 0,
            retransmissions: 0,
            bytes_read: 0,
            start: None,
            end: None,
        }
    }

    pub(crate) fn mark_start(&mut self) {
        self.start = Some(Instant::now());
    }

    pub(crate) fn mark_end(&mut self) {
        self.end = Some(Instant::now());
    }

    pub(crate) fn record_good_frame(&mut self) {
        self.frames_good += 1;
    }

    pub(crate) fn record_error_frame(&mut self) {
        self.frames_error += 1;
    }

    pub(crate) fn record_retransmission(&mut self) {
        self.retransmissions += 1;
    }

    pub(crate) fn record_bytes_read(&mut self, n: usize) {
        self.bytes_read += n as u64;
    }

    pub fn frames_good(&self) -> u64 {
        self.frames_good
    }

    pub fn frames_error(&self) -> u64 {
        self.frames_error
    }

    pub fn retransmissions(&self) -> u64 {
        self.retransmissions
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Wall-clock seconds between `mark_start` and `mark_end` (or now, if
    /// the connection has not yet closed).
    pub fn elapsed_secs(&self) -> f64 {
        let start = match self.start {
            Some(s) => s,
            None => return 0.0,
        };
        let end = self.end.unwrap_or_else(Instant::now);
        end.saturating_duration_since(start).as_secs_f64()
    }

    /// Bits per second of destuffed payload delivered, over the connection's
    /// elapsed lifetime.
    pub fn received_bit_rate(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed <= 0.0 {
            return 0.0;
        }
        (self.bytes_read as f64 * 8.0) / elapsed
    }

    /// Ratio of the received bit rate to the channel's raw capacity
    /// (`baud_rate` bits/s).
    pub fn actual_efficiency(&self, baud_rate: u32) -> f64 {
        if baud_rate == 0 {
            return 0.0;
        }
        self.received_bit_rate() / baud_rate as f64
    }

    /// Frame error rate implied by `model`: `p1 + p2 * (1 - p1)`.
    pub fn fer(model: &ChannelModel) -> f64 {
        model.bcc1_error_rate + model.bcc2_error_rate * (1.0 - model.bcc1_error_rate)
    }

    /// Theoretical optimal efficiency `(1 - FER) / (1 + 2a)`, where
    /// `a = T_propagation / T_frame` and `T_frame` is the transmission time
    /// of one maximum-size frame at `baud_rate`.
    pub fn optimal_efficiency(model: &ChannelModel, frame_bits: f64, baud_rate: u32) -> f64 {
        if baud_rate == 0 || frame_bits <= 0.0 {
            return 0.0;
        }
        let t_frame = frame_bits / baud_rate as f64;
        let a = if t_frame > 0.0 {
            model.t_propagation / t_frame
        } else {
            0.0
        };
        (1.0 - Self::fer(model)) / (1.0 + 2.0 * a)
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "link layer statistics ({})", self.role)?;
        writeln!(f, "  good frames:     {}", self.frames_good)?;
        writeln!(f, "  error frames:    {}", self.frames_error)?;
        writeln!(f, "  retransmissions: {}", self.retransmissions)?;
        writeln!(f, "  bytes read:      {}", self.bytes_read)?;
        writeln!(f, "  elapsed:         {:.3}s", self.elapsed_secs())?;
        write!(f, "  received bit rate: {:.1} bit/s", self.received_bit_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn bit_rate_and_efficiency_from_recorded_bytes() {
        let mut stats = Statistics::new(Role::Receiver);
        stats.mark_start();
        stats.record_bytes_read(125); // 1000 bits
        sleep(Duration::from_millis(50));
        stats.mark_end();

        assert!(stats.received_bit_rate() > 0.0);
        assert!(stats.actual_efficiency(9600) > 0.0);
        assert!(stats.actual_efficiency(9600) < 1.0);
    }

    #[test]
    fn zero_error_model_yields_fer_zero_and_optimal_efficiency_one() {
        let model = ChannelModel::default();
        assert_eq!(Statistics::fer(&model), 0.0);
        assert_eq!(Statistics::optimal_efficiency(&model, 800.0, 9600), 1.0);
    }

    #[test]
    fn nonzero_error_rates_reduce_optimal_efficiency() {
        let model = ChannelModel {
            t_propagation: 0.0,
            bcc1_error_rate: 0.1,
            bcc2_error_rate: 0.1,
        };
        let eff = Statistics::optimal_efficiency(&model, 800.0, 9600);
        assert!(eff < 1.0);
        assert!(eff > 0.0);
    }

    #[test]
    fn propagation_delay_reduces_optimal_efficiency() {
        let model = ChannelModel {
            t_propagation: 1.0,
            ..ChannelModel::default()
        };
        let eff = Statistics::optimal_efficiency(&model, 800.0, 9600);
        assert!(eff < 1.0);
    }
}
