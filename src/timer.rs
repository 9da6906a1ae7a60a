//! Deadline-based one-shot retransmission timer.
//!
//! Replaces the original signal-driven alarm with a polled wall-clock
//! deadline, per the re-architecture called for in the design notes: every
//! blocking byte read is already bounded by a deadline (see
//! [`crate::transport::SerialTransport::read_byte`]), so the caller simply
//! checks [`Timer::poll`] each time control returns from a read.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct Timer {
    deadline: Option<Instant>,
    alarm_count: u8,
    max_retransmissions: u8,
}

impl Timer {
    pub(crate) fn new(max_retransmissions: u8) -> Self {
        Self {
            deadline: None,
            alarm_count: 0,
            max_retransmissions,
        }
    }

    /// Arms the timer for `timeout` from now, independent of any previous
    /// arm/expiry history.
    pub(crate) fn arm(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + timeout);
    }

    /// Disables the timer and clears the retry counter. The discipline:
    /// always call this on successful completion and on fatal exit.
    pub(crate) fn disable(&mut self) {
        self.deadline = None;
        self.alarm_count = 0;
    }

    /// Resets only the retry counter, leaving the timer disarmed. Used on a
    /// REJ, which should trigger an immediate resend rather than wait out
    /// the remaining deadline, without counting it against the retry budget.
    pub(crate) fn reset_count(&mut self) {
        self.alarm_count = 0;
    }

    /// Returns `true` exactly once when the armed deadline has elapsed, and
    /// disarms itself so repeated polling without a fresh `arm` does not
    /// refire. Increments the retry counter on that one firing.
    pub(crate) fn poll(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.deadline = None;
                self.alarm_count += 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn alarm_count(&self) -> u8 {
        self.alarm_count
    }

    /// `true` once the retry budget has been consumed: the caller must give
    /// up rather than resend again.
    pub(crate) fn exhausted(&self) -> bool {
        self.alarm_count > self.max_retransmissions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_fires_once_per_arm() {
        let mut t = Timer::new(2);
        t.arm(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(t.poll());
        assert!(!t.poll());
        assert_eq!(t.alarm_count(), 1);
    }

    #[test]
    fn exhaustion_tracks_max_retransmissions() {
        let mut t = Timer::new(1);
        assert!(!t.exhausted());
        t.arm(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(t.poll());
        assert!(!t.exhausted()); // alarm_count == 1 == max, not yet exhausted
        t.arm(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(t.poll());
        assert!(t.exhausted()); // alarm_count == 2 > max
    }

    #[test]
    fn disable_clears_deadline_and_count() {
        let mut t = Timer::new(3);
        t.arm(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(t.poll());
        t.disable();
        assert_eq!(t.alarm_count(), 0);
        assert!(!t.poll());
    }

    #[test]
    fn reset_count_keeps_timer_disarmed() {
        let mut t = Timer::new(3);
        t.arm(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(t.poll());
        t.reset_count();
        assert_eq!(t.alarm_count(), 0);
    }
}
