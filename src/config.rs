//! Validated connection configuration.

use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use derive_more::Display;

use crate::Error;
use crate::protocol::{MAX_DEVICE_LEN, MAX_PAYLOAD_SIZE};

pub(crate) const BAUD_BOUNDS: RangeInclusive<u32> = 1200..=4_000_000;

/// Which side of the handshake this `LinkLayer` plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Role {
    Transmitter,
    Receiver,
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transmitter" | "tx" => Ok(Self::Transmitter),
            "receiver" | "rx" => Ok(Self::Receiver),
            other => Err(Error::InvalidParams(format!(
                "invalid role '{other}', expected 'transmitter' or 'receiver'"
            ))),
        }
    }
}

/// Immutable, validated connection configuration.
///
/// Validation happens here, at construction time, so an invalid device path
/// or timeout is rejected before ever touching the transport rather than
/// failing deep inside a handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkLayerConfig {
    pub(crate) device: String,
    pub(crate) role: Role,
    pub(crate) baud_rate: u32,
    pub(crate) max_retransmissions: u8,
    pub(crate) timeout: Duration,
}

impl LinkLayerConfig {
    pub fn new(
        device: impl std::fmt::Display,
        role: Role,
        baud_rate: u32,
        max_retransmissions: u8,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let device = device.to_string();
        if device.is_empty() || device.len() > MAX_DEVICE_LEN {
            return Err(Error::InvalidParams(format!(
                "device path must be 1..={MAX_DEVICE_LEN} bytes, got {}",
                device.len()
            )));
        }
        if !BAUD_BOUNDS.contains(&baud_rate) {
            return Err(Error::InvalidParams(format!(
                "baud rate {baud_rate} out of supported range {}..={}",
                BAUD_BOUNDS.start(),
                BAUD_BOUNDS.end()
            )));
        }
        if timeout.is_zero() {
            return Err(Error::InvalidParams(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            device,
            role,
            baud_rate,
            max_retransmissions,
            timeout,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn max_retransmissions(&self) -> u8 {
        self.max_retransmissions
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Validates a payload length is in the accepted `write` range.
pub(crate) fn validate_payload_len(len: usize) -> Result<(), Error> {
    if len == 0 || len > MAX_PAYLOAD_SIZE {
        return Err(Error::InvalidParams(format!(
            "payload length must be 1..={MAX_PAYLOAD_SIZE}, got {len}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversize_device_path() {
        let device = "x".repeat(MAX_DEVICE_LEN + 1);
        let err = LinkLayerConfig::new(
            device,
            Role::Transmitter,
            9600,
            3,
            Duration::from_secs(3),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }

    #[test]
    fn rejects_baud_out_of_bounds() {
        let err = LinkLayerConfig::new(
            "/dev/ttyS0",
            Role::Receiver,
            100,
            3,
            Duration::from_secs(3),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = LinkLayerConfig::new("/dev/ttyS0", Role::Receiver, 9600, 3, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }

    #[test]
    fn role_from_str_accepts_aliases() {
        assert_eq!(Role::from_str("tx").unwrap(), Role::Transmitter);
        assert_eq!(Role::from_str("Receiver").unwrap(), Role::Receiver);
        assert!(Role::from_str("bogus").is_err());
    }

    #[test]
    fn accepts_well_formed_config() {
        let cfg = LinkLayerConfig::new("/dev/ttyS0", Role::Transmitter, 9600, 3, Duration::from_secs(3))
            .unwrap();
        assert_eq!(cfg.device(), "/dev/ttyS0");
        assert_eq!(cfg.baud_rate(), 9600);
    }
}
