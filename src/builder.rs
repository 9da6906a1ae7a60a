//! Type-state builder for [`LinkLayer`], mirroring the teacher's
//! `BaseContextBuilder<Init>` → `BaseContextBuilder<Serial>` pattern: the
//! role must be selected before `build()` becomes available, so a caller
//! cannot construct a half-configured connection.

use std::marker::PhantomData;
use std::time::Duration;

use crate::LinkResult;
use crate::config::{LinkLayerConfig, Role};
use crate::connection::LinkLayer;
use crate::transport::SerialPortTransport;

const DEFAULT_BAUD: u32 = 115_200;
const DEFAULT_MAX_RETRANSMISSIONS: u8 = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Initial builder state: no role selected yet.
pub struct Init;
/// A role and device have been selected; `build()` is now available.
pub struct RoleSelected;

/// Type-state builder for a [`LinkLayer`] over a real serial port.
pub struct LinkLayerBuilder<S> {
    device: Option<String>,
    role: Option<Role>,
    baud_rate: u32,
    max_retransmissions: u8,
    timeout: Duration,
    _marker: PhantomData<S>,
}

impl Default for LinkLayerBuilder<Init> {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkLayerBuilder<Init> {
    pub fn new() -> Self {
        Self {
            device: None,
            role: None,
            baud_rate: DEFAULT_BAUD,
            max_retransmissions: DEFAULT_MAX_RETRANSMISSIONS,
            timeout: DEFAULT_TIMEOUT,
            _marker: PhantomData,
        }
    }

    /// Selects the transmitter role for `device`.
    pub fn transmitter(self, device: impl Into<String>) -> LinkLayerBuilder<RoleSelected> {
        self.with_role(Role::Transmitter, device)
    }

    /// Selects the receiver role for `device`.
    pub fn receiver(self, device: impl Into<String>) -> LinkLayerBuilder<RoleSelected> {
        self.with_role(Role::Receiver, device)
    }

    fn with_role(self, role: Role, device: impl Into<String>) -> LinkLayerBuilder<RoleSelected> {
        LinkLayerBuilder {
            device: Some(device.into()),
            role: Some(role),
            baud_rate: self.baud_rate,
            max_retransmissions: self.max_retransmissions,
            timeout: self.timeout,
            _marker: PhantomData,
        }
    }
}

impl LinkLayerBuilder<RoleSelected> {
    pub fn baud(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn max_retransmissions(mut self, max_retransmissions: u8) -> Self {
        self.max_retransmissions = max_retransmissions;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates the accumulated configuration, opens the serial device,
    /// and performs the open handshake.
    pub fn build(self) -> LinkResult<LinkLayer<SerialPortTransport>> {
        let config = LinkLayerConfig::new(
            self.device.expect("device required to reach build()"),
            self.role.expect("role required to reach build()"),
            self.baud_rate,
            self.max_retransmissions,
            self.timeout,
        )?;
        let transport = SerialPortTransport::open(config.device(), config.baud_rate())?;
        LinkLayer::open(config, transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let builder = LinkLayerBuilder::new().transmitter("/dev/ttyUSB0");
        assert_eq!(builder.baud_rate, DEFAULT_BAUD);
        assert_eq!(builder.max_retransmissions, DEFAULT_MAX_RETRANSMISSIONS);
        assert_eq!(builder.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn invalid_config_is_rejected_before_the_device_is_ever_opened() {
        // An out-of-range baud rate fails `LinkLayerConfig::new` validation
        // inside `build()`, before `SerialPortTransport::open` is attempted,
        // so a nonexistent device path never surfaces as the error.
        let err = LinkLayerBuilder::new()
            .transmitter("/dev/nonexistent-for-test")
            .baud(100)
            .build()
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidParams(_)));
    }
}
