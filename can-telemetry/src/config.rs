//! Bus session configuration
//!
//! Everything the session needs to bring up and drain a bus. The defaults
//! match the vehicle harness: `can0` at 500 kbit/s.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bus bitrate (bit/s)
pub const DEFAULT_BITRATE: u32 = 500_000;

/// Configuration for one bus session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Network interface name (e.g. "can0", "vcan0")
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Bitrate passed to the bring-up step
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    /// Whether to run the bring-up step before opening the transport
    #[serde(default = "default_true")]
    pub bring_up: bool,

    /// Maximum number of received frames buffered between polls
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Timeout used by `Controller::poll` for each read (default: 100ms)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Timeout used for blocking sends (default: 100ms)
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,

    /// How long the notifier waits on the transport before re-checking for
    /// shutdown (default: 50ms)
    #[serde(default = "default_notifier_poll")]
    pub notifier_poll_ms: u64,
}

fn default_interface() -> String {
    "can0".to_string()
}

fn default_bitrate() -> u32 {
    DEFAULT_BITRATE
}

fn default_true() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    256
}

fn default_read_timeout() -> u64 {
    100
}

fn default_send_timeout() -> u64 {
    100
}

fn default_notifier_poll() -> u64 {
    50
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            bitrate: default_bitrate(),
            bring_up: default_true(),
            queue_capacity: default_queue_capacity(),
            read_timeout_ms: default_read_timeout(),
            send_timeout_ms: default_send_timeout(),
            notifier_poll_ms: default_notifier_poll(),
        }
    }
}

impl BusConfig {
    /// Create a new bus configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the interface name
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Builder method: set the bitrate
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Builder method: enable or disable the bring-up step
    pub fn with_bring_up(mut self, enabled: bool) -> Self {
        self.bring_up = enabled;
        self
    }

    /// Builder method: set the receive queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Builder method: set the poll read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder method: set the send timeout
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn notifier_poll(&self) -> Duration {
        Duration::from_millis(self.notifier_poll_ms.max(1))
    }

    /// Queue capacity, never zero (a zero-capacity channel would drop every frame)
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_config_builder() {
        let config = BusConfig::new()
            .with_interface("vcan0")
            .with_bitrate(250_000)
            .with_bring_up(false)
            .with_queue_capacity(16)
            .with_read_timeout(Duration::from_millis(20));

        assert_eq!(config.interface, "vcan0");
        assert_eq!(config.bitrate, 250_000);
        assert!(!config.bring_up);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.read_timeout(), Duration::from_millis(20));
    }

    #[test]
    fn test_defaults() {
        let config = BusConfig::default();
        assert_eq!(config.interface, "can0");
        assert_eq!(config.bitrate, DEFAULT_BITRATE);
        assert!(config.bring_up);
        assert_eq!(config.send_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let config = BusConfig::new().with_queue_capacity(0);
        assert_eq!(config.effective_queue_capacity(), 1);
    }
}
