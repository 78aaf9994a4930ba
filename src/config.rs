//! Configuration for gattkit
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{GattError, Result};
use crate::gatt::{ATT_OPCODE_LEN, MTU_DEFAULT_CLIENT, MTU_DEFAULT_SERVER};

/// Main configuration for a peripheral instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Completion Configuration
    // -------------------------------------------------------------------------
    /// How long a blocking request waits for its completion event
    /// before reporting an unknown outcome (milliseconds)
    pub completion_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Transfer Configuration
    // -------------------------------------------------------------------------
    /// MTU offered by this side during exchange
    pub local_mtu: u16,

    /// MTU assumed for a connection until the peer negotiates one
    pub default_peer_mtu: u16,

    // -------------------------------------------------------------------------
    // Event Loop Configuration
    // -------------------------------------------------------------------------
    /// Name given to the event-delivery thread
    pub event_thread_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion_timeout_ms: 5000,
            local_mtu: MTU_DEFAULT_SERVER,
            default_peer_mtu: MTU_DEFAULT_CLIENT,
            event_thread_name: "gattkit-events".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Completion timeout as a `Duration`
    pub fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }

    /// Reject settings the transfer path cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.completion_timeout_ms == 0 {
            return Err(GattError::Config(
                "completion timeout must be non-zero".to_string(),
            ));
        }

        // An MTU must leave room for at least one payload byte after the opcode
        if (self.default_peer_mtu as usize) <= ATT_OPCODE_LEN {
            return Err(GattError::Config(format!(
                "default peer MTU {} leaves no room for payload",
                self.default_peer_mtu
            )));
        }

        if self.local_mtu < self.default_peer_mtu {
            return Err(GattError::Config(format!(
                "local MTU {} is below default peer MTU {}",
                self.local_mtu, self.default_peer_mtu
            )));
        }

        if self.event_thread_name.is_empty() {
            return Err(GattError::Config("event thread name is empty".to_string()));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the completion timeout (in milliseconds)
    pub fn completion_timeout_ms(mut self, ms: u64) -> Self {
        self.config.completion_timeout_ms = ms;
        self
    }

    /// Set the local MTU
    pub fn local_mtu(mut self, mtu: u16) -> Self {
        self.config.local_mtu = mtu;
        self
    }

    /// Set the MTU assumed for new connections
    pub fn default_peer_mtu(mut self, mtu: u16) -> Self {
        self.config.default_peer_mtu = mtu;
        self
    }

    /// Set the event-delivery thread name
    pub fn event_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.event_thread_name = name.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
