//! Engine configuration.

use crate::error::{Error, Result};
use std::time::Duration;

/// Configuration for a [`MidiBindEngine`](super::MidiBindEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Client name registered with the OS MIDI service.
    pub client_name: String,
    /// Longest `start` waits for the input port to open.
    pub open_timeout: Duration,
    /// How often a running session checks that its port still exists.
    pub port_check_interval: Duration,
    /// Reports queued for the caller before new ones are dropped.
    pub report_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client_name: "midibind".to_string(),
            open_timeout: Duration::from_secs(2),
            port_check_interval: Duration::from_secs(1),
            report_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "client_name cannot be empty".to_string(),
            ));
        }
        if self.open_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "open_timeout must be greater than zero".to_string(),
            ));
        }
        if self.port_check_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "port_check_interval must be greater than zero".to_string(),
            ));
        }
        if self.report_capacity == 0 {
            return Err(Error::InvalidConfig(
                "report_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
