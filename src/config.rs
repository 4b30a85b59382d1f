//! Master configuration

use std::time::Duration;

use crate::constants::{DEFAULT_TIMEOUT_MS, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS};
use crate::error::{ModbusError, ModbusResult};

/// Settings shared by every request a master sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterConfig {
    /// Total time allowed for one response frame
    pub timeout: Duration,
    /// Log every byte sent and received at info level
    pub packet_logging: bool,
}

impl MasterConfig {
    /// Default configuration: 1000 ms timeout, packet logging off
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            packet_logging: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_packet_logging(mut self, enabled: bool) -> Self {
        self.packet_logging = enabled;
        self
    }

    /// Check the timeout is within 100..=10000 ms
    pub fn validate(&self) -> ModbusResult<()> {
        let ms = self.timeout.as_millis();
        if ms < MIN_TIMEOUT_MS as u128 || ms > MAX_TIMEOUT_MS as u128 {
            return Err(ModbusError::invalid_argument(format!(
                "Timeout {} ms outside {}-{} ms",
                ms, MIN_TIMEOUT_MS, MAX_TIMEOUT_MS
            )));
        }
        Ok(())
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self::new()
    }
}
