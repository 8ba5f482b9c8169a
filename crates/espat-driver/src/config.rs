//! Driver configuration.

use std::time::Duration;

use espat_protocol::{BOOT_MARKER_CAPACITY, DEFAULT_BOOT_MARKER, MAX_UBIDOTS_VARIABLES};
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult};

/// Default Ubidots device API prefix.
pub const DEFAULT_UBIDOTS_URL: &str = "/api/v1.6/devices/";

/// Timing and retry budgets for the driver.
///
/// Read timeouts are counted in polling ticks: the reader sleeps one tick
/// each time no byte is pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Name used in log output.
    pub name: String,
    /// Length of one polling tick in milliseconds.
    pub tick_ms: u64,
    /// Default read timeout, in ticks.
    pub read_timeout_ticks: u32,
    /// Default number of reads when waiting for a token.
    /// Reply scans (`find_among`) use twice this many.
    pub default_tries: u32,
    /// Reads allowed while waiting for `WIFI CONNECTED`.
    pub connect_tries: u32,
    /// Reads allowed while waiting for the Ubidots `status_code` line.
    pub post_status_tries: u32,
    /// How long the reset line is held low, in milliseconds.
    pub reset_hold_ms: u64,
    /// Line printed by the firmware when it finishes booting.
    pub boot_marker: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            name: "esp8266".to_string(),
            tick_ms: 2,
            read_timeout_ticks: 1000,
            default_tries: 5,
            connect_tries: 10,
            post_status_tries: 25,
            reset_hold_ms: 10,
            boot_marker: DEFAULT_BOOT_MARKER.to_string(),
        }
    }
}

impl DriverConfig {
    /// Length of one polling tick.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// How long the reset line is held low.
    pub fn reset_hold(&self) -> Duration {
        Duration::from_millis(self.reset_hold_ms)
    }

    /// Number of reads a reply scan is allowed.
    pub fn scan_attempts(&self) -> u32 {
        self.default_tries * 2
    }

    /// Set the driver name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the default read timeout in ticks.
    pub fn with_read_timeout_ticks(mut self, ticks: u32) -> Self {
        self.read_timeout_ticks = ticks;
        self
    }

    /// Set the default number of tries.
    pub fn with_default_tries(mut self, tries: u32) -> Self {
        self.default_tries = tries;
        self
    }

    /// Set the tick length in milliseconds.
    pub fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms;
        self
    }

    /// Check the configuration for values the driver cannot work with.
    pub fn validate(&self) -> DriverResult<()> {
        if self.default_tries == 0 {
            return Err(DriverError::Config("default_tries must be at least 1".to_string()));
        }
        if self.connect_tries == 0 {
            return Err(DriverError::Config("connect_tries must be at least 1".to_string()));
        }
        if self.boot_marker.len() >= BOOT_MARKER_CAPACITY {
            return Err(DriverError::BootMarkerTooLong {
                max: BOOT_MARKER_CAPACITY - 1,
                actual: self.boot_marker.len(),
            });
        }
        Ok(())
    }
}

/// Ubidots endpoint settings used by the request helpers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UbidotsConfig {
    /// API token.
    pub token: String,
    /// Device API prefix, e.g. `/api/v1.6/devices/`.
    pub url: String,
    /// Device label.
    pub device: String,
    /// Variable labels, at most four.
    pub variables: Vec<String>,
}

impl Default for UbidotsConfig {
    fn default() -> Self {
        UbidotsConfig {
            token: String::new(),
            url: DEFAULT_UBIDOTS_URL.to_string(),
            device: String::new(),
            variables: Vec::new(),
        }
    }
}

impl UbidotsConfig {
    /// Check that everything a POST needs is present.
    pub fn validate(&self) -> DriverResult<()> {
        if self.token.is_empty() {
            return Err(DriverError::Config("ubidots token is not set".to_string()));
        }
        if self.device.is_empty() {
            return Err(DriverError::Config("ubidots device name is not set".to_string()));
        }
        if self.variables.len() > MAX_UBIDOTS_VARIABLES {
            return Err(DriverError::Config(format!(
                "at most {} ubidots variables, got {}",
                MAX_UBIDOTS_VARIABLES,
                self.variables.len()
            )));
        }
        Ok(())
    }
}
