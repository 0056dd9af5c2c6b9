//! Startup configuration, read from TOML.
//!
//! ```toml
//! [serial]
//! device = "/dev/ttyXRUSB0"
//! baud_rate = 115200
//! slave = 1
//!
//! [poll]
//! interval_secs = 60
//! ```

use anyhow::{bail, Context, Result};
use serde_derive::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    pub device: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    /// Modbus device address.
    pub slave: u8,
    /// Per request timeout.
    pub timeout_secs: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            device: "/dev/ttyXRUSB0".into(),
            baud_rate: 115200,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            slave: 1,
            timeout_secs: 10,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    pub interval_secs: u64,
    /// Wait between failed connection attempts.
    pub reconnect_backoff_secs: u64,
    /// Also read the holding bank settings on every cycle.
    pub read_configuration: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig { interval_secs: 60, reconnect_backoff_secs: 10, read_configuration: true }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub serial: SerialConfig,
    pub poll: PollConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Config> {
        let config: Config = toml::from_str(s).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        Config::from_toml_str(&s).with_context(|| format!("loading {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let serial = &self.serial;
        if serial.device.is_empty() {
            bail!("serial.device must not be empty")
        }
        if serial.baud_rate == 0 {
            bail!("serial.baud_rate must be positive")
        }
        if !(5..=8).contains(&serial.data_bits) {
            bail!("serial.data_bits must be between 5 and 8, got {}", serial.data_bits)
        }
        if !(1..=2).contains(&serial.stop_bits) {
            bail!("serial.stop_bits must be 1 or 2, got {}", serial.stop_bits)
        }
        if !(1..=247).contains(&serial.slave) {
            bail!("serial.slave must be between 1 and 247, got {}", serial.slave)
        }
        if serial.timeout_secs == 0 {
            bail!("serial.timeout_secs must be positive")
        }
        if self.poll.interval_secs == 0 {
            bail!("poll.interval_secs must be positive")
        }
        if self.poll.reconnect_backoff_secs == 0 {
            bail!("poll.reconnect_backoff_secs must be positive")
        }
        Ok(())
    }
}
