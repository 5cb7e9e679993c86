//! Configuration schema.
//!
//! One `Config` carries everything a run needs: the serial link, the test
//! parameters substituted into commands, the sequencer policy, logging and the
//! optional provisioning step.

use crate::port::{
    DataBits, FlowControl, Parity, PortConfiguration, StopBits, DEFAULT_BAUD_RATE,
    DEFAULT_PORT_PATH,
};
use crate::sequencer::TimeoutPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub parameters: ParameterSet,
    pub sequencer: SequencerConfig,
    pub logging: LoggingConfig,
    pub provision: ProvisionConfig,
}

impl Config {
    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.port.trim().is_empty() {
            return Err(ConfigError::validation("serial.port", "must not be empty"));
        }
        if self.serial.baud == 0 {
            return Err(ConfigError::validation("serial.baud", "must be non-zero"));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "serial.read_timeout_ms",
                "must be non-zero",
            ));
        }
        if self
            .provision
            .commands
            .iter()
            .any(|argv| argv.first().map_or(true, |p| p.trim().is_empty()))
        {
            return Err(ConfigError::validation(
                "provision.commands",
                "every entry needs a program name",
            ));
        }
        Ok(())
    }
}

/// Serial link settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path of the modem UART
    pub port: String,
    /// Baud rate
    pub baud: u32,
    /// Upper bound for one read call, in milliseconds
    pub read_timeout_ms: u64,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT_PATH.to_string(),
            baud: DEFAULT_BAUD_RATE,
            read_timeout_ms: 500,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            flow_control: self.flow_control,
            ..PortConfiguration::new(self.baud, self.read_timeout())
        }
    }
}

/// Wi-Fi security mode as the test firmware numbers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    Open,
    Wpa2,
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("0"),
            Self::Wpa2 => f.write_str("1"),
        }
    }
}

/// Values substituted into the command templates.
///
/// Trusted input: nothing here is escaped or checked before it goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    pub ssid: String,
    pub country: String,
    pub security: SecurityMode,
    /// Ignored by the firmware when `security` is open
    pub password: String,
    /// Transmit power in dBm
    pub tx_power: u8,
    /// Static address is ignored by the firmware when DHCP is on
    pub dhcp: bool,
    pub static_ip: String,
    pub remote_ip: String,
    /// Repeat count for looping tests
    pub count: u32,
    /// Interval between repeats, in milliseconds
    pub interval_ms: u32,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            ssid: "halow_testing".to_string(),
            country: "US".to_string(),
            security: SecurityMode::Wpa2,
            password: "12345678".to_string(),
            tx_power: 17,
            dhcp: false,
            static_ip: "192.168.200.12".to_string(),
            remote_ip: "192.168.200.1".to_string(),
            count: 10,
            interval_ms: 500,
        }
    }
}

/// Sequencer policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Deadline for a terminal token after a command is sent, in milliseconds.
    /// Zero waits forever.
    pub response_timeout_ms: u64,
    /// Quiet period after a successful command, in milliseconds
    pub inter_command_delay_ms: u64,
    /// What to do when the deadline fires
    pub on_timeout: TimeoutPolicy,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 30_000,
            inter_command_delay_ms: 1_000,
            on_timeout: TimeoutPolicy::Abort,
        }
    }
}

impl SequencerConfig {
    pub fn response_timeout(&self) -> Option<Duration> {
        match self.response_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn inter_command_delay(&self) -> Duration {
        Duration::from_millis(self.inter_command_delay_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Echo every line sent and every chunk received
    pub verbose: bool,
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

/// Commands run before the link is opened (module load, radio gain, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Each entry is a program followed by its arguments
    pub commands: Vec<Vec<String>>,
}
