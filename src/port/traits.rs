//! Core traits for the modem serial link.
//!
//! `SerialPortAdapter` lets the transport session run against either a real
//! UART or the scripted mock used by the tests.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default device the modem is wired to on the host board.
pub const DEFAULT_PORT_PATH: &str = "/dev/ttyAMA0";

/// Baud rate the AT firmware listens on out of reset.
pub const DEFAULT_BAUD_RATE: u32 = 38400;

/// Per-read timeout. One read call never blocks longer than this.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Line settings for the modem link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits.
    pub data_bits: DataBits,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Upper bound for a single read call.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl PortConfiguration {
    /// 8N1 with no flow control at the given speed and read timeout.
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self {
            baud_rate,
            timeout,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataBits {
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Byte-level access to an open serial link.
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the link.
    ///
    /// Returns the number of bytes accepted, which may be fewer than `data.len()`.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Push any buffered output onto the wire.
    fn flush(&mut self) -> Result<(), PortError> {
        Ok(())
    }

    /// Read whatever is available into `buffer`, blocking at most the
    /// configured timeout.
    ///
    /// Implementations report an elapsed timeout as an `Io` error of kind
    /// `TimedOut`, the same way `serialport` does.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this port.
    fn name(&self) -> &str;

    /// Discard pending input and output.
    fn clear_buffers(&mut self) -> Result<(), PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_matches_modem() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, 38400);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.flow_control, FlowControl::None);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_new_keeps_8n1() {
        let config = PortConfiguration::new(115200, Duration::from_millis(100));
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.timeout, Duration::from_millis(100));
        assert_eq!(config.data_bits, DataBits::Eight);
    }

    #[test]
    fn test_line_setting_conversions() {
        let bits: serialport::DataBits = DataBits::Seven.into();
        assert_eq!(bits, serialport::DataBits::Seven);

        let flow: serialport::FlowControl = FlowControl::Hardware.into();
        assert_eq!(flow, serialport::FlowControl::Hardware);

        let parity: serialport::Parity = Parity::Even.into();
        assert_eq!(parity, serialport::Parity::Even);

        let stop: serialport::StopBits = StopBits::Two.into();
        assert_eq!(stop, serialport::StopBits::Two);
    }
}
