//! Errors raised by the serial port layer.

use thiserror::Error;

/// Errors that can occur while opening or driving the modem link.
#[derive(Debug, Error)]
pub enum PortError {
    /// The device path does not exist.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// The device exists but could not be claimed.
    #[error("Serial port busy or inaccessible: {0}")]
    Busy(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The driver rejected the requested line settings.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// True when the error only means "nothing arrived before the read timeout".
    pub fn is_read_timeout(&self) -> bool {
        matches!(
            self,
            Self::Io(e) if matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            )
        )
    }
}
