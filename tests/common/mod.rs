//! Shared helpers for the integration tests.
//!
//! - Scripted mock modem construction
//! - A configuration tuned for fast, deterministic runs

#![allow(dead_code)]

use at_test_driver::config::{Config, SerialConfig};
use at_test_driver::port::MockSerialPort;
use at_test_driver::session::{TransportError, TransportSession};
use std::cell::Cell;

/// Mock modem that answers successive lines with `replies`.
pub fn scripted_modem(replies: &[&str]) -> MockSerialPort {
    let mut mock = MockSerialPort::new("MOCK0");
    mock.script_replies(replies.iter().copied());
    mock
}

/// Defaults, minus the waiting: no inter-command delay and a short deadline.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.serial.port = "MOCK0".to_string();
    config.sequencer.inter_command_delay_ms = 0;
    config.sequencer.response_timeout_ms = 25;
    config
}

/// Opener that hands out `mock` and counts how often it was asked.
pub fn mock_opener<'a>(
    mock: &'a MockSerialPort,
    opened: &'a Cell<usize>,
) -> impl FnOnce(&SerialConfig, bool) -> Result<TransportSession<MockSerialPort>, TransportError> + 'a
{
    move |_config, verbose| {
        opened.set(opened.get() + 1);
        Ok(TransportSession::with_port(mock.clone(), verbose))
    }
}
