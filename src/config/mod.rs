//! Configuration for the AT test driver.
//!
//! # Configuration Resolution
//!
//! 1. `AT_TEST_CONFIG` environment variable (explicit path)
//! 2. `./at-test.toml` (current directory)
//! 3. `$XDG_CONFIG_HOME/at-test/at-test.toml` (or `~/.config/...`)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `AT_TEST_<SECTION>_<KEY>`, for example
//! `AT_TEST_SERIAL_PORT=/dev/ttyUSB0` or `AT_TEST_SEQUENCER_ON_TIMEOUT=retry_once`.
//!
//! # Example
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyAMA0"
//! baud = 38400
//! read_timeout_ms = 500
//!
//! [parameters]
//! ssid = "halow_testing"
//! country = "US"
//! security = "wpa2"
//! password = "12345678"
//! tx_power = 17
//! dhcp = false
//! static_ip = "192.168.200.12"
//! remote_ip = "192.168.200.1"
//! count = 10
//! interval_ms = 500
//!
//! [sequencer]
//! response_timeout_ms = 30000
//! inter_command_delay_ms = 1000
//! on_timeout = "abort"
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_env_overrides, apply_overrides_from, resolve_config_path, ConfigLoader};
pub use schema::{
    Config, LogFormat, LoggingConfig, ParameterSet, ProvisionConfig, SecurityMode, SequencerConfig,
    SerialConfig,
};
