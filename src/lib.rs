//! AT-command test driver.
//!
//! Sends firmware self-test AT commands to a serial-attached Wi-Fi modem one at
//! a time, waits for `OK`/`ERROR` after each, and stops at the first failure.
//!
//! # Modules
//!
//! - `config`: TOML configuration with environment overrides
//! - `matrix`: (family, case) selection to command list
//! - `port`: serial port abstraction, real and mock
//! - `session`: transport session owning the open link
//! - `sequencer`: blocking-response protocol and abort-on-failure policy
//! - `provision`: optional host preparation before the port is opened
//! - `runner`: end-to-end run used by the binary
//! - `logging`: tracing subscriber setup
//! - `error`: top-level error and exit codes

pub mod config;
pub mod error;
pub mod logging;
pub mod matrix;
pub mod port;
pub mod provision;
pub mod runner;
pub mod sequencer;
pub mod session;

pub use config::{Config, ConfigError, ConfigLoader, ConfigResult, ParameterSet};
pub use error::AppError;
pub use matrix::{Command, CommandList, Selection, TestFamily, UsageError};
pub use port::{MockSerialPort, PortConfiguration, PortError, SerialPortAdapter, SyncSerialPort};
pub use runner::{run_plan, Plan, RunSummary};
pub use sequencer::{
    CommandRecord, CommandState, Outcome, ResponseBuffer, RunReport, RunStatus, SequenceError,
    Sequencer, SequencerOptions, TimeoutPolicy,
};
pub use session::{TransportError, TransportSession};
