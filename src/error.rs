//! Top-level error type and process exit codes.

use crate::config::ConfigError;
use crate::matrix::UsageError;
use crate::provision::ProvisionError;
use crate::sequencer::{RunReport, SequenceError};
use crate::session::TransportError;
use thiserror::Error;

/// Every command succeeded, or a listing/dry run finished.
pub const EXIT_SUCCESS: u8 = 0;
/// The modem answered `ERROR` or never answered.
pub const EXIT_RUN_FAILED: u8 = 1;
/// Bad selectors or arguments; nothing was sent.
pub const EXIT_USAGE: u8 = 2;
/// Configuration, provisioning or transport trouble.
pub const EXIT_ENVIRONMENT: u8 = 3;

/// Errors that end a run before a report can be produced.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("failed to encode report: {0}")]
    Report(#[from] serde_json::Error),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => EXIT_USAGE,
            Self::Config(_)
            | Self::Provision(_)
            | Self::Transport(_)
            | Self::Sequence(_)
            | Self::Report(_) => EXIT_ENVIRONMENT,
        }
    }
}

/// Exit code for a run that produced a report.
pub fn report_exit_code(report: &RunReport) -> u8 {
    if report.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_RUN_FAILED
    }
}
