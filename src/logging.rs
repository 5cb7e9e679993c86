//! Tracing setup for the binary.
//!
//! Logs go to stderr so `--json` reports on stdout stay machine-readable.
//! `RUST_LOG` takes precedence; otherwise verbose runs log at `debug`.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(config: &LoggingConfig, verbose: bool) -> String {
    if verbose || config.verbose {
        "at_test_driver=debug,at_test=debug,warn".to_string()
    } else {
        format!("at_test_driver={0},at_test={0},warn", config.level)
    }
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config, verbose)));

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
}
