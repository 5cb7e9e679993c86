//! Transport session: the single open link to the modem for one run.
//!
//! The session only moves bytes. It appends the line terminator on write and
//! hands back whatever arrived within one read timeout; interpreting replies is
//! the sequencer's job.

use crate::config::SerialConfig;
use crate::matrix::Command;
use crate::port::{PortError, SerialPortAdapter, SyncSerialPort};
use thiserror::Error;
use tracing::{debug, info};

/// Terminator appended to every command on the wire.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Tracing target for raw wire traffic.
pub const WIRE_TARGET: &str = "at_test::wire";

const READ_CHUNK_SIZE: usize = 256;

/// Transport failures. All of them end the run.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: PortError,
    },

    #[error("write to {port} failed: {source}")]
    Write {
        port: String,
        #[source]
        source: PortError,
    },

    #[error("write to {port} stalled after {written} of {total} bytes")]
    WriteStalled {
        port: String,
        written: usize,
        total: usize,
    },

    #[error("read from {port} failed: {source}")]
    Read {
        port: String,
        #[source]
        source: PortError,
    },
}

/// Exclusive owner of the serial link for the duration of a run.
#[derive(Debug)]
pub struct TransportSession<P: SerialPortAdapter> {
    port: P,
    verbose: bool,
}

impl TransportSession<SyncSerialPort> {
    /// Open the configured device. Failure is fatal for the run.
    pub fn open(config: &SerialConfig, verbose: bool) -> Result<Self, TransportError> {
        let port = SyncSerialPort::open(&config.port, config.port_configuration()).map_err(
            |source| TransportError::Open {
                port: config.port.clone(),
                source,
            },
        )?;

        info!(
            port = %config.port,
            baud = config.baud,
            read_timeout_ms = config.read_timeout_ms,
            "serial link open"
        );

        Ok(Self::with_port(port, verbose))
    }
}

impl<P: SerialPortAdapter> TransportSession<P> {
    /// Wrap an already open port.
    pub fn with_port(port: P, verbose: bool) -> Self {
        Self { port, verbose }
    }

    pub fn port_name(&self) -> &str {
        self.port.name()
    }

    /// Send `command` followed by CRLF. Does not wait for a reply.
    pub fn write_line(&mut self, command: &Command) -> Result<(), TransportError> {
        let line = format!("{command}{LINE_TERMINATOR}");
        if self.verbose {
            debug!(target: WIRE_TARGET, ">> {}", command);
        }

        let bytes = line.as_bytes();
        let mut written = 0;
        while written < bytes.len() {
            let n = self
                .port
                .write_bytes(&bytes[written..])
                .map_err(|source| self.write_error(source))?;
            if n == 0 {
                return Err(TransportError::WriteStalled {
                    port: self.port.name().to_string(),
                    written,
                    total: bytes.len(),
                });
            }
            written += n;
        }

        self.port
            .flush()
            .map_err(|source| self.write_error(source))?;
        debug!(bytes = written, "command sent");
        Ok(())
    }

    /// Wait at most one read timeout and return what arrived, possibly nothing.
    pub fn read_chunk(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut buffer = [0u8; READ_CHUNK_SIZE];
        match self.port.read_bytes(&mut buffer) {
            Ok(n) => {
                if self.verbose && n > 0 {
                    debug!(
                        target: WIRE_TARGET,
                        "<< {}",
                        String::from_utf8_lossy(&buffer[..n]).escape_debug()
                    );
                }
                Ok(buffer[..n].to_vec())
            }
            Err(e) if e.is_read_timeout() => Ok(Vec::new()),
            Err(source) => Err(TransportError::Read {
                port: self.port.name().to_string(),
                source,
            }),
        }
    }

    /// Drop anything the modem sent before the run started.
    pub fn discard_pending(&mut self) -> Result<(), TransportError> {
        self.port
            .clear_buffers()
            .map_err(|source| TransportError::Read {
                port: self.port.name().to_string(),
                source,
            })
    }

    fn write_error(&self, source: PortError) -> TransportError {
        TransportError::Write {
            port: self.port.name().to_string(),
            source,
        }
    }
}
