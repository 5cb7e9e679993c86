//! End-to-end run: resolve, provision, open, sequence.
//!
//! Selectors are validated before anything touches the host or the port, so a
//! usage error never reaches the modem.

use crate::config::{Config, SerialConfig};
use crate::error::AppError;
use crate::matrix::{CommandList, Selection};
use crate::port::{SerialPortAdapter, SyncSerialPort};
use crate::provision::Provisioner;
use crate::sequencer::{RunReport, Sequencer, SequencerOptions};
use crate::session::{TransportError, TransportSession};
use serde::Serialize;
use tracing::info;

/// A validated selection and the commands it renders to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub selection: Selection,
    pub commands: CommandList,
}

impl Plan {
    /// Validate CLI indices and render commands from the configured parameters.
    pub fn new(family: u32, case: Option<u32>, config: &Config) -> Result<Self, AppError> {
        let selection = Selection::from_indices(family, case)?;
        let commands = selection.commands(&config.parameters);
        Ok(Self {
            selection,
            commands,
        })
    }
}

/// Report plus the selection that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub family: &'static str,
    pub case: &'static str,
    pub port: String,
    #[serde(flatten)]
    pub report: RunReport,
}

/// Run `plan` on the port produced by `open`.
///
/// `open` receives the serial settings and the verbose flag. Production code
/// passes [`open_serial`]; tests pass a closure returning a mock session.
pub fn run_plan<P, F>(
    plan: Plan,
    config: &Config,
    provisioner: &dyn Provisioner,
    open: F,
) -> Result<RunSummary, AppError>
where
    P: SerialPortAdapter,
    F: FnOnce(&SerialConfig, bool) -> Result<TransportSession<P>, TransportError>,
{
    let Plan {
        selection,
        commands,
    } = plan;

    info!(
        family = %selection.family(),
        case = selection.label(),
        commands = commands.len(),
        "resolved test selection"
    );

    provisioner.provision(&config.serial.port)?;

    let mut session = open(&config.serial, config.logging.verbose)?;
    session.discard_pending()?;
    let port = session.port_name().to_string();

    let mut sequencer = Sequencer::new(session, SequencerOptions::from(&config.sequencer));
    let report = sequencer.run(commands)?;

    Ok(RunSummary {
        family: selection.family().name(),
        case: selection.label(),
        port,
        report,
    })
}

/// Open the real UART described by `config`.
pub fn open_serial(
    config: &SerialConfig,
    verbose: bool,
) -> Result<TransportSession<SyncSerialPort>, TransportError> {
    TransportSession::open(config, verbose)
}
