//! Optional host-side preparation run before the link is opened.
//!
//! Loading the modem driver or setting radio gain is board-specific, so the
//! driver only knows it as a capability: "make the port usable".

use crate::config::ProvisionConfig;
use std::process::Command as OsCommand;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: String },
}

/// Prepares the host so that `port` can be opened.
pub trait Provisioner {
    fn provision(&self, port: &str) -> Result<(), ProvisionError>;
}

/// Does nothing; used when no provisioning is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProvisioner;

impl Provisioner for NoopProvisioner {
    fn provision(&self, _port: &str) -> Result<(), ProvisionError> {
        Ok(())
    }
}

/// Runs configured OS commands in order, stopping at the first failure.
#[derive(Debug, Clone, Default)]
pub struct CommandProvisioner {
    commands: Vec<Vec<String>>,
}

impl CommandProvisioner {
    pub fn new(commands: Vec<Vec<String>>) -> Self {
        Self { commands }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Provisioner for CommandProvisioner {
    fn provision(&self, port: &str) -> Result<(), ProvisionError> {
        for argv in &self.commands {
            let Some((program, args)) = argv.split_first() else {
                continue;
            };
            let line = argv.join(" ");
            debug!(command = %line, port, "provisioning");

            let status = OsCommand::new(program)
                .args(args)
                .status()
                .map_err(|source| ProvisionError::Spawn {
                    program: program.clone(),
                    source,
                })?;

            if !status.success() {
                return Err(ProvisionError::Failed {
                    command: line,
                    status: status.to_string(),
                });
            }
        }

        if !self.commands.is_empty() {
            info!(steps = self.commands.len(), port, "provisioning done");
        }
        Ok(())
    }
}

/// Pick the provisioner for a configuration.
pub fn from_config(config: &ProvisionConfig) -> Box<dyn Provisioner> {
    if config.commands.is_empty() {
        Box::new(NoopProvisioner)
    } else {
        Box::new(CommandProvisioner::new(config.commands.clone()))
    }
}
