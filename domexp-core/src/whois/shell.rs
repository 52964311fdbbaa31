use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument};

use super::client::DEFAULT_TIMEOUT;
use crate::error::{DomexpError, Result};

/// Runs a WHOIS command-line tool and returns its standard output.
#[async_trait]
pub trait WhoisCommand: Send + Sync {
    /// Fails when the tool is missing, times out or exits non-zero.
    async fn run(&self, domain: &str) -> Result<String>;
}

/// The system `whois` utility.
#[derive(Debug, Clone)]
pub struct SystemWhois {
    program: String,
    timeout: Duration,
}

impl Default for SystemWhois {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemWhois {
    pub fn new() -> Self {
        Self {
            program: "whois".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl WhoisCommand for SystemWhois {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn run(&self, domain: &str) -> Result<String> {
        debug!(domain = %domain, "Running whois command");

        let mut command = Command::new(&self.program);
        command.arg(domain).kill_on_drop(true);

        let output = timeout(self.timeout, command.output())
            .await
            .map_err(|_| DomexpError::Timeout(format!("{} {} timed out", self.program, domain)))?
            .map_err(|e| DomexpError::WhoisCommandFailed(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(DomexpError::WhoisCommandFailed(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
