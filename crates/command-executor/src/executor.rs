//! Executor that runs commands as local child processes

use async_process::Stdio;
use tracing::{debug, trace};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::process::{ExitStatus, LineStream, ProcessOutput};

/// Runs [`Command`]s on the local host
#[derive(Debug, Clone)]
pub struct Executor {
    /// Name used to tag log messages
    service_name: String,
}

impl Executor {
    /// Create a new executor; `service_name` tags its log messages
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Get the service name
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Run a command to completion and capture its output
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`ProcessOutput::status`].
    pub async fn output(&self, command: &Command) -> Result<ProcessOutput> {
        let program = command.get_program().to_string_lossy().into_owned();
        debug!("[{}] running: {}", self.service_name, command.display());

        let output = command
            .prepare()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::from_spawn(&program, e))?;

        let output = ProcessOutput {
            status: ExitStatus::from(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        trace!(
            "[{}] {} exited with {}",
            self.service_name,
            program,
            output.status
        );
        Ok(output)
    }

    /// Spawn a command and stream its stdout line by line
    pub async fn spawn_lines(&self, command: &Command) -> Result<LineStream> {
        let program = command.get_program().to_string_lossy().into_owned();
        debug!("[{}] spawning: {}", self.service_name, command.display());

        let child = command
            .prepare()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::from_spawn(&program, e))?;

        Ok(LineStream::new(program, child))
    }
}
