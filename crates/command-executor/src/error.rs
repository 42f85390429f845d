//! Error types for command execution

use thiserror::Error;

/// Unified error type for command execution
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn a process
    #[error("failed to spawn {program}: {reason}")]
    SpawnFailed {
        /// The program that could not be started
        program: String,
        /// The reason for the spawn failure
        reason: String,
    },

    /// Command not found
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found
        command: String,
    },

    /// I/O error while talking to a running process
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify a spawn error for `program`
    pub fn from_spawn(program: impl Into<String>, err: std::io::Error) -> Self {
        let program = program.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::CommandNotFound { command: program }
        } else {
            Self::SpawnFailed {
                program,
                reason: err.to_string(),
            }
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
