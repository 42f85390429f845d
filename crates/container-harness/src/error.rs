//! Error types for the container harness

use command_executor::ExitStatus;
use thiserror::Error;

use crate::cancel::Cancelled;
use crate::config::ConfigError;

/// Failure reported by an [`crate::EngineClient`] implementation
#[derive(Error, Debug)]
pub enum EngineError {
    /// The caller's scope was cancelled or expired before the call finished
    #[error("engine call cancelled")]
    Cancelled,

    /// An engine CLI command exited unsuccessfully
    #[error("`{command}` failed with {status}: {stderr}")]
    CommandFailed {
        /// The command line that was run
        command: String,
        /// How it exited
        status: ExitStatus,
        /// Trimmed stderr output
        stderr: String,
    },

    /// The engine answered with something we could not interpret
    #[error("malformed engine response: {0}")]
    Malformed(String),

    /// The engine does not offer this capability
    #[error("{0} not supported by this engine")]
    Unsupported(&'static str),

    /// Failed to run the engine CLI at all
    #[error(transparent)]
    Executor(#[from] command_executor::Error),

    /// Other engine failure
    #[error("{0}")]
    Other(String),
}

impl From<Cancelled> for EngineError {
    fn from(_: Cancelled) -> Self {
        EngineError::Cancelled
    }
}

/// Setup step of an orchestration, used to report which one failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Image pull
    Pull,
    /// Container creation
    Create,
    /// Container start
    Start,
    /// Container inspection
    Inspect,
    /// Required-port check after inspection
    PortCheck,
    /// Readiness gate
    Ready,
    /// Loading harness configuration
    Config,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::Pull => "pull",
            Step::Create => "create",
            Step::Start => "start",
            Step::Inspect => "inspect",
            Step::PortCheck => "port check",
            Step::Ready => "ready",
            Step::Config => "config",
        };
        f.write_str(name)
    }
}

/// Error types for orchestration operations
#[derive(Error, Debug)]
pub enum Error {
    /// The engine refused to start pulling the image
    #[error("failed to pull image {image}: {source}")]
    Pull {
        /// Image reference
        image: String,
        /// Underlying engine failure
        source: EngineError,
    },

    /// The engine could not create the container
    #[error("failed to create container from image {image}: {source}")]
    Create {
        /// Image reference
        image: String,
        /// Underlying engine failure
        source: EngineError,
    },

    /// The container was created but could not be started
    #[error("failed to start container {id}: {source}")]
    Start {
        /// Container identifier
        id: String,
        /// Underlying engine failure
        source: EngineError,
    },

    /// The container started but could not be inspected
    #[error("failed to inspect container {id}: {source}")]
    Inspect {
        /// Container identifier
        id: String,
        /// Underlying engine failure
        source: EngineError,
    },

    /// A port is required but the container has no network settings
    #[error("container {id} has no network settings but a port is required")]
    NoNetworkSettings {
        /// Container identifier
        id: String,
    },

    /// A port is required but no binding could be resolved
    #[error("container {id} has no resolvable port bindings but a port is required")]
    NoPortBindings {
        /// Container identifier
        id: String,
    },

    /// The readiness predicate never passed before the scope ended
    #[error("container was never ready before timing out: {container}")]
    NotReady {
        /// Description of the container
        container: String,
    },

    /// Harness configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// The setup step that failed
    pub fn step(&self) -> Step {
        match self {
            Error::Pull { .. } => Step::Pull,
            Error::Create { .. } => Step::Create,
            Error::Start { .. } => Step::Start,
            Error::Inspect { .. } => Step::Inspect,
            Error::NoNetworkSettings { .. } | Error::NoPortBindings { .. } => Step::PortCheck,
            Error::NotReady { .. } => Step::Ready,
            Error::Config(_) => Step::Config,
        }
    }

    /// True when the engine succeeded but produced an unusable container
    pub fn is_config_mismatch(&self) -> bool {
        matches!(
            self,
            Error::NoNetworkSettings { .. } | Error::NoPortBindings { .. }
        )
    }

    /// The engine failure behind this error, if any
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Error::Pull { source, .. }
            | Error::Create { source, .. }
            | Error::Start { source, .. }
            | Error::Inspect { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// A launch that failed, with the container left behind if one was created
///
/// When `container_id` is set the caller owns its cleanup.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct LaunchFailure {
    /// Identifier of a created container that still needs cleanup
    pub container_id: Option<String>,
    /// What went wrong
    pub error: Error,
}

impl LaunchFailure {
    pub(crate) fn not_created(error: Error) -> Self {
        Self {
            container_id: None,
            error,
        }
    }

    pub(crate) fn created(id: impl Into<String>, error: Error) -> Self {
        Self {
            container_id: Some(id.into()),
            error,
        }
    }

    /// Discard the cleanup obligation and keep the error
    pub fn into_error(self) -> Error {
        self.error
    }
}
