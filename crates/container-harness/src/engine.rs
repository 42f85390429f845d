//! The container engine boundary.
//!
//! The harness is a client of an engine that can pull images and create,
//! start, inspect, stop and remove containers. [`EngineClient`] captures that
//! capability set so the orchestration logic runs unchanged against the
//! Docker CLI ([`crate::docker::DockerCli`]) or an in-memory test double.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::cancel::{CancelToken, Cancelled};
use crate::error::EngineError;

/// Capability set the harness needs from a container engine
///
/// Implementations are used sequentially by one orchestration at a time.
/// Concurrent tests should use separate clients unless the implementation is
/// itself safe to share.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Ask the engine to fetch an image.
    ///
    /// An `Err` means the pull was never initiated. The returned progress
    /// stream is diagnostic output only.
    async fn pull_image(
        &self,
        request: &ImageRequest,
    ) -> Result<Box<dyn PullProgress>, EngineError>;

    /// Create (but do not start) a container and return its identifier
    async fn create_container(
        &self,
        image: &str,
        config: &ContainerConfig,
    ) -> Result<String, EngineError>;

    /// Start a created container
    async fn start_container(&self, id: &str) -> Result<(), EngineError>;

    /// Read the current state of a container, including its port bindings
    async fn inspect_container(&self, id: &str) -> Result<InspectedContainer, EngineError>;

    /// Stop a container, waiting up to `grace` before it is killed
    async fn stop_container(&self, id: &str, grace: Option<Duration>) -> Result<(), EngineError>;

    /// Remove a container and its anonymous volumes
    async fn remove_container(&self, id: &str) -> Result<(), EngineError>;

    /// Fetch the output a container has produced so far
    async fn container_logs(
        &self,
        id: &str,
        selection: LogSelection,
    ) -> Result<ContainerLogs, EngineError> {
        let _ = (id, selection);
        Err(EngineError::Unsupported("container logs"))
    }
}

/// Streamed progress output of an image pull
#[async_trait]
pub trait PullProgress: Send {
    /// Next progress line, `None` once the stream is exhausted
    async fn next_line(&mut self) -> Option<std::io::Result<String>>;

    /// Release the stream
    async fn close(self: Box<Self>) -> std::io::Result<()>;
}

/// Race an engine call against `cancel`, folding cancellation into [`EngineError`]
pub(crate) async fn guarded<T, F>(cancel: &CancelToken, call: F) -> Result<T, EngineError>
where
    F: std::future::Future<Output = Result<T, EngineError>>,
{
    cancel
        .run(call)
        .await
        .unwrap_or_else(|Cancelled| Err(EngineError::Cancelled))
}

/// What to pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    /// Image reference, e.g. `postgres:16-alpine`
    pub image: String,
    /// Optional platform, e.g. `linux/amd64`
    pub platform: Option<String>,
}

impl ImageRequest {
    /// Request `image` for the engine's default platform
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            platform: None,
        }
    }
}

/// Transport protocol of a container port
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    /// TCP (the default when no protocol is given)
    Tcp,
    /// UDP
    Udp,
    /// SCTP
    Sctp,
}

impl Protocol {
    fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Sctp => "sctp",
        }
    }
}

/// A port inside the container, written `80/tcp` by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerPort {
    /// Port number
    pub number: u16,
    /// Transport protocol
    pub protocol: Protocol,
}

impl ContainerPort {
    /// A TCP port
    pub fn tcp(number: u16) -> Self {
        Self {
            number,
            protocol: Protocol::Tcp,
        }
    }

    /// A UDP port
    pub fn udp(number: u16) -> Self {
        Self {
            number,
            protocol: Protocol::Udp,
        }
    }
}

impl fmt::Display for ContainerPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol.as_str())
    }
}

impl FromStr for ContainerPort {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, protocol) = match s.split_once('/') {
            Some((number, proto)) => {
                let protocol = match proto.to_ascii_lowercase().as_str() {
                    "tcp" => Protocol::Tcp,
                    "udp" => Protocol::Udp,
                    "sctp" => Protocol::Sctp,
                    other => {
                        return Err(EngineError::Malformed(format!(
                            "unknown protocol '{}' in port '{}'",
                            other, s
                        )));
                    }
                };
                (number, protocol)
            }
            None => (s, Protocol::Tcp),
        };

        let number = number
            .trim()
            .parse::<u16>()
            .map_err(|e| EngineError::Malformed(format!("invalid port '{}': {}", s, e)))?;
        Ok(Self { number, protocol })
    }
}

impl From<u16> for ContainerPort {
    fn from(number: u16) -> Self {
        Self::tcp(number)
    }
}

/// A host binding as reported by the engine, unnormalized
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostBinding {
    /// Bound host address; empty, `0.0.0.0` or `::` mean every interface
    pub host_ip: String,
    /// Bound host port as text
    pub host_port: String,
}

impl HostBinding {
    /// Convenience constructor
    pub fn new(host_ip: impl Into<String>, host_port: impl Into<String>) -> Self {
        Self {
            host_ip: host_ip.into(),
            host_port: host_port.into(),
        }
    }
}

/// Network section of an inspected container
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkSettings {
    /// Exposed container ports and their host bindings, in engine order
    pub ports: BTreeMap<ContainerPort, Vec<HostBinding>>,
}

/// Engine view of a container after inspection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InspectedContainer {
    /// Full container identifier
    pub id: String,
    /// Container name without the leading slash
    pub name: String,
    /// Absent when the engine reports no network configuration
    pub network: Option<NetworkSettings>,
}

/// Publish a container port on a chosen host address and port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    /// Port inside the container
    pub container_port: ContainerPort,
    /// Host address to bind, every interface when `None`
    pub host_ip: Option<String>,
    /// Host port to bind, engine-assigned when `None`
    pub host_port: Option<u16>,
}

/// Container creation overrides, passed through to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Environment variables
    pub env: BTreeMap<String, String>,
    /// Entrypoint override
    pub entrypoint: Option<Vec<String>>,
    /// Command override
    pub cmd: Vec<String>,
    /// Ports to expose in addition to those declared by the image
    pub exposed_ports: Vec<ContainerPort>,
    /// Explicit host bindings
    pub port_bindings: Vec<PortBinding>,
    /// Publish every exposed port on an engine-assigned host port
    pub publish_all_ports: bool,
    /// Container hostname
    pub hostname: Option<String>,
    /// Platform to run, e.g. `linux/arm64`
    pub platform: Option<String>,
    /// Size of `/dev/shm` in bytes
    pub shm_size: Option<u64>,
    /// Volume specs (`host:container[:mode]` or named volumes)
    pub volumes: Vec<String>,
    /// Run the container privileged
    pub privileged: bool,
    /// Labels applied to the container
    pub labels: BTreeMap<String, String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            env: BTreeMap::new(),
            entrypoint: None,
            cmd: Vec::new(),
            exposed_ports: Vec::new(),
            port_bindings: Vec::new(),
            publish_all_ports: true,
            hostname: None,
            platform: None,
            shm_size: None,
            volumes: Vec::new(),
            privileged: false,
            labels: BTreeMap::new(),
        }
    }
}

/// Which container output streams to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogSelection {
    /// Include stdout
    pub stdout: bool,
    /// Include stderr
    pub stderr: bool,
}

impl LogSelection {
    /// Whether any stream was selected
    pub fn any(&self) -> bool {
        self.stdout || self.stderr
    }
}

/// Captured container output
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerLogs {
    /// Container stdout, when selected
    pub stdout: Option<String>,
    /// Container stderr, when selected
    pub stderr: Option<String>,
}
