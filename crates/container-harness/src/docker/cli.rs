//! [`EngineClient`] backed by the `docker` command line.

use async_trait::async_trait;
use command_executor::{Command, Executor, ProcessOutput};
use std::time::Duration;
use tracing::debug;

use super::inspect::parse_inspect;
use super::pull::DockerPullProgress;
use crate::config::{ConfigError, Settings};
use crate::engine::{
    ContainerConfig, ContainerLogs, EngineClient, ImageRequest, InspectedContainer, LogSelection,
    PortBinding, PullProgress,
};
use crate::error::EngineError;

/// Talks to the container engine through its CLI
///
/// Any binary that speaks the Docker CLI dialect works, e.g. `podman`.
#[derive(Debug, Clone)]
pub struct DockerCli {
    executor: Executor,
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    /// Use `docker` from `PATH`
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Use a specific engine binary
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            executor: Executor::new("container-harness"),
            binary: binary.into(),
        }
    }

    /// Use the binary named by suite settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_binary(settings.docker_binary.clone())
    }

    /// Use the binary named by the environment's settings
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::from_settings(&Settings::from_env()?))
    }

    /// The engine binary being invoked
    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd
    }

    /// Run `cmd`, failing on a non-zero exit
    async fn checked(&self, cmd: Command) -> Result<ProcessOutput, EngineError> {
        let output = self.executor.output(&cmd).await?;
        if !output.success() {
            return Err(EngineError::CommandFailed {
                command: cmd.display(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl EngineClient for DockerCli {
    async fn pull_image(
        &self,
        request: &ImageRequest,
    ) -> Result<Box<dyn PullProgress>, EngineError> {
        let mut args = vec!["pull".to_string()];
        if let Some(platform) = &request.platform {
            args.push("--platform".to_string());
            args.push(platform.clone());
        }
        args.push(request.image.clone());

        let stream = self.executor.spawn_lines(&self.command(&args)).await?;
        Ok(Box::new(DockerPullProgress::new(&request.image, stream)))
    }

    async fn create_container(
        &self,
        image: &str,
        config: &ContainerConfig,
    ) -> Result<String, EngineError> {
        let output = self.checked(self.command(create_args(image, config))).await?;
        let id = output.stdout.lines().last().unwrap_or_default().trim();
        if id.is_empty() {
            return Err(EngineError::Malformed(
                "docker create printed no container id".to_string(),
            ));
        }
        Ok(id.to_string())
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.checked(self.command(["start", id])).await?;
        Ok(())
    }

    async fn inspect_container(&self, id: &str) -> Result<InspectedContainer, EngineError> {
        let output = self
            .checked(self.command(["inspect", "--type", "container", id]))
            .await?;
        parse_inspect(&output.stdout)
    }

    async fn stop_container(&self, id: &str, grace: Option<Duration>) -> Result<(), EngineError> {
        self.checked(self.command(stop_args(id, grace))).await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        self.checked(self.command(["rm", "-f", "-v", id])).await?;
        Ok(())
    }

    async fn container_logs(
        &self,
        id: &str,
        selection: LogSelection,
    ) -> Result<ContainerLogs, EngineError> {
        let output = self.checked(self.command(["logs", id])).await?;
        debug!(
            "Fetched {} bytes of stdout and {} bytes of stderr from {}",
            output.stdout.len(),
            output.stderr.len(),
            id
        );
        Ok(ContainerLogs {
            stdout: selection.stdout.then_some(output.stdout),
            stderr: selection.stderr.then_some(output.stderr),
        })
    }
}

/// Arguments for `docker create`
pub fn create_args(image: &str, config: &ContainerConfig) -> Vec<String> {
    let mut args = vec!["create".to_string()];

    for (key, value) in &config.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }
    for (key, value) in &config.env {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }

    // The CLI takes a single entrypoint executable; the rest leads the command
    let mut cmd = Vec::new();
    if let Some(entrypoint) = &config.entrypoint {
        let mut parts = entrypoint.iter();
        args.push("--entrypoint".to_string());
        args.push(parts.next().cloned().unwrap_or_default());
        cmd.extend(parts.cloned());
    }
    cmd.extend(config.cmd.iter().cloned());

    for port in &config.exposed_ports {
        args.push("--expose".to_string());
        args.push(port.to_string());
    }
    for binding in &config.port_bindings {
        args.push("-p".to_string());
        args.push(publish_arg(binding));
    }
    if config.publish_all_ports {
        args.push("-P".to_string());
    }
    if let Some(hostname) = &config.hostname {
        args.push("--hostname".to_string());
        args.push(hostname.clone());
    }
    if let Some(platform) = &config.platform {
        args.push("--platform".to_string());
        args.push(platform.clone());
    }
    if let Some(shm_size) = config.shm_size {
        args.push("--shm-size".to_string());
        args.push(shm_size.to_string());
    }
    for volume in &config.volumes {
        args.push("-v".to_string());
        args.push(volume.clone());
    }
    if config.privileged {
        args.push("--privileged".to_string());
    }

    args.push(image.to_string());
    args.extend(cmd);
    args
}

/// `docker stop` arguments; the grace period is rounded up to whole seconds
fn stop_args(id: &str, grace: Option<Duration>) -> Vec<String> {
    let mut args = vec!["stop".to_string()];
    if let Some(grace) = grace {
        let secs = grace.as_secs() + u64::from(grace.subsec_nanos() > 0);
        args.push("-t".to_string());
        args.push(secs.to_string());
    }
    args.push(id.to_string());
    args
}

/// `-p` value: `[ip:][host_port:]container_port/proto`
fn publish_arg(binding: &PortBinding) -> String {
    let port = binding.container_port.to_string();
    let host_port = binding.host_port.map(|p| p.to_string());
    match (&binding.host_ip, host_port) {
        (Some(ip), host_port) => {
            let ip = if ip.contains(':') && !ip.starts_with('[') {
                format!("[{}]", ip)
            } else {
                ip.clone()
            };
            format!("{}:{}:{}", ip, host_port.unwrap_or_default(), port)
        }
        (None, Some(host_port)) => format!("{}:{}", host_port, port),
        (None, None) => port,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ContainerPort;

    #[test]
    fn minimal_create_publishes_all_ports() {
        let args = create_args("nginx:alpine", &ContainerConfig::default());
        assert_eq!(args, vec!["create", "-P", "nginx:alpine"]);
    }

    #[test]
    fn create_passes_overrides_in_order() {
        let mut config = ContainerConfig {
            entrypoint: Some(vec!["/bin/sh".to_string(), "-c".to_string()]),
            cmd: vec!["sleep 60".to_string()],
            exposed_ports: vec![ContainerPort::udp(53)],
            publish_all_ports: false,
            hostname: Some("db".to_string()),
            shm_size: Some(268_435_456),
            privileged: true,
            ..ContainerConfig::default()
        };
        config.env.insert("A".to_string(), "1".to_string());
        config.labels.insert("container-harness".to_string(), "true".to_string());

        let args = create_args("alpine", &config);
        assert_eq!(
            args,
            vec![
                "create",
                "--label",
                "container-harness=true",
                "-e",
                "A=1",
                "--entrypoint",
                "/bin/sh",
                "--expose",
                "53/udp",
                "--hostname",
                "db",
                "--shm-size",
                "268435456",
                "--privileged",
                "alpine",
                "-c",
                "sleep 60",
            ]
        );
    }

    #[test]
    fn publish_arg_forms() {
        let binding = |host_ip: Option<&str>, host_port: Option<u16>| PortBinding {
            container_port: ContainerPort::tcp(80),
            host_ip: host_ip.map(str::to_string),
            host_port,
        };
        assert_eq!(publish_arg(&binding(None, None)), "80/tcp");
        assert_eq!(publish_arg(&binding(None, Some(8181))), "8181:80/tcp");
        assert_eq!(
            publish_arg(&binding(Some("127.0.0.1"), Some(8181))),
            "127.0.0.1:8181:80/tcp"
        );
        assert_eq!(publish_arg(&binding(Some("127.0.0.1"), None)), "127.0.0.1::80/tcp");
        assert_eq!(publish_arg(&binding(Some("::1"), Some(8181))), "[::1]:8181:80/tcp");
    }

    #[test]
    fn stop_grace_rounds_up_to_whole_seconds() {
        assert_eq!(stop_args("abc", None), ["stop", "abc"]);
        assert_eq!(
            stop_args("abc", Some(Duration::from_secs(3))),
            ["stop", "-t", "3", "abc"]
        );
        assert_eq!(
            stop_args("abc", Some(Duration::from_millis(500))),
            ["stop", "-t", "1", "abc"]
        );
        assert_eq!(
            stop_args("abc", Some(Duration::from_millis(2001))),
            ["stop", "-t", "3", "abc"]
        );
        assert_eq!(stop_args("abc", Some(Duration::ZERO)), ["stop", "-t", "0", "abc"]);
    }

    #[test]
    fn binary_comes_from_settings() {
        let settings = Settings {
            docker_binary: "podman".to_string(),
            ..Settings::default()
        };
        assert_eq!(DockerCli::from_settings(&settings).binary(), "podman");
        assert_eq!(DockerCli::new().binary(), "docker");
    }

    #[smol_potat::test]
    async fn missing_binary_is_an_executor_error() {
        let engine = DockerCli::with_binary("definitely-not-a-container-engine");
        let err = engine.start_container("abc").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Executor(command_executor::Error::CommandNotFound { .. })
        ));
    }
}
