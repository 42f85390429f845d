//! Per-container options.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::config::Settings;
use crate::engine::{ContainerConfig, ContainerPort, ImageRequest, LogSelection, PortBinding};
use crate::info::ContainerInfo;
use crate::ready::{self, ReadyFn};

/// Label put on every container the harness creates
pub const HARNESS_LABEL: &str = "container-harness";

/// How to run one ephemeral container
#[derive(Clone)]
pub struct Options {
    /// Scope for create, start, inspect and readiness polling
    pub timeout: Duration,
    /// Scope for pulling the image
    pub pull_timeout: Duration,
    /// Bound on each readiness predicate invocation
    pub ready_timeout: Duration,
    /// Scope for stop and remove, independent of the caller's scope
    pub cleanup_timeout: Duration,
    /// Grace period passed to stop, engine default when `None`
    pub stop_timeout: Option<Duration>,
    /// Readiness predicate; `None` means ready as soon as inspected
    pub ready: Option<ReadyFn>,
    /// Fail setup unless at least one port binding resolves
    pub port_required: bool,
    /// Creation overrides passed through to the engine
    pub container: ContainerConfig,
    /// Log the container's stdout on teardown
    pub log_stdout: bool,
    /// Log the container's stderr on teardown
    pub log_stderr: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl Options {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Options seeded from suite settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            timeout: settings.timeout(),
            pull_timeout: settings.pull_timeout(),
            ready_timeout: settings.ready_timeout(),
            cleanup_timeout: settings.cleanup_timeout(),
            stop_timeout: settings.stop_timeout(),
            ready: None,
            port_required: false,
            container: ContainerConfig::default(),
            log_stdout: settings.log_stdout,
            log_stderr: settings.log_stderr,
        }
    }

    /// Set the run-scope timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the pull-scope timeout
    pub fn with_pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    /// Set the per-check readiness timeout
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Set the cleanup-scope timeout
    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }

    /// Set the stop grace period
    pub fn with_stop_timeout(mut self, grace: Duration) -> Self {
        self.stop_timeout = Some(grace);
        self
    }

    /// Use an async readiness predicate
    pub fn with_ready<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(ContainerInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.ready = Some(ready::from_fn(check));
        self
    }

    /// Use a prebuilt readiness predicate such as [`ready::tcp_connect`]
    pub fn with_ready_fn(mut self, check: ReadyFn) -> Self {
        self.ready = Some(check);
        self
    }

    /// Require at least one resolvable port binding
    pub fn with_port_required(mut self, required: bool) -> Self {
        self.port_required = required;
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.container.env.insert(key.into(), value.into());
        self
    }

    /// Override the entrypoint
    pub fn with_entrypoint<I, S>(mut self, entrypoint: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.container.entrypoint = Some(entrypoint.into_iter().map(Into::into).collect());
        self
    }

    /// Override the command
    pub fn with_cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.container.cmd = cmd.into_iter().map(Into::into).collect();
        self
    }

    /// Expose an extra container port
    pub fn with_exposed_port(mut self, port: impl Into<ContainerPort>) -> Self {
        self.container.exposed_ports.push(port.into());
        self
    }

    /// Bind a container port to a fixed host port on every interface
    pub fn with_port_binding(
        mut self,
        container_port: impl Into<ContainerPort>,
        host_port: u16,
    ) -> Self {
        self.container.port_bindings.push(PortBinding {
            container_port: container_port.into(),
            host_ip: None,
            host_port: Some(host_port),
        });
        self
    }

    /// Publish every exposed port on an engine-assigned host port
    pub fn with_publish_all_ports(mut self, publish: bool) -> Self {
        self.container.publish_all_ports = publish;
        self
    }

    /// Set the container hostname
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.container.hostname = Some(hostname.into());
        self
    }

    /// Pull and run for a specific platform
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.container.platform = Some(platform.into());
        self
    }

    /// Size `/dev/shm` in bytes
    pub fn with_shm_size(mut self, bytes: u64) -> Self {
        self.container.shm_size = Some(bytes);
        self
    }

    /// Mount a volume
    pub fn with_volume(mut self, spec: impl Into<String>) -> Self {
        self.container.volumes.push(spec.into());
        self
    }

    /// Run the container privileged
    pub fn with_privileged(mut self, privileged: bool) -> Self {
        self.container.privileged = privileged;
        self
    }

    /// Add a container label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.container.labels.insert(key.into(), value.into());
        self
    }

    /// Log container output on teardown
    pub fn with_logs(mut self, stdout: bool, stderr: bool) -> Self {
        self.log_stdout = stdout;
        self.log_stderr = stderr;
        self
    }

    pub(crate) fn image_request(&self, image: &str) -> ImageRequest {
        ImageRequest {
            image: image.to_string(),
            platform: self.container.platform.clone(),
        }
    }

    /// Creation config with the harness label applied
    pub(crate) fn container_config(&self) -> ContainerConfig {
        let mut config = self.container.clone();
        config
            .labels
            .entry(HARNESS_LABEL.to_string())
            .or_insert_with(|| "true".to_string());
        config
    }

    pub(crate) fn log_selection(&self) -> LogSelection {
        LogSelection {
            stdout: self.log_stdout,
            stderr: self.log_stderr,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("timeout", &self.timeout)
            .field("pull_timeout", &self.pull_timeout)
            .field("ready_timeout", &self.ready_timeout)
            .field("cleanup_timeout", &self.cleanup_timeout)
            .field("stop_timeout", &self.stop_timeout)
            .field("ready", &self.ready.as_ref().map(|_| "<fn>"))
            .field("port_required", &self.port_required)
            .field("container", &self.container)
            .field("log_stdout", &self.log_stdout)
            .field("log_stderr", &self.log_stderr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_settings() {
        let opts = Options::default();
        assert_eq!(opts.timeout, Duration::from_secs(60));
        assert_eq!(opts.pull_timeout, Duration::from_secs(60));
        assert_eq!(opts.ready_timeout, Duration::from_secs(2));
        assert_eq!(opts.cleanup_timeout, Duration::from_secs(15));
        assert!(opts.ready.is_none());
        assert!(!opts.port_required);
        assert!(opts.container.publish_all_ports);
    }

    #[test]
    fn builders_fill_container_config() {
        let opts = Options::new()
            .with_env("POSTGRES_PASSWORD", "secret")
            .with_cmd(["postgres", "-c", "fsync=off"])
            .with_exposed_port(5432)
            .with_port_binding(ContainerPort::tcp(80), 8181)
            .with_platform("linux/amd64")
            .with_port_required(true);

        assert_eq!(opts.container.env["POSTGRES_PASSWORD"], "secret");
        assert_eq!(opts.container.cmd, vec!["postgres", "-c", "fsync=off"]);
        assert_eq!(opts.container.exposed_ports, vec![ContainerPort::tcp(5432)]);
        assert_eq!(opts.container.port_bindings[0].host_port, Some(8181));
        assert_eq!(
            opts.image_request("postgres:16").platform.as_deref(),
            Some("linux/amd64")
        );
        assert!(opts.port_required);
    }

    #[test]
    fn container_config_carries_harness_label() {
        let config = Options::new().container_config();
        assert_eq!(config.labels[HARNESS_LABEL], "true");

        let config = Options::new()
            .with_label(HARNESS_LABEL, "suite-a")
            .container_config();
        assert_eq!(config.labels[HARNESS_LABEL], "suite-a");
    }

    #[test]
    fn from_settings_copies_log_flags() {
        let settings = Settings {
            log_stderr: true,
            stop_timeout_secs: Some(1),
            ..Settings::default()
        };
        let opts = Options::from_settings(&settings);
        assert!(opts.log_stderr);
        assert!(!opts.log_stdout);
        assert_eq!(opts.stop_timeout, Some(Duration::from_secs(1)));
        assert!(opts.log_selection().any());
    }
}
