//! Scriptable in-memory engine for tests.
//!
//! [`MockEngine`] answers every call from a script set up with builder
//! methods and records each call it receives, so tests can assert on what
//! the harness asked of the engine and in which order.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::engine::{
    ContainerConfig, ContainerLogs, ContainerPort, EngineClient, HostBinding, ImageRequest,
    InspectedContainer, LogSelection, NetworkSettings, PullProgress,
};
use crate::error::EngineError;

/// Engine operation, as recorded by [`MockEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EngineOp {
    /// `pull_image`
    Pull,
    /// `create_container`
    Create,
    /// `start_container`
    Start,
    /// `inspect_container`
    Inspect,
    /// `stop_container`
    Stop,
    /// `remove_container`
    Remove,
    /// `container_logs`
    Logs,
}

/// One recorded engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCall {
    /// Which operation was called
    pub op: EngineOp,
    /// Image for pull and create, container id otherwise
    pub target: String,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<EngineCall>,
    pull_lines_read: usize,
    pull_closed: bool,
    last_config: Option<ContainerConfig>,
    last_stop_grace: Option<Duration>,
}

/// In-memory [`EngineClient`] double
#[derive(Debug, Clone)]
pub struct MockEngine {
    container_id: String,
    pull_lines: Vec<String>,
    pull_read_error: bool,
    pull_close_error: bool,
    failing: BTreeSet<EngineOp>,
    hanging: BTreeSet<EngineOp>,
    inspect: Option<InspectedContainer>,
    logs: ContainerLogs,
    state: Arc<Mutex<State>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// An engine where every call succeeds and port 80/tcp is published
    pub fn new() -> Self {
        Self {
            container_id: "0123456789abcdef0123456789abcdef".to_string(),
            pull_lines: vec![
                "Pulling from library/mock".to_string(),
                "Status: Downloaded".to_string(),
            ],
            pull_read_error: false,
            pull_close_error: false,
            failing: BTreeSet::new(),
            hanging: BTreeSet::new(),
            inspect: None,
            logs: ContainerLogs::default(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Identifier handed out by `create_container`
    pub fn with_container_id(mut self, id: impl Into<String>) -> Self {
        self.container_id = id.into();
        self
    }

    /// Progress lines streamed by a successful pull
    pub fn with_pull_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pull_lines = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Fail reading the pull progress after the scripted lines
    pub fn with_pull_read_error(mut self) -> Self {
        self.pull_read_error = true;
        self
    }

    /// Fail closing the pull progress
    pub fn with_pull_close_error(mut self) -> Self {
        self.pull_close_error = true;
        self
    }

    /// Answer `inspect_container` with `inspected`; an empty id is replaced
    /// with the created container's id
    pub fn with_inspect(mut self, inspected: InspectedContainer) -> Self {
        self.inspect = Some(inspected);
        self
    }

    /// Output returned by `container_logs`
    pub fn with_logs(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.logs = ContainerLogs {
            stdout: Some(stdout.into()),
            stderr: Some(stderr.into()),
        };
        self
    }

    /// Make `op` fail
    pub fn fail_on(mut self, op: EngineOp) -> Self {
        self.failing.insert(op);
        self
    }

    /// Make `op` never complete
    pub fn hang_on(mut self, op: EngineOp) -> Self {
        self.hanging.insert(op);
        self
    }

    /// Refuse to start pulling
    pub fn fail_pull(self) -> Self {
        self.fail_on(EngineOp::Pull)
    }

    /// Refuse to create the container
    pub fn fail_create(self) -> Self {
        self.fail_on(EngineOp::Create)
    }

    /// Refuse to start the container
    pub fn fail_start(self) -> Self {
        self.fail_on(EngineOp::Start)
    }

    /// Refuse to inspect the container
    pub fn fail_inspect(self) -> Self {
        self.fail_on(EngineOp::Inspect)
    }

    /// Refuse to stop the container
    pub fn fail_stop(self) -> Self {
        self.fail_on(EngineOp::Stop)
    }

    /// Refuse to remove the container
    pub fn fail_remove(self) -> Self {
        self.fail_on(EngineOp::Remove)
    }

    /// Identifier handed out by `create_container`
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state().calls.clone()
    }

    /// The operations received so far, in order
    pub fn ops(&self) -> Vec<EngineOp> {
        self.state().calls.iter().map(|call| call.op).collect()
    }

    /// How many times `op` was called
    pub fn count(&self, op: EngineOp) -> usize {
        self.state().calls.iter().filter(|call| call.op == op).count()
    }

    /// Progress lines consumed across all pulls
    pub fn pull_lines_read(&self) -> usize {
        self.state().pull_lines_read
    }

    /// Whether a pull progress stream was closed
    pub fn pull_closed(&self) -> bool {
        self.state().pull_closed
    }

    /// Config passed to the last `create_container`
    pub fn last_config(&self) -> Option<ContainerConfig> {
        self.state().last_config.clone()
    }

    /// Grace period passed to the last `stop_container`
    pub fn last_stop_grace(&self) -> Option<Duration> {
        self.state().last_stop_grace
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self, op: EngineOp, target: &str) -> Result<(), EngineError> {
        self.state().calls.push(EngineCall {
            op,
            target: target.to_string(),
        });
        if self.hanging.contains(&op) {
            futures::future::pending::<()>().await;
        }
        if self.failing.contains(&op) {
            return Err(EngineError::Other(format!("scripted {:?} failure", op)));
        }
        Ok(())
    }

    fn default_inspect(&self) -> InspectedContainer {
        InspectedContainer {
            id: self.container_id.clone(),
            name: "mock".to_string(),
            network: Some(NetworkSettings {
                ports: BTreeMap::from([(
                    ContainerPort::tcp(80),
                    vec![HostBinding::new("0.0.0.0", "32768")],
                )]),
            }),
        }
    }
}

#[async_trait]
impl EngineClient for MockEngine {
    async fn pull_image(
        &self,
        request: &ImageRequest,
    ) -> Result<Box<dyn PullProgress>, EngineError> {
        self.enter(EngineOp::Pull, &request.image).await?;
        Ok(Box::new(MockPull {
            lines: self.pull_lines.iter().cloned().collect(),
            read_error: self.pull_read_error,
            close_error: self.pull_close_error,
            state: self.state.clone(),
        }))
    }

    async fn create_container(
        &self,
        image: &str,
        config: &ContainerConfig,
    ) -> Result<String, EngineError> {
        self.state().last_config = Some(config.clone());
        self.enter(EngineOp::Create, image).await?;
        Ok(self.container_id.clone())
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.enter(EngineOp::Start, id).await
    }

    async fn inspect_container(&self, id: &str) -> Result<InspectedContainer, EngineError> {
        self.enter(EngineOp::Inspect, id).await?;
        let mut inspected = self.inspect.clone().unwrap_or_else(|| self.default_inspect());
        if inspected.id.is_empty() {
            inspected.id = self.container_id.clone();
        }
        Ok(inspected)
    }

    async fn stop_container(&self, id: &str, grace: Option<Duration>) -> Result<(), EngineError> {
        self.state().last_stop_grace = grace;
        self.enter(EngineOp::Stop, id).await
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        self.enter(EngineOp::Remove, id).await
    }

    async fn container_logs(
        &self,
        id: &str,
        selection: LogSelection,
    ) -> Result<ContainerLogs, EngineError> {
        self.enter(EngineOp::Logs, id).await?;
        Ok(ContainerLogs {
            stdout: self.logs.stdout.clone().filter(|_| selection.stdout),
            stderr: self.logs.stderr.clone().filter(|_| selection.stderr),
        })
    }
}

struct MockPull {
    lines: VecDeque<String>,
    read_error: bool,
    close_error: bool,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl PullProgress for MockPull {
    async fn next_line(&mut self) -> Option<io::Result<String>> {
        match self.lines.pop_front() {
            Some(line) => {
                self.state.lock().unwrap_or_else(|e| e.into_inner()).pull_lines_read += 1;
                Some(Ok(line))
            }
            None if self.read_error => {
                self.read_error = false;
                Some(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "scripted read failure",
                )))
            }
            None => None,
        }
    }

    async fn close(self: Box<Self>) -> io::Result<()> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).pull_closed = true;
        if self.close_error {
            return Err(io::Error::other("scripted close failure"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[smol_potat::test]
    async fn records_calls_in_order() {
        let engine = MockEngine::new();
        let id = engine
            .create_container("nginx", &ContainerConfig::default())
            .await
            .unwrap();
        engine.start_container(&id).await.unwrap();
        engine.remove_container(&id).await.unwrap();
        assert_eq!(
            engine.calls(),
            vec![
                EngineCall {
                    op: EngineOp::Create,
                    target: "nginx".to_string()
                },
                EngineCall {
                    op: EngineOp::Start,
                    target: id.clone()
                },
                EngineCall {
                    op: EngineOp::Remove,
                    target: id
                },
            ]
        );
    }

    #[smol_potat::test]
    async fn scripted_failures_are_recorded_too() {
        let engine = MockEngine::new().fail_stop();
        assert!(engine.stop_container("abc", None).await.is_err());
        assert_eq!(engine.count(EngineOp::Stop), 1);
    }

    #[smol_potat::test]
    async fn clones_share_recorded_calls() {
        let engine = MockEngine::new();
        let clone = engine.clone();
        clone.start_container("abc").await.unwrap();
        assert_eq!(engine.ops(), vec![EngineOp::Start]);
    }

    #[smol_potat::test]
    async fn pull_stream_scripts_read_and_close_errors() {
        let engine = MockEngine::new()
            .with_pull_lines(["one"])
            .with_pull_read_error()
            .with_pull_close_error();
        let mut progress = engine.pull_image(&ImageRequest::new("nginx")).await.unwrap();
        assert_eq!(progress.next_line().await.unwrap().unwrap(), "one");
        assert!(progress.next_line().await.unwrap().is_err());
        assert!(progress.next_line().await.is_none());
        assert!(progress.close().await.is_err());
        assert!(engine.pull_closed());
    }
}
