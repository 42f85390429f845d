//! Docker CLI engine.
//!
//! [`DockerCli`] implements [`crate::EngineClient`] by shelling out to the
//! `docker` binary (or anything CLI-compatible, such as `podman`) through
//! `command-executor`. Each engine call is one short-lived process, so
//! cancelling a call simply kills its process.

mod cli;
mod inspect;
mod pull;

pub use cli::{DockerCli, create_args};
pub use pull::DockerPullProgress;

use std::future::Future;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::info::ContainerInfo;
use crate::options::Options;

/// Run `body` against a container from `image` on the local Docker engine.
///
/// The engine binary comes from the environment's settings
/// (`CONTAINER_HARNESS_CONFIG`, `CONTAINER_HARNESS_DOCKER`) and the caller
/// scope never expires on its own; the timeouts in `opts` bound each phase.
pub async fn run<T, F, Fut>(image: &str, opts: Options, body: F) -> Result<T>
where
    F: FnOnce(ContainerInfo) -> Fut,
    Fut: Future<Output = T>,
{
    let engine = DockerCli::from_env()?;
    crate::run(&engine, &CancelToken::new(), image, opts, body).await
}
