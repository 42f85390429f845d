//! # Container Harness
//!
//! Ephemeral containers for integration tests.
//!
//! A test asks for an image; the harness pulls it, creates and starts a
//! container, resolves the host endpoints its ports are published on, waits
//! until a caller-supplied readiness predicate passes, runs the test body and
//! then stops and removes the container. Teardown happens on every exit
//! path, including a setup step that fails halfway, a container that never
//! becomes ready and a test body that panics.
//!
//! The orchestration is written against the [`EngineClient`] trait. The
//! production engine is [`docker::DockerCli`]; the `test-utils` feature adds
//! an in-memory [`mock::MockEngine`] for testing code built on the harness.
//!
//! ## Example
//!
//! ```no_run
//! use container_harness::{Options, docker, ready};
//! use std::time::Duration;
//!
//! # smol::block_on(async {
//! let opts = Options::new()
//!     .with_env("POSTGRES_PASSWORD", "postgres")
//!     .with_port_required(true)
//!     .with_timeout(Duration::from_secs(120))
//!     .with_ready_fn(ready::tcp_connect(5432));
//!
//! docker::run("postgres:16-alpine", opts, |info| async move {
//!     let endpoint = info.port(5432).expect("postgres port is published");
//!     println!("postgres listening on {}", endpoint);
//! })
//! .await?;
//! # Ok::<(), container_harness::Error>(())
//! # });
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

mod cancel;
mod cleanup;
mod config;
pub mod docker;
mod engine;
mod error;
mod info;
mod launch;
mod options;
mod provision;
pub mod ready;
mod resolve;
mod run;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
#[cfg(feature = "test-utils")]
pub mod testing;

pub use cancel::{CancelToken, Cancelled};
pub use cleanup::stop_container;
pub use config::{CONFIG_ENV, ConfigError, DOCKER_ENV, Settings};
pub use engine::{
    ContainerConfig, ContainerLogs, ContainerPort, EngineClient, HostBinding, ImageRequest,
    InspectedContainer, LogSelection, NetworkSettings, PortBinding, Protocol, PullProgress,
};
pub use error::{EngineError, Error, LaunchFailure, Result, Step};
pub use info::{ContainerInfo, Endpoint};
pub use launch::run_image;
pub use options::{HARNESS_LABEL, Options};
pub use provision::pull_image;
pub use ready::{READY_POLL_INTERVAL, ReadyFn, wait_container_ready};
pub use resolve::{resolve_binding, resolve_endpoints, resolve_host};
pub use run::run;
