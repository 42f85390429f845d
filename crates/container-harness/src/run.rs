//! End-to-end orchestration of one ephemeral container.
//!
//! [`run`] strings the pieces together: pull, launch, wait for readiness,
//! hand the container to the test body, tear it down. Each phase gets its
//! own scope. Pull and launch are children of the caller's scope, while
//! teardown always runs in a fresh scope so that an expired or cancelled
//! caller never leaks a container.

use futures::FutureExt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info};

use crate::cancel::CancelToken;
use crate::cleanup::stop_container;
use crate::engine::EngineClient;
use crate::error::{Error, Result};
use crate::info::ContainerInfo;
use crate::launch::run_image;
use crate::options::Options;
use crate::provision::pull_image;
use crate::ready::wait_container_ready;

/// Run `body` against a fresh container from `image`.
///
/// The container is removed before this returns, whatever happened: a
/// failed setup step, a container that never became ready, or a panicking
/// body (the panic is resumed after cleanup). Setup failures are returned
/// as [`Error`]; the body's own output is returned untouched.
///
/// ```no_run
/// use container_harness::{CancelToken, Options, docker::DockerCli, run};
///
/// # smol::block_on(async {
/// let engine = DockerCli::from_env()?;
/// let opts = Options::new().with_port_required(true);
/// run(&engine, &CancelToken::new(), "nginx:alpine", opts, |info| async move {
///     let endpoint = info.port(80).expect("nginx publishes port 80");
///     println!("nginx listening on {}", endpoint);
/// })
/// .await?;
/// # Ok::<(), container_harness::Error>(())
/// # });
/// ```
pub async fn run<T, F, Fut>(
    engine: &dyn EngineClient,
    cancel: &CancelToken,
    image: &str,
    opts: Options,
    body: F,
) -> Result<T>
where
    F: FnOnce(ContainerInfo) -> Fut,
    Fut: Future<Output = T>,
{
    let pull_scope = cancel.child_with_timeout(opts.pull_timeout);
    pull_image(&pull_scope, engine, &opts.image_request(image)).await?;

    let run_scope = cancel.child_with_timeout(opts.timeout);
    let info = match run_image(&run_scope, engine, image, &opts).await {
        Ok(info) => info,
        Err(failure) => {
            if let Some(id) = &failure.container_id {
                let guard = ContainerGuard::new(id);
                cleanup(engine, id, &opts).await;
                guard.disarm();
            }
            return Err(failure.into_error());
        }
    };

    let guard = ContainerGuard::new(info.id());
    if !wait_container_ready(&run_scope, &info, opts.ready.as_ref(), opts.ready_timeout).await {
        cleanup(engine, info.id(), &opts).await;
        guard.disarm();
        return Err(Error::NotReady {
            container: info.to_string(),
        });
    }

    debug!("Handing container {} to the test body", info.id());
    let outcome = AssertUnwindSafe(body(info.clone())).catch_unwind().await;
    if outcome.is_err() {
        error!("Test body panicked, cleaning up container {}", info.id());
    }
    cleanup(engine, info.id(), &opts).await;
    guard.disarm();

    match outcome {
        Ok(output) => Ok(output),
        Err(payload) => panic::resume_unwind(payload),
    }
}

async fn cleanup(engine: &dyn EngineClient, id: &str, opts: &Options) {
    let scope = CancelToken::with_timeout(opts.cleanup_timeout);
    stop_container(&scope, engine, id, opts).await;
    info!("Cleaned up container {}", id);
}

/// Flags containers abandoned by a dropped orchestration.
///
/// Teardown is async and cannot run from `Drop`, so if the future driving
/// [`run`] is dropped mid-flight the best we can do is name the container.
struct ContainerGuard {
    id: Option<String>,
}

impl ContainerGuard {
    fn new(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
        }
    }

    fn disarm(mut self) {
        self.id = None;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            error!(
                "Orchestration dropped before cleanup, container {} was leaked (label {}=true)",
                id,
                crate::options::HARNESS_LABEL
            );
        }
    }
}
