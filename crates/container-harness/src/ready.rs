//! Readiness gating.
//!
//! A started container is rarely usable straight away: databases replay
//! logs, brokers elect leaders. [`wait_container_ready`] polls a caller
//! predicate until it passes or the caller's scope ends, and reports the
//! outcome as a plain `bool`.

use async_runtime_compat::{sleep, timeout};
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::info::ContainerInfo;

/// Pause between unsuccessful readiness checks
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Caller-supplied readiness predicate
pub type ReadyFn = Arc<dyn Fn(ContainerInfo) -> BoxFuture<'static, bool> + Send + Sync>;

/// Wrap an async closure as a [`ReadyFn`]
pub fn from_fn<F, Fut>(check: F) -> ReadyFn
where
    F: Fn(ContainerInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Arc::new(move |info| check(info).boxed())
}

/// Wrap a synchronous predicate as a [`ReadyFn`]
pub fn from_sync<F>(check: F) -> ReadyFn
where
    F: Fn(&ContainerInfo) -> bool + Send + Sync + 'static,
{
    Arc::new(move |info| {
        let ready = check(&info);
        async move { ready }.boxed()
    })
}

/// Ready once a TCP connection to the container's `container_port` succeeds
pub fn tcp_connect(container_port: u16) -> ReadyFn {
    from_fn(move |info: ContainerInfo| async move {
        let Some(endpoint) = info.port(container_port) else {
            debug!("Container {} has no binding for port {}", info.id(), container_port);
            return false;
        };
        match async_net::TcpStream::connect(endpoint.socket_addr()).await {
            Ok(_) => true,
            Err(e) => {
                debug!("Connect to {} failed: {}", endpoint, e);
                false
            }
        }
    })
}

/// Poll `ready` until it passes or `cancel` fires.
///
/// Without a predicate the container is ready immediately, regardless of
/// the scope. Otherwise cancellation always wins over a pending retry, and
/// each predicate invocation is bounded by `check_timeout` within `cancel`.
pub async fn wait_container_ready(
    cancel: &CancelToken,
    info: &ContainerInfo,
    ready: Option<&ReadyFn>,
    check_timeout: Duration,
) -> bool {
    let Some(ready) = ready else {
        return true;
    };

    let mut attempts = 0u32;
    loop {
        if cancel.is_cancelled() {
            warn!("Container was never ready after {} checks: {}", attempts, info);
            return false;
        }

        attempts += 1;
        match cancel.run(timeout(check_timeout, ready(info.clone()))).await {
            Ok(Ok(true)) => {
                info!("Container ready after {} checks: {}", attempts, info);
                return true;
            }
            Ok(Ok(false)) => debug!("Readiness check {} failed for {}", attempts, info.id()),
            Ok(Err(elapsed)) => debug!(
                "Readiness check {} for {} did not finish within {:?}",
                attempts,
                info.id(),
                elapsed.duration()
            ),
            Err(_) => debug!("Readiness check {} for {} was cancelled", attempts, info.id()),
        }

        if cancel.is_cancelled() || cancel.run(sleep(READY_POLL_INTERVAL)).await.is_err() {
            warn!("Container was never ready after {} checks: {}", attempts, info);
            return false;
        }
    }
}
