//! Container teardown.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::engine::{EngineClient, guarded};
use crate::options::Options;

/// Budget for the remove call when `cancel` ran out before it was reached
pub const REMOVE_GRACE: Duration = Duration::from_secs(5);

/// Stop and remove container `id`.
///
/// Removal is issued to the engine exactly once whether or not the stop
/// succeeded. Log fetching and stop share at most half of the time left in
/// `cancel`, leaving the rest for removal; if `cancel` is already over by
/// then, removal gets [`REMOVE_GRACE`] on its own. Failures are logged,
/// never returned: teardown must not mask the outcome of the test that ran
/// before it.
pub async fn stop_container(
    cancel: &CancelToken,
    engine: &dyn EngineClient,
    id: &str,
    opts: &Options,
) {
    let stop_scope = match cancel.remaining() {
        Some(remaining) => cancel.child_with_timeout(remaining / 2),
        None => cancel.child(),
    };

    let selection = opts.log_selection();
    if selection.any() {
        match guarded(&stop_scope, engine.container_logs(id, selection)).await {
            Ok(logs) => {
                if let Some(stdout) = logs.stdout.filter(|s| !s.is_empty()) {
                    info!("Container {} stdout:\n{}", id, stdout.trim_end());
                }
                if let Some(stderr) = logs.stderr.filter(|s| !s.is_empty()) {
                    info!("Container {} stderr:\n{}", id, stderr.trim_end());
                }
            }
            Err(e) => warn!("Failed to fetch logs for container {}: {}", id, e),
        }
    }

    match guarded(&stop_scope, engine.stop_container(id, opts.stop_timeout)).await {
        Ok(()) => debug!("Stopped container {}", id),
        Err(e) => warn!("Failed to stop container {}: {}", id, e),
    }

    let remove_scope = if cancel.is_cancelled() {
        warn!("Cleanup scope for {} ran out, removing with a {:?} grace", id, REMOVE_GRACE);
        CancelToken::with_timeout(REMOVE_GRACE)
    } else {
        cancel.clone()
    };
    match guarded(&remove_scope, engine.remove_container(id)).await {
        Ok(()) => debug!("Removed container {}", id),
        Err(e) => warn!(
            "Failed to remove container {}, it may need manual cleanup: {}",
            id, e
        ),
    }
}
