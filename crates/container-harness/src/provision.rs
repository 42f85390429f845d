//! Image provisioning.

use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::engine::{EngineClient, ImageRequest, PullProgress, guarded};
use crate::error::{Error, Result};

/// Pull `request` and consume the engine's progress output.
///
/// Only a refusal to start the pull is an error. Progress output is
/// diagnostic: read and close failures are logged and dropped, and a pull
/// that goes wrong mid-stream surfaces later when the container is created.
pub async fn pull_image(
    cancel: &CancelToken,
    engine: &dyn EngineClient,
    request: &ImageRequest,
) -> Result<()> {
    info!("Pulling image {}", request.image);
    let progress = guarded(cancel, engine.pull_image(request))
        .await
        .map_err(|source| Error::Pull {
            image: request.image.clone(),
            source,
        })?;

    drain(cancel, progress, &request.image).await;
    debug!("Finished pulling image {}", request.image);
    Ok(())
}

async fn drain(cancel: &CancelToken, mut progress: Box<dyn PullProgress>, image: &str) {
    let drained = cancel
        .run(async {
            let mut lines = 0usize;
            while let Some(line) = progress.next_line().await {
                match line {
                    Ok(line) => {
                        lines += 1;
                        debug!(target: "container_harness::pull", "{}: {}", image, line);
                    }
                    Err(e) => {
                        warn!("Failed to read pull progress for {}: {}", image, e);
                        break;
                    }
                }
            }
            lines
        })
        .await;
    match drained {
        Ok(lines) => debug!("Read {} progress lines pulling {}", lines, image),
        Err(_) => warn!("Pull of {} still streaming when its scope ended", image),
    }

    match cancel.run(progress.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to close pull progress for {}: {}", image, e),
        Err(_) => warn!("Closing pull progress for {} outlived its scope", image),
    }
}
