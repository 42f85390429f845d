//! Streamed output of `docker pull`.

use async_trait::async_trait;
use command_executor::LineStream;
use std::io;

use crate::engine::PullProgress;

/// Progress lines of a running `docker pull`
///
/// Dropping the stream kills the pull.
#[derive(Debug)]
pub struct DockerPullProgress {
    image: String,
    stream: LineStream,
}

impl DockerPullProgress {
    pub(crate) fn new(image: impl Into<String>, stream: LineStream) -> Self {
        Self {
            image: image.into(),
            stream,
        }
    }
}

#[async_trait]
impl PullProgress for DockerPullProgress {
    async fn next_line(&mut self) -> Option<io::Result<String>> {
        self.stream.next_line().await
    }

    /// Wait for `docker pull` to exit; a failed pull is reported here
    async fn close(self: Box<Self>) -> io::Result<()> {
        let DockerPullProgress { image, stream } = *self;
        let output = stream.finish().await.map_err(io::Error::other)?;
        if output.success() {
            return Ok(());
        }
        Err(io::Error::other(format!(
            "docker pull {} exited with {}: {}",
            image,
            output.status,
            output.stderr.trim()
        )))
    }
}
