//! Process results and streamed output

use async_process::{Child, ChildStderr, ChildStdout};
use futures_lite::StreamExt;
use futures_lite::future;
use futures_lite::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines};
use tracing::debug;

use crate::error::Result;

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (Unix only)
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// How the process exited
    pub status: ExitStatus,
    /// Everything written to stdout
    pub stdout: String,
    /// Everything written to stderr
    pub stderr: String,
}

impl ProcessOutput {
    /// Returns true if the process exited with code 0
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// A running process whose stdout is consumed line by line
///
/// Stderr is collected while stdout is read, so a chatty child never
/// blocks on a full stderr pipe. Dropping the stream kills the process.
pub struct LineStream {
    program: String,
    child: Child,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    stderr: Option<ChildStderr>,
    stderr_buf: Vec<u8>,
}

enum Event {
    Line(Option<std::io::Result<String>>),
    Stderr(std::io::Result<usize>),
}

impl LineStream {
    pub(crate) fn new(program: String, mut child: Child) -> Self {
        let stdout = child.stdout.take().map(|s| BufReader::new(s).lines());
        let stderr = child.stderr.take();
        Self {
            program,
            child,
            stdout,
            stderr,
            stderr_buf: Vec::new(),
        }
    }

    /// Process ID of the child
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Read the next stdout line. `None` once stdout is closed.
    pub async fn next_line(&mut self) -> Option<std::io::Result<String>> {
        loop {
            let lines = self.stdout.as_mut()?;
            let Some(stderr) = self.stderr.as_mut() else {
                let line = lines.next().await;
                if line.is_none() {
                    self.stdout = None;
                }
                return line;
            };

            let mut chunk = [0u8; 4096];
            let event = future::or(
                async { Event::Line(lines.next().await) },
                async { Event::Stderr(stderr.read(&mut chunk).await) },
            )
            .await;

            match event {
                Event::Line(line) => {
                    if line.is_none() {
                        self.stdout = None;
                    }
                    return line;
                }
                Event::Stderr(Ok(0)) => self.stderr = None,
                Event::Stderr(Ok(n)) => self.stderr_buf.extend_from_slice(&chunk[..n]),
                Event::Stderr(Err(e)) => {
                    debug!("{} stderr closed: {}", self.program, e);
                    self.stderr = None;
                }
            }
        }
    }

    /// Drain whatever stdout remains, then wait for the process to exit.
    ///
    /// The returned output holds only the stdout lines not yet consumed
    /// through [`LineStream::next_line`], and all of stderr.
    pub async fn finish(mut self) -> Result<ProcessOutput> {
        let mut stdout = String::new();
        while let Some(line) = self.next_line().await {
            stdout.push_str(&line?);
            stdout.push('\n');
        }

        if let Some(mut err) = self.stderr.take() {
            err.read_to_end(&mut self.stderr_buf).await?;
        }
        let stderr = String::from_utf8_lossy(&self.stderr_buf).into_owned();

        let status = ExitStatus::from(self.child.status().await?);
        debug!("{} (pid {}) finished with {}", self.program, self.child.id(), status);

        Ok(ProcessOutput {
            status,
            stdout,
            stderr,
        })
    }
}

impl std::fmt::Debug for LineStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineStream")
            .field("program", &self.program)
            .field("pid", &self.child.id())
            .finish()
    }
}
