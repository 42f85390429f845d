//! Runtime-agnostic utility functions
//!
//! This module provides timer functions that abstract over the different
//! async runtimes to avoid repetitive cfg-flag patterns throughout the
//! codebase.

use futures::future::{Either, select};
use std::future::Future;
use std::pin::pin;
use std::time::{Duration, Instant};

/// Sleep for the specified duration using the selected runtime
pub async fn sleep(duration: Duration) {
    #[cfg(feature = "smol")]
    {
        smol::Timer::after(duration).await;
    }

    #[cfg(all(feature = "tokio", not(feature = "smol")))]
    {
        tokio::time::sleep(duration).await;
    }

    #[cfg(all(feature = "async-std", not(any(feature = "smol", feature = "tokio"))))]
    {
        async_std::task::sleep(duration).await;
    }

    #[cfg(not(any(feature = "smol", feature = "tokio", feature = "async-std")))]
    {
        let _ = duration;
        compile_error!("One of the runtime features must be enabled: smol, tokio, or async-std");
    }
}

/// Sleep until `deadline`. Returns immediately if it has already passed.
pub async fn sleep_until(deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if !remaining.is_zero() {
        sleep(remaining).await;
    }
}

/// Error returned by [`timeout`] when the deadline elapses first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    duration: Duration,
}

impl Elapsed {
    /// The timeout that was exceeded
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl std::fmt::Display for Elapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deadline of {:?} elapsed", self.duration)
    }
}

impl std::error::Error for Elapsed {}

/// Run `future` to completion unless `duration` elapses first.
///
/// On timeout the future is dropped, which cancels whatever it was awaiting.
pub async fn timeout<F>(duration: Duration, future: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    let future = pin!(future);
    let delay = pin!(sleep(duration));

    match select(future, delay).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(((), _)) => Err(Elapsed { duration }),
    }
}

#[cfg(all(test, feature = "smol"))]
mod tests {
    use super::*;

    #[test]
    fn test_sleep() {
        smol::block_on(async {
            let start = Instant::now();
            sleep(Duration::from_millis(100)).await;
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(100));
            assert!(elapsed < Duration::from_millis(500));
        });
    }

    #[test]
    fn test_sleep_until_past_deadline_returns_immediately() {
        smol::block_on(async {
            let start = Instant::now();
            sleep_until(start - Duration::from_secs(1)).await;
            assert!(start.elapsed() < Duration::from_millis(50));
        });
    }

    #[smol_potat::test]
    async fn test_timeout_completes_fast_future() {
        let value = timeout(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(value, Ok(7));
    }

    #[smol_potat::test]
    async fn test_timeout_elapses_on_slow_future() {
        let result = timeout(Duration::from_millis(20), sleep(Duration::from_secs(5))).await;
        let err = result.unwrap_err();
        assert_eq!(err.duration(), Duration::from_millis(20));
        assert_eq!(err.to_string(), "deadline of 20ms elapsed");
    }
}
