//! Caller-owned cancellation scopes.
//!
//! A [`CancelToken`] is cancelled explicitly with [`CancelToken::cancel`],
//! implicitly when its deadline passes, or when any ancestor scope is
//! cancelled. Every engine call and readiness check made by the harness is
//! raced against a token with [`CancelToken::run`], so a hung engine can
//! never hang the test suite.

use async_channel::{Receiver, Sender};
use async_runtime_compat::sleep_until;
use futures::future::{self, BoxFuture, Either, FutureExt};
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Error returned when a scope is cancelled before the guarded future finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Cooperative cancellation scope with an optional deadline
///
/// Clones share state: cancelling one clone cancels them all.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<CancelToken>,
    // Never carries messages. Closing the channel wakes every waiter.
    notify_tx: Sender<()>,
    notify_rx: Receiver<()>,
}

impl CancelToken {
    /// Create a root scope that is only cancelled explicitly
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Create a root scope that expires after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout), None)
    }

    /// Create a root scope that expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(Some(deadline), None)
    }

    /// Create a child scope, cancelled whenever this scope is
    pub fn child(&self) -> Self {
        Self::build(None, Some(self.clone()))
    }

    /// Create a child scope that additionally expires after `timeout`
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout), Some(self.clone()))
    }

    fn build(deadline: Option<Instant>, parent: Option<CancelToken>) -> Self {
        let (notify_tx, notify_rx) = async_channel::bounded(1);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline,
                parent,
                notify_tx,
                notify_rx,
            }),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify_tx.close();
    }

    /// Whether this scope, or any ancestor, has been cancelled or expired
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        if self
            .inner
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            return true;
        }
        self.inner
            .parent
            .as_ref()
            .is_some_and(CancelToken::is_cancelled)
    }

    /// The earliest deadline in effect for this scope, including ancestors
    pub fn deadline(&self) -> Option<Instant> {
        let parent = self.inner.parent.as_ref().and_then(CancelToken::deadline);
        match (self.inner.deadline, parent) {
            (Some(own), Some(parent)) => Some(own.min(parent)),
            (own, parent) => own.or(parent),
        }
    }

    /// Time left before the effective deadline, if there is one
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Resolve once this scope is cancelled or expires
    pub fn cancelled(&self) -> BoxFuture<'_, ()> {
        async move {
            if self.is_cancelled() {
                return;
            }

            let mut waiters: Vec<BoxFuture<'_, ()>> = Vec::with_capacity(3);
            let notify = self.inner.notify_rx.clone();
            waiters.push(
                async move {
                    // recv only fails once the channel is closed by cancel()
                    let _ = notify.recv().await;
                }
                .boxed(),
            );
            if let Some(deadline) = self.inner.deadline {
                waiters.push(sleep_until(deadline).boxed());
            }
            if let Some(parent) = &self.inner.parent {
                waiters.push(parent.cancelled());
            }

            future::select_all(waiters).await;
        }
        .boxed()
    }

    /// Drive `fut` to completion unless this scope is cancelled first.
    ///
    /// An already-cancelled scope never polls `fut`. On cancellation the
    /// future is dropped.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        if self.is_cancelled() {
            return Err(Cancelled);
        }

        let fut = pin!(fut);
        match future::select(fut, self.cancelled()).await {
            Either::Left((output, _)) => Ok(output),
            Either::Right(((), _)) => Err(Cancelled),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_runtime_compat::sleep;

    #[test]
    fn cancel_token_starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.deadline(), None);
    }

    #[test]
    fn cancel_is_idempotent_and_shared_across_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        a.cancel();
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn parent_cancellation_reaches_children() {
        let parent = CancelToken::new();
        let child = parent.child_with_timeout(Duration::from_secs(60));
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn child_cancellation_does_not_reach_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn expired_deadline_counts_as_cancelled() {
        let token = CancelToken::with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(token.is_cancelled());
        assert_eq!(token.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn child_deadline_is_bounded_by_parent() {
        let parent = CancelToken::with_timeout(Duration::from_secs(1));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[smol_potat::test]
    async fn run_completes_under_live_scope() {
        let token = CancelToken::new();
        assert_eq!(token.run(async { 5 }).await, Ok(5));
    }

    #[smol_potat::test]
    async fn run_never_polls_under_cancelled_scope() {
        let token = CancelToken::new();
        token.cancel();
        let polled = AtomicBool::new(false);
        let result = token
            .run(async {
                polled.store(true, Ordering::SeqCst);
            })
            .await;
        assert_eq!(result, Err(Cancelled));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[smol_potat::test]
    async fn run_aborts_hung_future_at_deadline() {
        let token = CancelToken::with_timeout(Duration::from_millis(50));
        let start = Instant::now();
        let result = token.run(future::pending::<()>()).await;
        assert_eq!(result, Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[smol_potat::test]
    async fn explicit_cancel_wakes_waiters() {
        let token = CancelToken::new();
        let canceller = token.clone();
        let waiting = token.run(future::pending::<()>());
        let cancelling = async {
            sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        };
        let (result, ()) = futures::join!(waiting, cancelling);
        assert_eq!(result, Err(Cancelled));
    }

    #[smol_potat::test]
    async fn parent_cancel_wakes_child_waiters() {
        let parent = CancelToken::new();
        let child = parent.child();
        let waiting = child.run(future::pending::<()>());
        let cancelling = async {
            sleep(Duration::from_millis(20)).await;
            parent.cancel();
        };
        let (result, ()) = futures::join!(waiting, cancelling);
        assert_eq!(result, Err(Cancelled));
    }
}
