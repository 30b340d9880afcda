//! Suspension primitives used between attempts and cycles.
//!
//! Every delay in the poller goes through a [`Waiter`], which delegates to an
//! injectable [`Sleeper`] so tests can fast-forward without wall-clock time.
//! Waits double as cancellation points for graceful shutdown.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use log::debug;
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

/// Future returned by [`Sleeper::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Source of delays.
pub trait Sleeper {
    /// Completes once `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}

/// Sleeper backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Result of a wait.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitStatus {
    /// The full duration elapsed.
    Elapsed,
    /// Shutdown was requested before the duration elapsed.
    Cancelled,
}

impl WaitStatus {
    /// Returns `true` when the wait was interrupted by shutdown.
    #[must_use]
    pub const fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Cancellable waits over a [`Sleeper`].
#[derive(Clone, Debug, Default)]
pub struct Waiter<S> {
    sleeper: S,
}

impl<S: Sleeper> Waiter<S> {
    /// Wraps a sleeper.
    #[must_use]
    pub const fn new(sleeper: S) -> Self {
        Self { sleeper }
    }

    /// Returns the underlying sleeper.
    #[must_use]
    pub const fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Suspends for `duration`. A zero duration returns immediately.
    pub async fn wait(&self, duration: Duration, shutdown: &CancellationToken) -> WaitStatus {
        if shutdown.is_cancelled() {
            return WaitStatus::Cancelled;
        }
        if duration.is_zero() {
            return WaitStatus::Elapsed;
        }
        tokio::select! {
            biased;
            () = shutdown.cancelled() => WaitStatus::Cancelled,
            () = self.sleeper.sleep(duration) => WaitStatus::Elapsed,
        }
    }

    /// Suspends for `seconds`, one second at a time, calling `on_tick` with
    /// the elapsed count after each second. Zero seconds resolves
    /// immediately without calling `on_tick`.
    pub async fn wait_with_progress<F>(
        &self,
        seconds: u64,
        mut on_tick: F,
        shutdown: &CancellationToken,
    ) -> WaitStatus
    where
        F: FnMut(u64) + Send,
    {
        for elapsed in 1..=seconds {
            if self.wait(TICK, shutdown).await.is_cancelled() {
                return WaitStatus::Cancelled;
            }
            on_tick(elapsed);
        }
        WaitStatus::Elapsed
    }

    /// [`Waiter::wait_with_progress`] with the default progress side effect:
    /// a debug line per second.
    pub async fn wait_with_default_progress(
        &self,
        seconds: u64,
        shutdown: &CancellationToken,
    ) -> WaitStatus {
        self.wait_with_progress(
            seconds,
            |elapsed| debug!("waiting for {elapsed}/{seconds} seconds"),
            shutdown,
        )
        .await
    }
}
