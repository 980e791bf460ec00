//! Effect worker registry: invocation strategies over spawned tasks
//!
//! Every effect invocation runs as a tokio task. The worker registry decides,
//! per action kind, how a new invocation relates to in-flight ones:
//!
//! - [`Parallel`](InvocationStrategy::Parallel): every invocation runs to
//!   completion independently (the default)
//! - [`TakeLatest`](InvocationStrategy::TakeLatest): a new invocation aborts
//!   the superseded one at its next suspension point
//! - [`Debounce`](InvocationStrategy::Debounce): wait before running; a newer
//!   invocation resets the timer
//! - [`Throttle`](InvocationStrategy::Throttle): run, then drop further
//!   invocations for the given window
//!
//! Cancellation is cooperative: aborting lands at the superseded task's next
//! await, and no error is injected into it. Its completion ticket resolves
//! as cancelled for anyone awaiting it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::action::ActionKind;

/// How concurrent invocations of one effect kind relate to each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvocationStrategy {
    /// All invocations run to completion independently.
    Parallel,
    /// A new invocation supersedes the in-flight one, aborting it at its
    /// next suspension point.
    TakeLatest,
    /// Wait this long before running; a newer invocation resets the timer.
    Debounce(Duration),
    /// Run, then drop invocations arriving within this window. Dropped
    /// invocations resolve their tickets as cancelled.
    Throttle(Duration),
}

impl Default for InvocationStrategy {
    fn default() -> Self {
        Self::Parallel
    }
}

pub(crate) type WorkerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Registry of in-flight effect tasks, keyed by action kind.
///
/// Must be driven from within a tokio runtime context.
pub(crate) struct EffectWorkers {
    exclusive: HashMap<ActionKind, AbortHandle>,
    last_run: HashMap<ActionKind, Instant>,
    parallel: Vec<AbortHandle>,
}

impl EffectWorkers {
    pub(crate) fn new() -> Self {
        Self {
            exclusive: HashMap::new(),
            last_run: HashMap::new(),
            parallel: Vec::new(),
        }
    }

    pub(crate) fn schedule(
        &mut self,
        kind: ActionKind,
        strategy: InvocationStrategy,
        fut: WorkerFuture,
    ) {
        match strategy {
            InvocationStrategy::Parallel => {
                self.spawn_tracked(fut);
            }
            InvocationStrategy::TakeLatest => {
                if let Some(handle) = self.exclusive.remove(&kind) {
                    handle.abort();
                }
                let handle = tokio::spawn(fut);
                self.exclusive.insert(kind, handle.abort_handle());
            }
            InvocationStrategy::Debounce(delay) => {
                if let Some(handle) = self.exclusive.remove(&kind) {
                    handle.abort();
                }
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    fut.await;
                });
                self.exclusive.insert(kind, handle.abort_handle());
            }
            InvocationStrategy::Throttle(window) => {
                let now = Instant::now();
                let within_window = self
                    .last_run
                    .get(&kind)
                    .is_some_and(|last| now.duration_since(*last) < window);
                if within_window {
                    tracing::trace!(kind = %kind, "throttled effect invocation dropped");
                    return;
                }
                self.last_run.insert(kind, now);
                self.spawn_tracked(fut);
            }
        }
    }

    fn spawn_tracked(&mut self, fut: WorkerFuture) {
        self.parallel.retain(|handle| !handle.is_finished());
        let handle = tokio::spawn(fut);
        self.parallel.push(handle.abort_handle());
    }

    /// Abort every in-flight effect task. Used at shutdown.
    pub(crate) fn cancel_all(&mut self) {
        for (_, handle) in self.exclusive.drain() {
            handle.abort();
        }
        for handle in self.parallel.drain(..) {
            handle.abort();
        }
        self.last_run.clear();
    }
}

impl Drop for EffectWorkers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn kind() -> ActionKind {
        ActionKind::new("job", "run")
    }

    #[tokio::test]
    async fn test_parallel_runs_all_invocations() {
        let mut workers = EffectWorkers::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let c = Arc::clone(&counter);
            workers.schedule(
                kind(),
                InvocationStrategy::Parallel,
                Box::pin(async move {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_take_latest_aborts_superseded() {
        let mut workers = EffectWorkers::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&counter);
        workers.schedule(
            kind(),
            InvocationStrategy::TakeLatest,
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                c1.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let c2 = Arc::clone(&counter);
        workers.schedule(
            kind(),
            InvocationStrategy::TakeLatest,
            Box::pin(async move {
                c2.fetch_add(10, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_debounce_resets_timer() {
        let mut workers = EffectWorkers::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&counter);
        workers.schedule(
            kind(),
            InvocationStrategy::Debounce(Duration::from_millis(50)),
            Box::pin(async move {
                c1.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;

        let c2 = Arc::clone(&counter);
        workers.schedule(
            kind(),
            InvocationStrategy::Debounce(Duration::from_millis(50)),
            Box::pin(async move {
                c2.fetch_add(10, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_throttle_drops_within_window() {
        let mut workers = EffectWorkers::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let c = Arc::clone(&counter);
            workers.schedule(
                kind(),
                InvocationStrategy::Throttle(Duration::from_secs(10)),
                Box::pin(async move {
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_all_aborts_in_flight() {
        let mut workers = EffectWorkers::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        workers.schedule(
            kind(),
            InvocationStrategy::Parallel,
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        workers.cancel_all();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
