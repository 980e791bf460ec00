//! Subscriptions: long-lived action sources started at boot
//!
//! A subscription's setup runs exactly once, after the store is constructed
//! and before any user-triggered dispatch. It receives a
//! [`SubscriptionContext`] — a dispatch handle plus helpers for the common
//! shapes (fixed intervals, streams) — and may return a teardown that is
//! invoked exactly once at stop.
//!
//! Setup failures are partial-failure tolerant: a failing setup is recorded,
//! the remaining setups still run, and the aggregate is surfaced to the
//! caller after all attempts.
//!
//! # Example
//!
//! ```ignore
//! Model::builder("clock", Clock::default())
//!     .subscription("tick", |ctx| {
//!         Ok(Some(ctx.interval(Duration::from_secs(1), || {
//!             Action::new(ActionKind::new("clock", "tick"))
//!         })))
//!     })
//! ```

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use tokio_stream::{Stream, StreamExt};

use crate::action::Action;
use crate::effect::Dispatched;
use crate::error::{DispatchError, SubscriptionFailure};
use crate::store::Dispatcher;

/// Idempotent cleanup returned by a subscription setup.
pub type Teardown = Box<dyn FnOnce() + Send>;

pub(crate) type SetupFn =
    Box<dyn FnOnce(&SubscriptionContext) -> anyhow::Result<Option<Teardown>> + Send>;

/// Context handed to a subscription's setup function.
pub struct SubscriptionContext {
    dispatcher: Dispatcher,
    namespace: String,
}

impl SubscriptionContext {
    pub(crate) fn new(dispatcher: Dispatcher, namespace: String) -> Self {
        Self {
            dispatcher,
            namespace,
        }
    }

    /// The namespace of the model this subscription belongs to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// A dispatch handle that outlives the setup call.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Dispatch an action directly from setup.
    pub fn dispatch(&self, action: impl Into<Action>) -> Result<Dispatched, DispatchError> {
        self.dispatcher.dispatch(action)
    }

    /// Emit an action at fixed intervals. The first emission happens one
    /// period after start.
    ///
    /// Returns a teardown that stops the timer.
    pub fn interval<F>(&self, period: Duration, action_fn: F) -> Teardown
    where
        F: Fn() -> Action + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                if let Err(err) = dispatcher.dispatch(action_fn()) {
                    tracing::warn!(error = %err, "interval subscription dispatch failed");
                }
            }
        });
        let abort = handle.abort_handle();
        Box::new(move || abort.abort())
    }

    /// Like [`interval`](Self::interval), but emits immediately as well.
    pub fn interval_immediate<F>(&self, period: Duration, action_fn: F) -> Teardown
    where
        F: Fn() -> Action + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;
                if let Err(err) = dispatcher.dispatch(action_fn()) {
                    tracing::warn!(error = %err, "interval subscription dispatch failed");
                }
            }
        });
        let abort = handle.abort_handle();
        Box::new(move || abort.abort())
    }

    /// Forward every item of a stream as an action.
    ///
    /// Returns a teardown that stops consuming the stream.
    pub fn stream<S>(&self, stream: S) -> Teardown
    where
        S: Stream<Item = Action> + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        let handle = tokio::spawn(async move {
            tokio::pin!(stream);
            while let Some(action) = stream.next().await {
                if let Err(err) = dispatcher.dispatch(action) {
                    tracing::warn!(error = %err, "stream subscription dispatch failed");
                }
            }
        });
        let abort = handle.abort_handle();
        Box::new(move || abort.abort())
    }
}

/// Handle to one started subscription.
///
/// The teardown is invoked at most once; calling [`teardown`](Self::teardown)
/// again is a no-op, and a panicking teardown is logged, never propagated.
pub struct SubscriptionHandle {
    name: String,
    teardown: Option<Teardown>,
}

impl SubscriptionHandle {
    pub(crate) fn new(name: String, teardown: Option<Teardown>) -> Self {
        Self { name, teardown }
    }

    /// Qualified `namespace/name` of this subscription.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the teardown if it has not run yet.
    pub fn teardown(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            if std::panic::catch_unwind(AssertUnwindSafe(teardown)).is_err() {
                tracing::warn!(name = %self.name, "subscription teardown panicked");
            }
        }
    }
}

/// All subscriptions of a running app.
pub(crate) struct SubscriptionSet {
    handles: Vec<SubscriptionHandle>,
}

impl SubscriptionSet {
    /// Run every setup, collecting failures instead of failing fast.
    pub(crate) fn start(
        setups: Vec<(String, String, SetupFn)>,
        dispatcher: &Dispatcher,
    ) -> (Self, Vec<SubscriptionFailure>) {
        let mut handles = Vec::new();
        let mut failures = Vec::new();

        for (name, namespace, setup) in setups {
            let ctx = SubscriptionContext::new(dispatcher.clone(), namespace);
            match setup(&ctx) {
                Ok(teardown) => handles.push(SubscriptionHandle::new(name, teardown)),
                Err(source) => {
                    tracing::warn!(name = %name, error = %source, "subscription setup failed");
                    failures.push(SubscriptionFailure { name, source });
                }
            }
        }

        (Self { handles }, failures)
    }

    /// Tear every subscription down, in unspecified order.
    pub(crate) fn stop(&mut self) {
        for handle in &mut self.handles {
            handle.teardown();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.stop();
    }
}
