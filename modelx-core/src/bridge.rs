//! Concurrent-update bridge: batching, deferred reads, transitions
//!
//! The bridge is the host-facing integration surface for rendering runtimes.
//! It carries no compile-time dependency on any UI library; hosts subscribe
//! to change notifications and drive their own scheduling from them.
//!
//! - [`with_batch`](UpdateBridge::with_batch): coalesce every dispatch made
//!   inside the closure into a single change notification
//! - [`deferred_read`](UpdateBridge::deferred_read): a read path that lags
//!   the authoritative state by exactly one notification pass while
//!   listeners are being delivered, and converges once the pass completes
//! - [`with_transition`](UpdateBridge::with_transition): a pending flag that
//!   stays `true` until every dispatch triggered by the closure — including
//!   the effects it started — has been applied and committed
//!
//! None of these suppress or reorder dispatches; reducer ordering is never
//! affected by batching.

use std::cell::RefCell;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;

use crate::action::Action;
use crate::effect::Dispatched;
use crate::error::DispatchError;
use crate::store::{Store, StoreInner};

impl Store {
    /// The concurrent-update bridge over this store.
    pub fn bridge(&self) -> UpdateBridge {
        UpdateBridge {
            store: Arc::clone(&self.inner),
        }
    }
}

/// Host-facing batching and deferred-read surface over a store.
#[derive(Clone)]
pub struct UpdateBridge {
    store: Arc<StoreInner>,
}

impl UpdateBridge {
    /// Run `f`, notifying change listeners exactly once after it returns —
    /// no matter how many dispatches it performs. Nestable; only the
    /// outermost batch flushes.
    pub fn with_batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.store.with_batch(f)
    }

    /// Dispatch a sequence of actions as one batch.
    ///
    /// Stops at the first reducer failure; actions already applied stay
    /// applied and are committed by the batch flush.
    pub fn dispatch_all<I>(&self, actions: I) -> Result<Vec<Dispatched>, DispatchError>
    where
        I: IntoIterator<Item = Action>,
    {
        self.with_batch(|| {
            actions
                .into_iter()
                .map(|action| self.store.dispatch(action))
                .collect()
        })
    }

    /// Read a namespace through the deferred view.
    ///
    /// During a notification pass this returns the previously committed
    /// snapshot; at rest it equals the authoritative state.
    pub fn deferred_read(&self, namespace: &str) -> Option<Value> {
        self.store.deferred_namespace(namespace)
    }

    /// Decode a namespace through the deferred view.
    pub fn deferred_decode<S: DeserializeOwned>(
        &self,
        namespace: &str,
    ) -> Result<S, DispatchError> {
        let value = self
            .deferred_read(namespace)
            .ok_or_else(|| DispatchError::UnknownNamespace(namespace.to_string()))?;
        serde_json::from_value(value).map_err(|source| DispatchError::StateDecode {
            namespace: namespace.to_string(),
            source,
        })
    }

    /// Run `f` as a transition: its dispatches are batched, and the returned
    /// [`Transition`] reports `pending` until everything `f` set in motion —
    /// including matched effects — has been applied and committed.
    ///
    /// Must be called from within a tokio runtime context when `f` triggers
    /// effects.
    pub fn with_transition<F>(&self, f: F) -> Transition
    where
        F: FnOnce(&TransitionScope<'_>),
    {
        let scope = TransitionScope {
            store: &self.store,
            tickets: RefCell::new(Vec::new()),
        };
        self.store.with_batch(|| f(&scope));
        let tickets = scope.tickets.into_inner();

        let effects_in_flight = tickets.iter().any(Dispatched::triggered_effect);
        let (tx, rx) = watch::channel(effects_in_flight);
        if effects_in_flight {
            tokio::spawn(async move {
                for ticket in tickets {
                    // completion is what matters here; failures already went
                    // to the ticket owner or the on_error hook
                    let _ = ticket.await;
                }
                let _ = tx.send(false);
            });
        }

        Transition { rx }
    }
}

/// Dispatch surface inside [`UpdateBridge::with_transition`].
///
/// Records each dispatch's completion ticket so the transition knows when
/// everything has settled.
pub struct TransitionScope<'a> {
    store: &'a Arc<StoreInner>,
    tickets: RefCell<Vec<Dispatched>>,
}

impl TransitionScope<'_> {
    /// Dispatch an action within the transition.
    pub fn dispatch(&self, action: impl Into<Action>) -> Result<(), DispatchError> {
        let dispatched = self.store.dispatch(action.into())?;
        self.tickets.borrow_mut().push(dispatched);
        Ok(())
    }
}

/// Read-only view of a transition's progress.
///
/// `pending` may not be used to suppress or reorder dispatches; it only
/// reports when the work has settled.
#[derive(Clone)]
pub struct Transition {
    rx: watch::Receiver<bool>,
}

impl Transition {
    /// Whether dispatches triggered by the transition are still in flight.
    pub fn is_pending(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the transition has settled.
    pub async fn settled(mut self) {
        // wait_for errs only when the sender dropped, which implies settled
        let _ = self.rx.wait_for(|pending| !pending).await;
    }
}
