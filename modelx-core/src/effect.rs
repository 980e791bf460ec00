//! Effect execution: put / call / select over the store
//!
//! An effect is an async closure `(Action, EffectContext) -> Result<(), EffectError>`
//! registered for an action kind. When a matching action is dispatched the
//! runner starts the closure with the originating action and a context that
//! exposes the three effect operations:
//!
//! - [`put`](EffectContext::put): route an action through the reducer
//!   registry synchronously, scheduling a nested effect run when the kind
//!   matches one (fire-and-forget unless the returned ticket is awaited)
//! - [`call`](EffectContext::call): await an async operation; failures come
//!   back as `Err` for the effect's own handling, never swallowed
//! - [`select`](EffectContext::select): read derived state at the moment of
//!   the call, so a select after an awaited `call` sees every `put` applied
//!   before that point
//!
//! Between awaits an effect runs synchronously and is never interleaved with
//! another step of the same invocation; other invocations and subscriptions
//! may interleave during the suspension windows.
//!
//! # Example
//!
//! ```ignore
//! Model::builder("counter", Counter::default())
//!     .reducer("set", |_state, action: &Action| Counter {
//!         count: action.payload_as().unwrap_or_default(),
//!     })
//!     .effect("load", |_action, ctx| async move {
//!         let value = ctx.call(fetch_count()).await?;
//!         ctx.put(Action::with_payload(
//!             ActionKind::new("counter", "set"),
//!             value,
//!         )?)?;
//!         Ok(())
//!     })
//!     .build()?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use crate::action::{Action, ActionKind};
use crate::error::{DispatchError, EffectError};
use crate::store::{Dispatcher, GlobalState, StoreInner};

/// Boxed future returned by a registered effect closure.
pub(crate) type EffectFuture = Pin<Box<dyn Future<Output = Result<(), EffectError>> + Send>>;

/// A registered effect in the dynamic registry.
pub(crate) type DynEffect = Arc<dyn Fn(Action, EffectContext) -> EffectFuture + Send + Sync>;

/// The live context of one effect invocation.
///
/// One instance per invocation; concurrent invocations of the same kind do
/// not share instances.
#[derive(Clone)]
pub struct EffectContext {
    store: Arc<StoreInner>,
    kind: ActionKind,
}

impl EffectContext {
    pub(crate) fn new(store: Arc<StoreInner>, kind: ActionKind) -> Self {
        Self { store, kind }
    }

    /// The kind this effect was registered for.
    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    /// Dispatch an action from inside the effect.
    ///
    /// The matching reducer runs synchronously before this returns. If the
    /// kind also matches an effect, a nested run is scheduled and continues
    /// on its own unless the returned ticket is awaited. A kind matching
    /// neither a reducer nor an effect is a silent no-op.
    pub fn put(&self, action: impl Into<Action>) -> Result<Dispatched, DispatchError> {
        self.store.dispatch(action.into())
    }

    /// Await an async operation.
    ///
    /// A rejection is returned as `Err` so the effect can catch and recover;
    /// the runner never swallows it.
    pub async fn call<T, E, Fut>(&self, operation: Fut) -> Result<T, EffectError>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        operation.await.map_err(|err| EffectError::Other(err.into()))
    }

    /// Read derived state at the moment of the call.
    pub fn select<T>(&self, f: impl FnOnce(&GlobalState) -> T) -> T {
        self.store.select(f)
    }

    /// Decode a namespace's state at the moment of the call.
    pub fn select_decode<S: DeserializeOwned>(
        &self,
        namespace: &str,
    ) -> Result<S, DispatchError> {
        self.store.select(|state| state.decode(namespace))
    }

    /// A dispatch handle that outlives this invocation.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            inner: Arc::clone(&self.store),
        }
    }
}

/// Completion ticket for a dispatch.
///
/// Ready immediately when the action matched no effect. When an effect
/// matched, awaiting resolves once that invocation completes; dropping the
/// ticket leaves the effect running (fire-and-forget).
#[derive(Debug)]
pub struct Dispatched {
    kind: ActionKind,
    ticket: Option<oneshot::Receiver<Result<(), EffectError>>>,
}

impl Dispatched {
    pub(crate) fn ready(kind: ActionKind) -> Self {
        Self { kind, ticket: None }
    }

    pub(crate) fn pending(
        kind: ActionKind,
        ticket: oneshot::Receiver<Result<(), EffectError>>,
    ) -> Self {
        Self {
            kind,
            ticket: Some(ticket),
        }
    }

    /// The kind that was dispatched.
    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    /// Whether the dispatch matched a registered effect.
    pub fn triggered_effect(&self) -> bool {
        self.ticket.is_some()
    }
}

impl Future for Dispatched {
    type Output = Result<(), EffectError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.ticket.as_mut() {
            None => Poll::Ready(Ok(())),
            Some(rx) => match Pin::new(rx).poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                // Sender dropped without resolving: the invocation was
                // superseded, throttled away, or shut down.
                Poll::Ready(Err(_)) => Poll::Ready(Err(EffectError::Cancelled {
                    kind: this.kind.clone(),
                })),
            },
        }
    }
}

/// Hook into the effect lifecycle.
///
/// Invoked on the effect's task, before the first step and after the last.
/// Used by the loading plugin to track in-flight effects.
pub trait EffectHook: Send + Sync {
    /// An invocation of `kind` is about to start.
    fn effect_started(&self, kind: &ActionKind, dispatcher: &Dispatcher);

    /// The invocation finished (successfully or not).
    fn effect_finished(&self, kind: &ActionKind, ok: bool, dispatcher: &Dispatcher);
}
