//! Centralized state store with per-namespace reducer registry
//!
//! The store owns the global state tree: a map from namespace to that
//! namespace's JSON state value. All mutations flow through [`dispatch`]
//! (Store::dispatch): the matching reducer computes a full next-state value,
//! the store installs it, change listeners are notified (or a pending batch
//! is marked dirty), and a matching effect is scheduled.
//!
//! Dispatch is linearized by an internal gate: the reducer registry is never
//! invoked concurrently with itself, and all namespace-state transitions are
//! ordered by dispatch order. The store is the sole writer of global state;
//! everything else reads through snapshots or `select`.
//!
//! Change listeners are notification-only. Dispatching from inside a
//! listener is not supported; hosts should schedule follow-up work instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::action::{Action, ActionKind};
use crate::effect::{Dispatched, EffectContext, EffectHook};
use crate::error::{DispatchError, EffectError};
use crate::model::EffectEntry;
use crate::tasks::EffectWorkers;

/// The global state tree: one JSON value per namespace.
///
/// Snapshots of this type are handed to change listeners and `select`
/// closures; typed reads go through [`GlobalState::decode`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalState(HashMap<String, Value>);

impl GlobalState {
    /// The raw state value for a namespace, if registered.
    pub fn namespace(&self, namespace: &str) -> Option<&Value> {
        self.0.get(namespace)
    }

    /// Decode a namespace's state into a concrete type.
    pub fn decode<S: DeserializeOwned>(&self, namespace: &str) -> Result<S, DispatchError> {
        let value = self
            .0
            .get(namespace)
            .ok_or_else(|| DispatchError::UnknownNamespace(namespace.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|source| DispatchError::StateDecode {
            namespace: namespace.to_string(),
            source,
        })
    }

    /// Iterate over all registered namespaces.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub(crate) fn insert(&mut self, namespace: String, value: Value) {
        self.0.insert(namespace, value);
    }
}

/// A reducer in the dynamic registry.
///
/// Takes the current namespace state and the action, returns the full next
/// state value. Typed reducers registered through `ModelBuilder` are wrapped
/// into this shape with a serde round-trip.
pub type DynReducer =
    Arc<dyn Fn(&Value, &Action) -> Result<Value, DispatchError> + Send + Sync>;

type Listener = Arc<dyn Fn(&GlobalState) + Send + Sync>;

pub(crate) type ErrorHook = Arc<dyn Fn(&EffectError) + Send + Sync>;

#[derive(Default)]
struct BatchState {
    depth: u32,
    dirty: bool,
}

pub(crate) struct StoreInner {
    state: RwLock<GlobalState>,
    reducers: HashMap<String, HashMap<String, DynReducer>>,
    effects: HashMap<ActionKind, EffectEntry>,
    /// Linearizes reducer application; the registry never runs concurrently
    /// with itself.
    gate: Mutex<()>,
    middleware: Mutex<ComposedMiddleware>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    batch: Mutex<BatchState>,
    /// Serializes notification passes so the deferred view is consistent.
    notify_gate: Mutex<()>,
    committed: RwLock<GlobalState>,
    deferred: RwLock<GlobalState>,
    workers: Mutex<EffectWorkers>,
    hooks: Vec<Arc<dyn EffectHook>>,
    on_error: Option<ErrorHook>,
}

impl StoreInner {
    pub(crate) fn dispatch(
        self: &Arc<Self>,
        action: Action,
    ) -> Result<Dispatched, DispatchError> {
        let changed = {
            let _gate = self.gate.lock();
            let mut middleware = self.middleware.lock();
            middleware.before(&action);
            let reduced = self.reduce(&action);
            middleware.after(&action, *reduced.as_ref().unwrap_or(&false));
            drop(middleware);
            reduced?
        };

        if changed {
            self.notify_or_mark();
        }

        Ok(self.schedule_effect(action))
    }

    /// Apply the matching reducer, if any. The next state is fully computed
    /// before it is installed, so a failure leaves the pre-dispatch value.
    fn reduce(&self, action: &Action) -> Result<bool, DispatchError> {
        let namespace = action.kind().namespace();
        let Some(reducer) = self
            .reducers
            .get(namespace)
            .and_then(|m| m.get(action.kind().name()))
        else {
            return Ok(false);
        };

        let current = self
            .state
            .read()
            .namespace(namespace)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownNamespace(namespace.to_string()))?;

        let next = reducer(&current, action)?;
        if next == current {
            return Ok(false);
        }
        self.state.write().insert(namespace.to_string(), next);
        Ok(true)
    }

    fn schedule_effect(self: &Arc<Self>, action: Action) -> Dispatched {
        let kind = action.kind().clone();
        let Some(entry) = self.effects.get(&kind) else {
            let has_reducer = self
                .reducers
                .get(kind.namespace())
                .is_some_and(|m| m.contains_key(kind.name()));
            if !has_reducer {
                tracing::trace!(kind = %kind, "action matched no reducer and no effect");
            }
            return Dispatched::ready(kind);
        };

        let (tx, rx) = oneshot::channel();
        let ctx = EffectContext::new(Arc::clone(self), kind.clone());
        let runner = Arc::clone(&entry.runner);
        let hooks = self.hooks.clone();
        let on_error = self.on_error.clone();
        let dispatcher = Dispatcher {
            inner: Arc::clone(self),
        };
        let task_kind = kind.clone();

        let fut = Box::pin(async move {
            for hook in &hooks {
                hook.effect_started(&task_kind, &dispatcher);
            }
            let result = runner(action, ctx).await;
            for hook in &hooks {
                hook.effect_finished(&task_kind, result.is_ok(), &dispatcher);
            }
            if let Err(err) = &result {
                tracing::warn!(kind = %task_kind, error = %err, "effect failed");
            }
            // An Err nobody awaits still reaches the app's error hook.
            if let Err(unclaimed) = tx.send(result) {
                if let (Err(err), Some(on_error)) = (unclaimed, on_error.as_ref()) {
                    on_error(&err);
                }
            }
        });

        self.workers.lock().schedule(kind.clone(), entry.strategy, fut);
        Dispatched::pending(kind, rx)
    }

    pub(crate) fn with_batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.batch.lock().depth += 1;
        let out = f();
        let flush = {
            let mut batch = self.batch.lock();
            batch.depth -= 1;
            let flush = batch.depth == 0 && batch.dirty;
            if flush {
                batch.dirty = false;
            }
            flush
        };
        if flush {
            self.flush();
        }
        out
    }

    fn notify_or_mark(&self) {
        {
            let mut batch = self.batch.lock();
            if batch.depth > 0 {
                batch.dirty = true;
                return;
            }
        }
        self.flush();
    }

    /// One notification pass. While listeners run, the deferred view holds
    /// the previously committed snapshot; it converges as soon as the pass
    /// completes.
    fn flush(&self) {
        let _pass = self.notify_gate.lock();
        let snapshot = self.state.read().clone();
        {
            let previous = self.committed.read().clone();
            *self.deferred.write() = previous;
            *self.committed.write() = snapshot.clone();
        }
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
        *self.deferred.write() = snapshot;
    }

    pub(crate) fn state_snapshot(&self) -> GlobalState {
        self.state.read().clone()
    }

    pub(crate) fn select<T>(&self, f: impl FnOnce(&GlobalState) -> T) -> T {
        f(&self.state.read())
    }

    pub(crate) fn deferred_namespace(&self, namespace: &str) -> Option<Value> {
        self.deferred.read().namespace(namespace).cloned()
    }

    fn remove_listener(&self, id: u64) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    pub(crate) fn shutdown(&self) {
        self.workers.lock().cancel_all();
    }
}

/// Everything needed to assemble a store; built by the app from its
/// registered models and options.
pub(crate) struct StoreParts {
    pub initial: GlobalState,
    pub reducers: HashMap<String, HashMap<String, DynReducer>>,
    pub effects: HashMap<ActionKind, EffectEntry>,
    pub middleware: ComposedMiddleware,
    pub hooks: Vec<Arc<dyn EffectHook>>,
    pub on_error: Option<ErrorHook>,
}

impl Default for StoreParts {
    fn default() -> Self {
        Self {
            initial: GlobalState::default(),
            reducers: HashMap::new(),
            effects: HashMap::new(),
            middleware: ComposedMiddleware::new(),
            hooks: Vec::new(),
            on_error: None,
        }
    }
}

/// Handle to a running store.
///
/// Cheap to clone; all clones share the same state tree.
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl Store {
    pub(crate) fn from_parts(parts: StoreParts) -> Self {
        let inner = Arc::new(StoreInner {
            state: RwLock::new(parts.initial.clone()),
            reducers: parts.reducers,
            effects: parts.effects,
            gate: Mutex::new(()),
            middleware: Mutex::new(parts.middleware),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
            batch: Mutex::new(BatchState::default()),
            notify_gate: Mutex::new(()),
            committed: RwLock::new(parts.initial.clone()),
            deferred: RwLock::new(parts.initial),
            workers: Mutex::new(EffectWorkers::new()),
            hooks: parts.hooks,
            on_error: parts.on_error,
        });
        Self { inner }
    }

    /// Dispatch an action.
    ///
    /// The matching reducer (if any) runs synchronously before this returns.
    /// The returned [`Dispatched`] ticket resolves immediately when no effect
    /// matched, or when the matching effect completes.
    ///
    /// Dispatching a kind that matches an effect requires a tokio runtime
    /// context, since the effect runs as a spawned task.
    pub fn dispatch(&self, action: impl Into<Action>) -> Result<Dispatched, DispatchError> {
        self.inner.dispatch(action.into())
    }

    /// A snapshot of the current global state.
    pub fn state(&self) -> GlobalState {
        self.inner.state_snapshot()
    }

    /// Read derived state without cloning the whole tree.
    pub fn select<T>(&self, f: impl FnOnce(&GlobalState) -> T) -> T {
        self.inner.select(f)
    }

    /// Register a change listener, notified once per committed update.
    ///
    /// The listener is removed when the returned handle is dropped.
    pub fn subscribe(
        &self,
        listener: impl Fn(&GlobalState) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        ListenerHandle {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// A cheap dispatch-only handle for other tasks.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Send + Clone handle used by effects, subscriptions and host code to
/// dispatch into the store.
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) inner: Arc<StoreInner>,
}

impl Dispatcher {
    /// Dispatch an action. See [`Store::dispatch`].
    pub fn dispatch(&self, action: impl Into<Action>) -> Result<Dispatched, DispatchError> {
        self.inner.dispatch(action.into())
    }

    /// A snapshot of the current global state.
    pub fn state(&self) -> GlobalState {
        self.inner.state_snapshot()
    }

    /// Read derived state without cloning the whole tree.
    pub fn select<T>(&self, f: impl FnOnce(&GlobalState) -> T) -> T {
        self.inner.select(f)
    }
}

/// Unsubscribes its change listener on drop.
pub struct ListenerHandle {
    id: u64,
    inner: Weak<StoreInner>,
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.remove_listener(self.id);
        }
    }
}

/// Middleware trait for intercepting dispatches.
///
/// Implement this trait to add logging, persistence, or other cross-cutting
/// concerns. Hooks run under the dispatch gate, so keep them cheap.
pub trait Middleware: Send {
    /// Called before the action reaches the reducer registry.
    fn before(&mut self, action: &Action);

    /// Called after the reducer ran (or was skipped), with the change flag.
    fn after(&mut self, action: &Action, state_changed: bool);
}

/// A no-op middleware that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMiddleware;

impl Middleware for NoopMiddleware {
    fn before(&mut self, _action: &Action) {}
    fn after(&mut self, _action: &Action, _state_changed: bool) {}
}

/// Middleware that logs every dispatched action with its duration and
/// whether it changed state.
#[derive(Debug, Default)]
pub struct LoggingMiddleware {
    /// Whether to log before dispatch as well.
    pub log_before: bool,
    started: Vec<Instant>,
}

impl LoggingMiddleware {
    /// Log after dispatch only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log both before and after dispatch.
    pub fn verbose() -> Self {
        Self {
            log_before: true,
            started: Vec::new(),
        }
    }
}

impl Middleware for LoggingMiddleware {
    fn before(&mut self, action: &Action) {
        self.started.push(Instant::now());
        if self.log_before {
            tracing::debug!(action = %action.kind(), "dispatching action");
        }
    }

    fn after(&mut self, action: &Action, state_changed: bool) {
        let elapsed = self.started.pop().map(|t| t.elapsed());
        tracing::debug!(
            action = %action.kind(),
            state_changed,
            elapsed_us = elapsed.map(|e| e.as_micros() as u64),
            "action processed"
        );
    }
}

/// Compose multiple middleware into a single middleware.
///
/// `before` hooks run in registration order, `after` hooks in reverse order
/// for proper nesting.
pub struct ComposedMiddleware {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl std::fmt::Debug for ComposedMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares_count", &self.middlewares.len())
            .finish()
    }
}

impl Default for ComposedMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl ComposedMiddleware {
    /// Create an empty composition.
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add a middleware to the composition.
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }
}

impl Middleware for ComposedMiddleware {
    fn before(&mut self, action: &Action) {
        for middleware in &mut self.middlewares {
            middleware.before(action);
        }
    }

    fn after(&mut self, action: &Action, state_changed: bool) {
        for middleware in self.middlewares.iter_mut().rev() {
            middleware.after(action, state_changed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_store(middleware: ComposedMiddleware) -> Store {
        let mut reducers: HashMap<String, HashMap<String, DynReducer>> = HashMap::new();
        let mut counter: HashMap<String, DynReducer> = HashMap::new();
        counter.insert(
            "increment".to_string(),
            Arc::new(|value, _action| {
                let n = value.as_i64().unwrap_or(0);
                Ok(Value::from(n + 1))
            }),
        );
        counter.insert(
            "fail".to_string(),
            Arc::new(|_value, action| {
                Err(DispatchError::Reducer {
                    kind: action.kind().clone(),
                    source: anyhow::anyhow!("boom"),
                })
            }),
        );
        reducers.insert("counter".to_string(), counter);

        let mut initial = GlobalState::default();
        initial.insert("counter".to_string(), Value::from(0));

        Store::from_parts(StoreParts {
            initial,
            reducers,
            middleware,
            ..StoreParts::default()
        })
    }

    fn increment() -> Action {
        Action::new(ActionKind::new("counter", "increment"))
    }

    #[test]
    fn test_dispatch_applies_reducer() {
        let store = counter_store(ComposedMiddleware::new());

        for _ in 0..3 {
            store.dispatch(increment()).unwrap();
        }

        assert_eq!(store.state().namespace("counter"), Some(&Value::from(3)));
    }

    #[test]
    fn test_unknown_kind_is_silent_noop() {
        let store = counter_store(ComposedMiddleware::new());
        let before = store.state();

        let dispatched = store
            .dispatch(Action::new(ActionKind::new("ghost", "nothing")))
            .unwrap();

        assert!(!dispatched.triggered_effect());
        assert_eq!(store.state(), before);
    }

    #[test]
    fn test_failed_reducer_keeps_pre_dispatch_state() {
        let store = counter_store(ComposedMiddleware::new());
        store.dispatch(increment()).unwrap();

        let err = store
            .dispatch(Action::new(ActionKind::new("counter", "fail")))
            .unwrap_err();

        assert!(matches!(err, DispatchError::Reducer { .. }));
        assert_eq!(store.state().namespace("counter"), Some(&Value::from(1)));
    }

    #[test]
    fn test_reducer_does_not_mutate_input() {
        let store = counter_store(ComposedMiddleware::new());
        let before = store.state();
        let snapshot = before.clone();

        store.dispatch(increment()).unwrap();

        // the pre-dispatch snapshot is untouched; reducers replace, never
        // mutate in place
        assert_eq!(before, snapshot);
        assert_eq!(before.namespace("counter"), Some(&Value::from(0)));
    }

    #[test]
    fn test_listener_notified_per_change() {
        let store = counter_store(ComposedMiddleware::new());
        let notified = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&notified);
        let handle = store.subscribe(move |_state| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.dispatch(increment()).unwrap();
        store.dispatch(increment()).unwrap();
        assert_eq!(notified.load(Ordering::SeqCst), 2);

        drop(handle);
        store.dispatch(increment()).unwrap();
        assert_eq!(notified.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_noop_dispatch_does_not_notify() {
        let store = counter_store(ComposedMiddleware::new());
        let notified = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&notified);
        let _handle = store.subscribe(move |_state| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store
            .dispatch(Action::new(ActionKind::new("ghost", "nothing")))
            .unwrap();

        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[derive(Default)]
    struct CountingMiddleware {
        before_count: Arc<AtomicUsize>,
        after_count: Arc<AtomicUsize>,
    }

    impl Middleware for CountingMiddleware {
        fn before(&mut self, _action: &Action) {
            self.before_count.fetch_add(1, Ordering::SeqCst);
        }

        fn after(&mut self, _action: &Action, _state_changed: bool) {
            self.after_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_middleware_sees_every_dispatch() {
        let before = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));

        let mut composed = ComposedMiddleware::new();
        composed.add(CountingMiddleware {
            before_count: Arc::clone(&before),
            after_count: Arc::clone(&after),
        });

        let store = counter_store(composed);
        store.dispatch(increment()).unwrap();
        store
            .dispatch(Action::new(ActionKind::new("ghost", "nothing")))
            .unwrap();

        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(after.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_global_state_decode() {
        let store = counter_store(ComposedMiddleware::new());
        store.dispatch(increment()).unwrap();

        let state = store.state();
        assert_eq!(state.decode::<i64>("counter").unwrap(), 1);
        assert!(matches!(
            state.decode::<i64>("missing"),
            Err(DispatchError::UnknownNamespace(_))
        ));
    }
}
