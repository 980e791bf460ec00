//! Application lifecycle: create → model → start → stop
//!
//! [`create`] builds an [`App`]; models are registered with
//! [`App::model`] (duplicate namespaces fail fast); [`App::start`] assembles
//! the store from every registered model, starts the subscriptions, and
//! hands back a [`Running`] handle carrying the full dispatch/read surface.
//!
//! There is no ambient global store: everything flows through the handles a
//! `Running` gives out, so multiple apps can coexist in one process.
//!
//! # Example
//!
//! ```ignore
//! let mut app = create(AppOptions::new());
//! app.model(counter_model()?)?;
//! let running = app.start()?;
//!
//! running.dispatch(Action::new(ActionKind::new("counter", "increment")))?;
//! assert_eq!(running.state().decode::<Counter>("counter")?.count, 1);
//!
//! running.stop();
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::action::{Action, ActionKind};
use crate::bridge::UpdateBridge;
use crate::effect::Dispatched;
use crate::error::{ConfigError, DispatchError, EffectError, SubscriptionFailure};
use crate::model::Model;
use crate::store::{
    ComposedMiddleware, Dispatcher, ErrorHook, GlobalState, ListenerHandle, Middleware, Store,
    StoreParts,
};
use crate::subscriptions::{SetupFn, SubscriptionSet};

/// Create an application from options.
pub fn create(options: AppOptions) -> App {
    App {
        options,
        models: Vec::new(),
        namespaces: HashSet::new(),
    }
}

/// Options applied at [`App::start`].
#[derive(Default)]
pub struct AppOptions {
    initial_state: HashMap<String, Value>,
    middleware: ComposedMiddleware,
    on_error: Option<ErrorHook>,
    #[cfg(feature = "loading")]
    loading: bool,
}

impl AppOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override a namespace's initial state.
    ///
    /// Applied over the model's own initial state at start; namespaces
    /// without a model are seeded as read-only state.
    pub fn initial_state<T: Serialize>(
        mut self,
        namespace: impl Into<String>,
        state: T,
    ) -> Result<Self, serde_json::Error> {
        self.initial_state
            .insert(namespace.into(), serde_json::to_value(state)?);
        Ok(self)
    }

    /// Add a dispatch middleware.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.add(middleware);
        self
    }

    /// Hook invoked for effect failures that nobody awaited.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&EffectError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Track in-flight effects under the reserved `loading` namespace.
    #[cfg(feature = "loading")]
    pub fn with_loading(mut self) -> Self {
        self.loading = true;
        self
    }
}

/// An application being assembled: options plus registered models.
pub struct App {
    options: AppOptions,
    models: Vec<Model>,
    namespaces: HashSet<String>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("models", &self.models.len())
            .field("namespaces", &self.namespaces)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Register a model. Registering two models with the same namespace is a
    /// configuration error.
    pub fn model(&mut self, model: Model) -> Result<&mut Self, ConfigError> {
        if !self.namespaces.insert(model.namespace.clone()) {
            return Err(ConfigError::DuplicateNamespace(model.namespace));
        }
        self.models.push(model);
        Ok(self)
    }

    /// Construct the store, start every subscription, and return the running
    /// app.
    ///
    /// Subscription setup failures are not fatal; they are collected and
    /// exposed via [`Running::subscription_failures`].
    pub fn start(mut self) -> Result<Running, ConfigError> {
        let mut parts = StoreParts {
            middleware: self.options.middleware,
            on_error: self.options.on_error,
            ..StoreParts::default()
        };

        #[cfg(feature = "loading")]
        if self.options.loading {
            if self.namespaces.contains(crate::loading::LOADING_NAMESPACE) {
                return Err(ConfigError::DuplicateNamespace(
                    crate::loading::LOADING_NAMESPACE.to_string(),
                ));
            }
            self.models.push(crate::loading::loading_model()?);
            parts.hooks.push(Arc::new(crate::loading::LoadingHook));
        }
        let mut setups: Vec<(String, String, SetupFn)> = Vec::new();

        for model in self.models {
            let namespace = model.namespace;
            let initial = self
                .options
                .initial_state
                .remove(&namespace)
                .unwrap_or(model.initial);
            parts.initial.insert(namespace.clone(), initial);
            parts.reducers.insert(namespace.clone(), model.reducers);
            for (name, entry) in model.effects {
                parts
                    .effects
                    .insert(ActionKind::new(namespace.clone(), name), entry);
            }
            for (name, setup) in model.subscriptions {
                setups.push((
                    format!("{namespace}/{name}"),
                    namespace.clone(),
                    setup,
                ));
            }
        }

        // leftover overrides become plain read-only namespaces
        for (namespace, value) in self.options.initial_state {
            parts.initial.insert(namespace, value);
        }

        let store = Store::from_parts(parts);
        let (subscriptions, failures) = SubscriptionSet::start(setups, &store.dispatcher());

        Ok(Running {
            store,
            subscriptions,
            failures,
        })
    }
}

/// A started application.
///
/// Dropping (or calling [`stop`](Self::stop)) tears down every subscription
/// exactly once and aborts in-flight effect workers.
pub struct Running {
    store: Store,
    subscriptions: SubscriptionSet,
    failures: Vec<SubscriptionFailure>,
}

impl std::fmt::Debug for Running {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Running")
            .field("failures", &self.failures.len())
            .finish_non_exhaustive()
    }
}

impl Running {
    /// Dispatch an action.
    ///
    /// The matching reducer runs synchronously; the returned ticket is
    /// awaitable when the kind matched an effect.
    pub fn dispatch(&self, action: impl Into<Action>) -> Result<Dispatched, DispatchError> {
        self.store.dispatch(action)
    }

    /// A cheap dispatch handle for other tasks.
    pub fn dispatcher(&self) -> Dispatcher {
        self.store.dispatcher()
    }

    /// A snapshot of the global state.
    pub fn state(&self) -> GlobalState {
        self.store.state()
    }

    /// Read derived state without cloning the whole tree.
    pub fn select<T>(&self, f: impl FnOnce(&GlobalState) -> T) -> T {
        self.store.select(f)
    }

    /// Register a change listener; removed when the handle drops.
    pub fn subscribe(
        &self,
        listener: impl Fn(&GlobalState) + Send + Sync + 'static,
    ) -> ListenerHandle {
        self.store.subscribe(listener)
    }

    /// The concurrent-update bridge over this app's store.
    pub fn bridge(&self) -> UpdateBridge {
        self.store.bridge()
    }

    /// The underlying store handle.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Subscription setups that failed at start, in registration order.
    pub fn subscription_failures(&self) -> &[SubscriptionFailure] {
        &self.failures
    }

    /// Shut the app down: tear down subscriptions and abort in-flight effect
    /// workers. Equivalent to dropping, but explicit at call sites.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.subscriptions.stop();
        self.store.inner.shutdown();
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.shutdown();
    }
}
