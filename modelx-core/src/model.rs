//! Models: namespaced bundles of state, reducers, effects and subscriptions
//!
//! A model owns one namespace of the global state tree. It is assembled with
//! a typed [`ModelBuilder`] and registered on an `App` before start; after
//! registration it is immutable.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Clone, Debug, Default, Serialize, Deserialize)]
//! struct Counter {
//!     count: i64,
//! }
//!
//! let model = Model::builder("counter", Counter::default())
//!     .reducer("increment", |state: Counter, _action| Counter {
//!         count: state.count + 1,
//!     })
//!     .effect("load", |_action, ctx| async move {
//!         let value = ctx.call(fetch_count()).await?;
//!         ctx.put(Action::with_payload(ActionKind::new("counter", "set"), value)?)?;
//!         Ok(())
//!     })
//!     .subscription("clock", |ctx| {
//!         Ok(Some(ctx.interval(Duration::from_secs(1), || {
//!             Action::new(ActionKind::new("counter", "increment"))
//!         })))
//!     })
//!     .build()?;
//! ```

use std::collections::{HashMap, HashSet};
use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::action::Action;
use crate::effect::{DynEffect, EffectContext, EffectFuture};
use crate::error::{ConfigError, DispatchError, EffectError};
use crate::store::DynReducer;
use crate::subscriptions::{SetupFn, SubscriptionContext, Teardown};
use crate::tasks::InvocationStrategy;

pub(crate) struct EffectEntry {
    pub(crate) runner: DynEffect,
    pub(crate) strategy: InvocationStrategy,
}

/// A registered model: one namespace's state, reducers, effects and
/// subscriptions.
pub struct Model {
    pub(crate) namespace: String,
    pub(crate) initial: Value,
    pub(crate) reducers: HashMap<String, DynReducer>,
    pub(crate) effects: HashMap<String, EffectEntry>,
    pub(crate) subscriptions: Vec<(String, SetupFn)>,
}

impl Model {
    /// Start building a model for `namespace` with a typed initial state.
    pub fn builder<S>(namespace: impl Into<String>, initial: S) -> ModelBuilder<S>
    where
        S: Serialize + DeserializeOwned + Send + 'static,
    {
        ModelBuilder {
            namespace: namespace.into(),
            initial,
            reducers: HashMap::new(),
            effects: HashMap::new(),
            subscriptions: Vec::new(),
            subscription_names: HashSet::new(),
            error: None,
        }
    }

    /// The namespace this model owns.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("namespace", &self.namespace)
            .field("reducers", &self.reducers.keys().collect::<Vec<_>>())
            .field("effects", &self.effects.keys().collect::<Vec<_>>())
            .field(
                "subscriptions",
                &self
                    .subscriptions
                    .iter()
                    .map(|(name, _)| name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Typed builder for [`Model`].
///
/// Reducers and effects registered here are wrapped into the dynamic
/// registry with a serde round-trip of the namespace state; decode and
/// encode failures surface as [`DispatchError`] at the dispatch call site.
pub struct ModelBuilder<S> {
    namespace: String,
    initial: S,
    reducers: HashMap<String, DynReducer>,
    effects: HashMap<String, EffectEntry>,
    subscriptions: Vec<(String, SetupFn)>,
    subscription_names: HashSet<String>,
    error: Option<ConfigError>,
}

impl<S> ModelBuilder<S>
where
    S: Serialize + DeserializeOwned + Send + 'static,
{
    /// Register a pure reducer: `(state, action) -> next state`.
    pub fn reducer<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(S, &Action) -> S + Send + Sync + 'static,
    {
        self.try_reducer(name, move |state, action| {
            Ok::<_, anyhow::Error>(f(state, action))
        })
    }

    /// Register a fallible reducer. An `Err` propagates to the dispatch call
    /// site and leaves the namespace state at its pre-dispatch value.
    pub fn try_reducer<F, E>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(S, &Action) -> Result<S, E> + Send + Sync + 'static,
        E: Into<anyhow::Error>,
    {
        let name = name.into();
        if self.reducers.contains_key(&name) {
            self.fail(ConfigError::DuplicateReducer {
                namespace: self.namespace.clone(),
                name,
            });
            return self;
        }

        let namespace = self.namespace.clone();
        let wrapped: DynReducer = std::sync::Arc::new(move |value, action| {
            let state: S =
                serde_json::from_value(value.clone()).map_err(|source| {
                    DispatchError::StateDecode {
                        namespace: namespace.clone(),
                        source,
                    }
                })?;
            let next = f(state, action).map_err(|source| DispatchError::Reducer {
                kind: action.kind().clone(),
                source: source.into(),
            })?;
            serde_json::to_value(next).map_err(|source| DispatchError::StateEncode {
                namespace: namespace.clone(),
                source,
            })
        });
        self.reducers.insert(name, wrapped);
        self
    }

    /// Register an effect with the default [`Parallel`](InvocationStrategy::Parallel)
    /// strategy.
    pub fn effect<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Action, EffectContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EffectError>> + Send + 'static,
    {
        self.effect_with(name, InvocationStrategy::Parallel, f)
    }

    /// Register an effect with an explicit invocation strategy.
    pub fn effect_with<F, Fut>(
        mut self,
        name: impl Into<String>,
        strategy: InvocationStrategy,
        f: F,
    ) -> Self
    where
        F: Fn(Action, EffectContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EffectError>> + Send + 'static,
    {
        let name = name.into();
        if self.effects.contains_key(&name) {
            self.fail(ConfigError::DuplicateEffect {
                namespace: self.namespace.clone(),
                name,
            });
            return self;
        }

        let runner: DynEffect =
            std::sync::Arc::new(move |action, ctx| -> EffectFuture { Box::pin(f(action, ctx)) });
        self.effects.insert(name, EffectEntry { runner, strategy });
        self
    }

    /// Register a subscription.
    ///
    /// The setup runs once at application start and may return a teardown,
    /// invoked exactly once at stop.
    pub fn subscription<F>(mut self, name: impl Into<String>, setup: F) -> Self
    where
        F: FnOnce(&SubscriptionContext) -> anyhow::Result<Option<Teardown>> + Send + 'static,
    {
        let name = name.into();
        if !self.subscription_names.insert(name.clone()) {
            self.fail(ConfigError::DuplicateSubscription {
                namespace: self.namespace.clone(),
                name,
            });
            return self;
        }
        self.subscriptions.push((name, Box::new(setup)));
        self
    }

    /// Finish the model. Returns the first registration error, if any.
    pub fn build(self) -> Result<Model, ConfigError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.namespace.is_empty() || self.namespace.contains('/') {
            return Err(ConfigError::InvalidNamespace(self.namespace));
        }
        let initial =
            serde_json::to_value(&self.initial).map_err(|source| ConfigError::InitialState {
                namespace: self.namespace.clone(),
                source,
            })?;
        Ok(Model {
            namespace: self.namespace,
            initial,
            reducers: self.reducers,
            effects: self.effects,
            subscriptions: self.subscriptions,
        })
    }

    // keep the first error; later ones are usually cascading noise
    fn fail(&mut self, error: ConfigError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}
