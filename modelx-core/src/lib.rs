//! Core types and runtime for modelx
//!
//! This crate provides model-based state management for async Rust
//! applications, following a Redux/Elm-inspired architecture: state lives in
//! a central store partitioned into namespaces, mutations flow through
//! dispatched actions and pure reducers, and side effects run as async
//! closures with `put`/`call`/`select` over the store.
//!
//! # Core Concepts
//!
//! - **Action**: a namespaced, payload-carrying state-change request
//! - **Model**: one namespace's state, reducers, effects and subscriptions
//! - **Store**: centralized state container with linearized dispatch
//! - **Effect**: an async sequence of side-effecting operations triggered by
//!   an action
//! - **Subscription**: a long-lived action source started at boot and torn
//!   down at stop
//! - **Bridge**: batching and deferred reads for host rendering runtimes
//!
//! # Basic Example
//!
//! ```ignore
//! use modelx_core::prelude::*;
//!
//! #[derive(Clone, Debug, Default, Serialize, Deserialize)]
//! struct Counter {
//!     count: i64,
//! }
//!
//! let model = Model::builder("counter", Counter::default())
//!     .reducer("increment", |state: Counter, _action| Counter {
//!         count: state.count + 1,
//!     })
//!     .build()?;
//!
//! let mut app = create(AppOptions::new());
//! app.model(model)?;
//! let running = app.start()?;
//!
//! running.dispatch(Action::new(ActionKind::new("counter", "increment")))?;
//! assert_eq!(running.state().decode::<Counter>("counter")?.count, 1);
//! ```
//!
//! # Effects
//!
//! Effects follow a two-phase action pattern: an intent action triggers the
//! effect, and the effect `put`s result actions back through the reducers:
//!
//! ```ignore
//! Model::builder("weather", Weather::default())
//!     .try_reducer("did_load", |state: Weather, action: &Action| {
//!         Ok(Weather { report: action.payload_as()?, ..state })
//!     })
//!     .effect("fetch", |action, ctx| async move {
//!         let city: String = action.payload_as().map_err(anyhow::Error::from)?;
//!         let report = ctx.call(api::fetch(&city)).await?;
//!         ctx.put(Action::with_payload(
//!             ActionKind::new("weather", "did_load"),
//!             report,
//!         )?)?;
//!         Ok(())
//!     })
//! ```
//!
//! Dispatching `weather/fetch` returns a ticket that resolves when the
//! effect completes, so callers may await it or let it run fire-and-forget.

pub mod action;
pub mod app;
pub mod bridge;
pub mod effect;
pub mod error;
#[cfg(feature = "loading")]
pub mod loading;
pub mod model;
pub mod store;
pub mod subscriptions;
pub mod tasks;
pub mod testing;

// Action exports
pub use action::{Action, ActionKind, ModelAction};

// App lifecycle exports
pub use app::{create, App, AppOptions, Running};

// Bridge exports
pub use bridge::{Transition, TransitionScope, UpdateBridge};

// Effect exports
pub use effect::{Dispatched, EffectContext, EffectHook};

// Error exports
pub use error::{
    ActionDecodeError, ActionKindError, ConfigError, DispatchError, EffectError,
    SubscriptionFailure,
};

/// Support items referenced by `modelx-macros` expansions. Not public API.
#[doc(hidden)]
pub mod macro_support {
    pub use serde_json::{from_value, to_value, Map, Value};
}

// Model exports
pub use model::{Model, ModelBuilder};

// Store exports
pub use store::{
    ComposedMiddleware, Dispatcher, DynReducer, GlobalState, ListenerHandle, LoggingMiddleware,
    Middleware, NoopMiddleware, Store,
};

// Subscription exports
pub use subscriptions::{SubscriptionContext, SubscriptionHandle, Teardown};

// Task exports
pub use tasks::InvocationStrategy;

// Loading plugin exports (requires "loading" feature)
#[cfg(feature = "loading")]
pub use loading::{LoadingState, LOADING_NAMESPACE};

// Testing exports
pub use testing::TestHarness;

#[cfg(feature = "testing-time")]
pub use testing::{advance_time, pause_time, resume_time};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{Action, ActionKind, ModelAction};
    pub use crate::app::{create, App, AppOptions, Running};
    pub use crate::bridge::{Transition, TransitionScope, UpdateBridge};
    pub use crate::effect::{Dispatched, EffectContext};
    pub use crate::error::{
        ConfigError, DispatchError, EffectError, SubscriptionFailure,
    };
    pub use crate::model::{Model, ModelBuilder};
    pub use crate::store::{
        ComposedMiddleware, Dispatcher, GlobalState, ListenerHandle, LoggingMiddleware,
        Middleware, NoopMiddleware, Store,
    };
    pub use crate::subscriptions::{SubscriptionContext, SubscriptionHandle, Teardown};
    pub use crate::tasks::InvocationStrategy;

    #[cfg(feature = "loading")]
    pub use crate::loading::{LoadingState, LOADING_NAMESPACE};
}
