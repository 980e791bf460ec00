//! modelx: model-based state management for async Rust apps
//!
//! Like Redux with sagas, but for tokio: state lives in a central store
//! partitioned into namespaced models, mutations flow through dispatched
//! actions and pure reducers, and side effects run as async closures with
//! `put`/`call`/`select` over the store.
//!
//! # Example
//! ```ignore
//! use modelx::prelude::*;
//!
//! #[derive(ModelAction, Clone, Debug)]
//! #[action(namespace = "counter")]
//! enum CounterAction {
//!     Increment,
//!     Set(i64),
//! }
//!
//! let model = Model::builder("counter", 0i64)
//!     .reducer("increment", |count: i64, _action| count + 1)
//!     .build()?;
//!
//! let mut app = create(AppOptions::new());
//! app.model(model)?;
//! let running = app.start()?;
//! running.dispatch(CounterAction::Increment)?;
//! ```

// Re-export everything from core
pub use modelx_core::*;

// Re-export derive macros
pub use modelx_macros::ModelAction;

/// Prelude for convenient imports
pub mod prelude {
    // Actions
    pub use modelx_core::{Action, ActionKind, ModelAction};

    // App lifecycle
    pub use modelx_core::{create, App, AppOptions, Running};

    // Store
    pub use modelx_core::{
        ComposedMiddleware, Dispatcher, GlobalState, ListenerHandle, LoggingMiddleware,
        Middleware, NoopMiddleware, Store,
    };

    // Models and effects
    pub use modelx_core::{
        Dispatched, EffectContext, InvocationStrategy, Model, ModelBuilder,
    };

    // Subscriptions
    pub use modelx_core::{SubscriptionContext, SubscriptionHandle, Teardown};

    // Bridge
    pub use modelx_core::{Transition, TransitionScope, UpdateBridge};

    // Errors
    pub use modelx_core::{
        ConfigError, DispatchError, EffectError, SubscriptionFailure,
    };

    // Derive macros
    pub use modelx_macros::ModelAction;

    #[cfg(feature = "loading")]
    pub use modelx_core::{LoadingState, LOADING_NAMESPACE};
}
