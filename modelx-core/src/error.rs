//! Error types for configuration, dispatch, effects and subscriptions

use thiserror::Error;

use crate::action::ActionKind;

/// A string that does not parse as `namespace/name`.
#[derive(Debug, Clone, Error)]
#[error("invalid action kind `{0}`: expected `namespace/name`")]
pub struct ActionKindError(pub String);

/// Programmer errors caught at registration/start time.
///
/// These fail fast and synchronously; they are not runtime conditions to
/// recover from.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a model with namespace `{0}` is already registered")]
    DuplicateNamespace(String),

    #[error("namespace `{0}` must be non-empty and must not contain `/`")]
    InvalidNamespace(String),

    #[error("model `{namespace}` already defines reducer `{name}`")]
    DuplicateReducer { namespace: String, name: String },

    #[error("model `{namespace}` already defines effect `{name}`")]
    DuplicateEffect { namespace: String, name: String },

    #[error("model `{namespace}` already defines subscription `{name}`")]
    DuplicateSubscription { namespace: String, name: String },

    #[error("initial state for `{namespace}` is not serializable: {source}")]
    InitialState {
        namespace: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced synchronously at the dispatch call site.
///
/// When a reducer fails the store keeps its pre-dispatch value; the next
/// state is fully computed before it is installed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to decode `{namespace}` state: {source}")]
    StateDecode {
        namespace: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode `{namespace}` state: {source}")]
    StateEncode {
        namespace: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("reducer for `{kind}` failed: {source}")]
    Reducer {
        kind: ActionKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("no state registered under namespace `{0}`")]
    UnknownNamespace(String),
}

/// Failure of a single effect invocation.
///
/// Propagated through the [`Dispatched`](crate::effect::Dispatched) ticket to
/// whoever awaits it; failures nobody awaits go to the app's `on_error` hook.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("effect `{kind}` was superseded or shut down before completing")]
    Cancelled { kind: ActionKind },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure to decode a runtime [`Action`](crate::action::Action) back into a
/// typed action enum.
#[derive(Debug, Error)]
pub enum ActionDecodeError {
    #[error("action `{0}` does not belong to this enum")]
    UnknownKind(ActionKind),

    #[error("failed to decode payload for `{kind}`: {source}")]
    Payload {
        kind: ActionKind,
        #[source]
        source: serde_json::Error,
    },
}

/// A subscription whose setup failed at start.
///
/// Setup failures are collected, not fail-fast: remaining subscriptions still
/// start and the aggregate is surfaced after all setups have been attempted.
#[derive(Debug, Error)]
#[error("subscription `{name}` failed to start: {source}")]
pub struct SubscriptionFailure {
    /// Qualified `namespace/name` of the failed subscription.
    pub name: String,
    #[source]
    pub source: anyhow::Error,
}
