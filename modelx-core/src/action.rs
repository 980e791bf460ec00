//! Actions: namespaced, payload-carrying state-change requests
//!
//! Every dispatch goes through the runtime [`Action`] shape: a parsed
//! `"namespace/name"` [`ActionKind`] plus an optional JSON payload. Typed
//! action enums implement [`ModelAction`] (usually via `#[derive(ModelAction)]`
//! from `modelx-macros`) and convert into this shape at the dispatch boundary,
//! so dispatch stays string-keyed at runtime while call sites stay typed.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::ActionKindError;

/// A fully-qualified action kind: `namespace/name`.
///
/// Both halves must be non-empty and the name half must not contain `/`.
///
/// # Examples
///
/// ```
/// use modelx_core::ActionKind;
///
/// let kind = ActionKind::new("counter", "increment");
/// assert_eq!(kind.namespace(), "counter");
/// assert_eq!(kind.name(), "increment");
/// assert_eq!(kind.to_string(), "counter/increment");
///
/// let parsed: ActionKind = "counter/increment".parse().unwrap();
/// assert_eq!(parsed, kind);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActionKind {
    namespace: String,
    name: String,
}

impl ActionKind {
    /// Create a kind from its two halves.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse a `"namespace/name"` string.
    pub fn parse(s: &str) -> Result<Self, ActionKindError> {
        match s.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(ns, name))
            }
            _ => Err(ActionKindError(s.to_string())),
        }
    }

    /// The namespace half.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The name half.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ActionKind {
    type Err = ActionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// An immutable state-change request.
///
/// Created by UI code, effects and subscriptions; consumed by the reducer
/// registry and, when the kind matches one, the effect runner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

impl Action {
    /// Create an action with no payload.
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    /// Create an action carrying a serializable payload.
    pub fn with_payload<T: Serialize>(
        kind: ActionKind,
        payload: T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind,
            payload: Some(serde_json::to_value(payload)?),
        })
    }

    /// The action kind.
    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    /// The raw payload, if any.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Decode the payload into a concrete type.
    ///
    /// A missing payload decodes as JSON `null`, so `Option<T>` payloads
    /// come back as `None` rather than an error.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let value = self.payload.clone().unwrap_or(Value::Null);
        serde_json::from_value(value)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

/// Trait for typed action enums that dispatch through the runtime boundary.
///
/// Implementations should be:
/// - Clone: actions may be logged or replayed
/// - Debug: for logging
/// - Send + 'static: for dispatch from async tasks
///
/// Use `#[derive(ModelAction)]` from `modelx-macros` to auto-implement this
/// trait for a `#[action(namespace = "...")]` enum.
pub trait ModelAction: Clone + fmt::Debug + Send + 'static {
    /// The fully-qualified kind this value dispatches as.
    fn kind(&self) -> ActionKind;

    /// The payload carried by this value, if any.
    fn payload(&self) -> Option<Value> {
        None
    }
}

impl<T: ModelAction> From<T> for Action {
    fn from(value: T) -> Self {
        Self {
            kind: value.kind(),
            payload: value.payload(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        let kind = ActionKind::new("counter", "increment");
        assert_eq!(kind.to_string(), "counter/increment");
        assert_eq!(ActionKind::parse("counter/increment").unwrap(), kind);
    }

    #[test]
    fn test_kind_rejects_malformed() {
        assert!(ActionKind::parse("").is_err());
        assert!(ActionKind::parse("counter").is_err());
        assert!(ActionKind::parse("/increment").is_err());
        assert!(ActionKind::parse("counter/").is_err());
        assert!(ActionKind::parse("a/b/c").is_err());
    }

    #[test]
    fn test_kind_serde_as_string() {
        let kind = ActionKind::new("todos", "add");
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, "\"todos/add\"");
        let back: ActionKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }

    #[test]
    fn test_action_payload_decode() {
        let action = Action::with_payload(ActionKind::new("counter", "set"), 42u64).unwrap();
        assert_eq!(action.payload_as::<u64>().unwrap(), 42);
    }

    #[test]
    fn test_missing_payload_decodes_as_none() {
        let action = Action::new(ActionKind::new("counter", "increment"));
        assert_eq!(action.payload_as::<Option<u64>>().unwrap(), None);
        assert!(action.payload_as::<u64>().is_err());
    }

    #[derive(Clone, Debug)]
    enum TypedAction {
        Increment,
        Set(u64),
    }

    impl ModelAction for TypedAction {
        fn kind(&self) -> ActionKind {
            match self {
                TypedAction::Increment => ActionKind::new("counter", "increment"),
                TypedAction::Set(_) => ActionKind::new("counter", "set"),
            }
        }

        fn payload(&self) -> Option<Value> {
            match self {
                TypedAction::Increment => None,
                TypedAction::Set(n) => serde_json::to_value(n).ok(),
            }
        }
    }

    #[test]
    fn test_typed_action_into_runtime_shape() {
        let action: Action = TypedAction::Set(7).into();
        assert_eq!(action.kind().to_string(), "counter/set");
        assert_eq!(action.payload_as::<u64>().unwrap(), 7);

        let action: Action = TypedAction::Increment.into();
        assert!(action.payload().is_none());
    }
}
