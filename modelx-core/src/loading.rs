//! Loading plugin: in-flight effect tracking under a reserved namespace
//!
//! Enabled with [`AppOptions::with_loading`](crate::app::AppOptions::with_loading).
//! Installs a `loading` model whose state mirrors which effects are currently
//! running:
//!
//! ```json
//! {
//!   "global": true,
//!   "models": { "counter": true },
//!   "effects": { "counter/load": true }
//! }
//! ```
//!
//! Driven by the effect lifecycle hooks: every start dispatches
//! `loading/show` with the effect kind as payload, every finish dispatches
//! `loading/hide`. Overlapping invocations of one kind are reference-counted
//! so the flag only clears when the last one finishes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionKind};
use crate::effect::EffectHook;
use crate::error::ConfigError;
use crate::model::Model;
use crate::store::Dispatcher;

/// The namespace reserved by this plugin.
pub const LOADING_NAMESPACE: &str = "loading";

/// State of the `loading` namespace.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadingState {
    /// Whether any effect is in flight.
    pub global: bool,
    /// Per-namespace flag: any effect of that model in flight.
    pub models: HashMap<String, bool>,
    /// Per-kind flag.
    pub effects: HashMap<String, bool>,
    counters: HashMap<String, u32>,
}

impl LoadingState {
    fn shift(mut self, kind: &str, delta: i32) -> Self {
        let count = self.counters.entry(kind.to_string()).or_insert(0);
        *count = count.saturating_add_signed(delta);
        self.recompute();
        self
    }

    fn recompute(&mut self) {
        self.effects.clear();
        self.models.clear();
        self.global = false;
        for (kind, count) in &self.counters {
            let active = *count > 0;
            self.effects.insert(kind.clone(), active);
            if let Some((namespace, _)) = kind.split_once('/') {
                let entry = self.models.entry(namespace.to_string()).or_insert(false);
                *entry = *entry || active;
            }
            self.global = self.global || active;
        }
    }
}

pub(crate) fn loading_model() -> Result<Model, ConfigError> {
    Model::builder(LOADING_NAMESPACE, LoadingState::default())
        .try_reducer("show", |state: LoadingState, action: &Action| {
            let kind: String = action.payload_as()?;
            Ok::<_, anyhow::Error>(state.shift(&kind, 1))
        })
        .try_reducer("hide", |state: LoadingState, action: &Action| {
            let kind: String = action.payload_as()?;
            Ok::<_, anyhow::Error>(state.shift(&kind, -1))
        })
        .build()
}

pub(crate) struct LoadingHook;

impl LoadingHook {
    fn mark(&self, name: &str, kind: &ActionKind, dispatcher: &Dispatcher) {
        // the plugin's own dispatches must not feed back into itself
        if kind.namespace() == LOADING_NAMESPACE {
            return;
        }
        let action =
            Action::with_payload(ActionKind::new(LOADING_NAMESPACE, name), kind.to_string());
        match action {
            Ok(action) => {
                if let Err(err) = dispatcher.dispatch(action) {
                    tracing::warn!(kind = %kind, error = %err, "loading update failed");
                }
            }
            Err(err) => {
                tracing::warn!(kind = %kind, error = %err, "loading payload encode failed");
            }
        }
    }
}

impl EffectHook for LoadingHook {
    fn effect_started(&self, kind: &ActionKind, dispatcher: &Dispatcher) {
        self.mark("show", kind, dispatcher);
    }

    fn effect_finished(&self, kind: &ActionKind, _ok: bool, dispatcher: &Dispatcher) {
        self.mark("hide", kind, dispatcher);
    }
}
