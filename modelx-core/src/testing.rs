//! Test utilities for modelx applications
//!
//! - [`TestHarness`]: starts an app with a recording change listener so tests
//!   can assert on notification counts and observed snapshots
//! - time helpers (`pause_time` / `advance_time` / `resume_time`) behind the
//!   `testing-time` feature, for driving interval subscriptions and
//!   debounced effects under virtual time
//!
//! # Example
//!
//! ```ignore
//! let mut app = create(AppOptions::new());
//! app.model(counter_model()?)?;
//! let harness = TestHarness::start(app)?;
//!
//! harness.dispatch(Action::new(ActionKind::new("counter", "increment")))?;
//!
//! assert_eq!(harness.notification_count(), 1);
//! assert_eq!(harness.state().decode::<Counter>("counter")?.count, 1);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::action::Action;
use crate::app::{App, Running};
use crate::effect::Dispatched;
use crate::error::{ConfigError, DispatchError};
use crate::store::{GlobalState, ListenerHandle};

/// A started app plus a recording change listener.
pub struct TestHarness {
    running: Running,
    notifications: Arc<Mutex<Vec<GlobalState>>>,
    _listener: ListenerHandle,
}

impl TestHarness {
    /// Start the app and attach the recording listener.
    pub fn start(app: App) -> Result<Self, ConfigError> {
        let running = app.start()?;
        let notifications = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&notifications);
        let listener = running.subscribe(move |state| {
            sink.lock().push(state.clone());
        });
        Ok(Self {
            running,
            notifications,
            _listener: listener,
        })
    }

    /// The running app under test.
    pub fn running(&self) -> &Running {
        &self.running
    }

    /// Dispatch an action.
    pub fn dispatch(&self, action: impl Into<Action>) -> Result<Dispatched, DispatchError> {
        self.running.dispatch(action)
    }

    /// A snapshot of the current global state.
    pub fn state(&self) -> GlobalState {
        self.running.state()
    }

    /// How many change notifications have been delivered so far.
    pub fn notification_count(&self) -> usize {
        self.notifications.lock().len()
    }

    /// Take every recorded notification snapshot, clearing the record.
    pub fn drain_notifications(&self) -> Vec<GlobalState> {
        std::mem::take(&mut *self.notifications.lock())
    }
}

/// Pause the tokio clock. See `tokio::time::pause`.
#[cfg(feature = "testing-time")]
pub fn pause_time() {
    tokio::time::pause();
}

/// Advance the paused tokio clock.
#[cfg(feature = "testing-time")]
pub async fn advance_time(duration: std::time::Duration) {
    tokio::time::advance(duration).await;
}

/// Resume the tokio clock.
#[cfg(feature = "testing-time")]
pub fn resume_time() {
    tokio::time::resume();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::app::{create, AppOptions};
    use crate::model::Model;

    fn counter_app() -> App {
        let model = Model::builder("counter", 0i64)
            .reducer("increment", |count: i64, _action| count + 1)
            .build()
            .unwrap();
        let mut app = create(AppOptions::new());
        app.model(model).unwrap();
        app
    }

    #[tokio::test]
    async fn test_harness_records_notifications() {
        let harness = TestHarness::start(counter_app()).unwrap();

        harness
            .dispatch(Action::new(ActionKind::new("counter", "increment")))
            .unwrap();
        harness
            .dispatch(Action::new(ActionKind::new("counter", "increment")))
            .unwrap();

        assert_eq!(harness.notification_count(), 2);
        let snapshots = harness.drain_notifications();
        assert_eq!(snapshots[0].decode::<i64>("counter").unwrap(), 1);
        assert_eq!(snapshots[1].decode::<i64>("counter").unwrap(), 2);
        assert_eq!(harness.notification_count(), 0);
    }
}
