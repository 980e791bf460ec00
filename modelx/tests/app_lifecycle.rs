//! End-to-end tests over the full create → model → start → stop lifecycle

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use modelx::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Counter {
    count: i64,
}

#[derive(ModelAction, Clone, Debug)]
#[action(namespace = "counter")]
enum CounterAction {
    Increment,
    Set(i64),
    Load,
    Tick,
}

fn counter_model() -> Model {
    Model::builder("counter", Counter::default())
        .reducer("increment", |state: Counter, _action| Counter {
            count: state.count + 1,
        })
        .reducer("tick", |state: Counter, _action| Counter {
            count: state.count + 1,
        })
        .try_reducer("set", |_state: Counter, action: &Action| {
            Ok::<_, anyhow::Error>(Counter {
                count: action.payload_as()?,
            })
        })
        .effect("load", |_action, ctx| async move {
            let value = ctx.call(async { Ok::<i64, anyhow::Error>(42) }).await?;
            ctx.put(CounterAction::Set(value))?;
            Ok(())
        })
        .build()
        .expect("counter model builds")
}

#[tokio::test]
async fn test_three_increments_leave_state_at_three() {
    let mut app = create(AppOptions::new());
    app.model(counter_model()).unwrap();
    let running = app.start().unwrap();

    for _ in 0..3 {
        running.dispatch(CounterAction::Increment).unwrap();
    }

    assert_eq!(
        running.state().decode::<Counter>("counter").unwrap(),
        Counter { count: 3 }
    );
    running.stop();
}

#[tokio::test]
async fn test_effect_awaits_call_then_puts() {
    let mut app = create(AppOptions::new());
    app.model(counter_model()).unwrap();
    let running = app.start().unwrap();

    let dispatched = running.dispatch(CounterAction::Load).unwrap();
    assert!(dispatched.triggered_effect());
    dispatched.await.unwrap();

    assert_eq!(
        running.state().decode::<Counter>("counter").unwrap(),
        Counter { count: 42 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_interval_subscription_under_virtual_time() {
    let model = Model::builder("counter", Counter::default())
        .reducer("tick", |state: Counter, _action| Counter {
            count: state.count + 1,
        })
        .subscription("clock", |ctx| {
            Ok(Some(ctx.interval(Duration::from_secs(1), || {
                CounterAction::Tick.into()
            })))
        })
        .build()
        .unwrap();

    let mut app = create(AppOptions::new());
    app.model(model).unwrap();
    let running = app.start().unwrap();
    assert!(running.subscription_failures().is_empty());

    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
    }
    assert_eq!(
        running.state().decode::<Counter>("counter").unwrap(),
        Counter { count: 3 }
    );

    let dispatcher = running.dispatcher();
    running.stop();

    // no further increments after stop, however far time advances
    for _ in 0..5 {
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
    }
    assert_eq!(
        dispatcher.state().decode::<Counter>("counter").unwrap(),
        Counter { count: 3 }
    );
}

#[tokio::test]
async fn test_batched_dispatches_notify_once_in_order() {
    let mut app = create(AppOptions::new());
    app.model(counter_model()).unwrap();
    let running = app.start().unwrap();

    let notifications = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notifications);
    let _listener = running.subscribe(move |state: &GlobalState| {
        sink.lock()
            .unwrap()
            .push(state.decode::<Counter>("counter").unwrap().count);
    });

    let bridge = running.bridge();
    bridge.with_batch(|| {
        running.dispatch(CounterAction::Set(10)).unwrap();
        running.dispatch(CounterAction::Increment).unwrap();
        running.dispatch(CounterAction::Increment).unwrap();
    });

    // one notification, final state reflecting a, b, c applied in order
    assert_eq!(*notifications.lock().unwrap(), vec![12]);
}

#[tokio::test]
async fn test_effect_failure_is_isolated_to_its_ticket() {
    let failing = Model::builder("jobs", Counter::default())
        .effect("explode", |_action, _ctx| async {
            Err(EffectError::Other(anyhow::anyhow!("boom")))
        })
        .build()
        .unwrap();

    let reported = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&reported);

    let mut app = create(AppOptions::new().on_error(move |_err| {
        sink.fetch_add(1, Ordering::SeqCst);
    }));
    app.model(counter_model()).unwrap();
    app.model(failing).unwrap();
    let running = app.start().unwrap();

    let err = running
        .dispatch(Action::new(ActionKind::new("jobs", "explode")))
        .unwrap()
        .await
        .unwrap_err();
    assert!(matches!(err, EffectError::Other(_)));

    // awaited failures bypass the hook; the counter model is untouched
    assert_eq!(reported.load(Ordering::SeqCst), 0);
    running.dispatch(CounterAction::Increment).unwrap();
    assert_eq!(
        running.state().decode::<Counter>("counter").unwrap(),
        Counter { count: 1 }
    );
}

#[tokio::test]
async fn test_take_latest_supersedes_previous_invocation() {
    let model = Model::builder("search", Vec::<String>::new())
        .try_reducer("did_search", |mut results: Vec<String>, action: &Action| {
            results.push(action.payload_as()?);
            Ok::<_, anyhow::Error>(results)
        })
        .effect_with(
            "query",
            InvocationStrategy::TakeLatest,
            |action: Action, ctx| async move {
                let term: String = action.payload_as().map_err(anyhow::Error::from)?;
                // simulate backend latency; a newer query lands here first
                tokio::time::sleep(Duration::from_millis(30)).await;
                ctx.put(
                    Action::with_payload(ActionKind::new("search", "did_search"), term)
                        .map_err(anyhow::Error::from)?,
                )?;
                Ok(())
            },
        )
        .build()
        .unwrap();

    let mut app = create(AppOptions::new());
    app.model(model).unwrap();
    let running = app.start().unwrap();

    let first = running
        .dispatch(Action::with_payload(ActionKind::new("search", "query"), "ru").unwrap())
        .unwrap();
    let second = running
        .dispatch(Action::with_payload(ActionKind::new("search", "query"), "rust").unwrap())
        .unwrap();

    let err = first.await.unwrap_err();
    assert!(matches!(err, EffectError::Cancelled { .. }));
    second.await.unwrap();

    assert_eq!(
        running.state().decode::<Vec<String>>("search").unwrap(),
        vec!["rust"]
    );
}
