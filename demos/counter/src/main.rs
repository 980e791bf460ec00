//! Counter - Minimal modelx example
//!
//! This example demonstrates the core pattern in ~100 lines:
//! - Model: one namespace of state + reducers + effects + subscriptions
//! - Actions: what can happen
//! - Effect: async work that puts result actions back
//! - Subscription: a clock ticking the counter once a second
//! - App lifecycle: create -> model -> start -> stop

use std::time::Duration;

use modelx::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// State - What the app knows
// ============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Counter {
    count: i64,
}

// ============================================================================
// Actions - What can happen
// ============================================================================

#[derive(ModelAction, Clone, Debug)]
#[action(namespace = "counter")]
enum CounterAction {
    Increment,
    Set(i64),
    Load,
    Tick,
}

// ============================================================================
// Model - State + reducers + an effect + a clock subscription
// ============================================================================

fn counter_model() -> Result<Model, ConfigError> {
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
            // stand-in for a backend call
            let value = ctx
                .call(async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<i64, anyhow::Error>(40)
                })
                .await?;
            ctx.put(CounterAction::Set(value))?;
            Ok(())
        })
        .subscription("clock", |ctx| {
            Ok(Some(ctx.interval(Duration::from_secs(1), || {
                CounterAction::Tick.into()
            })))
        })
        .build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut app = create(AppOptions::new().middleware(LoggingMiddleware::new()).with_loading());
    app.model(counter_model()?)?;
    let running = app.start()?;

    let _listener = running.subscribe(|state: &GlobalState| {
        if let Ok(counter) = state.decode::<Counter>("counter") {
            println!("count = {}", counter.count);
        }
    });

    // seed the counter from the fake backend, then bump it twice in one batch
    running.dispatch(CounterAction::Load)?.await?;
    running.bridge().with_batch(|| {
        for _ in 0..2 {
            if let Err(err) = running.dispatch(CounterAction::Increment) {
                eprintln!("dispatch failed: {err}");
            }
        }
    });

    // let the clock subscription tick a few times
    tokio::time::sleep(Duration::from_secs(3)).await;

    let counter: Counter = running.state().decode("counter")?;
    println!("final count = {}", counter.count);

    running.stop();
    Ok(())
}
