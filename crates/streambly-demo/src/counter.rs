#![forbid(unsafe_code)]

//! Counter app: a manually driven `math` value and a timer-driven
//! `auto_count`.
//!
//! The timer is a channel of ticks drained by a local task. Stopping the
//! stream aborts that task, so ticks sent afterwards go nowhere.

use futures::channel::mpsc;
use futures::executor::LocalSpawner;
use futures::future::{self, abortable};
use futures::task::LocalSpawnExt;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use streambly::{BoxError, Handle, Mutation, Start, Started};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    pub auto_count: u64,
    pub math: i64,
}

/// Operations exposed to callers.
#[derive(Debug, Clone)]
pub struct CounterApi {
    handle: Handle<CounterState>,
}

impl CounterApi {
    pub fn inc(&self) -> Mutation {
        self.handle.update(|s| CounterState {
            math: s.math + 1,
            ..s.clone()
        })
    }

    pub fn minus(&self) -> Mutation {
        self.handle.update(|s| CounterState {
            math: s.math - 1,
            ..s.clone()
        })
    }
}

/// Tick source standing in for an interval timer.
pub struct Ticker {
    spawner: LocalSpawner,
    ticks: mpsc::UnboundedReceiver<()>,
}

impl Ticker {
    /// A ticker whose ticks are driven through the returned sender.
    #[must_use]
    pub fn new(spawner: LocalSpawner) -> (mpsc::UnboundedSender<()>, Self) {
        let (tx, ticks) = mpsc::unbounded();
        (tx, Self { spawner, ticks })
    }
}

/// Initializer for the counter stream.
///
/// # Errors
///
/// Fails if the tick task cannot be spawned.
pub fn counter(
    handle: Handle<CounterState>,
    seed: CounterState,
    ticker: Ticker,
) -> Result<Start<CounterState, CounterApi>, BoxError> {
    let Ticker { spawner, ticks } = ticker;
    let timer = handle.clone();
    let (task, abort) = abortable(ticks.for_each(move |()| {
        timer.modify(|s| s.auto_count += 1);
        future::ready(())
    }));
    spawner.spawn_local(async move {
        if task.await.is_err() {
            debug!(target: "streambly_demo", "counter timer aborted");
        }
    })?;

    let api = CounterApi { handle };
    Ok(Start::ready(Started::new(seed, api).on_stop(move || {
        info!(target: "streambly_demo", "stopping counter timer");
        abort.abort();
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_on_detached_handle_are_ignored() {
        let api = CounterApi {
            handle: Handle::detached(),
        };
        assert_eq!(api.inc(), Mutation::Ignored);
        assert_eq!(api.minus(), Mutation::Ignored);
    }

    #[test]
    fn state_serializes_with_field_names() {
        let json = serde_json::to_value(CounterState {
            auto_count: 2,
            math: -1,
        })
        .expect("serialize");
        assert_eq!(json, serde_json::json!({ "auto_count": 2, "math": -1 }));
    }
}
