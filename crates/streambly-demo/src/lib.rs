#![forbid(unsafe_code)]

//! Demo applications built on `streambly`.

pub mod cli;
pub mod counter;
pub mod todo;

use std::cell::Cell;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::LocalPool;
use serde::Serialize;
use streambly::{BoxError, Stream, StreamOptions};
use tracing::info;

use crate::cli::Opts;
use crate::counter::{CounterState, Ticker, counter};
use crate::todo::{TodoList, loaded_todos};

/// Final state of a demo run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub counter: CounterState,
    pub todos: TodoList,
    /// Subscriber notifications delivered across both apps.
    pub notifications: u32,
}

/// Run both apps to completion on a local executor.
///
/// # Errors
///
/// Any start or cleanup failure of either stream.
pub fn run(opts: &Opts) -> Result<Summary, BoxError> {
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let notifications = Rc::new(Cell::new(0u32));

    // Counter: two manual edits, then the timer.
    let (ticks, ticker) = Ticker::new(spawner.clone());
    let counter_stream = Stream::with_options(
        &spawner,
        &counter,
        CounterState::default(),
        ticker,
        StreamOptions::new().name("counter"),
    )?;
    let seen = Rc::clone(&notifications);
    let _counter_sub = counter_stream.subscribe(move |state: &CounterState| {
        seen.set(seen.get() + 1);
        info!(target: "streambly_demo", auto_count = state.auto_count, math = state.math, "counter changed");
    });
    let api = counter_stream.controller()?;
    api.inc();
    api.inc();
    api.minus();
    for _ in 0..opts.ticks {
        ticks.unbounded_send(())?;
    }
    pool.run_until_stalled();
    let counter_final = counter_stream.value()?;
    counter_stream.stop()?;

    // Todo list: started from a document delivered after construction.
    let (deliver, document) = oneshot::channel();
    let todo_stream = Stream::with_options(
        &spawner,
        &loaded_todos,
        TodoList::default(),
        document,
        StreamOptions::new().name("todos"),
    )?;
    let seen = Rc::clone(&notifications);
    let _todo_sub = todo_stream.subscribe(move |list: &TodoList| {
        seen.set(seen.get() + 1);
        info!(target: "streambly_demo", total = list.todos.len(), remaining = list.remaining(), "todos changed");
    });
    if deliver.send(r#"{"todos":[{"id":0,"title":"read the docs","done":true}]}"#.to_owned()).is_err() {
        return Err("todo loader went away".into());
    }
    if let Some(started) = todo_stream.started() {
        pool.run_until(started)?;
    }
    let todos = todo_stream.controller()?;
    for title in &opts.todos {
        todos.add(title.as_str());
    }
    if let Some(first) = todo_stream.with_value(|l| l.todos.iter().find(|t| !t.done).map(|t| t.id))? {
        todos.toggle(first);
    }
    let todos_final = todo_stream.value()?;
    todo_stream.stop()?;

    Ok(Summary {
        counter: counter_final,
        todos: todos_final,
        notifications: notifications.get(),
    })
}

/// Human-readable rendering of a [`Summary`].
#[must_use]
pub fn render(summary: &Summary) -> String {
    let mut out = format!(
        "counter: math={} auto_count={}\n",
        summary.counter.math, summary.counter.auto_count
    );
    for todo in &summary.todos.todos {
        let mark = if todo.done { 'x' } else { ' ' };
        out.push_str(&format!("[{mark}] {} {}\n", todo.id, todo.title));
    }
    out.push_str(&format!("notifications: {}\n", summary.notifications));
    out
}
