//! Behavioural tests for the demo apps.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::LocalPool;
use proptest::prelude::*;
use streambly::{LifecycleState, Mutation, Stream, StreamError};
use streambly_demo::cli::Opts;
use streambly_demo::counter::{CounterState, Ticker, counter};
use streambly_demo::todo::{Todo, TodoList, loaded_todos, todos};

// ── Counter ──────────────────────────────────────────────────────────

#[test]
fn counter_ops_and_ticks_update_state() {
    let mut pool = LocalPool::new();
    let (ticks, ticker) = Ticker::new(pool.spawner());
    let stream =
        Stream::new(&pool.spawner(), &counter, CounterState::default(), ticker).expect("start");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let _sub = stream.subscribe(move |s: &CounterState| sink.borrow_mut().push(s.clone()));

    let api = stream.controller().expect("controller");
    assert_eq!(api.inc(), Mutation::Notified);
    assert_eq!(api.inc(), Mutation::Notified);
    assert_eq!(api.minus(), Mutation::Notified);
    ticks.unbounded_send(()).expect("tick");
    pool.run_until_stalled();

    assert_eq!(
        stream.value().expect("value"),
        CounterState {
            auto_count: 1,
            math: 1
        }
    );
    assert_eq!(seen.borrow().len(), 4);
}

#[test]
fn counter_timer_stops_with_stream() {
    let mut pool = LocalPool::new();
    let (ticks, ticker) = Ticker::new(pool.spawner());
    let stream =
        Stream::new(&pool.spawner(), &counter, CounterState::default(), ticker).expect("start");
    let api = stream.controller().expect("controller");

    ticks.unbounded_send(()).expect("tick");
    ticks.unbounded_send(()).expect("tick");
    pool.run_until_stalled();
    assert_eq!(stream.value().expect("value").auto_count, 2);

    stream.stop().expect("stop");
    let _ = ticks.unbounded_send(());
    pool.run_until_stalled();

    assert_eq!(stream.state(), LifecycleState::Stopped);
    assert_eq!(stream.ignored_mutations(), 0);
    assert_eq!(api.inc(), Mutation::Ignored);
}

// ── Todo ─────────────────────────────────────────────────────────────

#[test]
fn todo_add_toggle_remove() {
    let pool = LocalPool::new();
    let stream = Stream::new(&pool.spawner(), &todos, TodoList::default(), ()).expect("start");
    let api = stream.controller().expect("controller");

    api.add("a");
    api.add("b");
    assert_eq!(api.toggle(0), Mutation::Notified);
    assert_eq!(api.toggle(42), Mutation::Unchanged);
    assert_eq!(api.remove(1), Mutation::Notified);
    assert_eq!(api.remove(1), Mutation::Unchanged);

    let list = stream.value().expect("value");
    assert_eq!(
        list.todos,
        vec![Todo {
            id: 0,
            title: "a".into(),
            done: true
        }]
    );
    assert_eq!(list.remaining(), 0);
}

#[test]
fn loaded_todos_start_from_document_and_append_seed() {
    let mut pool = LocalPool::new();
    let (deliver, document) = oneshot::channel();
    let seed = TodoList {
        todos: vec![Todo {
            id: 0,
            title: "from seed".into(),
            done: false,
        }],
        next_id: 1,
    };
    let stream = Stream::new(&pool.spawner(), &loaded_todos, seed, document).expect("construct");
    assert_eq!(stream.state(), LifecycleState::Starting);

    deliver
        .send(r#"{"todos":[{"id":3,"title":"loaded"}]}"#.to_owned())
        .expect("deliver");
    pool.run_until_stalled();

    let list = stream.value().expect("value");
    let ids: Vec<u32> = list.todos.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![3, 4]);
    assert_eq!(list.next_id, 5);
}

#[test]
fn malformed_document_fails_the_start() {
    let mut pool = LocalPool::new();
    let (deliver, document) = oneshot::channel();
    let stream = Stream::new(&pool.spawner(), &loaded_todos, TodoList::default(), document)
        .expect("construct");
    let signal = stream.started().expect("pending");

    deliver.send("not json".to_owned()).expect("deliver");
    pool.run_until_stalled();

    assert_eq!(stream.state(), LifecycleState::Error);
    assert!(matches!(
        pool.run_until(signal),
        Err(StreamError::StartFailed { .. })
    ));
    assert!(matches!(
        stream.value(),
        Err(StreamError::StreamInErrorState { .. })
    ));
}

#[test]
fn document_with_largest_id_fails_the_start() {
    let mut pool = LocalPool::new();
    let (deliver, document) = oneshot::channel();
    let stream = Stream::new(&pool.spawner(), &loaded_todos, TodoList::default(), document)
        .expect("construct");

    deliver
        .send(r#"{"todos":[{"id":4294967295,"title":"last"}]}"#.to_owned())
        .expect("deliver");
    pool.run_until_stalled();

    assert_eq!(stream.state(), LifecycleState::Error);
    match stream.value() {
        Err(StreamError::StreamInErrorState { cause }) => {
            assert_eq!(cause.to_string(), "todo id space exhausted");
        }
        other => panic!("expected error state, got {other:?}"),
    }
}

#[test]
fn add_is_unchanged_once_ids_run_out() {
    let pool = LocalPool::new();
    let seed = TodoList {
        todos: Vec::new(),
        next_id: u32::MAX,
    };
    let stream = Stream::new(&pool.spawner(), &todos, seed, ()).expect("start");
    let api = stream.controller().expect("controller");

    assert_eq!(api.add("one too many"), Mutation::Unchanged);
    assert!(stream.value().expect("value").todos.is_empty());
}

// ── Full run ─────────────────────────────────────────────────────────

#[test]
fn default_run_summary() {
    let summary = streambly_demo::run(&Opts::default()).expect("run");
    assert_eq!(summary.counter.math, 1);
    assert_eq!(summary.counter.auto_count, 3);
    // One loaded todo plus three added, the first added one toggled done.
    assert_eq!(summary.todos.todos.len(), 4);
    assert_eq!(summary.todos.remaining(), 2);
    // 3 counter ops + 3 ticks + 3 adds + 1 toggle.
    assert_eq!(summary.notifications, 10);

    let text = streambly_demo::render(&summary);
    assert!(text.contains("math=1 auto_count=3"));
    assert!(text.contains("[x] 1 write docs"));
}

proptest! {
    #[test]
    fn run_tracks_tick_count(ticks in 0u32..20) {
        let opts = Opts { ticks, todos: Vec::new(), json: false };
        let summary = streambly_demo::run(&opts).expect("run");
        prop_assert_eq!(summary.counter.auto_count, u64::from(ticks));
        prop_assert_eq!(summary.notifications, 3 + ticks);
        prop_assert_eq!(summary.todos.todos.len(), 1);
    }
}
