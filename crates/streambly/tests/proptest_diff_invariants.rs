//! Property-based invariant tests for structural change detection.
//!
//! 1. A value is never different from itself or from a deep copy.
//! 2. `is_different` is symmetric.
//! 3. JSON `changes` is empty exactly when the values are not different.
//! 4. Every reported path resolves in the side it claims to touch.
//! 5. A single leaf edit is reported at exactly that path.
//! 6. A stream publishes exactly the mutations that change its value.

use futures::executor::LocalPool;
use proptest::prelude::*;
use serde_json::{Map, Value, json};
use streambly::diff::{self, json::ChangeKind};
use streambly::{BoxError, Handle, Mutation, Start, Started, Stream};

// ── Helpers ──────────────────────────────────────────────────────────

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-50i64..50).prop_map(Value::from),
        (-4.0f64..4.0).prop_map(|f| json!(f)),
        "[a-c~/]{0,3}".prop_map(Value::String),
    ]
}

fn arb_json() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            proptest::collection::btree_map("[a-d~/]{1,2}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

#[derive(Debug, Clone, PartialEq)]
struct Row {
    id: u8,
    tags: Vec<String>,
    done: bool,
}

fn arb_row() -> impl Strategy<Value = Row> {
    (any::<u8>(), proptest::collection::vec("[a-z]{0,4}", 0..4), any::<bool>())
        .prop_map(|(id, tags, done)| Row { id, tags, done })
}

// ═════════════════════════════════════════════════════════════════════════
// 1-2. Reflexivity and symmetry
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn json_deep_copy_is_not_different(v in arb_json()) {
        let copy = v.clone();
        prop_assert!(!diff::json::is_different(&v, &copy));
        prop_assert!(diff::json::changes(&v, &copy).is_empty());
    }

    #[test]
    fn json_is_symmetric(a in arb_json(), b in arb_json()) {
        prop_assert_eq!(
            diff::json::is_different(&a, &b),
            diff::json::is_different(&b, &a)
        );
    }

    #[test]
    fn typed_rows_agree_with_partial_eq(a in arb_row(), b in arb_row()) {
        prop_assert_eq!(diff::is_different(&a, &b), a != b);
        prop_assert!(!diff::is_different(&a, &a.clone()));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3-4. Change lists agree with the predicate and point at real nodes
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn changes_empty_iff_not_different(a in arb_json(), b in arb_json()) {
        let changes = diff::json::changes(&a, &b);
        prop_assert_eq!(changes.is_empty(), !diff::json::is_different(&a, &b));
    }

    #[test]
    fn change_paths_resolve(a in arb_json(), b in arb_json()) {
        for change in diff::json::changes(&a, &b) {
            match change.kind {
                ChangeKind::Added => {
                    prop_assert!(a.pointer(&change.path).is_none());
                    prop_assert!(b.pointer(&change.path).is_some());
                }
                ChangeKind::Removed => {
                    prop_assert!(a.pointer(&change.path).is_some());
                    prop_assert!(b.pointer(&change.path).is_none());
                }
                ChangeKind::Changed => {
                    prop_assert!(a.pointer(&change.path).is_some());
                    prop_assert!(b.pointer(&change.path).is_some());
                }
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. A single leaf edit is localized
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn single_field_edit_is_reported_once(
        base in proptest::collection::btree_map("[a-d]{1,2}", arb_leaf(), 1..6),
        pick in any::<prop::sample::Index>(),
    ) {
        let key = pick.get(&base.keys().cloned().collect::<Vec<_>>()).clone();
        let a = Value::Object(base.clone().into_iter().collect());
        let mut edited = base;
        edited.insert(key.clone(), json!({ "replaced": true }));
        let b = Value::Object(edited.into_iter().collect());

        let changes = diff::json::changes(&a, &b);
        prop_assert_eq!(changes.len(), 1);
        prop_assert_eq!(&changes[0].path, &format!("/{key}"));
        prop_assert_eq!(changes[0].kind, ChangeKind::Changed);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Streams publish exactly the differing mutations
// ═════════════════════════════════════════════════════════════════════════

fn row_api(handle: Handle<Row>, seed: Row, (): ()) -> Result<Start<Row, Handle<Row>>, BoxError> {
    Ok(Start::ready(Started::new(seed, handle)))
}

proptest! {
    #[test]
    fn stream_notifies_only_on_difference(
        seed in arb_row(),
        edits in proptest::collection::vec(arb_row(), 0..20),
    ) {
        let pool = LocalPool::new();
        let stream = Stream::new(&pool.spawner(), &row_api, seed.clone(), ()).expect("start");
        let handle = stream.controller().expect("controller");

        let mut expected = 0u64;
        let mut last = seed;
        for edit in edits {
            let outcome = handle.set(edit.clone());
            if edit != last {
                prop_assert_eq!(outcome, Mutation::Notified);
                expected += 1;
            } else {
                prop_assert_eq!(outcome, Mutation::Unchanged);
            }
            last = edit;
        }
        prop_assert_eq!(stream.version().expect("version"), expected);
        prop_assert_eq!(stream.value().expect("value"), last);
    }
}
