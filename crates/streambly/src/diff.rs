#![forbid(unsafe_code)]

//! Structural change detection.
//!
//! A stream only notifies subscribers when the next value is structurally
//! different from the last published snapshot. For statically typed values
//! the structure is the type's `PartialEq`: derived implementations compare
//! field by field and recurse into nested data, while reference identity
//! never participates.
//!
//! The [`json`] submodule applies the same rule to dynamically shaped
//! `serde_json::Value` data, where composite and scalar values can meet.
//!
//! # Invariants
//!
//! 1. `is_different(a, a)` is `false` for every reflexive value.
//! 2. `is_different(a, b) == is_different(b, a)`.
//! 3. Evaluation has no side effects and is deterministic.

/// Whether `a` and `b` differ structurally.
///
/// Values whose `PartialEq` is not reflexive (a float `NaN`, for instance)
/// always count as different, so publishing one always notifies.
#[inline]
#[must_use]
pub fn is_different<T: PartialEq + ?Sized>(a: &T, b: &T) -> bool {
    a != b
}

#[cfg(feature = "json")]
pub mod json {
    //! Structural comparison of `serde_json::Value` trees.

    use serde_json::Value;

    /// Kind of a single structural change.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ChangeKind {
        Added,
        Removed,
        Changed,
    }

    /// One structural change, addressed by JSON pointer (RFC 6901).
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Change {
        pub path: String,
        pub kind: ChangeKind,
    }

    /// Whether two JSON values differ structurally.
    ///
    /// Scalars compare by value (numbers numerically), arrays element-wise,
    /// objects key by key. A composite compared with a scalar, or an array
    /// with an object, is always different.
    #[must_use]
    pub fn is_different(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => false,
            (Value::Bool(x), Value::Bool(y)) => x != y,
            (Value::String(x), Value::String(y)) => x != y,
            (Value::Number(x), Value::Number(y)) => !numbers_equal(x, y),
            (Value::Array(xs), Value::Array(ys)) => {
                xs.len() != ys.len() || xs.iter().zip(ys).any(|(x, y)| is_different(x, y))
            }
            (Value::Object(xs), Value::Object(ys)) => {
                xs.len() != ys.len()
                    || xs
                        .iter()
                        .any(|(k, x)| ys.get(k).is_none_or(|y| is_different(x, y)))
            }
            _ => true,
        }
    }

    /// Every path at which `b` differs from `a`.
    ///
    /// Empty exactly when `is_different(a, b)` is `false`. A change of kind
    /// at some path is reported once, for that path, without descending.
    #[must_use]
    pub fn changes(a: &Value, b: &Value) -> Vec<Change> {
        let mut out = Vec::new();
        let mut path = String::new();
        collect(a, b, &mut path, &mut out);
        out
    }

    fn collect(a: &Value, b: &Value, path: &mut String, out: &mut Vec<Change>) {
        match (a, b) {
            (Value::Array(xs), Value::Array(ys)) => {
                let shared = xs.len().min(ys.len());
                for i in 0..xs.len().max(ys.len()) {
                    let mark = path.len();
                    path.push('/');
                    path.push_str(&i.to_string());
                    if i < shared {
                        collect(&xs[i], &ys[i], path, out);
                    } else if i < xs.len() {
                        push(out, path, ChangeKind::Removed);
                    } else {
                        push(out, path, ChangeKind::Added);
                    }
                    path.truncate(mark);
                }
            }
            (Value::Object(xs), Value::Object(ys)) => {
                for (key, x) in xs {
                    let mark = path.len();
                    push_segment(path, key);
                    match ys.get(key) {
                        Some(y) => collect(x, y, path, out),
                        None => push(out, path, ChangeKind::Removed),
                    }
                    path.truncate(mark);
                }
                for key in ys.keys().filter(|k| !xs.contains_key(*k)) {
                    let mark = path.len();
                    push_segment(path, key);
                    push(out, path, ChangeKind::Added);
                    path.truncate(mark);
                }
            }
            _ => {
                if is_different(a, b) {
                    push(out, path, ChangeKind::Changed);
                }
            }
        }
    }

    fn push(out: &mut Vec<Change>, path: &str, kind: ChangeKind) {
        out.push(Change {
            path: path.to_owned(),
            kind,
        });
    }

    fn push_segment(path: &mut String, key: &str) {
        path.push('/');
        for ch in key.chars() {
            match ch {
                '~' => path.push_str("~0"),
                '/' => path.push_str("~1"),
                other => path.push(other),
            }
        }
    }

    fn numbers_equal(x: &serde_json::Number, y: &serde_json::Number) -> bool {
        if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
            return a == b;
        }
        match (x.as_f64(), y.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

}
