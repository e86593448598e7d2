#![forbid(unsafe_code)]

//! Cached, change-suppressed slices of a stream's value.
//!
//! # Design
//!
//! [`Projection<O>`] wraps a selector over the stream value and its cached
//! result in shared, reference-counted storage. Every accepted mutation of the
//! source stream marks the cache dirty; the next [`get()`](Projection::get)
//! re-runs the selector. The cached slice, and the projection's version, only
//! change when the new slice is structurally different from the cached one,
//! so a consumer that re-renders on version changes skips mutations that did
//! not touch its slice.
//!
//! # Invariants
//!
//! 1. `get()` never returns a slice older than the last completed mutation.
//! 2. The selector runs at most once per notification cycle.
//! 3. `version` increments by exactly 1 each time the cached slice changes.
//!
//! # Failure Modes
//!
//! - **Stream not running**: `get()` fails like [`Stream::value`], whether or
//!   not the cache is dirty. The cache is marked dirty so a stale slice is
//!   never served.
//! - **Stream dropped**: the subscription becomes inert and reads fail with
//!   `NotRunning`.
//!
//! [`Stream::value`]: crate::Stream::value

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::diff::is_different;
use crate::error::Result;
use crate::stream::Subscription;
use crate::stream::subscription::Registry;

/// Shared interior for [`Projection<O>`].
struct ProjectionInner<O> {
    /// Fails with the source stream's read error when it is not running.
    live: Box<dyn Fn() -> Result<()>>,
    /// Reads the source stream and applies the selector.
    read: Box<dyn Fn() -> Result<O>>,
    /// Cached slice (None only before the first successful read).
    cached: Option<O>,
    /// Whether the cached slice may be stale.
    dirty: Cell<bool>,
    /// Bumped each time the cached slice changes.
    version: u64,
    /// Keeps the dirty-marking listener registered.
    _subscription: Option<Subscription>,
}

/// A lazily evaluated, memoized slice of a stream value.
///
/// Cloning a `Projection` creates a new handle to the **same** cache.
pub struct Projection<O> {
    inner: Rc<RefCell<ProjectionInner<O>>>,
}

impl<O> Clone for Projection<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<O: fmt::Debug> fmt::Debug for Projection<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Projection")
            .field("cached", &inner.cached)
            .field("dirty", &inner.dirty.get())
            .field("version", &inner.version)
            .finish()
    }
}

impl<O: Clone + PartialEq + 'static> Projection<O> {
    pub(crate) fn new<P: 'static>(
        live: impl Fn() -> Result<()> + 'static,
        read: impl Fn() -> Result<O> + 'static,
        registry: &Rc<Registry<P>>,
    ) -> Self {
        let inner = Rc::new(RefCell::new(ProjectionInner {
            live: Box::new(live),
            read: Box::new(read),
            cached: None,
            dirty: Cell::new(true),
            version: 0,
            _subscription: None,
        }));

        let weak_inner = Rc::downgrade(&inner);
        let sub = registry.subscribe(move |_: &P| {
            if let Some(strong) = weak_inner.upgrade() {
                strong.borrow().dirty.set(true);
            }
        });
        inner.borrow_mut()._subscription = Some(sub);

        Self { inner }
    }

    /// The current slice, recomputed if the stream changed since the last
    /// read.
    ///
    /// # Errors
    ///
    /// The source stream's read error when it is not running.
    pub fn get(&self) -> Result<O> {
        self.refresh()?;
        let inner = self.inner.borrow();
        match &inner.cached {
            Some(value) => Ok(value.clone()),
            None => (inner.read)(),
        }
    }

    /// Run `f` on the current slice. `f` receives a copy and may use the
    /// projection or its stream freely.
    ///
    /// # Errors
    ///
    /// See [`get`](Self::get).
    pub fn with<R>(&self, f: impl FnOnce(&O) -> R) -> Result<R> {
        self.get().map(|value| f(&value))
    }

    /// Number of times the cached slice changed.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.borrow().dirty.get()
    }

    /// Force the next read to re-run the selector.
    pub fn invalidate(&self) {
        self.inner.borrow().dirty.set(true);
    }

    fn refresh(&self) -> Result<()> {
        {
            let inner = self.inner.borrow();
            if let Err(err) = (inner.live)() {
                inner.dirty.set(true);
                return Err(err);
            }
            // Cleared before the selector runs so a mutation it triggers
            // leaves the cache dirty.
            if !inner.dirty.replace(false) {
                return Ok(());
            }
        }
        let next = {
            let inner = self.inner.borrow();
            match (inner.read)() {
                Ok(next) => next,
                Err(err) => {
                    inner.dirty.set(true);
                    return Err(err);
                }
            }
        };
        let mut inner = self.inner.borrow_mut();
        let changed = inner
            .cached
            .as_ref()
            .is_none_or(|cached| is_different(cached, &next));
        if changed {
            inner.cached = Some(next);
            inner.version += 1;
        }
        Ok(())
    }
}
