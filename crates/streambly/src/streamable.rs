#![forbid(unsafe_code)]

//! The initializer contract.
//!
//! A [`Streamable`] sets a stream up: it receives the [`Handle`] it may keep
//! for later mutations, the caller's seed value, and an opaque context, and
//! returns a [`Start`]. The start is either [`Ready`](Start::Ready) right away
//! or [`Pending`](Start::Pending) on a local future; in both cases it settles
//! into [`Started`], carrying the authoritative starting value, the
//! controller external callers will use, and an optional cleanup routine.
//!
//! Any `Fn(Handle<P>, P, C) -> Result<Start<P, A>, BoxError>` closure is a
//! `Streamable`. Use [`streamable`] to pin the value, controller and context
//! types when closure inference needs help:
//!
//! ```
//! use streambly::{Start, Started, streamable};
//!
//! struct Counter {
//!     inc: Box<dyn Fn()>,
//! }
//!
//! let counter = streamable::<u32>()
//!     .api::<Counter>()
//!     .implement(|handle, seed, ()| {
//!         let inc = Box::new(move || {
//!             handle.update(|n| n + 1);
//!         });
//!         Ok(Start::ready(Started::new(seed, Counter { inc })))
//!     });
//! # let _ = counter;
//! ```

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use futures::future::{FutureExt, LocalBoxFuture};

use crate::error::BoxError;
use crate::stream::Handle;

/// Cleanup routine run exactly once when a running stream stops.
pub type Cleanup = Box<dyn FnOnce() -> Result<(), BoxError>>;

/// Future produced by an asynchronous initializer.
pub type PendingStart<P, A> = LocalBoxFuture<'static, Result<Started<P, A>, BoxError>>;

/// The settled result of an initializer.
pub struct Started<P, A> {
    pub initial_value: P,
    pub cleanup: Option<Cleanup>,
    pub controller: A,
}

impl<P, A> Started<P, A> {
    /// A start with no cleanup.
    #[must_use]
    pub fn new(initial_value: P, controller: A) -> Self {
        Self {
            initial_value,
            cleanup: None,
            controller,
        }
    }

    /// Attach a fallible cleanup routine.
    #[must_use]
    pub fn with_cleanup(
        mut self,
        cleanup: impl FnOnce() -> Result<(), BoxError> + 'static,
    ) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    /// Attach a cleanup routine that cannot fail.
    #[must_use]
    pub fn on_stop(self, cleanup: impl FnOnce() + 'static) -> Self {
        self.with_cleanup(move || {
            cleanup();
            Ok(())
        })
    }
}

impl<P> Started<P, ()> {
    /// A start exposing no controller operations.
    #[must_use]
    pub fn value(initial_value: P) -> Self {
        Self::new(initial_value, ())
    }
}

impl<P: fmt::Debug, A> fmt::Debug for Started<P, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Started")
            .field("initial_value", &self.initial_value)
            .field("cleanup", &self.cleanup.is_some())
            .finish_non_exhaustive()
    }
}

/// What an initializer returns: a settled start, or a future of one.
pub enum Start<P, A> {
    Ready(Started<P, A>),
    Pending(PendingStart<P, A>),
}

impl<P, A> Start<P, A> {
    #[must_use]
    pub fn ready(started: Started<P, A>) -> Self {
        Self::Ready(started)
    }

    /// Box a local future as a pending start.
    #[must_use]
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Started<P, A>, BoxError>> + 'static,
    {
        Self::Pending(future.boxed_local())
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl<P, A> From<Started<P, A>> for Start<P, A> {
    fn from(started: Started<P, A>) -> Self {
        Self::Ready(started)
    }
}

/// A stream initializer.
///
/// Invoked at most once per stream, at construction. Returning `Err` means
/// the stream failed to start.
pub trait Streamable<P, A, C> {
    fn start(&self, handle: Handle<P>, seed: P, context: C) -> Result<Start<P, A>, BoxError>;
}

impl<P, A, C, F> Streamable<P, A, C> for F
where
    F: Fn(Handle<P>, P, C) -> Result<Start<P, A>, BoxError>,
{
    fn start(&self, handle: Handle<P>, seed: P, context: C) -> Result<Start<P, A>, BoxError> {
        self(handle, seed, context)
    }
}

// ─── Declaration helper ──────────────────────────────────────────────────────

/// Begin declaring an initializer for values of type `P`.
#[must_use]
pub fn streamable<P>() -> Declare<P, (), ()> {
    Declare(PhantomData)
}

/// Type-only declaration state; see [`streamable`].
pub struct Declare<P, A, C>(PhantomData<fn() -> (P, A, C)>);

impl<P, A, C> Declare<P, A, C> {
    /// Fix the controller type.
    #[must_use]
    pub fn api<Api>(self) -> Declare<P, Api, C> {
        Declare(PhantomData)
    }

    /// Fix the context type.
    #[must_use]
    pub fn context<Ctx>(self) -> Declare<P, A, Ctx> {
        Declare(PhantomData)
    }

    /// Accept the initializer body and return it unchanged.
    pub fn implement<F>(self, initializer: F) -> F
    where
        F: Fn(Handle<P>, P, C) -> Result<Start<P, A>, BoxError>,
    {
        initializer
    }
}

impl<P, A, C> fmt::Debug for Declare<P, A, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Declare")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn on_stop_wraps_infallible_cleanup() {
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let started = Started::value(1).on_stop(move || flag.set(true));
        let cleanup = started.cleanup.expect("cleanup attached");
        assert!(cleanup().is_ok());
        assert!(ran.get());
    }

    #[test]
    fn pending_start_is_pending() {
        let start: Start<u8, ()> = Start::pending(async { Ok::<_, BoxError>(Started::value(1)) });
        assert!(start.is_pending());
        let start: Start<u8, ()> = Started::value(1).into();
        assert!(!start.is_pending());
    }

    #[test]
    fn declare_returns_the_initializer() {
        let init = streamable::<i32>()
            .context::<i32>()
            .implement(|_handle, seed, offset| Ok(Start::ready(Started::value(seed + offset))));
        let handle = Handle::detached();
        match init.start(handle, 1, 2) {
            Ok(Start::Ready(started)) => assert_eq!(started.initial_value, 3),
            _ => panic!("expected a ready start"),
        }
    }
}
