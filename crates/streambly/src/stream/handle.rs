#![forbid(unsafe_code)]

//! The mutation handle given to initializers.
//!
//! A [`Handle`] is the only way to change a stream's value. It holds a weak
//! reference, so timers or callbacks that retain it never keep a discarded
//! stream alive; once the stream is gone the handle behaves as if the stream
//! were stopped.
//!
//! Mutations issued while the stream is not running are expected (a timer
//! may fire before the initializer's pending start settles). The lenient
//! methods ([`set`](Handle::set), [`update`](Handle::update),
//! [`modify`](Handle::modify)) report them as diagnostics and return
//! [`Mutation::Ignored`]; the `try_` variants return
//! [`StreamError::MutationRejected`] instead.

use std::fmt;
use std::rc::Weak;

use crate::error::{Result, StreamError};
use crate::stream::{LifecycleState, StreamId};

/// Outcome of a mutation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// The value changed and subscribers were notified.
    Notified,
    /// The value was structurally equal to the last published snapshot.
    Unchanged,
    /// The stream was not running; nothing happened.
    Ignored,
}

/// A pending edit of the stream value.
pub(crate) enum Edit<'a, P> {
    Replace(P),
    Update(Box<dyn FnOnce(&P) -> P + 'a>),
    Modify(Box<dyn FnOnce(&mut P) + 'a>),
}

/// What a [`Handle`] needs from the stream behind it.
pub(crate) trait Slot<P> {
    fn id(&self) -> StreamId;
    fn lifecycle(&self) -> LifecycleState;
    fn read(&self) -> Result<P>;
    fn apply(&self, edit: Edit<'_, P>) -> Result<Mutation>;
    fn report_ignored(&self, state: LifecycleState);
    fn end(&self);
}

/// Mutation handle for one stream: `get`, `set`/`update`/`modify`, `end`.
pub struct Handle<P> {
    slot: Option<Weak<dyn Slot<P>>>,
}

impl<P> Clone for Handle<P> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<P> Handle<P> {
    pub(crate) fn new(slot: Weak<dyn Slot<P>>) -> Self {
        Self { slot: Some(slot) }
    }

    /// A handle attached to no stream. Every operation behaves as on a
    /// stopped stream; useful for exercising an initializer in isolation.
    #[must_use]
    pub fn detached() -> Self {
        Self { slot: None }
    }

    fn with_slot<R>(&self, f: impl FnOnce(&dyn Slot<P>) -> R) -> Option<R> {
        let slot = self.slot.as_ref()?.upgrade()?;
        Some(f(&*slot))
    }

    /// The stream's identity, if it still exists.
    #[must_use]
    pub fn stream_id(&self) -> Option<StreamId> {
        self.with_slot(|slot| slot.id())
    }

    /// Lifecycle state of the stream; `Stopped` once it is gone.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.with_slot(|slot| slot.lifecycle())
            .unwrap_or(LifecycleState::Stopped)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Current value.
    ///
    /// # Errors
    ///
    /// `NotRunning` while stopped or starting, `StreamInErrorState` (with the
    /// captured start failure) after the stream failed to start.
    pub fn get(&self) -> Result<P> {
        self.with_slot(|slot| slot.read())
            .unwrap_or(Err(StreamError::NotRunning {
                state: LifecycleState::Stopped,
            }))
    }

    /// Publish `next` if it differs from the last published snapshot.
    pub fn set(&self, next: P) -> Mutation {
        self.lenient(Edit::Replace(next))
    }

    /// Publish `updater(current)` if it differs from the last snapshot.
    ///
    /// The updater runs without internal borrows held and may read the
    /// stream. It is not called when the stream is not running.
    pub fn update(&self, updater: impl FnOnce(&P) -> P) -> Mutation {
        self.lenient(Edit::Update(Box::new(updater)))
    }

    /// Edit the current value in place, then publish it if it now differs
    /// from the last snapshot.
    ///
    /// The editor runs while the value is borrowed and must not call back
    /// into the same stream.
    pub fn modify(&self, editor: impl FnOnce(&mut P)) -> Mutation {
        self.lenient(Edit::Modify(Box::new(editor)))
    }

    /// Like [`set`](Self::set), but rejects instead of ignoring.
    ///
    /// # Errors
    ///
    /// `MutationRejected` when the stream is not running.
    pub fn try_set(&self, next: P) -> Result<Mutation> {
        self.strict(Edit::Replace(next))
    }

    /// Like [`update`](Self::update), but rejects instead of ignoring.
    ///
    /// # Errors
    ///
    /// `MutationRejected` when the stream is not running.
    pub fn try_update(&self, updater: impl FnOnce(&P) -> P) -> Result<Mutation> {
        self.strict(Edit::Update(Box::new(updater)))
    }

    /// Like [`modify`](Self::modify), but rejects instead of ignoring.
    ///
    /// # Errors
    ///
    /// `MutationRejected` when the stream is not running.
    pub fn try_modify(&self, editor: impl FnOnce(&mut P)) -> Result<Mutation> {
        self.strict(Edit::Modify(Box::new(editor)))
    }

    /// Stop the stream from inside the initializer's own continuations.
    ///
    /// Equivalent to [`Stream::stop`](crate::Stream::stop); failures (already
    /// stopped, cleanup errors) are reported as diagnostics.
    pub fn end(&self) {
        let _ = self.with_slot(|slot| slot.end());
    }

    fn strict(&self, edit: Edit<'_, P>) -> Result<Mutation> {
        self.with_slot(|slot| slot.apply(edit))
            .unwrap_or(Err(StreamError::MutationRejected {
                state: LifecycleState::Stopped,
            }))
    }

    fn lenient(&self, edit: Edit<'_, P>) -> Mutation {
        self.with_slot(|slot| match slot.apply(edit) {
            Ok(outcome) => outcome,
            Err(err) => {
                let state = match err {
                    StreamError::MutationRejected { state } => state,
                    _ => slot.lifecycle(),
                };
                slot.report_ignored(state);
                Mutation::Ignored
            }
        })
        .unwrap_or(Mutation::Ignored)
    }
}

impl<P> fmt::Debug for Handle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("stream", &self.stream_id())
            .field("state", &self.state())
            .finish()
    }
}
