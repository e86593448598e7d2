#![forbid(unsafe_code)]

//! One-shot, multi-waiter completion signal.
//!
//! A [`Deferred<T>`] is created unresolved and resolved at most once. Any
//! number of [`Signal<T>`] futures, taken before or after resolution, observe
//! the same value. Dropping the `Deferred` without resolving it abandons the
//! signal: waiters complete with `None` instead of hanging.
//!
//! Streams use this to let callers await the end of the `starting` window.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

/// Resolving half of a one-shot signal.
pub struct Deferred<T: Clone> {
    sender: Option<oneshot::Sender<T>>,
    signal: Signal<T>,
}

/// Awaitable half of a one-shot signal. Cheaply cloneable.
pub struct Signal<T: Clone> {
    inner: Shared<oneshot::Receiver<T>>,
}

impl<T: Clone> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<T: Clone> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("settled", &self.inner.peek().is_some())
            .finish()
    }
}

impl<T: Clone> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> Deferred<T> {
    /// Create an unresolved signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            sender: Some(sender),
            signal: Signal {
                inner: receiver.shared(),
            },
        }
    }

    /// Resolve the signal. Returns `false` if it was already resolved.
    pub fn resolve(&mut self, value: T) -> bool {
        match self.sender.take() {
            // A send error only means every waiter, including our own
            // retained signal, is gone; the signal still counts as resolved.
            Some(sender) => {
                let _ = sender.send(value);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.sender.is_none()
    }

    /// A future completing with the resolved value.
    #[must_use]
    pub fn signal(&self) -> Signal<T> {
        self.signal.clone()
    }
}

impl<T: Clone> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Signal<T> {
    /// The resolved value, if resolution already happened.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.inner.peek().and_then(|res| res.as_ref().ok())
    }
}

impl<T: Clone> Future for Signal<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx).map(Result::ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::future::join;

    #[test]
    fn waiters_before_and_after_resolution_agree() {
        let mut deferred = Deferred::new();
        let early = deferred.signal();
        assert!(!deferred.is_resolved());
        assert!(early.peek().is_none());

        assert!(deferred.resolve(7));
        let late = deferred.signal();

        let (a, b) = block_on(join(early, late));
        assert_eq!(a, Some(7));
        assert_eq!(b, Some(7));
    }

    #[test]
    fn resolves_only_once() {
        let mut deferred = Deferred::new();
        assert!(deferred.resolve("first"));
        assert!(!deferred.resolve("second"));
        assert!(deferred.is_resolved());
        assert_eq!(block_on(deferred.signal()), Some("first"));
    }

    #[test]
    fn dropped_unresolved_signal_yields_none() {
        let deferred: Deferred<u8> = Deferred::new();
        let waiter = deferred.signal();
        drop(deferred);
        assert_eq!(block_on(waiter), None);
    }

    #[test]
    fn peek_after_poll() {
        let mut deferred = Deferred::new();
        let waiter = deferred.signal();
        deferred.resolve(3u32);
        assert_eq!(block_on(waiter.clone()), Some(3));
        assert_eq!(waiter.peek(), Some(&3));
    }
}
