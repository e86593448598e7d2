#![forbid(unsafe_code)]

//! The stream engine.
//!
//! A [`Stream`] owns one slot of application state. It is built from an
//! initializer ([`Streamable`]), a seed value and a context; the initializer
//! receives a [`Handle`] for later mutations and returns the starting value,
//! a controller and an optional cleanup routine, either at once or through a
//! local future.
//!
//! # Lifecycle
//!
//! ```text
//!            ready start                     stop()
//!   new ──────────────────────► running ────────────► stopped
//!    │                            ▲
//!    │ pending start              │ future resolves
//!    └──────────────► starting ───┤
//!                                 │ future fails
//!                                 └────────────► error
//! ```
//!
//! Streams are not restartable. A `stop()` issued while starting is queued
//! and applied the moment the initializer settles.
//!
//! # Invariants
//!
//! 1. The initializer is invoked exactly once, during construction.
//! 2. The value and controller are readable only while running.
//! 3. The cleanup routine runs at most once.
//! 4. A mutation structurally equal to the last published snapshot never
//!    reaches subscribers, and does not bump [`Stream::version`].
//! 5. Each accepted mutation is delivered to every subscriber registered at
//!    that moment exactly once, before the mutating call returns.
//!
//! # Threading
//!
//! Streams are single-threaded (`Rc`/`RefCell`), matching a cooperative
//! event-driven host. Pending initializers run on a [`LocalSpawn`] executor.

mod engine;
mod handle;
pub(crate) mod subscription;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures::task::{LocalSpawn, LocalSpawnExt};
use tracing::debug;

use crate::deferred::{Deferred, Signal};
use crate::diagnostics::StreamOptions;
use crate::error::{BoxError, Cause, Result, StreamError};
use crate::projection::Projection;
use crate::streamable::{Start, Started, Streamable};

use self::engine::Core;
pub use self::handle::{Handle, Mutation};
use self::handle::Slot;
pub use self::subscription::Subscription;

// ─── Identity ────────────────────────────────────────────────────────────────

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique stream identity, stable for the stream's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    pub(crate) fn next() -> Self {
        Self(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

// ─── Lifecycle state ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Error,
}

impl LifecycleState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Start signal ────────────────────────────────────────────────────────────

/// The pending initializer was dropped before it settled, typically because
/// its executor shut down.
#[derive(Debug, thiserror::Error)]
#[error("initializer task was dropped before it settled")]
struct Abandoned;

/// Future returned by [`Stream::started`].
///
/// Resolves `Ok(())` once the stream is running, or with the failure that
/// ended the `starting` window. Resolves immediately if that already
/// happened.
#[derive(Debug, Clone)]
#[must_use = "futures do nothing unless polled"]
pub struct StartSignal {
    inner: Signal<Result<()>>,
}

impl Future for StartSignal {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|settled| {
            settled.unwrap_or_else(|| Err(StreamError::start_failed(Cause::new(Abandoned))))
        })
    }
}

// ─── Stream ──────────────────────────────────────────────────────────────────

/// A reactive value container.
///
/// The owner of a stream decides when it ends: call [`stop`](Self::stop)
/// explicitly, or drop the stream, which stops it if it is still running.
pub struct Stream<P, A = ()> {
    core: Rc<Core<P, A>>,
    started: Option<StartSignal>,
}

impl<P, A> Stream<P, A>
where
    P: Clone + PartialEq + 'static,
    A: 'static,
{
    /// Build a stream and invoke its initializer.
    ///
    /// `spawner` drives a pending start; a ready start never touches it.
    ///
    /// # Errors
    ///
    /// `StartFailed` if the initializer returns an error, or if a pending
    /// start cannot be spawned.
    pub fn new<S, I, C>(spawner: &S, initializer: &I, seed: P, context: C) -> Result<Self>
    where
        S: LocalSpawn + ?Sized,
        I: Streamable<P, A, C> + ?Sized,
    {
        Self::with_options(spawner, initializer, seed, context, StreamOptions::default())
    }

    /// Like [`new`](Self::new), with explicit options.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_options<S, I, C>(
        spawner: &S,
        initializer: &I,
        seed: P,
        context: C,
        options: StreamOptions,
    ) -> Result<Self>
    where
        S: LocalSpawn + ?Sized,
        I: Streamable<P, A, C> + ?Sized,
    {
        let core = Rc::new(Core::new(options));
        let slot: Weak<dyn Slot<P>> = Rc::downgrade(&core) as Weak<dyn Slot<P>>;
        debug!(target: "streambly", stream_id = %core.id, "invoking initializer");

        let pending = match initializer.start(Handle::new(slot), seed, context) {
            Err(err) => return Err(core.fail(err)),
            Ok(Start::Ready(started)) => {
                match core.settle(started) {
                    // `end()` during the initializer already stopped it.
                    Ok(()) | Err(StreamError::AlreadyStopped) => {}
                    Err(err) => return Err(err),
                }
                return Ok(Self {
                    core,
                    started: None,
                });
            }
            Ok(Start::Pending(pending)) => pending,
        };

        let mut deferred = Deferred::new();
        let signal = StartSignal {
            inner: deferred.signal(),
        };
        let weak = Rc::downgrade(&core);
        let task = async move {
            let outcome = pending.await;
            let settled = match (weak.upgrade(), outcome) {
                (Some(core), Ok(started)) => core.settle(started),
                (Some(core), Err(err)) => Err(core.fail(err)),
                (None, outcome) => discard(outcome),
            };
            deferred.resolve(settled);
        };
        if let Err(err) = spawner.spawn_local(task) {
            return Err(core.fail(Box::new(err)));
        }

        Ok(Self {
            core,
            started: Some(signal),
        })
    }

    #[must_use]
    pub fn id(&self) -> StreamId {
        self.core.id
    }

    /// Label given through [`StreamOptions::name`].
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.core.reporter.name()
    }

    /// Current lifecycle state. Never fails.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.core.state()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// A copy of the current value.
    ///
    /// # Errors
    ///
    /// `NotRunning` outside `running`; `StreamInErrorState` after a failed
    /// start.
    pub fn value(&self) -> Result<P> {
        self.core.with_running(|run| run.current.clone())
    }

    /// Run `f` on a copy of the current value. `f` may read, mutate or stop
    /// the stream.
    ///
    /// # Errors
    ///
    /// See [`value`](Self::value).
    pub fn with_value<R>(&self, f: impl FnOnce(&P) -> R) -> Result<R> {
        self.value().map(|value| f(&value))
    }

    /// The controller returned by the initializer.
    ///
    /// # Errors
    ///
    /// See [`value`](Self::value).
    pub fn controller(&self) -> Result<Rc<A>> {
        self.core.with_running(|run| Rc::clone(&run.controller))
    }

    /// Number of accepted mutations since the stream started running.
    ///
    /// # Errors
    ///
    /// See [`value`](Self::value).
    pub fn version(&self) -> Result<u64> {
        self.core.with_running(|run| run.version)
    }

    /// Register a listener for every accepted mutation.
    ///
    /// Allowed in any state; listeners registered before the stream runs
    /// simply see nothing until the first accepted mutation.
    pub fn subscribe(&self, listener: impl Fn(&P) + 'static) -> Subscription {
        self.core.subscribers.subscribe(listener)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.core.subscribers.len()
    }

    /// Mutations dropped because the stream was not running.
    #[must_use]
    pub fn ignored_mutations(&self) -> u64 {
        self.core.reporter.ignored()
    }

    /// Await the end of the `starting` window.
    ///
    /// `None` when the initializer completed synchronously: the stream was
    /// already past `starting` when construction returned.
    pub fn started(&self) -> Option<StartSignal> {
        self.started.clone()
    }

    /// Stop the stream.
    ///
    /// While running, runs the cleanup routine and releases the value and
    /// controller. While starting, the stop is queued until the initializer
    /// settles. After a failed start, moves to `stopped`.
    ///
    /// # Errors
    ///
    /// `AlreadyStopped` if the stream is stopped or a stop is already
    /// queued. `CleanupFailed` if the cleanup routine fails; the stream is
    /// stopped regardless.
    pub fn stop(&self) -> Result<()> {
        self.core.stop()
    }

    /// A cached, change-suppressed slice of the value.
    ///
    /// The selector runs on a copy of the value and may read or mutate the
    /// stream.
    pub fn project<O>(&self, select: impl Fn(&P) -> O + 'static) -> Projection<O>
    where
        O: Clone + PartialEq + 'static,
    {
        let weak = Rc::downgrade(&self.core);
        let source = Rc::downgrade(&self.core);
        let live = move || match source.upgrade() {
            Some(core) => core.with_running(|_| ()),
            None => Err(gone()),
        };
        let read = move || match weak.upgrade() {
            Some(core) => {
                let value = core.with_running(|run| run.current.clone())?;
                Ok(select(&value))
            }
            None => Err(gone()),
        };
        Projection::new(live, read, &self.core.subscribers)
    }
}

impl<P, A> Drop for Stream<P, A> {
    fn drop(&mut self) {
        if self.core.state() == LifecycleState::Running {
            debug!(target: "streambly", stream_id = %self.core.id, "stopping stream on drop");
            // Only `CleanupFailed` can surface from a running stream, and it
            // is already reported through diagnostics.
            let _ = self.core.stop();
        }
    }
}

impl<P, A> fmt::Debug for Stream<P, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.core.id)
            .field("name", &self.core.reporter.name())
            .field("state", &self.core.state())
            .field("subscribers", &self.core.subscribers.len())
            .finish_non_exhaustive()
    }
}

/// Read error for a projection or handle whose stream is gone.
fn gone() -> StreamError {
    StreamError::NotRunning {
        state: LifecycleState::Stopped,
    }
}

/// Settle a start whose stream was dropped while it was pending. Nobody can
/// stop it anymore, so its cleanup runs now.
fn discard<P, A>(outcome: std::result::Result<Started<P, A>, BoxError>) -> Result<()> {
    match outcome {
        Ok(started) => {
            if let Some(cleanup) = started.cleanup {
                cleanup().map_err(|err| StreamError::CleanupFailed {
                    cause: Cause::from(err),
                })?;
            }
            Err(StreamError::AlreadyStopped)
        }
        Err(err) => Err(StreamError::start_failed(err)),
    }
}
