#![forbid(unsafe_code)]

//! Structured diagnostics for stream lifecycle events and misuse.
//!
//! Every stream reports through two channels:
//!
//! - `tracing` events (target `streambly`), with `stream_id` and `state`
//!   fields, so hosts that install a subscriber get logs for free.
//! - An optional per-stream hook set with [`StreamOptions::on_diagnostic`],
//!   for hosts that want to count or surface misuse themselves.
//!
//! Process-wide counters are kept for telemetry, in the same spirit as the
//! per-stream [`ignored_mutations`](crate::Stream::ignored_mutations) count.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, warn};

use crate::error::Cause;
use crate::stream::{LifecycleState, StreamId};

// ─── Metrics counters ────────────────────────────────────────────────────────

static STREAMS_STARTED_TOTAL: AtomicU64 = AtomicU64::new(0);
static MUTATIONS_IGNORED_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Streams that reached `running`, across the process.
#[must_use]
pub fn streams_started_total() -> u64 {
    STREAMS_STARTED_TOTAL.load(Ordering::Relaxed)
}

/// Mutations dropped because their stream was not running, across the
/// process.
#[must_use]
pub fn mutations_ignored_total() -> u64 {
    MUTATIONS_IGNORED_TOTAL.load(Ordering::Relaxed)
}

// ─── Diagnostic events ───────────────────────────────────────────────────────

/// A lifecycle event or tolerated misuse, reported to the diagnostic hook.
#[derive(Debug, Clone)]
pub enum Diagnostic {
    Started {
        stream: StreamId,
    },
    StartFailed {
        stream: StreamId,
        cause: Cause,
    },
    /// `set`/`update`/`modify` issued while the stream was not running.
    IgnoredMutation {
        stream: StreamId,
        state: LifecycleState,
    },
    /// The mutation handle's `get` was called before the stream was running.
    ReadBeforeStart {
        stream: StreamId,
        state: LifecycleState,
    },
    /// `end` was called on a stream that was already stopped.
    EndAfterStop {
        stream: StreamId,
    },
    CleanupFailed {
        stream: StreamId,
        cause: Cause,
    },
    /// A stop was requested while starting; it applies once the initializer
    /// settles.
    StopDeferred {
        stream: StreamId,
    },
    Stopped {
        stream: StreamId,
    },
}

impl Diagnostic {
    /// The stream this event belongs to.
    #[must_use]
    pub fn stream(&self) -> StreamId {
        match self {
            Self::Started { stream }
            | Self::StartFailed { stream, .. }
            | Self::IgnoredMutation { stream, .. }
            | Self::ReadBeforeStart { stream, .. }
            | Self::EndAfterStop { stream }
            | Self::CleanupFailed { stream, .. }
            | Self::StopDeferred { stream }
            | Self::Stopped { stream } => *stream,
        }
    }
}

// ─── Options ─────────────────────────────────────────────────────────────────

/// Per-stream configuration.
#[derive(Clone, Default)]
pub struct StreamOptions {
    name: Option<String>,
    hook: Option<Rc<dyn Fn(&Diagnostic)>>,
}

impl StreamOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Label included in every log line for this stream.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Install a hook called synchronously for every [`Diagnostic`].
    ///
    /// The hook runs with no internal borrows held and may read the stream.
    #[must_use]
    pub fn on_diagnostic(mut self, hook: impl Fn(&Diagnostic) + 'static) -> Self {
        self.hook = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOptions")
            .field("name", &self.name)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

// ─── Reporter ────────────────────────────────────────────────────────────────

/// Per-stream sink combining tracing, the hook, and the counters.
pub(crate) struct Reporter {
    name: Option<String>,
    hook: Option<Rc<dyn Fn(&Diagnostic)>>,
    ignored: Cell<u64>,
}

impl Reporter {
    pub(crate) fn new(options: StreamOptions) -> Self {
        Self {
            name: options.name,
            hook: options.hook,
            ignored: Cell::new(0),
        }
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn ignored(&self) -> u64 {
        self.ignored.get()
    }

    /// Log and forward an event. Callers must not hold a borrow of the
    /// stream's state.
    pub(crate) fn emit(&self, event: Diagnostic) {
        let label = self.name.as_deref().unwrap_or("");
        match &event {
            Diagnostic::Started { stream } => {
                STREAMS_STARTED_TOTAL.fetch_add(1, Ordering::Relaxed);
                debug!(target: "streambly", stream_id = %stream, label, "stream running");
            }
            Diagnostic::StartFailed { stream, cause } => {
                error!(target: "streambly", stream_id = %stream, label, %cause, "stream failed to start");
            }
            Diagnostic::IgnoredMutation { stream, state } => {
                self.ignored.set(self.ignored.get() + 1);
                MUTATIONS_IGNORED_TOTAL.fetch_add(1, Ordering::Relaxed);
                warn!(target: "streambly", stream_id = %stream, label, %state, "mutation ignored: stream not running");
            }
            Diagnostic::ReadBeforeStart { stream, state } => {
                warn!(target: "streambly", stream_id = %stream, label, %state, "read before stream was running");
            }
            Diagnostic::EndAfterStop { stream } => {
                warn!(target: "streambly", stream_id = %stream, label, "end called on stopped stream");
            }
            Diagnostic::CleanupFailed { stream, cause } => {
                warn!(target: "streambly", stream_id = %stream, label, %cause, "stream cleanup failed");
            }
            Diagnostic::StopDeferred { stream } => {
                debug!(target: "streambly", stream_id = %stream, label, "stop deferred until start settles");
            }
            Diagnostic::Stopped { stream } => {
                debug!(target: "streambly", stream_id = %stream, label, "stream stopped");
            }
        }
        if let Some(hook) = &self.hook {
            hook(&event);
        }
    }
}
