#![forbid(unsafe_code)]

//! Shared state behind a [`Stream`](super::Stream) and its handles.
//!
//! All transitions go through [`Core`]. The lifecycle is a tagged [`Phase`]
//! whose variants carry only the data valid in that state, so a value or
//! controller can never be read outside `Running`.
//!
//! Borrows of `phase` end before user code runs. The one exception is the
//! editor passed to `modify`, which works on the value in place.

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use tracing::trace;

use crate::diagnostics::{Diagnostic, Reporter, StreamOptions};
use crate::diff::is_different;
use crate::error::{BoxError, Cause, Result, StreamError};
use crate::streamable::{Cleanup, Started};

use super::handle::{Edit, Mutation, Slot};
use super::subscription::Registry;
use super::{LifecycleState, StreamId};

/// Data owned while running.
pub(crate) struct Running<P, A> {
    pub(crate) current: P,
    /// Deep copy of the value at the last notification; only used for diffing.
    pub(crate) snapshot: P,
    pub(crate) cleanup: Option<Cleanup>,
    pub(crate) controller: Rc<A>,
    pub(crate) version: u64,
}

enum Change<'a, P> {
    Replace(P),
    InPlace(Box<dyn FnOnce(&mut P) + 'a>),
}

pub(crate) enum Phase<P, A> {
    Stopped,
    Starting { stop_requested: bool },
    Running(Running<P, A>),
    Error { cause: Cause },
}

impl<P, A> Phase<P, A> {
    pub(crate) fn lifecycle(&self) -> LifecycleState {
        match self {
            Self::Stopped => LifecycleState::Stopped,
            Self::Starting { .. } => LifecycleState::Starting,
            Self::Running(_) => LifecycleState::Running,
            Self::Error { .. } => LifecycleState::Error,
        }
    }
}

pub(crate) struct Core<P, A> {
    pub(crate) id: StreamId,
    pub(crate) phase: RefCell<Phase<P, A>>,
    pub(crate) subscribers: Rc<Registry<P>>,
    pub(crate) reporter: Reporter,
}

impl<P, A> Core<P, A> {
    pub(crate) fn new(options: StreamOptions) -> Self {
        Self {
            id: StreamId::next(),
            phase: RefCell::new(Phase::Starting {
                stop_requested: false,
            }),
            subscribers: Rc::new(Registry::new()),
            reporter: Reporter::new(options),
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.phase.borrow().lifecycle()
    }

    /// Borrow the running payload, or fail with the read error for the
    /// current state.
    pub(crate) fn with_running<R>(&self, f: impl FnOnce(&Running<P, A>) -> R) -> Result<R> {
        match &*self.phase.borrow() {
            Phase::Running(run) => Ok(f(run)),
            Phase::Error { cause } => Err(StreamError::StreamInErrorState {
                cause: cause.clone(),
            }),
            other => Err(StreamError::NotRunning {
                state: other.lifecycle(),
            }),
        }
    }

    /// Record a failed start: the stream enters `error` for good.
    pub(crate) fn fail(&self, err: BoxError) -> StreamError {
        let cause = Cause::from(err);
        *self.phase.borrow_mut() = Phase::Error {
            cause: cause.clone(),
        };
        self.reporter.emit(Diagnostic::StartFailed {
            stream: self.id,
            cause: cause.clone(),
        });
        StreamError::StartFailed { cause }
    }

    /// Record a successful start.
    ///
    /// Returns `Ok` when the stream is now running. A stop requested during
    /// `starting` is applied here: the start's cleanup runs at once and the
    /// result is `AlreadyStopped`.
    pub(crate) fn settle(&self, started: Started<P, A>) -> Result<()>
    where
        P: Clone,
    {
        let stop_requested = match &*self.phase.borrow() {
            Phase::Starting { stop_requested } => *stop_requested,
            // Settling twice would mean two initializer invocations.
            _ => return Err(StreamError::AlreadyStopped),
        };

        if stop_requested {
            *self.phase.borrow_mut() = Phase::Stopped;
            let Started {
                cleanup,
                controller,
                ..
            } = started;
            drop(controller);
            let cleaned = self.run_cleanup(cleanup);
            self.reporter.emit(Diagnostic::Stopped { stream: self.id });
            cleaned?;
            return Err(StreamError::AlreadyStopped);
        }

        let snapshot = started.initial_value.clone();
        *self.phase.borrow_mut() = Phase::Running(Running {
            current: started.initial_value,
            snapshot,
            cleanup: started.cleanup,
            controller: Rc::new(started.controller),
            version: 0,
        });
        self.reporter.emit(Diagnostic::Started { stream: self.id });
        Ok(())
    }

    /// Transition to `stopped`, running the cleanup routine if one is owned.
    pub(crate) fn stop(&self) -> Result<()> {
        let running = {
            let mut phase = self.phase.borrow_mut();
            match mem::replace(&mut *phase, Phase::Stopped) {
                Phase::Stopped => return Err(StreamError::AlreadyStopped),
                Phase::Starting {
                    stop_requested: true,
                } => {
                    *phase = Phase::Starting {
                        stop_requested: true,
                    };
                    return Err(StreamError::AlreadyStopped);
                }
                Phase::Starting {
                    stop_requested: false,
                } => {
                    *phase = Phase::Starting {
                        stop_requested: true,
                    };
                    drop(phase);
                    self.reporter.emit(Diagnostic::StopDeferred { stream: self.id });
                    return Ok(());
                }
                Phase::Error { .. } => None,
                Phase::Running(run) => Some(run),
            }
        };

        let result = match running {
            Some(Running {
                cleanup,
                controller,
                ..
            }) => {
                drop(controller);
                self.run_cleanup(cleanup)
            }
            None => Ok(()),
        };
        self.reporter.emit(Diagnostic::Stopped { stream: self.id });
        result
    }

    fn run_cleanup(&self, cleanup: Option<Cleanup>) -> Result<()> {
        let Some(cleanup) = cleanup else {
            return Ok(());
        };
        cleanup().map_err(|err| {
            let cause = Cause::from(err);
            self.reporter.emit(Diagnostic::CleanupFailed {
                stream: self.id,
                cause: cause.clone(),
            });
            StreamError::CleanupFailed { cause }
        })
    }

    fn rejected(&self) -> StreamError {
        StreamError::MutationRejected {
            state: self.state(),
        }
    }
}

impl<P: Clone + PartialEq, A> Slot<P> for Core<P, A> {
    fn id(&self) -> StreamId {
        self.id
    }

    fn lifecycle(&self) -> LifecycleState {
        self.state()
    }

    fn read(&self) -> Result<P> {
        let result = self.with_running(|run| run.current.clone());
        if let Err(StreamError::NotRunning { state }) = &result {
            self.reporter.emit(Diagnostic::ReadBeforeStart {
                stream: self.id,
                state: *state,
            });
        }
        result
    }

    fn apply(&self, edit: Edit<'_, P>) -> Result<Mutation> {
        let change = match edit {
            Edit::Replace(next) => Change::Replace(next),
            Edit::Update(updater) => {
                // Resolve against a copy so the updater may read the stream.
                let current = self
                    .with_running(|run| run.current.clone())
                    .map_err(|_| self.rejected())?;
                Change::Replace(updater(&current))
            }
            Edit::Modify(editor) => Change::InPlace(editor),
        };

        let (published, version) = {
            let mut phase = self.phase.borrow_mut();
            let state = phase.lifecycle();
            let Phase::Running(run) = &mut *phase else {
                return Err(StreamError::MutationRejected { state });
            };
            match change {
                Change::Replace(next) => run.current = next,
                Change::InPlace(editor) => editor(&mut run.current),
            }
            if !is_different(&run.current, &run.snapshot) {
                return Ok(Mutation::Unchanged);
            }
            run.snapshot = run.current.clone();
            run.version += 1;
            (run.snapshot.clone(), run.version)
        };

        trace!(target: "streambly", stream_id = %self.id, version, "publishing value");
        self.subscribers.notify(&published);
        Ok(Mutation::Notified)
    }

    fn report_ignored(&self, state: LifecycleState) {
        self.reporter.emit(Diagnostic::IgnoredMutation {
            stream: self.id,
            state,
        });
    }

    fn end(&self) {
        match self.stop() {
            Ok(()) => {}
            Err(StreamError::AlreadyStopped) => {
                self.reporter.emit(Diagnostic::EndAfterStop { stream: self.id });
            }
            // Already reported as `CleanupFailed`.
            Err(_) => {}
        }
    }
}
