#![forbid(unsafe_code)]

//! Failure kinds surfaced by stream operations.
//!
//! The set is closed: every engine failure is one of the [`StreamError`]
//! variants so callers can branch exhaustively. Variants that wrap a user
//! failure carry it as a shared [`Cause`], which lets a captured start
//! failure be re-raised by every later read without being consumed.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::stream::LifecycleState;

/// Error type returned by initializers and cleanup routines.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, StreamError>;

/// A shared, cloneable underlying failure.
#[derive(Clone)]
pub struct Cause(Arc<dyn Error + Send + Sync + 'static>);

impl Cause {
    /// Wrap an arbitrary error.
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self(Arc::from(err.into()))
    }

    /// Borrow the wrapped error.
    #[must_use]
    pub fn get(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0
    }
}

impl From<BoxError> for Cause {
    fn from(err: BoxError) -> Self {
        Self(Arc::from(err))
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// The initializer returned an error, or its pending result failed.
    #[error("stream failed to start: {cause}")]
    StartFailed { cause: Cause },

    #[error("mutation rejected: stream is {state}")]
    MutationRejected { state: LifecycleState },

    /// The cleanup routine failed during `stop()`. The stream is stopped
    /// regardless.
    #[error("stream cleanup failed: {cause}")]
    CleanupFailed { cause: Cause },

    #[error("stream is already stopped")]
    AlreadyStopped,

    #[error("stream is not running (state: {state})")]
    NotRunning { state: LifecycleState },

    /// A read was attempted after the stream failed to start.
    #[error("stream is in error state: {cause}")]
    StreamInErrorState { cause: Cause },
}

impl StreamError {
    pub(crate) fn start_failed(cause: impl Into<Cause>) -> Self {
        Self::StartFailed {
            cause: cause.into(),
        }
    }

    /// The underlying failure, if this kind carries one.
    #[must_use]
    pub fn cause(&self) -> Option<&Cause> {
        match self {
            Self::StartFailed { cause }
            | Self::CleanupFailed { cause }
            | Self::StreamInErrorState { cause } => Some(cause),
            Self::MutationRejected { .. } | Self::AlreadyStopped | Self::NotRunning { .. } => None,
        }
    }

    /// Whether a consumer should treat this as "not ready yet" and withhold
    /// rendering rather than report a failure.
    #[must_use]
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            Self::NotRunning { .. } | Self::StreamInErrorState { .. } | Self::MutationRejected { .. }
        )
    }
}
