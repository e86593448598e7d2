#![forbid(unsafe_code)]

//! Reactive value streams.
//!
//! A [`Stream`] owns one slot of application state. An initializer
//! ([`Streamable`]) produces its starting value, a controller exposing the
//! operations callers may invoke, and an optional cleanup routine. Mutations
//! flow through a [`Handle`]; each accepted mutation is deep-compared with
//! the last published snapshot and, when different, fanned out to every
//! subscriber.
//!
//! ```
//! use futures::executor::LocalPool;
//! use streambly::{Start, Started, Stream, streamable};
//!
//! let init = streamable::<u32>()
//!     .api::<streambly::Handle<u32>>()
//!     .implement(|handle, seed, ()| Ok(Start::ready(Started::new(seed, handle))));
//!
//! let pool = LocalPool::new();
//! let stream = Stream::new(&pool.spawner(), &init, 0, ()).unwrap();
//! let controller = stream.controller().unwrap();
//! controller.update(|n| n + 1);
//! assert_eq!(stream.value().unwrap(), 1);
//! ```

pub mod deferred;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod projection;
pub mod stream;
pub mod streamable;

pub use diagnostics::{Diagnostic, StreamOptions};
pub use error::{BoxError, Cause, Result, StreamError};
pub use projection::Projection;
pub use stream::{
    Handle, LifecycleState, Mutation, StartSignal, Stream, StreamId, Subscription,
};
pub use streamable::{Cleanup, Start, Started, Streamable, streamable};
