#![forbid(unsafe_code)]

//! Subscriber registry and RAII subscription guards.
//!
//! # Invariants
//!
//! 1. Each fan-out delivers to the listeners registered when it began, each
//!    exactly once.
//! 2. A listener removed before or during a fan-out is not invoked after its
//!    removal.
//! 3. Membership is independent of the stream's lifecycle: stopping a stream
//!    does not drop its listeners.
//!
//! Listeners run with no registry borrow held, so they may subscribe,
//! unsubscribe, read the stream, or mutate it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Listener<P> = dyn Fn(&P);

struct Entry<P> {
    id: u64,
    active: Rc<Cell<bool>>,
    listener: Rc<Listener<P>>,
}

/// Set of listeners for one stream.
pub(crate) struct Registry<P> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<Entry<P>>>,
}

impl<P> Registry<P> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            entries: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Deliver `value` to every listener registered at this moment.
    pub(crate) fn notify(&self, value: &P) {
        let batch: Vec<(Rc<Cell<bool>>, Rc<Listener<P>>)> = self
            .entries
            .borrow()
            .iter()
            .map(|e| (Rc::clone(&e.active), Rc::clone(&e.listener)))
            .collect();
        for (active, listener) in batch {
            if active.get() {
                listener(value);
            }
        }
    }
}

impl<P: 'static> Registry<P> {
    pub(crate) fn subscribe(self: &Rc<Self>, listener: impl Fn(&P) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push(Entry {
            id,
            active: Rc::new(Cell::new(true)),
            listener: Rc::new(listener),
        });
        let weak: Weak<dyn Unsubscribe> = Rc::downgrade(self) as Weak<dyn Unsubscribe>;
        Subscription {
            registry: Some(weak),
            id,
        }
    }
}

trait Unsubscribe {
    fn remove(&self, id: u64);
}

impl<P> Unsubscribe for Registry<P> {
    fn remove(&self, id: u64) {
        let mut entries = self.entries.borrow_mut();
        if let Some(pos) = entries.iter().position(|e| e.id == id) {
            let entry = entries.swap_remove(pos);
            entry.active.set(false);
        }
    }
}

/// Guard for a registered listener. Dropping it unsubscribes.
///
/// Outlives its stream safely: once the stream is gone, dropping the guard
/// does nothing.
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    registry: Option<Weak<dyn Unsubscribe>>,
    id: u64,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keep the listener registered for the rest of the stream's life.
    pub fn detach(mut self) {
        self.registry = None;
    }

    /// Whether the listener is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.take().and_then(|weak| weak.upgrade()) {
            registry.remove(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
