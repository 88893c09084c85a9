//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Capability contracts, catalog discovery, and the command/event protocol."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Observer lists carrying the synchronous event protocol.
//!
//! Delivery policy, deliberately: fan-out runs on the emitting thread, in
//! registration order, with no isolation between listeners. Listeners are
//! infallible closures; one that panics unwinds through the emitter and
//! aborts the remainder of the fan-out, and one that blocks stalls the
//! emitter. Listener work is expected to be short.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Ticket returned by [`Observers::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

/// An ordered list of listeners for events of type `E`.
pub struct Observers<E> {
    inner: Mutex<ObserverInner<E>>,
}

struct ObserverInner<E> {
    subscribers: Vec<(ObserverHandle, Arc<dyn Fn(&E) + Send + Sync>)>,
    next_id: u64,
}

impl<E> Observers<E> {
    /// Empty list.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ObserverInner {
                subscribers: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Append a listener; it will be notified after every listener
    /// registered before it.
    pub fn subscribe(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> ObserverHandle {
        let mut inner = self.inner.lock();
        let handle = ObserverHandle(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push((handle, Arc::new(listener)));
        handle
    }

    /// Drop a listener. Returns whether the handle was still registered.
    pub fn unsubscribe(&self, handle: ObserverHandle) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(id, _)| *id != handle);
        inner.subscribers.len() != before
    }

    /// Notify every listener in registration order on the calling thread.
    /// Returns the number of listeners notified.
    ///
    /// The list is snapshotted before delivery, so a listener may
    /// subscribe or unsubscribe during the fan-out without deadlocking;
    /// such changes take effect from the next emission.
    pub fn emit(&self, event: &E) -> usize {
        let snapshot: Vec<Arc<dyn Fn(&E) + Send + Sync>> = self
            .inner
            .lock()
            .subscribers
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// True when nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.len())
            .finish()
    }
}
