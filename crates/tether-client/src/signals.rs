//! Lifecycle handler registries.
//!
//! A [`Signal`] holds any number of handlers. Registering returns a
//! [`Subscription`]; releasing or dropping it removes the handler again.
//! Handlers run synchronously on the task that fires the signal.
//!
//! Once `release` returns, the handler is not running and never runs again:
//! each handler sits behind its own lock, held for the duration of a call
//! and taken by `release` to switch the handler off.

use std::cell::Cell;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

struct Slot<A> {
    id: u64,
    /// Reentrant so a handler may release its own subscription.
    live: ReentrantMutex<Cell<bool>>,
    handler: Box<dyn Fn(&A) + Send + Sync>,
}

impl<A> Slot<A> {
    fn call(&self, arg: &A) {
        let live = self.live.lock();
        if live.get() {
            (self.handler)(arg);
        }
    }

    fn switch_off(&self) {
        self.live.lock().set(false);
    }
}

struct Registry<A> {
    next_id: u64,
    slots: Vec<Arc<Slot<A>>>,
}

/// A set of handlers invoked with `&A`.
pub struct Signal<A> {
    registry: Arc<Mutex<Registry<A>>>,
}

impl<A: 'static> Signal<A> {
    /// Empty signal.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                slots: Vec::new(),
            })),
        }
    }

    /// Register `handler` until the returned subscription is released.
    #[must_use = "dropping the subscription unregisters the handler"]
    pub fn subscribe(&self, handler: impl Fn(&A) + Send + Sync + 'static) -> Subscription {
        let slot = {
            let mut registry = self.registry.lock();
            let slot = Arc::new(Slot {
                id: registry.next_id,
                live: ReentrantMutex::new(Cell::new(true)),
                handler: Box::new(handler),
            });
            registry.next_id += 1;
            registry.slots.push(Arc::clone(&slot));
            slot
        };
        let id = slot.id;
        let slot: Weak<Slot<A>> = Arc::downgrade(&slot);
        let registry: Weak<Mutex<Registry<A>>> = Arc::downgrade(&self.registry);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(slot) = slot.upgrade() {
                    slot.switch_off();
                }
                if let Some(registry) = registry.upgrade() {
                    registry.lock().slots.retain(|s| s.id != id);
                }
            })),
        }
    }

    /// Invoke every registered handler that is still live.
    pub fn fire(&self, arg: &A) {
        let slots: Vec<Arc<Slot<A>>> = self.registry.lock().slots.clone();
        for slot in slots {
            slot.call(arg);
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.registry.lock().slots.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> std::fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("handlers", &self.registry.lock().slots.len())
            .finish()
    }
}

/// Registration token for a handler.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Unregister the handler, waiting for a call in progress on another
    /// thread to finish. Releasing twice is a no-op.
    pub fn release(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }

    /// Whether the handler is still registered through this token.
    pub fn is_active(&self) -> bool {
        self.remove.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// The three lifecycle signals of a hub connection.
///
/// Each carries an optional string: the error message for `closed` and
/// `reconnecting`, the new connection id for `reconnected`.
#[derive(Debug, Default)]
pub struct LifecycleSignals {
    /// The connection stopped for good.
    pub closed: Signal<Option<String>>,
    /// The connection dropped and reconnection started.
    pub reconnecting: Signal<Option<String>>,
    /// Reconnection succeeded.
    pub reconnected: Signal<Option<String>>,
}
