//! Synchronous fan-out to registered listeners.

use super::types::{BusEvent, BusReceiver, ListenerId};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

#[derive(Clone)]
enum Listener {
    Handler(Handler),
    Channel(Sender<BusEvent>),
}

#[derive(Clone)]
struct Entry {
    id: ListenerId,
    listener: Listener,
}

/// Listener list, replaced wholesale on every change so `publish` can iterate
/// a snapshot while handlers subscribe or unsubscribe.
type Registry = RwLock<Arc<Vec<Entry>>>;

/// In-memory broadcast between the subscription manager and its consumers.
pub struct EventBus {
    registry: Arc<Registry>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(Arc::new(Vec::new()))),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler. It stays registered until the returned
    /// subscription is dropped or unsubscribed.
    pub fn subscribe<F>(&self, handler: F) -> BusSubscription
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let id = self.insert(Listener::Handler(Arc::new(handler)));
        BusSubscription {
            id,
            registry: Arc::downgrade(&self.registry),
            detached: false,
        }
    }

    /// Register a bounded channel listener.
    pub fn subscribe_channel(&self, capacity: usize) -> BusReceiver {
        let (sender, receiver) = bounded(capacity);
        let id = self.insert(Listener::Channel(sender));
        BusReceiver { id, receiver }
    }

    /// Remove a listener by id. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        remove(&self.registry, id)
    }

    /// Deliver `event` to every listener registered at the time of the call,
    /// in registration order. Returns the number of listeners reached.
    pub fn publish(&self, event: impl Into<BusEvent>) -> usize {
        let event = event.into();
        let snapshot = Arc::clone(&*self.registry.read());

        let mut delivered = 0;
        let mut dropped = Vec::new();

        for entry in snapshot.iter() {
            match &entry.listener {
                Listener::Handler(handler) => {
                    let result = catch_unwind(AssertUnwindSafe(|| handler(&event)));
                    if result.is_err() {
                        error!(listener = %entry.id, "bus listener panicked");
                    } else {
                        delivered += 1;
                    }
                }
                Listener::Channel(sender) => match sender.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                        dropped.push(entry.id);
                    }
                },
            }
        }

        for id in dropped {
            debug!(listener = %id, "dropping channel listener");
            remove(&self.registry, id);
        }

        delivered
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.registry.read().len()
    }

    fn insert(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut registry = self.registry.write();
        let mut entries = Vec::with_capacity(registry.len() + 1);
        entries.extend(registry.iter().cloned());
        entries.push(Entry { id, listener });
        *registry = Arc::new(entries);
        id
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn remove(registry: &Registry, id: ListenerId) -> bool {
    let mut registry = registry.write();
    if !registry.iter().any(|e| e.id == id) {
        return false;
    }
    let entries: Vec<Entry> = registry.iter().filter(|e| e.id != id).cloned().collect();
    *registry = Arc::new(entries);
    true
}

/// Capability to remove a handler from the bus.
///
/// Dropping it unsubscribes; call `detach` to keep the handler registered
/// for the lifetime of the bus.
pub struct BusSubscription {
    id: ListenerId,
    registry: Weak<Registry>,
    detached: bool,
}

impl BusSubscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the handler. Safe to call from inside the handler itself.
    pub fn unsubscribe(self) {
        drop(self)
    }

    /// Keep the handler registered and give up the capability.
    pub fn detach(mut self) -> ListenerId {
        self.detached = true;
        self.id
    }
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            remove(&registry, self.id);
        }
    }
}
