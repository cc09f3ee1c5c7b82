//! Page-scoped publish/subscribe between independently mounted widgets.
//!
//! Events carry no payload: a consumer re-fetches whatever state it owns when
//! notified, so several producers can never hand it a stale snapshot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationEvent {
    /// A per-assignment status changed; aggregate progress is stale.
    ProgressChanged,
    HideProgress,
    ShowProgress,
    /// The level changed; the list filters by difficulty and must re-sync.
    ListShouldReload,
}

type Handler = Arc<dyn Fn(NotificationEvent) + Send + Sync>;

struct Listener {
    id: u64,
    event: NotificationEvent,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<Listener>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cheap to clone; all clones share one listener registry.
#[derive(Clone, Default)]
pub struct NotificationBus {
    registry: Arc<Mutex<Registry>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event`. The handler stays registered until the
    /// returned [`Subscription`] is dropped or explicitly unsubscribed.
    #[must_use = "dropping the subscription unsubscribes the handler immediately"]
    pub fn subscribe<F>(&self, event: NotificationEvent, handler: F) -> Subscription
    where
        F: Fn(NotificationEvent) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push(Listener {
            id,
            event,
            handler: Arc::new(handler),
        });
        debug!(?event, listener_id = id, "bus: subscribed");
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Invokes every listener currently registered for `event`, in
    /// registration order, on the calling thread.
    ///
    /// Dispatch runs over a snapshot taken without holding the registry lock,
    /// so handlers may subscribe, unsubscribe or emit. A listener removed
    /// while the dispatch is running is skipped from then on; listeners added
    /// during dispatch only see later emissions.
    pub fn emit(&self, event: NotificationEvent) {
        let snapshot: Vec<(u64, Handler)> = lock(&self.registry)
            .listeners
            .iter()
            .filter(|listener| listener.event == event)
            .map(|listener| (listener.id, Arc::clone(&listener.handler)))
            .collect();
        debug!(?event, listeners = snapshot.len(), "bus: emit");

        for (id, handler) in snapshot {
            if !self.is_registered(id) {
                continue;
            }
            handler(event);
        }
    }

    pub fn listener_count(&self, event: NotificationEvent) -> usize {
        lock(&self.registry)
            .listeners
            .iter()
            .filter(|listener| listener.event == event)
            .count()
    }

    fn is_registered(&self, id: u64) -> bool {
        lock(&self.registry)
            .listeners
            .iter()
            .any(|listener| listener.id == id)
    }
}

/// Handle tying a bus listener to its owner's lifetime.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Removal happens in Drop.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        lock(&registry)
            .listeners
            .retain(|listener| listener.id != self.id);
        debug!(listener_id = self.id, "bus: unsubscribed");
    }
}

#[cfg(test)]
#[path = "tests/bus_tests.rs"]
mod tests;
