//! In-process fan-out of document changes to subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use super::{ChangeEvent, Collection, Document};

type Watchers = HashMap<u64, (Collection, String, mpsc::UnboundedSender<ChangeEvent>)>;

#[derive(Default)]
struct HubState {
    next_id: u64,
    watchers: Watchers,
}

/// Registry of live subscriptions. Store backends publish every committed
/// write here; each subscriber receives the events for its document.
#[derive(Clone, Default)]
pub struct ChangeHub {
    state: Arc<Mutex<HubState>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watcher and queue `current` as its first event.
    pub fn subscribe(
        &self,
        collection: Collection,
        key: &str,
        current: Option<Document>,
    ) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is still in scope, so this send cannot fail.
        let _ = tx.send(ChangeEvent {
            collection,
            key: key.to_string(),
            document: current,
        });

        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let id = state.next_id;
        state.next_id += 1;
        state.watchers.insert(id, (collection, key.to_string(), tx));
        debug!(%collection, key, subscription = id, "Subscription registered");

        Subscription {
            receiver: rx,
            registration: Registration {
                id,
                hub: Arc::downgrade(&self.state),
            },
        }
    }

    /// Deliver a change to every watcher of that document.
    pub fn publish(&self, event: ChangeEvent) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.watchers.retain(|_, (collection, key, tx)| {
            if *collection != event.collection || *key != event.key {
                return true;
            }
            tx.send(event.clone()).is_ok()
        });
    }

    /// Number of live subscriptions.
    pub fn active(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .watchers
            .len()
    }
}

struct Registration {
    id: u64,
    hub: Weak<Mutex<HubState>>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(state) = self.hub.upgrade() {
            let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
            state.watchers.remove(&self.id);
            debug!(subscription = self.id, "Subscription released");
        }
    }
}

/// A live watch on one document. Dropping it (or calling
/// [`Subscription::unsubscribe`]) releases the registration.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
    registration: Registration,
}

impl Subscription {
    /// Wait for the next change. Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Take a change if one is already queued.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn unsubscribe(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.registration.id)
            .finish()
    }
}
