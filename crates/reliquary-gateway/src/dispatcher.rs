use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tracing::debug;

use reliquary_types::events::GatewayEvent;

const BROADCAST_CAPACITY: usize = 1024;

/// Fans out join-table insert events to every connected gateway client.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// All connections receive all events and filter by character themselves
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Number of connections currently holding a character filter
    listeners: AtomicUsize,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                listeners: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    /// Connection-level events (no character scope) are dropped.
    pub fn broadcast(&self, event: GatewayEvent) {
        if event.character_id().is_none() {
            return;
        }
        // No receivers just means nobody is watching right now.
        if self.inner.broadcast_tx.send(event).is_err() {
            debug!("Dropped gateway event: no listeners");
        }
    }

    pub fn listener_joined(&self) {
        self.inner.listeners.fetch_add(1, Ordering::Relaxed);
    }

    pub fn listener_left(&self) {
        self.inner.listeners.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.load(Ordering::Relaxed)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
