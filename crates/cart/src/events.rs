//! Cart change notifications.
//!
//! Two ways to follow the cart:
//!
//! - callbacks registered with [`CartStore::subscribe`](crate::CartStore::subscribe),
//!   invoked in registration order after each change
//! - a tokio broadcast receiver from [`CartStore::events`](crate::CartStore::events)
//!   for async consumers; slow receivers lose the oldest events

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use go_marketplace_core::{CartChange, LineItem, ProductId};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::MAX_EVENT_CAPACITY;

/// What caused a cart event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartEventKind {
    /// A persisted cart was loaded into memory.
    Hydrated,
    /// A mutation changed the cart.
    Changed(CartChange),
}

/// Notification sent after the cart changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEvent {
    pub kind: CartEventKind,
    /// Product affected by the mutation (`None` for hydration).
    pub product_id: Option<ProductId>,
    /// Full cart after the change.
    pub products: Vec<LineItem>,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&CartEvent) + Send + Sync>;

/// Fan-out of cart events to callbacks and broadcast receivers.
pub(crate) struct Notifier {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(SubscriptionId, Callback)>>,
    sender: broadcast::Sender<CartEvent>,
}

impl Notifier {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.clamp(1, MAX_EVENT_CAPACITY));
        Self {
            next_id: AtomicU64::new(1),
            callbacks: Mutex::new(Vec::new()),
            sender,
        }
    }

    pub(crate) fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&CartEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub(crate) fn receiver(&self) -> broadcast::Receiver<CartEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
            + self.sender.receiver_count()
    }

    /// Deliver an event to every subscriber.
    ///
    /// Callbacks run outside the registry lock so they may unsubscribe.
    pub(crate) fn publish(&self, event: &CartEvent) {
        let callbacks: Vec<Callback> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(event);
        }

        match self.sender.send(event.clone()) {
            Ok(count) => debug!(receivers = count, "Published cart event"),
            Err(_) => debug!("Published cart event but no receivers"),
        }
    }
}
