//! The cart store.
//!
//! # Lifecycle
//!
//! A store starts unloaded. [`CartStore::open`] hydrates it from storage before
//! handing it out; a store built with [`CartStore::new`] hydrates on the first
//! call to [`CartStore::load`] or on its first mutation, whichever comes first.
//!
//! # Mutations
//!
//! Mutations on one store are queued: each holds the store's queue lock while
//! it
//! 1. applies the operation to a copy of the current cart,
//! 2. writes that copy to the storage record,
//! 3. swaps the copy in as the current cart and notifies subscribers.
//!
//! Each mutation runs on its own task, so dropping the caller's future (a
//! timeout, a `select!`, a closed screen) cannot stop it between the write
//! and the swap. The persisted record therefore never lags behind the
//! in-memory cart. A failed write is logged and reported through
//! [`MutationResult::persisted`]; the in-memory cart is still updated.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use go_marketplace_core::{Cart, CartChange, CartSummary, LineItem, NewLineItem, ProductId};
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::config::CartConfig;
use crate::error::Result;
use crate::events::{CartEvent, CartEventKind, Notifier, SubscriptionId};
use crate::storage::KeyValueStore;

/// Result of hydrating the store from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydration {
    /// A persisted cart with this many lines was loaded.
    Restored { lines: usize },
    /// No record exists; the cart starts empty.
    Empty,
    /// The record could not be read or parsed; the cart starts empty.
    Discarded,
    /// The store was already hydrated; nothing was read.
    AlreadyLoaded,
}

/// Result of a cart mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationResult {
    /// What the operation did to the cart.
    pub change: CartChange,
    /// Whether the post-mutation cart was written to storage.
    pub persisted: bool,
}

/// Shared handle to the cart.
///
/// This struct is cheaply cloneable via `Arc`; all clones see the same cart.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    state: watch::Sender<Cart>,
    loaded: AtomicBool,
    queue: Mutex<()>,
    notifier: Notifier,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("key", &self.inner.key)
            .field("loaded", &self.is_loaded())
            .field("lines", &self.inner.state.borrow().len())
            .field("subscribers", &self.inner.notifier.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create an unloaded store over `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, config: &CartConfig) -> Self {
        let (state, _) = watch::channel(Cart::new());
        Self {
            inner: Arc::new(CartStoreInner {
                storage,
                key: config.storage_key.clone(),
                state,
                loaded: AtomicBool::new(false),
                queue: Mutex::new(()),
                notifier: Notifier::new(config.event_capacity),
            }),
        }
    }

    /// Create a store and hydrate it from storage.
    pub async fn open(storage: Arc<dyn KeyValueStore>, config: &CartConfig) -> Self {
        let store = Self::new(storage, config);
        store.load().await;
        store
    }

    /// Hydrate the cart from storage.
    ///
    /// Runs at most once per store. Read and parse failures are logged and
    /// leave the cart empty.
    #[instrument(skip(self), fields(key = %self.inner.key))]
    pub async fn load(&self) -> Hydration {
        let _queue = self.inner.queue.lock().await;
        self.hydrate().await
    }

    /// Whether hydration has completed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::Acquire)
    }

    /// Key of the persisted cart record.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.inner.key
    }

    /// Snapshot of the current line items.
    #[must_use]
    pub fn products(&self) -> Vec<LineItem> {
        self.inner.state.borrow().items().to_vec()
    }

    /// Snapshot of the current cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.inner.state.borrow().clone()
    }

    /// Totals of the current cart.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        self.inner.state.borrow().summary()
    }

    /// Receiver that always holds the latest cart.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Cart> {
        self.inner.state.subscribe()
    }

    /// Register a callback invoked after every cart change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&CartEvent) + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(callback)
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.notifier.unsubscribe(id)
    }

    /// Broadcast receiver of cart events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<CartEvent> {
        self.inner.notifier.receiver()
    }

    /// Add one unit of a product.
    ///
    /// A product already in the cart is incremented; a new one is appended
    /// with quantity 1.
    #[instrument(skip(self, item), fields(product_id = %item.id))]
    pub async fn add_to_cart(&self, item: NewLineItem) -> MutationResult {
        let id = item.id.clone();
        self.apply(id, move |cart| cart.add(item)).await
    }

    /// Add one unit to an existing line. Unknown IDs leave the cart unchanged.
    #[instrument(skip(self, id), fields(product_id = %id))]
    pub async fn increment(&self, id: &str) -> MutationResult {
        let owned = id.to_owned();
        self.apply(ProductId::new(id), move |cart| cart.increment(&owned))
            .await
    }

    /// Take one unit from an existing line, removing it when none remain.
    /// Unknown IDs leave the cart unchanged.
    #[instrument(skip(self, id), fields(product_id = %id))]
    pub async fn decrement(&self, id: &str) -> MutationResult {
        let owned = id.to_owned();
        self.apply(ProductId::new(id), move |cart| cart.decrement(&owned))
            .await
    }

    /// Read and decode the persisted cart record directly.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the record cannot be read and
    /// `CartError::Serialization` if it is malformed.
    pub async fn read_persisted(&self) -> Result<Option<Cart>> {
        let Some(raw) = self.inner.storage.get(&self.inner.key).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Run a mutation to completion on a separate task.
    async fn apply<F>(&self, product_id: ProductId, op: F) -> MutationResult
    where
        F: FnOnce(&mut Cart) -> CartChange + Send + 'static,
    {
        let store = self.clone();
        let task = tokio::spawn(
            async move { store.commit(product_id, op).await }.in_current_span(),
        );

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                error!(error = %e, "Cart mutation task did not complete");
                MutationResult {
                    change: CartChange::Unchanged,
                    persisted: false,
                }
            }
        }
    }

    /// Compute, persist, then publish. Holds the queue lock throughout.
    async fn commit<F>(&self, product_id: ProductId, op: F) -> MutationResult
    where
        F: FnOnce(&mut Cart) -> CartChange,
    {
        let _queue = self.inner.queue.lock().await;
        self.hydrate().await;

        let mut next = self.inner.state.borrow().clone();
        let change = op(&mut next);
        let persisted = self.persist(&next).await;

        match change {
            CartChange::Unchanged => debug!("Product not in cart"),
            _ => info!(?change, lines = next.len(), persisted, "Cart updated"),
        }

        let products = next.items().to_vec();
        self.inner.state.send_replace(next);

        if change.is_change() {
            self.inner.notifier.publish(&CartEvent {
                kind: CartEventKind::Changed(change),
                product_id: Some(product_id),
                products,
            });
        }

        MutationResult { change, persisted }
    }

    /// Load the persisted cart. Callers must hold the queue lock.
    async fn hydrate(&self) -> Hydration {
        if self.is_loaded() {
            return Hydration::AlreadyLoaded;
        }

        let (cart, outcome) = match self.inner.storage.get(&self.inner.key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Cart>(&raw) {
                Ok(cart) => {
                    let lines = cart.len();
                    (cart, Hydration::Restored { lines })
                }
                Err(e) => {
                    warn!(error = %e, "Discarding malformed cart record");
                    (Cart::new(), Hydration::Discarded)
                }
            },
            Ok(None) => (Cart::new(), Hydration::Empty),
            Err(e) => {
                warn!(error = %e, "Failed to read cart record, starting empty");
                (Cart::new(), Hydration::Discarded)
            }
        };

        info!(?outcome, "Cart hydrated");

        let products = (!cart.is_empty()).then(|| cart.items().to_vec());
        self.inner.state.send_replace(cart);
        self.inner.loaded.store(true, Ordering::Release);

        if let Some(products) = products {
            self.inner.notifier.publish(&CartEvent {
                kind: CartEventKind::Hydrated,
                product_id: None,
                products,
            });
        }

        outcome
    }

    /// Write `cart` to the storage record. Failures are logged, not returned.
    async fn persist(&self, cart: &Cart) -> bool {
        let raw = match serde_json::to_string(cart) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to encode cart record");
                return false;
            }
        };

        match self.inner.storage.set(&self.inner.key, &raw).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to persist cart, keeping in-memory state");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use go_marketplace_core::{Price, Quantity};

    use super::*;
    use crate::config::DEFAULT_STORAGE_KEY;
    use crate::storage::{MemoryStore, StorageError};

    fn widget(id: &str) -> NewLineItem {
        NewLineItem::new(id, "Widget", "u", Price::from_cents(999))
    }

    fn quantity_of(store: &CartStore, id: &str) -> Option<u32> {
        store.cart().get(id).map(|item| item.quantity.get())
    }

    async fn open(storage: &Arc<MemoryStore>) -> CartStore {
        CartStore::open(storage.clone(), &CartConfig::default()).await
    }

    fn persisted(storage: &MemoryStore) -> Cart {
        serde_json::from_str(&storage.value(DEFAULT_STORAGE_KEY).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_open_without_record_is_empty() {
        let storage = Arc::new(MemoryStore::new());
        let store = CartStore::new(storage.clone(), &CartConfig::default());

        assert!(!store.is_loaded());
        assert_eq!(store.load().await, Hydration::Empty);
        assert!(store.is_loaded());
        assert!(store.products().is_empty());
        assert_eq!(store.load().await, Hydration::AlreadyLoaded);
    }

    #[tokio::test]
    async fn test_open_restores_record() {
        let json = r#"[{"id":"p1","title":"Widget","image_url":"u","price":9.99,"quantity":2}]"#;
        let storage = Arc::new(MemoryStore::with_value(DEFAULT_STORAGE_KEY, json));
        let store = CartStore::new(storage.clone(), &CartConfig::default());

        assert_eq!(store.load().await, Hydration::Restored { lines: 1 });
        assert_eq!(quantity_of(&store, "p1"), Some(2));
    }

    #[tokio::test]
    async fn test_malformed_record_starts_empty() {
        for raw in [
            "not json",
            r#"{"id":"p1"}"#,
            r#"[{"id":"p1","title":"A","image_url":"u","price":1,"quantity":0}]"#,
        ] {
            let storage = Arc::new(MemoryStore::with_value(DEFAULT_STORAGE_KEY, raw));
            let store = CartStore::new(storage.clone(), &CartConfig::default());

            assert_eq!(store.load().await, Hydration::Discarded, "record: {raw}");
            assert!(store.products().is_empty());
        }
    }

    #[tokio::test]
    async fn test_read_failure_starts_empty() {
        let storage = Arc::new(MemoryStore::with_value(DEFAULT_STORAGE_KEY, "[]"));
        storage.fail_reads(true);
        let store = CartStore::new(storage.clone(), &CartConfig::default());

        assert_eq!(store.load().await, Hydration::Discarded);
        assert!(store.is_loaded());
        assert!(store.products().is_empty());
    }

    #[tokio::test]
    async fn test_mutation_before_load_hydrates_first() {
        let json = r#"[{"id":"p1","title":"Widget","image_url":"u","price":9.99,"quantity":1}]"#;
        let storage = Arc::new(MemoryStore::with_value(DEFAULT_STORAGE_KEY, json));
        let store = CartStore::new(storage.clone(), &CartConfig::default());

        let result = store.increment("p1").await;

        assert_eq!(
            result.change,
            CartChange::Incremented {
                quantity: Quantity::new(2).unwrap()
            }
        );
        assert!(store.is_loaded());
        assert_eq!(quantity_of(&store, "p1"), Some(2));
    }

    #[tokio::test]
    async fn test_persisted_record_tracks_every_mutation() {
        let storage = Arc::new(MemoryStore::new());
        let store = open(&storage).await;

        store.add_to_cart(widget("p1")).await;
        assert_eq!(persisted(&storage), store.cart());

        store.add_to_cart(widget("p2")).await;
        assert_eq!(persisted(&storage), store.cart());

        store.increment("p1").await;
        assert_eq!(persisted(&storage), store.cart());

        store.decrement("p2").await;
        assert_eq!(persisted(&storage), store.cart());
        assert_eq!(store.products().len(), 1);
    }

    #[tokio::test]
    async fn test_example_scenario() {
        let storage = Arc::new(MemoryStore::new());
        let store = open(&storage).await;

        assert_eq!(store.add_to_cart(widget("p1")).await.change, CartChange::Added);
        store.add_to_cart(widget("p1")).await;
        assert_eq!(quantity_of(&store, "p1"), Some(2));
        store.increment("p1").await;
        assert_eq!(quantity_of(&store, "p1"), Some(3));

        store.decrement("p1").await;
        store.decrement("p1").await;
        assert_eq!(quantity_of(&store, "p1"), Some(1));
        assert_eq!(store.decrement("p1").await.change, CartChange::Removed);

        assert!(store.products().is_empty());
        assert!(persisted(&storage).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_still_persists() {
        let storage = Arc::new(MemoryStore::new());
        let store = open(&storage).await;

        let result = store.decrement("missing").await;

        assert_eq!(result.change, CartChange::Unchanged);
        assert!(result.persisted);
        assert_eq!(storage.value(DEFAULT_STORAGE_KEY).as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_write_failure_keeps_in_memory_change() {
        let storage = Arc::new(MemoryStore::new());
        let store = open(&storage).await;
        storage.fail_writes(true);

        let result = store.add_to_cart(widget("p1")).await;

        assert_eq!(result.change, CartChange::Added);
        assert!(!result.persisted);
        assert_eq!(quantity_of(&store, "p1"), Some(1));
        assert_eq!(storage.value(DEFAULT_STORAGE_KEY), None);

        storage.fail_writes(false);
        assert!(store.increment("p1").await.persisted);
        assert_eq!(persisted(&storage), store.cart());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes_only() {
        let storage = Arc::new(MemoryStore::new());
        let store = open(&storage).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let id = store.subscribe(move |event| {
            assert!(matches!(event.kind, CartEventKind::Changed(_)));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.add_to_cart(widget("p1")).await;
        store.increment("missing").await;
        store.decrement("p1").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(store.unsubscribe(id));
        store.add_to_cart(widget("p1")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_event_carries_post_change_snapshot() {
        let storage = Arc::new(MemoryStore::new());
        let store = open(&storage).await;
        let mut events = store.events();

        store.add_to_cart(widget("p1")).await;
        let event = events.recv().await.unwrap();

        assert_eq!(event.kind, CartEventKind::Changed(CartChange::Added));
        assert_eq!(event.product_id, Some(ProductId::new("p1")));
        assert_eq!(event.products, store.products());
    }

    #[tokio::test]
    async fn test_hand_built_config_with_huge_capacity() {
        let config = CartConfig {
            event_capacity: usize::MAX,
            ..CartConfig::default()
        };
        let store = CartStore::open(Arc::new(MemoryStore::new()), &config).await;
        let mut events = store.events();

        store.add_to_cart(widget("p1")).await;

        assert_eq!(
            events.recv().await.unwrap().kind,
            CartEventKind::Changed(CartChange::Added)
        );
    }

    #[tokio::test]
    async fn test_watch_receiver_sees_latest_cart() {
        let storage = Arc::new(MemoryStore::new());
        let store = open(&storage).await;
        let mut rx = store.watch();

        store.add_to_cart(widget("p1")).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_queued() {
        let storage = Arc::new(MemoryStore::new());
        let store = open(&storage).await;
        store.add_to_cart(widget("p1")).await;

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment("p1").await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().persisted);
        }

        assert_eq!(quantity_of(&store, "p1"), Some(51));
        assert_eq!(persisted(&storage), store.cart());
        assert_eq!(storage.write_count(), 51);
    }

    /// Storage whose writes land immediately but only acknowledge later.
    struct SlowAckStore {
        inner: MemoryStore,
        delay: std::time::Duration,
    }

    #[async_trait::async_trait]
    impl KeyValueStore for SlowAckStore {
        async fn get(&self, key: &str) -> std::result::Result<Option<String>, StorageError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> std::result::Result<(), StorageError> {
            self.inner.set(key, value).await?;
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_split_record_and_memory() {
        let storage = Arc::new(SlowAckStore {
            inner: MemoryStore::new(),
            delay: std::time::Duration::from_millis(200),
        });
        let store = CartStore::open(storage.clone(), &CartConfig::default()).await;

        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            store.add_to_cart(widget("p1")),
        )
        .await;
        assert!(timed_out.is_err());

        // Queued behind the abandoned mutation, so it returns once that finishes.
        assert_eq!(store.load().await, Hydration::AlreadyLoaded);

        assert_eq!(quantity_of(&store, "p1"), Some(1));
        assert_eq!(store.read_persisted().await.unwrap(), Some(store.cart()));
    }

    #[tokio::test]
    async fn test_read_persisted() {
        let storage = Arc::new(MemoryStore::new());
        let store = open(&storage).await;
        assert!(store.read_persisted().await.unwrap().is_none());

        store.add_to_cart(widget("p1")).await;
        assert_eq!(store.read_persisted().await.unwrap(), Some(store.cart()));

        storage.insert(DEFAULT_STORAGE_KEY, "garbage");
        assert!(matches!(
            store.read_persisted().await,
            Err(crate::CartError::Serialization(_))
        ));
    }

    #[test]
    fn test_debug_output() {
        let store = CartStore::new(Arc::new(MemoryStore::new()), &CartConfig::default());
        let debug = format!("{store:?}");
        assert!(debug.contains("@GoMarketplace:products"));
        assert!(debug.contains("loaded: false"));
    }
}
