//! Cart state container.
//!
//! [`CartStore`] owns the authoritative in-memory [`Cart`] and keeps a
//! durable copy in sync:
//!
//! - Mutations apply synchronously and are visible immediately.
//! - Every mutation queues a full snapshot write (see [`PendingWrite`]).
//!   Persistence failures are logged and never undo the in-memory change.
//! - On open, the snapshot under the cart key is restored. A missing key or
//!   an unreadable snapshot yields an empty cart.
//! - Subscribers receive the new [`Cart`] through a `watch` channel whenever
//!   the item list changes.
//!
//! # Example
//!
//! ```rust,ignore
//! let cart = CartStore::open(store, DEVICE_CART_KEY).await?;
//! let mut updates = cart.subscribe();
//!
//! cart.add_to_cart(latte)?; // fire and forget
//! cart.update_quantity(ProductId::new(1), 3).wait().await?; // wait for disk
//!
//! updates.changed().await?;
//! println!("{} items, {}", cart.item_count(), cart.total());
//! ```

mod writer;

pub use writer::{PendingWrite, PersistError};

use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use cafe_loyalty_core::{Cart, CartError, CartLineItem, ProductId, UserId};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::storage::{KeyValueStore, StorageError, validate_key};

use writer::Writer;

/// Key of the device-wide cart snapshot.
pub const DEVICE_CART_KEY: &str = "cart";

/// Which cart a signed-in user sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CartScope {
    /// One cart per device, shared across accounts.
    #[default]
    Device,
    /// One cart per signed-in user; guests use the device cart.
    PerUser,
}

impl CartScope {
    /// Storage key for the cart of `user` under this scope.
    #[must_use]
    pub fn key_for(self, user: Option<UserId>) -> String {
        match (self, user) {
            (Self::PerUser, Some(user)) => format!("{DEVICE_CART_KEY}.{user}"),
            _ => DEVICE_CART_KEY.to_string(),
        }
    }
}

impl FromStr for CartScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "device" => Ok(Self::Device),
            "user" | "per-user" | "per_user" => Ok(Self::PerUser),
            other => Err(format!("expected 'device' or 'user', got '{other}'")),
        }
    }
}

/// Cart state container. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    state: watch::Sender<Cart>,
    /// Only locked inside `state`'s modify closures or for reads, so the
    /// lock order is always state then key.
    key: Mutex<String>,
    store: Arc<dyn KeyValueStore>,
    writer: Writer,
}

impl CartStore {
    /// Restore the cart stored under `key` and start the snapshot writer.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if `key` is not a valid storage
    /// key. Read and decode failures are not errors; they produce an empty
    /// cart.
    #[instrument(skip_all)]
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        key: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let key = key.into();
        validate_key(&key)?;

        let cart = load(store.as_ref(), &key).await;
        info!(%key, entries = cart.len(), "cart restored");

        let (state, _) = watch::channel(cart);
        Ok(Self {
            inner: Arc::new(CartStoreInner {
                state,
                key: Mutex::new(key),
                writer: Writer::spawn(Arc::clone(&store)),
                store,
            }),
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a line item, merging into a matching entry if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`CartError`] if the item has zero quantity, a negative price,
    /// or the merge would overflow. Nothing is changed or persisted then.
    pub fn add_to_cart(&self, item: CartLineItem) -> Result<PendingWrite, CartError> {
        let product_id = item.product_id;
        let quantity = item.quantity;
        let pending = self.mutate(|cart| cart.add(item).map(|()| true))?;
        debug!(%product_id, quantity, "added to cart");
        Ok(pending)
    }

    /// Remove every entry for `product_id`.
    pub fn remove_from_cart(&self, product_id: ProductId) -> PendingWrite {
        let mut removed = 0;
        let pending = self.mutate_infallible(|cart| {
            removed = cart.remove_product(product_id);
            removed > 0
        });
        debug!(%product_id, removed, "removed from cart");
        pending
    }

    /// Set the quantity of every entry for `product_id`; `quantity <= 0`
    /// removes them.
    pub fn update_quantity(&self, product_id: ProductId, quantity: i64) -> PendingWrite {
        let mut changed = 0;
        let pending = self.mutate_infallible(|cart| {
            changed = cart.update_quantity(product_id, quantity);
            changed > 0
        });
        debug!(%product_id, quantity, changed, "cart quantity updated");
        pending
    }

    /// Empty the cart.
    pub fn clear_cart(&self) -> PendingWrite {
        let pending = self.mutate_infallible(|cart| {
            let changed = !cart.is_empty();
            cart.clear();
            changed
        });
        debug!("cart cleared");
        pending
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current entries in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.inner.state.borrow().items().to_vec()
    }

    /// Copy of the current cart.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.inner.state.borrow().clone()
    }

    /// Sum of `unit_price * quantity` over all entries.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.inner.state.borrow().total()
    }

    /// Sum of quantities over all entries.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.inner.state.borrow().item_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().is_empty()
    }

    /// Receive the cart every time its contents change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.inner.state.subscribe()
    }

    /// Storage key snapshots are currently written to.
    #[must_use]
    pub fn key(&self) -> String {
        self.inner
            .key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Wait until every snapshot queued so far has been written or failed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::WriterStopped`] if the writer task is gone.
    /// Individual write failures are reported through their
    /// [`PendingWrite`] handles, not here.
    pub async fn flush(&self) -> Result<(), PersistError> {
        self.inner.writer.flush().await
    }

    /// Load the cart stored under `key` and write future snapshots there.
    ///
    /// Pending writes to the previous key are flushed first. Switching to
    /// the current key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if `key` is not a valid key.
    #[instrument(skip(self))]
    pub async fn switch_key(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        if self.key() == key {
            return Ok(());
        }

        if let Err(e) = self.flush().await {
            warn!(error = %e, "could not flush cart before switching keys");
        }
        let cart = load(self.inner.store.as_ref(), key).await;
        info!(entries = cart.len(), "switched cart");

        self.inner.state.send_modify(|current| {
            *self.inner.key.lock().unwrap_or_else(PoisonError::into_inner) = key.to_string();
            *current = cart;
        });
        Ok(())
    }

    /// Apply `f` under the state lock and queue a snapshot if it succeeds.
    ///
    /// `f` returns whether the item list changed; subscribers are only woken
    /// for real changes, but a snapshot is written after every successful
    /// mutation.
    fn mutate<F>(&self, f: F) -> Result<PendingWrite, CartError>
    where
        F: FnOnce(&mut Cart) -> Result<bool, CartError>,
    {
        let mut outcome = Ok(());
        let mut pending = None;
        self.inner.state.send_if_modified(|cart| match f(cart) {
            Ok(changed) => {
                let key = self
                    .inner
                    .key
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                pending = Some(self.inner.writer.enqueue(key, cart.items().to_vec()));
                changed
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome?;
        Ok(pending.unwrap_or_else(PendingWrite::closed))
    }

    fn mutate_infallible<F>(&self, f: F) -> PendingWrite
    where
        F: FnOnce(&mut Cart) -> bool,
    {
        self.mutate(|cart| Ok(f(cart)))
            .unwrap_or_else(|_| PendingWrite::closed())
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("key", &self.key())
            .field("entries", &self.inner.state.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Read and decode the snapshot under `key`, falling back to an empty cart.
async fn load(store: &dyn KeyValueStore, key: &str) -> Cart {
    let bytes = match store.get(key).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!(%key, "no stored cart");
            return Cart::new();
        }
        Err(e) => {
            warn!(%key, error = %e, "failed to read stored cart; starting empty");
            return Cart::new();
        }
    };

    match serde_json::from_slice::<Vec<CartLineItem>>(&bytes) {
        Ok(items) => {
            let (cart, dropped) = Cart::restore(items);
            if dropped > 0 {
                warn!(%key, dropped, "dropped invalid entries from stored cart");
            }
            cart
        }
        Err(e) => {
            warn!(%key, error = %e, "stored cart is unreadable; starting empty");
            Cart::new()
        }
    }
}
