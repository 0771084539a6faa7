//! Local persisted state.
//!
//! The storefront keeps the cart, the delivery selection, the customer profile
//! and any in-flight checkout in a small key/value store. Values are JSON and
//! the whole map is written back on every mutation, so a crash never leaves a
//! half-written entry behind.
//!
//! Reads are forgiving: a value that no longer deserializes into the requested
//! type is reported as absent and logged, never raised.
//!
//! Every write publishes a [`StorageEvent`] that other flows may observe via
//! [`LocalStore::subscribe`].

mod backend;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Capacity of the storage-change channel.
const EVENT_CAPACITY: usize = 64;

/// Keys for locally persisted values.
pub mod keys {
    /// Cart line items.
    pub const CART_ITEMS: &str = "cart_items";

    /// Cart identifier.
    pub const CART_ID: &str = "cart_id";

    /// Current delivery selection.
    pub const DELIVERY_INFO: &str = "delivery_info";

    /// Checkout details awaiting payment confirmation.
    pub const PENDING_CHECKOUT: &str = "pending_checkout_details";

    /// Address details awaiting payment confirmation.
    pub const PENDING_ADDRESS: &str = "pending_address_details";

    /// Order code of the payment currently awaiting confirmation.
    pub const PENDING_ORDER_ID: &str = "pending_order_id";

    /// Logged-in customer profile.
    pub const CUSTOMER_PROFILE: &str = "customer_profile";

    /// Step log of an in-progress or partially failed order commit.
    pub const CHECKOUT_SAGA: &str = "checkout_saga";
}

/// Errors that can occur when persisting local state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded.
    #[error("Storage encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A change to a stored key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    /// `false` when the key was removed.
    pub present: bool,
}

/// Key/value store for client-side state.
///
/// Cheaply cloneable; clones share the same entries and backend.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<LocalStoreInner>,
}

struct LocalStoreInner {
    entries: Mutex<Map<String, Value>>,
    backend: Box<dyn StorageBackend>,
    events: broadcast::Sender<StorageEvent>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("keys", &self.lock().keys().cloned().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl LocalStore {
    /// Open a store over the given backend, loading whatever it holds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the backend cannot be read.
    pub fn open(backend: impl StorageBackend + 'static) -> Result<Self, StorageError> {
        let entries = backend.load()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(LocalStoreInner {
                entries: Mutex::new(entries),
                backend: Box::new(backend),
                events,
            }),
        })
    }

    /// Open a store persisted to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the file exists but cannot be read.
    pub fn file(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open(FileBackend::new(path.as_ref()))
    }

    /// A store that lives only as long as the process.
    #[must_use]
    pub fn in_memory() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(LocalStoreInner {
                entries: Mutex::new(Map::new()),
                backend: Box::new(MemoryBackend),
                events,
            }),
        }
    }

    /// Read a typed value.
    ///
    /// Returns `None` if the key is absent or its value does not match `T`.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.lock().get(key).cloned()?;
        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable stored value");
                None
            }
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Store a value, replacing any previous one.
    ///
    /// The in-memory entries only change once the backend has accepted them.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or persisted.
    pub fn insert<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value)?;
        {
            let mut entries = self.lock();
            let mut next = entries.clone();
            next.insert(key.to_string(), value);
            self.inner.backend.persist(&next)?;
            *entries = next;
        }
        self.notify(key, true);
        Ok(())
    }

    /// Remove a key. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the remaining entries cannot be persisted.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        {
            let mut entries = self.lock();
            if !entries.contains_key(key) {
                return Ok(());
            }
            let mut next = entries.clone();
            next.remove(key);
            self.inner.backend.persist(&next)?;
            *entries = next;
        }
        self.notify(key, false);
        Ok(())
    }

    /// Observe storage changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.inner.events.subscribe()
    }

    fn notify(&self, key: &str, present: bool) {
        debug!(key, present, "Storage changed");
        // No receivers is the normal case
        let _ = self.inner.events.send(StorageEvent {
            key: key.to_string(),
            present,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
