//! Command implementations.
//!
//! Every command opens the same local state: the file-backed store and the
//! delivery fee table. Only `checkout` and `resume` need the order API and the
//! gateway, and they load the full configuration themselves.

pub mod cart;
pub mod checkout;
pub mod delivery;
pub mod profile;

use tradepost_core::CustomerProfile;
use tradepost_storefront::config::LocalConfig;
use tradepost_storefront::delivery::{DeliveryResolver, DeliveryTable};
use tradepost_storefront::storage::{LocalStore, StorageError, keys};

/// Local state shared by every command.
pub struct Local {
    pub store: LocalStore,
    pub delivery: DeliveryResolver,
}

impl Local {
    /// Open the store and load the delivery table.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file is unreadable or the configured
    /// delivery table is invalid.
    pub fn open(config: &LocalConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = LocalStore::file(&config.store_path).map_err(|e: StorageError| {
            format!("Cannot open store {}: {e}", config.store_path.display())
        })?;

        let table = match &config.delivery_table_path {
            Some(path) => DeliveryTable::from_file(path)?,
            None => DeliveryTable::builtin(),
        };
        tracing::debug!(regions = table.regions().len(), "Delivery table loaded");

        Ok(Self {
            delivery: DeliveryResolver::new(table, store.clone()),
            store,
        })
    }

    /// The saved customer profile, if any.
    pub fn profile(&self) -> Option<CustomerProfile> {
        self.store.get(keys::CUSTOMER_PROFILE)
    }
}
