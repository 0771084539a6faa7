//! Local cart store.
//!
//! The persisted item list is the source of truth between sessions. Every
//! mutation reads the whole list, changes it, and writes the whole list back.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, instrument};

use tradepost_core::{CartId, CartItem, ProductId};

use crate::storage::{LocalStore, StorageError, keys};

/// Errors that can occur when changing the cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantities start at one.
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// The product is not in the cart.
    #[error("Product not in cart: {0}")]
    NotInCart(ProductId),

    /// Persisting the cart failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Cart backed by the local store.
#[derive(Debug, Clone)]
pub struct CartStore {
    store: LocalStore,
}

impl CartStore {
    #[must_use]
    pub const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// All cart lines. A corrupt stored list reads as an empty cart.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.store
            .get::<Vec<CartItem>>(keys::CART_ITEMS)
            .unwrap_or_default()
    }

    /// The cart identifier, generated and persisted on first use.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a newly generated id cannot be persisted.
    pub fn cart_id(&self) -> Result<CartId, StorageError> {
        if let Some(id) = self.store.get::<CartId>(keys::CART_ID)
            && !id.is_empty()
        {
            return Ok(id);
        }

        let id = CartId::new(uuid::Uuid::new_v4().to_string());
        self.store.insert(keys::CART_ID, &id)?;
        debug!(cart_id = %id, "Generated cart id");
        Ok(id)
    }

    /// Add a line, merging quantities if the product is already present.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a zero quantity.
    #[instrument(skip(self, item), fields(product_id = %item.product_id))]
    pub fn add(&self, item: CartItem) -> Result<Vec<CartItem>, CartError> {
        if item.quantity == 0 {
            return Err(CartError::InvalidQuantity {
                product_id: item.product_id,
                quantity: 0,
            });
        }

        let mut items = self.items();
        match items.iter_mut().find(|i| i.product_id == item.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => items.push(item),
        }

        self.replace(&items)?;
        Ok(items)
    }

    /// Change the quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for zero and `CartError::NotInCart`
    /// for unknown products.
    pub fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Vec<CartItem>, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity {
                product_id: product_id.clone(),
                quantity,
            });
        }

        let mut items = self.items();
        let line = items
            .iter_mut()
            .find(|i| &i.product_id == product_id)
            .ok_or_else(|| CartError::NotInCart(product_id.clone()))?;
        line.quantity = quantity;

        self.replace(&items)?;
        Ok(items)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the product is not in the cart.
    pub fn remove(&self, product_id: &ProductId) -> Result<Vec<CartItem>, CartError> {
        let mut items = self.items();
        let before = items.len();
        items.retain(|i| &i.product_id != product_id);
        if items.len() == before {
            return Err(CartError::NotInCart(product_id.clone()));
        }

        self.replace(&items)?;
        Ok(items)
    }

    /// Overwrite the whole item list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the list cannot be persisted.
    pub fn replace(&self, items: &[CartItem]) -> Result<(), StorageError> {
        self.store.insert(keys::CART_ITEMS, items)
    }

    /// Remove all items and the cart identifier.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be persisted.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(keys::CART_ITEMS)?;
        self.store.remove(keys::CART_ID)?;
        debug!("Cart cleared");
        Ok(())
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items().iter().map(CartItem::line_total).sum()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items().iter().map(|i| i.quantity).sum()
    }
}
