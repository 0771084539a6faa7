//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! tradepost cart add KENTE-01 "Kente Cloth" 100 --qty 2
//! tradepost cart qty KENTE-01 3
//! tradepost cart list
//! ```

use rust_decimal::Decimal;

use tradepost_core::{CartItem, Price, ProductId};
use tradepost_storefront::cart::{CartError, CartStore};
use tradepost_storefront::storage::StorageError;

use super::Local;

/// Add a product, merging with an existing line.
///
/// # Errors
///
/// Returns `CartError` for a zero quantity or a store write failure.
pub fn add(
    ctx: &Local,
    product_id: String,
    name: String,
    price: Decimal,
    qty: u32,
    image: Option<String>,
) -> Result<(), CartError> {
    let mut item = CartItem::new(product_id, name, price, qty);
    if let Some(image) = image {
        item = item.with_image(image);
    }

    let items = CartStore::new(ctx.store.clone()).add(item)?;
    tracing::info!(lines = items.len(), "Added to cart");
    print_items(&items);
    Ok(())
}

/// Print the cart lines and subtotal.
#[allow(clippy::print_stdout)]
pub fn list(ctx: &Local) {
    let items = CartStore::new(ctx.store.clone()).items();
    if items.is_empty() {
        println!("Cart is empty");
        return;
    }
    print_items(&items);
}

/// Change a line's quantity.
///
/// # Errors
///
/// Returns `CartError` for a zero quantity or a product not in the cart.
pub fn set_quantity(ctx: &Local, product_id: &str, qty: u32) -> Result<(), CartError> {
    let items = CartStore::new(ctx.store.clone()).set_quantity(&ProductId::new(product_id), qty)?;
    print_items(&items);
    Ok(())
}

/// Remove a line.
///
/// # Errors
///
/// Returns `CartError::NotInCart` if the product is not in the cart.
pub fn remove(ctx: &Local, product_id: &str) -> Result<(), CartError> {
    let items = CartStore::new(ctx.store.clone()).remove(&ProductId::new(product_id))?;
    print_items(&items);
    Ok(())
}

/// Empty the cart and drop its id.
///
/// # Errors
///
/// Returns `StorageError` if the store cannot be written.
pub fn clear(ctx: &Local) -> Result<(), StorageError> {
    CartStore::new(ctx.store.clone()).clear()?;
    tracing::info!("Cart cleared");
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_items(items: &[CartItem]) {
    for item in items {
        println!(
            "{:<16} {:<32} {:>4} x {:>10} = {:>10}",
            item.product_id,
            item.product_name,
            item.quantity,
            Price::cedis(item.unit_price).display(),
            Price::cedis(item.line_total()).display(),
        );
    }
    let subtotal: Decimal = items.iter().map(CartItem::line_total).sum();
    println!("Subtotal: {}", Price::cedis(subtotal).display());
}
