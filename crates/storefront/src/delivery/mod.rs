//! Delivery address and fee resolution.
//!
//! A delivery selection comes from the region/town fee table, a free-text
//! address, or an agent-entered address and fee. The chosen selection is
//! persisted as a whole and read back verbatim on the next checkout.

mod resolver;
mod table;

pub use resolver::DeliveryResolver;
pub use table::{DeliveryTable, Region, TownFee, TownMatch};

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur when resolving a delivery selection.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Region is not in the fee table.
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// Town is not listed under the region.
    #[error("Unknown town {town} in region {region}")]
    UnknownTown { region: String, town: String },

    /// Manual address text was empty.
    #[error("Delivery address is required")]
    EmptyAddress,

    /// A fee table could not be loaded.
    #[error("Invalid delivery table: {0}")]
    InvalidTable(String),

    /// Persisting the selection failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
