//! Core types for Tradepost.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod checkout;
pub mod delivery;
pub mod id;
pub mod price;
pub mod status;

pub use cart::CartItem;
pub use checkout::{AddressDetails, CheckoutDetails, CustomerProfile, PaymentSession};
pub use delivery::{DeliveryInfo, FREE_DELIVERY, TableFee};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use status::*;
