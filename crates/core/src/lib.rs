//! Tradepost Core - Shared types library.
//!
//! This crate provides common types used across all Tradepost components:
//! - `storefront` - Cart, delivery, checkout and payment orchestration
//! - `cli` - Command-line storefront for driving a checkout
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no persistence,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, prices, statuses, and the checkout records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
