//! Tradepost storefront library.
//!
//! Client-side commerce flows for a small marketplace: the local cart, the
//! delivery address and fee, checkout against the order API, and hosted
//! payment confirmation. The `tradepost` CLI is a thin shell over this crate.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod delivery;
pub mod error;
pub mod payment;
pub mod routes;
pub mod state;
pub mod storage;
pub mod telemetry;
