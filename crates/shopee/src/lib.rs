//! Client for the Shopee Open Platform (v2 partner API).
//!
//! Workers depend on the [`MarketplaceClient`] trait rather than the
//! concrete [`ShopeeClient`] so tests can substitute a fake.

pub mod client;
pub mod error;
pub mod types;

pub use client::{MarketplaceClient, ShopeeClient, ShopeeConfig};
pub use error::ShopeeError;
pub use types::{CatalogItem, CatalogPage, RefreshedToken, ShopCredentials};
