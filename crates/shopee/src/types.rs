//! Request inputs and decoded responses.

use marketsync_core::payload::ProductFields;

/// Shop-scoped credentials for a signed shop-level API call.
#[derive(Debug, Clone)]
pub struct ShopCredentials {
    pub shop_id: String,
    pub access_token: String,
}

/// One catalog item, already normalised into product fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    pub item_id: String,
    pub fields: ProductFields,
}

/// One page of the shop's catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub items: Vec<CatalogItem>,
    pub has_next_page: bool,
    pub next_offset: i64,
}

/// Token material returned by a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the new access token, in seconds.
    pub expires_in: i64,
}
