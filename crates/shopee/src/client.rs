//! Signed HTTP calls against the Shopee partner API.
//!
//! Every request carries `partner_id`, `timestamp`, and `sign` query
//! parameters. `sign` is the lowercase hex HMAC-SHA256, keyed with the
//! partner key, of `partner_id + path + timestamp`, followed by
//! `access_token + shop_id` for shop-level calls.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use marketsync_core::events::{id_string, integer_from_json};
use marketsync_core::payload::ProductFields;
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::Sha256;

use crate::error::ShopeeError;
use crate::types::{CatalogItem, CatalogPage, RefreshedToken, ShopCredentials};

type HmacSha256 = Hmac<Sha256>;

const ITEM_LIST_PATH: &str = "/api/v2/product/get_item_list";
const ITEM_BASE_INFO_PATH: &str = "/api/v2/product/get_item_base_info";
const REFRESH_TOKEN_PATH: &str = "/api/v2/auth/access_token/get";

/// Longest error body kept in an [`ShopeeError::Api`] message.
const MAX_ERROR_BODY: usize = 512;

/// Operations the workers need from a marketplace.
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// Fetch one page of the shop's listed items.
    async fn fetch_catalog_page(
        &self,
        credentials: &ShopCredentials,
        offset: i64,
        page_size: i64,
    ) -> Result<CatalogPage, ShopeeError>;

    /// Exchange a refresh token for a new access/refresh token pair.
    async fn refresh_access_token(
        &self,
        shop_id: &str,
        refresh_token: &str,
    ) -> Result<RefreshedToken, ShopeeError>;
}

/// Partner-level settings.
#[derive(Debug, Clone)]
pub struct ShopeeConfig {
    pub partner_id: Option<i64>,
    pub partner_key: Option<String>,
    pub base_url: String,
}

impl ShopeeConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://partner.shopeemobile.com";
}

/// HTTP client for the Shopee partner API.
pub struct ShopeeClient {
    client: reqwest::Client,
    config: ShopeeConfig,
}

impl ShopeeClient {
    pub fn new(config: ShopeeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn partner(&self) -> Result<(i64, &str), ShopeeError> {
        match (self.config.partner_id, self.config.partner_key.as_deref()) {
            (Some(id), Some(key)) if !key.is_empty() => Ok((id, key)),
            _ => Err(ShopeeError::NotConfigured),
        }
    }

    /// Common signed query parameters for `path`.
    fn signed_query(
        &self,
        path: &str,
        shop: Option<&ShopCredentials>,
    ) -> Result<Vec<(&'static str, String)>, ShopeeError> {
        let (partner_id, partner_key) = self.partner()?;
        let timestamp = chrono::Utc::now().timestamp();
        let sign = sign_request(
            partner_key,
            partner_id,
            path,
            timestamp,
            shop.map(|s| (s.access_token.as_str(), s.shop_id.as_str())),
        );

        let mut query = vec![
            ("partner_id", partner_id.to_string()),
            ("timestamp", timestamp.to_string()),
            ("sign", sign),
        ];
        if let Some(shop) = shop {
            query.push(("access_token", shop.access_token.clone()));
            query.push(("shop_id", shop.shop_id.clone()));
        }
        Ok(query)
    }

    async fn get(
        &self,
        path: &str,
        shop: &ShopCredentials,
        params: &[(&str, String)],
    ) -> Result<Value, ShopeeError> {
        let query = self.signed_query(path, Some(shop))?;
        let response = self
            .client
            .get(format!("{}{path}", self.config.base_url))
            .query(&query)
            .query(params)
            .send()
            .await?;
        Self::read_envelope(response).await
    }

    async fn read_envelope(response: reqwest::Response) -> Result<Value, ShopeeError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        check_envelope(status, &body)
    }
}

#[async_trait]
impl MarketplaceClient for ShopeeClient {
    async fn fetch_catalog_page(
        &self,
        credentials: &ShopCredentials,
        offset: i64,
        page_size: i64,
    ) -> Result<CatalogPage, ShopeeError> {
        let list = self
            .get(
                ITEM_LIST_PATH,
                credentials,
                &[
                    ("offset", offset.to_string()),
                    ("page_size", page_size.to_string()),
                    ("item_status", "NORMAL".to_string()),
                ],
            )
            .await?;
        let (item_ids, has_next_page, next_offset) = parse_item_list(&list, offset)?;

        let items = if item_ids.is_empty() {
            Vec::new()
        } else {
            let info = self
                .get(
                    ITEM_BASE_INFO_PATH,
                    credentials,
                    &[("item_id_list", item_ids.join(","))],
                )
                .await?;
            parse_item_base_info(&info)?
        };

        tracing::debug!(
            shop_id = %credentials.shop_id,
            offset,
            fetched = items.len(),
            has_next_page,
            "Fetched catalog page",
        );

        Ok(CatalogPage {
            items,
            has_next_page,
            next_offset,
        })
    }

    async fn refresh_access_token(
        &self,
        shop_id: &str,
        refresh_token: &str,
    ) -> Result<RefreshedToken, ShopeeError> {
        let (partner_id, _) = self.partner()?;
        let shop_id_num: i64 = shop_id
            .parse()
            .map_err(|_| ShopeeError::Decode(format!("shop id {shop_id} is not numeric")))?;
        let query = self.signed_query(REFRESH_TOKEN_PATH, None)?;
        let body = serde_json::json!({
            "refresh_token": refresh_token,
            "partner_id": partner_id,
            "shop_id": shop_id_num,
        });

        let response = self
            .client
            .post(format!("{}{REFRESH_TOKEN_PATH}", self.config.base_url))
            .query(&query)
            .json(&body)
            .send()
            .await?;
        let envelope = Self::read_envelope(response).await?;
        parse_token(&envelope)
    }
}

// ---------------------------------------------------------------------------
// Signing and response parsing
// ---------------------------------------------------------------------------

/// Compute the `sign` query parameter.
///
/// `shop` is `(access_token, shop_id)` for shop-level calls.
pub fn sign_request(
    partner_key: &str,
    partner_id: i64,
    path: &str,
    timestamp: i64,
    shop: Option<(&str, &str)>,
) -> String {
    let mut base = format!("{partner_id}{path}{timestamp}");
    if let Some((access_token, shop_id)) = shop {
        base.push_str(access_token);
        base.push_str(shop_id);
    }
    // HMAC accepts keys of any length; an empty key is rejected earlier.
    let mut mac = match HmacSha256::new_from_slice(partner_key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(base.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Turn an HTTP status and body into the JSON envelope, or an error when
/// either the status or the envelope's `error` field reports a failure.
fn check_envelope(status: u16, body: &str) -> Result<Value, ShopeeError> {
    let success = (200..300).contains(&status);
    let parsed: Result<Value, _> = serde_json::from_str(body);

    let value = match parsed {
        Ok(value) => value,
        Err(_) if !success => {
            return Err(ShopeeError::Api {
                status,
                error: String::new(),
                message: body.chars().take(MAX_ERROR_BODY).collect(),
            })
        }
        Err(e) => return Err(ShopeeError::Decode(e.to_string())),
    };

    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !success || !error.is_empty() {
        return Err(ShopeeError::Api {
            status,
            error: error.to_string(),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    Ok(value)
}

/// Item ids, `has_next_page`, and the offset of the next page.
fn parse_item_list(envelope: &Value, offset: i64) -> Result<(Vec<String>, bool, i64), ShopeeError> {
    let response = envelope
        .get("response")
        .ok_or_else(|| ShopeeError::Decode("get_item_list: missing `response`".into()))?;

    let ids: Vec<String> = response
        .get("item")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("item_id").and_then(id_string))
                .collect()
        })
        .unwrap_or_default();

    let has_next_page = response
        .get("has_next_page")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let next_offset = response
        .get("next_offset")
        .and_then(integer_from_json)
        .unwrap_or(offset + ids.len() as i64);

    Ok((ids, has_next_page, next_offset))
}

fn parse_item_base_info(envelope: &Value) -> Result<Vec<CatalogItem>, ShopeeError> {
    let list = envelope
        .pointer("/response/item_list")
        .and_then(Value::as_array)
        .ok_or_else(|| ShopeeError::Decode("get_item_base_info: missing `item_list`".into()))?;

    Ok(list.iter().filter_map(parse_catalog_item).collect())
}

fn parse_catalog_item(item: &Value) -> Option<CatalogItem> {
    let item_id = item.get("item_id").and_then(id_string)?;
    let text = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    // Catalog prices are plain currency amounts, unlike webhook payloads.
    let price = item
        .pointer("/price_info/0/current_price")
        .and_then(Value::as_f64)
        .and_then(|p| Decimal::try_from(p).ok())
        .map(|p| p.round_dp(5).normalize());

    let stock = item
        .pointer("/stock_info_v2/summary_info/total_available_stock")
        .or_else(|| item.pointer("/stock_info/0/current_stock"))
        .and_then(integer_from_json)
        .and_then(|s| i32::try_from(s).ok());

    let image_url = item
        .pointer("/image/image_url_list/0")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(CatalogItem {
        item_id,
        fields: ProductFields {
            name: text("item_name"),
            sku: text("item_sku"),
            stock,
            price,
            image_url,
        },
    })
}

fn parse_token(envelope: &Value) -> Result<RefreshedToken, ShopeeError> {
    let field = |key: &str| {
        envelope
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ShopeeError::Decode(format!("access_token/get: missing `{key}`")))
    };
    Ok(RefreshedToken {
        access_token: field("access_token")?,
        refresh_token: field("refresh_token")?,
        expires_in: envelope
            .get("expire_in")
            .and_then(Value::as_i64)
            .unwrap_or_default(),
    })
}
