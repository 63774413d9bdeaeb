//! Shopee Open Platform v2 client.
//!
//! Every call is signed with HMAC-SHA256 over
//! `partner_id + path + timestamp + access_token + shop_id`, keyed with the
//! partner key, and carries the signature in the query string. Auth calls
//! sign only `partner_id + path + timestamp`.

mod status;
mod types;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use marketsync_core::{
    CanonicalProduct, OrderStatus, PlatformOrder, PlatformProduct, PlatformType, ProductUpdate,
    ShopeeCredentials, TokenGrant,
};
use reqwest::Method;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use sha2::Sha256;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use url::Url;

use self::types::{
    AddedItem, Envelope, Item, ItemBaseInfo, ItemList, Order, OrderDetail, OrderList,
    TokenResponse,
};
use super::wire::{connection_verdict, endpoint, money, non_empty};
use super::{OrderQuery, PlatformAdapter, PlatformError, PlatformResult};
use crate::http::{ApiRequest, RequestExecutor};

pub use status::{
    NATIVE_ORDER_STATUSES, order_status_from_native, order_status_to_native,
    product_status_from_native,
};

const TOKEN_PATH: &str = "/api/v2/auth/access_token/get";

/// Fields requested from `get_order_detail`; Shopee omits them otherwise.
const ORDER_DETAIL_FIELDS: &str =
    "buyer_username,recipient_address,item_list,total_amount,actual_shipping_fee,payment_method";

/// `hex(HMAC_SHA256(partner_key, base_string))`.
///
/// # Errors
///
/// Returns `PlatformError::InvalidRequest` if the key cannot seed the MAC.
pub fn sign(partner_key: &str, base_string: &str) -> PlatformResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(partner_key.as_bytes())
        .map_err(|e| PlatformError::InvalidRequest(format!("bad partner key: {e}")))?;
    mac.update(base_string.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// String signed for shop-level calls.
#[must_use]
pub fn signature_base(
    partner_id: &str,
    path: &str,
    timestamp: i64,
    access_token: &str,
    shop_id: &str,
) -> String {
    format!("{partner_id}{path}{timestamp}{access_token}{shop_id}")
}

struct Tokens {
    access: SecretString,
    refresh: Option<SecretString>,
}

/// Shopee client for one shop.
pub struct ShopeeClient {
    executor: RequestExecutor,
    base_url: String,
    partner_id: String,
    partner_key: SecretString,
    shop_id: String,
    tokens: RwLock<Tokens>,
}

impl ShopeeClient {
    #[must_use]
    pub fn new(
        credentials: ShopeeCredentials,
        base_url: impl Into<String>,
        executor: RequestExecutor,
    ) -> Self {
        Self {
            executor,
            base_url: base_url.into(),
            partner_id: credentials.partner_id,
            partner_key: credentials.partner_key,
            shop_id: credentials.shop_id,
            tokens: RwLock::new(Tokens {
                access: credentials.access_token,
                refresh: credentials.refresh_token,
            }),
        }
    }

    /// URL for a shop-level call, signed at `timestamp` (unix seconds).
    fn signed_url(
        &self,
        path: &str,
        access_token: &str,
        timestamp: i64,
        params: &[(&str, String)],
    ) -> PlatformResult<Url> {
        let base = signature_base(&self.partner_id, path, timestamp, access_token, &self.shop_id);
        let signature = sign(self.partner_key.expose_secret(), &base)?;

        let mut url = endpoint(&self.base_url, path)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("partner_id", &self.partner_id)
                .append_pair("timestamp", &timestamp.to_string())
                .append_pair("access_token", access_token)
                .append_pair("shop_id", &self.shop_id)
                .append_pair("sign", &signature);
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }
        Ok(url)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> PlatformResult<ApiRequest> {
        let access = self.tokens.read().await.access.expose_secret().to_string();
        let url = self.signed_url(path, &access, Utc::now().timestamp(), params)?;
        Ok(ApiRequest::new(method, url))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> PlatformResult<T> {
        let request = self.request(Method::GET, path, params).await?;
        self.executor
            .execute_json::<Envelope<T>>(&request)
            .await?
            .into_response()
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> PlatformResult<T> {
        let request = self.request(Method::POST, path, &[]).await?.json(body);
        self.executor
            .execute_json::<Envelope<T>>(&request)
            .await?
            .into_response()
    }

    async fn post_ack(&self, path: &str, body: Value) -> PlatformResult<()> {
        let request = self.request(Method::POST, path, &[]).await?.json(body);
        self.executor
            .execute_json::<Envelope<Value>>(&request)
            .await?
            .into_ack()
    }

    async fn fetch_items(&self, item_ids: &[i64]) -> PlatformResult<Vec<PlatformProduct>> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = item_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let info: ItemBaseInfo = self
            .get("/api/v2/product/get_item_base_info", &[("item_id_list", joined)])
            .await?;

        info.item_list
            .into_iter()
            .map(|raw| {
                let item: Item = serde_json::from_value(raw.clone()).map_err(parse_error)?;
                Ok(item.into_platform(&self.shop_id, raw))
            })
            .collect()
    }

    async fn fetch_orders(&self, order_sns: &[String]) -> PlatformResult<Vec<PlatformOrder>> {
        if order_sns.is_empty() {
            return Ok(Vec::new());
        }
        let detail: OrderDetail = self
            .get(
                "/api/v2/order/get_order_detail",
                &[
                    ("order_sn_list", order_sns.join(",")),
                    ("response_optional_fields", ORDER_DETAIL_FIELDS.to_string()),
                ],
            )
            .await?;

        detail
            .order_list
            .into_iter()
            .map(|raw| {
                let order: Order = serde_json::from_value(raw.clone()).map_err(parse_error)?;
                Ok(order.into_platform(raw))
            })
            .collect()
    }
}

fn parse_error(err: serde_json::Error) -> PlatformError {
    PlatformError::Parse {
        platform: PlatformType::Shopee,
        message: err.to_string(),
    }
}

fn item_id(id: &str) -> PlatformResult<i64> {
    id.parse()
        .map_err(|_| PlatformError::InvalidRequest(format!("invalid Shopee item id: {id}")))
}

const fn item_status(active: bool) -> &'static str {
    if active { "NORMAL" } else { "UNLIST" }
}

fn numeric(field: &str, value: &str) -> PlatformResult<i64> {
    value
        .parse()
        .map_err(|_| PlatformError::InvalidRequest(format!("Shopee {field} must be numeric")))
}

#[async_trait]
impl PlatformAdapter for ShopeeClient {
    fn platform(&self) -> PlatformType {
        PlatformType::Shopee
    }

    #[instrument(skip(self), fields(platform = "shopee", shop_id = %self.shop_id))]
    async fn refresh_token(&self) -> PlatformResult<TokenGrant> {
        let refresh = self
            .tokens
            .read()
            .await
            .refresh
            .as_ref()
            .map(|t| t.expose_secret().to_string())
            .ok_or_else(|| PlatformError::InvalidRequest("no Shopee refresh token".to_string()))?;

        let timestamp = Utc::now().timestamp();
        let signature = sign(
            self.partner_key.expose_secret(),
            &format!("{}{TOKEN_PATH}{timestamp}", self.partner_id),
        )?;
        let mut url = endpoint(&self.base_url, TOKEN_PATH)?;
        url.query_pairs_mut()
            .append_pair("partner_id", &self.partner_id)
            .append_pair("timestamp", &timestamp.to_string())
            .append_pair("sign", &signature);

        let request = ApiRequest::new(Method::POST, url).json(json!({
            "refresh_token": refresh,
            "partner_id": numeric("partner_id", &self.partner_id)?,
            "shop_id": numeric("shop_id", &self.shop_id)?,
        }));
        let response: TokenResponse = self.executor.execute_json(&request).await?;
        if !response.error.is_empty() {
            return Err(PlatformError::Api {
                platform: PlatformType::Shopee,
                code: response.error,
                message: response.message,
            });
        }

        let access = SecretString::from(response.access_token);
        let refresh = non_empty(&response.refresh_token).map(SecretString::from);
        let expires_at =
            (response.expire_in > 0).then(|| Utc::now() + Duration::seconds(response.expire_in));

        let mut tokens = self.tokens.write().await;
        tokens.access = access.clone();
        if let Some(refresh) = &refresh {
            tokens.refresh = Some(refresh.clone());
        }
        debug!("Shopee access token refreshed");

        Ok(TokenGrant {
            access_token: access,
            refresh_token: refresh,
            expires_at,
        })
    }

    #[instrument(skip(self), fields(platform = "shopee"))]
    async fn get_products(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> PlatformResult<Vec<PlatformProduct>> {
        let query = OrderQuery {
            page,
            limit,
            ..OrderQuery::default()
        };
        let list: ItemList = self
            .get(
                "/api/v2/product/get_item_list",
                &[
                    ("offset", query.offset().to_string()),
                    ("page_size", query.limit().to_string()),
                    ("item_status", "NORMAL".to_string()),
                ],
            )
            .await?;

        let ids: Vec<i64> = list.item.iter().map(|i| i.item_id).collect();
        self.fetch_items(&ids).await
    }

    async fn get_product(&self, platform_product_id: &str) -> PlatformResult<PlatformProduct> {
        self.fetch_items(&[item_id(platform_product_id)?])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::not_found("Product", platform_product_id))
    }

    #[instrument(skip_all, fields(platform = "shopee", sku = %product.sku))]
    async fn create_product(&self, product: &CanonicalProduct) -> PlatformResult<PlatformProduct> {
        let mut body = json!({
            "item_name": product.name,
            "description": product.description,
            "item_sku": product.sku,
            "original_price": money(product.base_price),
            "seller_stock": [{"stock": 0}],
            "item_status": item_status(product.is_active),
            "image": {"image_url_list": product.images},
        });
        if let Some(weight) = product.weight {
            body["weight"] = money(weight);
        }
        if let Some(brand) = &product.brand {
            body["brand"] = json!({"original_brand_name": brand});
        }

        let added: AddedItem = self.post("/api/v2/product/add_item", body).await?;
        self.get_product(&added.item_id.to_string()).await
    }

    #[instrument(skip(self, update), fields(platform = "shopee"))]
    async fn update_product(
        &self,
        platform_product_id: &str,
        update: &ProductUpdate,
    ) -> PlatformResult<PlatformProduct> {
        let id = item_id(platform_product_id)?;

        let mut body = json!({ "item_id": id });
        let mut changed = false;
        let mut set = |key: &str, value: Value| {
            body[key] = value;
            changed = true;
        };
        if let Some(name) = &update.name {
            set("item_name", json!(name));
        }
        if let Some(description) = &update.description {
            set("description", json!(description));
        }
        if let Some(sku) = &update.sku {
            set("item_sku", json!(sku));
        }
        if let Some(images) = &update.images {
            set("image", json!({"image_url_list": images}));
        }
        if let Some(active) = update.is_active {
            set("item_status", json!(item_status(active)));
        }
        if let Some(weight) = update.weight {
            set("weight", money(weight));
        }
        if changed {
            self.post_ack("/api/v2/product/update_item", body).await?;
        }

        // update_item ignores prices.
        if let Some(price) = update.base_price {
            self.update_price(platform_product_id, price).await?;
        }

        self.get_product(platform_product_id).await
    }

    async fn delete_product(&self, platform_product_id: &str) -> PlatformResult<()> {
        let id = item_id(platform_product_id)?;
        self.post_ack("/api/v2/product/delete_item", json!({ "item_id": id }))
            .await
    }

    #[instrument(skip(self), fields(platform = "shopee"))]
    async fn update_stock(&self, platform_product_id: &str, stock: i64) -> PlatformResult<()> {
        let id = item_id(platform_product_id)?;
        self.post_ack(
            "/api/v2/product/update_stock",
            json!({
                "item_id": id,
                "stock_list": [{"model_id": 0, "normal_stock": stock}],
            }),
        )
        .await
    }

    async fn update_price(&self, platform_product_id: &str, price: Decimal) -> PlatformResult<()> {
        let id = item_id(platform_product_id)?;
        self.post_ack(
            "/api/v2/product/update_price",
            json!({
                "item_id": id,
                "price_list": [{"model_id": 0, "original_price": money(price)}],
            }),
        )
        .await
    }

    #[instrument(skip(self), fields(platform = "shopee"))]
    async fn get_orders(&self, query: &OrderQuery) -> PlatformResult<Vec<PlatformOrder>> {
        let (start, end) = query.window(Utc::now());
        let mut params = vec![
            ("time_range_field", "create_time".to_string()),
            ("time_from", start.timestamp().to_string()),
            ("time_to", end.timestamp().to_string()),
            ("page_size", query.limit().to_string()),
            ("cursor", query.offset().to_string()),
        ];
        if let Some(status) = query.status {
            params.push(("order_status", order_status_to_native(status).to_string()));
        }

        let list: OrderList = self.get("/api/v2/order/get_order_list", &params).await?;
        let order_sns: Vec<String> = list.order_list.into_iter().map(|o| o.order_sn).collect();
        self.fetch_orders(&order_sns).await
    }

    async fn get_order(&self, platform_order_id: &str) -> PlatformResult<PlatformOrder> {
        self.fetch_orders(&[platform_order_id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::not_found("Order", platform_order_id))
    }

    async fn update_order_status(
        &self,
        _platform_order_id: &str,
        _status: OrderStatus,
    ) -> PlatformResult<()> {
        Err(PlatformError::Unsupported {
            platform: PlatformType::Shopee,
            operation: "update_order_status",
            reason: "Shopee derives order status from logistics events",
        })
    }

    async fn update_shipping(
        &self,
        platform_order_id: &str,
        tracking_number: &str,
        _carrier: Option<&str>,
    ) -> PlatformResult<()> {
        self.post_ack(
            "/api/v2/logistics/ship_order",
            json!({
                "order_sn": platform_order_id,
                "tracking_number": tracking_number,
            }),
        )
        .await
    }

    async fn test_connection(&self) -> PlatformResult<bool> {
        let request = self
            .request(Method::GET, "/api/v2/shop/get_shop_info", &[])
            .await?;
        let result = self
            .executor
            .execute_json::<Envelope<Value>>(&request)
            .await
            .and_then(Envelope::into_ack);
        connection_verdict(result)
    }
}

impl std::fmt::Debug for ShopeeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopeeClient")
            .field("base_url", &self.base_url)
            .field("partner_id", &self.partner_id)
            .field("shop_id", &self.shop_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::http::testing::{ScriptedTransport, executor, single_attempt};

    fn credentials() -> ShopeeCredentials {
        ShopeeCredentials {
            partner_id: "1".to_string(),
            partner_key: SecretString::from("k".to_string()),
            shop_id: "5".to_string(),
            access_token: SecretString::from("t".to_string()),
            refresh_token: Some(SecretString::from("r".to_string())),
        }
    }

    fn client(transport: &Arc<ScriptedTransport>) -> ShopeeClient {
        ShopeeClient::new(
            credentials(),
            "https://partner.example.com",
            executor(PlatformType::Shopee, Arc::clone(transport), single_attempt()),
        )
    }

    #[test]
    fn test_signature_golden_value() {
        let base = signature_base("1", "/x", 1000, "t", "5");
        assert_eq!(base, "1/x1000t5");
        assert_eq!(
            sign("k", &base).unwrap(),
            "f3359c5fba073afc8306e77acdbe1266c5646d8c1f3d773986b98510aa611748"
        );
    }

    #[test]
    fn test_auth_signature_golden_value() {
        assert_eq!(
            sign("k", "1/api/v2/auth/access_token/get1000").unwrap(),
            "a7fed067c3152a48bd7d4492f83ab13b2df1363b70c10bbe02f45a596e9beab3"
        );
    }

    #[test]
    fn test_signed_url_parameter_order() {
        let transport = ScriptedTransport::new();
        let url = client(&transport)
            .signed_url("/x", "t", 1000, &[("offset", "0".to_string())])
            .unwrap();

        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(
            keys,
            ["partner_id", "timestamp", "access_token", "shop_id", "sign", "offset"]
        );
        assert!(url.as_str().contains(
            "sign=f3359c5fba073afc8306e77acdbe1266c5646d8c1f3d773986b98510aa611748"
        ));
    }

    #[tokio::test]
    async fn test_get_product_fetches_base_info() {
        let transport = ScriptedTransport::new();
        transport.on(
            "/api/v2/product/get_item_base_info",
            200,
            json!({
                "error": "",
                "message": "",
                "response": {"item_list": [{
                    "item_id": 42,
                    "item_sku": "TEA-001",
                    "item_name": "Oolong",
                    "price_info": [{"current_price": 450.0}],
                    "stock_info": [{"current_stock": 3}],
                    "item_status": "NORMAL"
                }]}
            }),
        );

        let product = client(&transport).get_product("42").await.unwrap();
        assert_eq!(product.sku, "TEA-001");
        assert_eq!(product.stock, 3);

        let sent = transport.requests();
        assert_eq!(sent[0].query_value("item_id_list").as_deref(), Some("42"));
        assert_eq!(sent[0].query_value("shop_id").as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_missing_item_is_not_found() {
        let transport = ScriptedTransport::new();
        transport.on(
            "/api/v2/product/get_item_base_info",
            200,
            json!({"error": "", "response": {"item_list": []}}),
        );

        let err = client(&transport).get_product("42").await.unwrap_err();
        assert_eq!(err.to_string(), "Product 42 not found");
    }

    #[tokio::test]
    async fn test_non_numeric_item_id_is_rejected_without_a_call() {
        let transport = ScriptedTransport::new();
        let err = client(&transport).update_stock("abc", 3).await.unwrap_err();
        assert!(matches!(err, PlatformError::InvalidRequest(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_update_stock_body() {
        let transport = ScriptedTransport::new();
        transport.on("/api/v2/product/update_stock", 200, json!({"error": ""}));

        client(&transport).update_stock("42", 9).await.unwrap();

        let body = transport.requests()[0].body.clone().unwrap();
        assert_eq!(body["item_id"], 42);
        assert_eq!(body["stock_list"][0]["model_id"], 0);
        assert_eq!(body["stock_list"][0]["normal_stock"], 9);
    }

    #[tokio::test]
    async fn test_order_status_updates_are_unsupported() {
        let transport = ScriptedTransport::new();
        let err = client(&transport)
            .update_order_status("SN1", OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Unsupported { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_token_swaps_the_access_token() {
        let transport = ScriptedTransport::new();
        transport.on(
            TOKEN_PATH,
            200,
            json!({"access_token": "t2", "refresh_token": "r2", "expire_in": 14400}),
        );
        transport.on("/api/v2/shop/get_shop_info", 200, json!({"error": ""}));

        let client = client(&transport);
        let grant = client.refresh_token().await.unwrap();
        assert_eq!(grant.access_token.expose_secret(), "t2");
        assert!(grant.expires_at.is_some());

        let refresh_call = &transport.requests_to(TOKEN_PATH)[0];
        assert!(refresh_call.query_value("access_token").is_none());
        assert_eq!(refresh_call.body.as_ref().unwrap()["shop_id"], 5);

        assert!(client.test_connection().await.unwrap());
        let check = &transport.requests_to("/api/v2/shop/get_shop_info")[0];
        assert_eq!(check.query_value("access_token").as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn test_api_error_fails_connection_test_cleanly() {
        let transport = ScriptedTransport::new();
        transport.on(
            "/api/v2/shop/get_shop_info",
            200,
            json!({"error": "error_auth", "message": "Invalid access_token."}),
        );
        assert!(!client(&transport).test_connection().await.unwrap());
    }
}
