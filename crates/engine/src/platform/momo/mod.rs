//! momo shopping merchant API client.
//!
//! momo authenticates each request with four headers: merchant id, API key,
//! a millisecond timestamp and a [`signature`] over the request payload.
//! There is no OAuth flow; the API key never expires.

pub mod signature;
mod types;

use async_trait::async_trait;
use chrono::Utc;
use marketsync_core::{
    CanonicalProduct, MomoCredentials, OrderStatus, PlatformOrder, PlatformProduct, PlatformType,
    ProductUpdate, TokenGrant,
};
use reqwest::Method;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::instrument;

use self::types::{CreatedProduct, Envelope, Order, OrderPage, Product, ProductPage};
use super::wire::{connection_verdict, endpoint, money};
use super::{OrderQuery, PlatformAdapter, PlatformError, PlatformResult};
use crate::http::{ApiRequest, RequestExecutor};

pub use types::{
    NATIVE_ORDER_STATUSES, order_status_from_native, order_status_to_native,
    product_status_from_native,
};

/// Carrier sent when the caller does not name one.
pub const DEFAULT_CARRIER: &str = "OTHER";

/// momo client for one merchant.
pub struct MomoClient {
    executor: RequestExecutor,
    base_url: String,
    merchant_id: String,
    api_key: SecretString,
    api_secret: SecretString,
}

impl MomoClient {
    #[must_use]
    pub fn new(
        credentials: MomoCredentials,
        base_url: impl Into<String>,
        executor: RequestExecutor,
    ) -> Self {
        Self {
            executor,
            base_url: base_url.into(),
            merchant_id: credentials.merchant_id,
            api_key: credentials.api_key,
            api_secret: credentials.api_secret,
        }
    }

    /// Build a signed request. `payload` is what gets signed; it is also
    /// sent as the body unless the method is GET or DELETE.
    fn request(&self, method: Method, path: &str, payload: Value) -> PlatformResult<ApiRequest> {
        let timestamp = Utc::now().timestamp_millis();
        let signature = signature::sign(
            &self.merchant_id,
            timestamp,
            &payload,
            self.api_secret.expose_secret(),
        );

        let carries_body = method != Method::GET && method != Method::DELETE;
        let request = ApiRequest::new(method, endpoint(&self.base_url, path)?)
            .header("X-Merchant-Id", self.merchant_id.as_str())
            .header("X-Api-Key", self.api_key.expose_secret())
            .header("X-Timestamp", timestamp.to_string())
            .header("X-Signature", signature);

        Ok(if carries_body {
            request.json(payload)
        } else {
            request
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Value,
    ) -> PlatformResult<T> {
        let request = self.request(method, path, payload)?;
        let envelope: Envelope<T> = self.executor.execute_json(&request).await?;
        Ok(envelope.data)
    }

    async fn send(&self, method: Method, path: &str, payload: Value) -> PlatformResult<()> {
        let request = self.request(method, path, payload)?;
        self.executor.execute(&request).await.map(|_| ())
    }
}

fn parse_error(err: serde_json::Error) -> PlatformError {
    PlatformError::Parse {
        platform: PlatformType::Momo,
        message: err.to_string(),
    }
}

fn product_from_raw(raw: Value) -> PlatformResult<PlatformProduct> {
    let product: Product = serde_json::from_value(raw.clone()).map_err(parse_error)?;
    Ok(product.into_platform(raw))
}

fn order_from_raw(raw: Value) -> PlatformResult<PlatformOrder> {
    let order: Order = serde_json::from_value(raw.clone()).map_err(parse_error)?;
    Ok(order.into_platform(raw))
}

#[async_trait]
impl PlatformAdapter for MomoClient {
    fn platform(&self) -> PlatformType {
        PlatformType::Momo
    }

    /// momo has no token exchange; the API key is the long-lived credential.
    async fn refresh_token(&self) -> PlatformResult<TokenGrant> {
        Ok(TokenGrant {
            access_token: self.api_key.clone(),
            refresh_token: None,
            expires_at: None,
        })
    }

    #[instrument(skip(self), fields(platform = "momo", merchant_id = %self.merchant_id))]
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
        let page: ProductPage = self
            .call(
                Method::POST,
                "/api/v1/products",
                json!({ "page": query.page(), "pageSize": query.limit() }),
            )
            .await?;
        page.products.into_iter().map(product_from_raw).collect()
    }

    async fn get_product(&self, platform_product_id: &str) -> PlatformResult<PlatformProduct> {
        let raw: Option<Value> = self
            .call(
                Method::GET,
                &format!("/api/v1/products/{platform_product_id}"),
                json!({ "productId": platform_product_id }),
            )
            .await?;
        match raw {
            Some(raw) => product_from_raw(raw),
            None => Err(PlatformError::not_found("Product", platform_product_id)),
        }
    }

    #[instrument(skip_all, fields(platform = "momo", sku = %product.sku))]
    async fn create_product(&self, product: &CanonicalProduct) -> PlatformResult<PlatformProduct> {
        let created: CreatedProduct = self
            .call(
                Method::POST,
                "/api/v1/products",
                json!({
                    "productCode": product.sku,
                    "productName": product.name,
                    "description": product.description,
                    "salePrice": money(product.base_price),
                    "listPrice": money(product.base_price),
                    "stockQty": 0,
                    "images": product.images,
                    "status": i64::from(product.is_active),
                }),
            )
            .await?;
        self.get_product(&created.product_id).await
    }

    #[instrument(skip(self, update), fields(platform = "momo"))]
    async fn update_product(
        &self,
        platform_product_id: &str,
        update: &ProductUpdate,
    ) -> PlatformResult<PlatformProduct> {
        let mut payload = Map::new();
        payload.insert("productId".to_string(), json!(platform_product_id));
        if let Some(name) = &update.name {
            payload.insert("productName".to_string(), json!(name));
        }
        if let Some(description) = &update.description {
            payload.insert("description".to_string(), json!(description));
        }
        if let Some(price) = update.base_price {
            payload.insert("salePrice".to_string(), money(price));
        }
        if let Some(sku) = &update.sku {
            payload.insert("productCode".to_string(), json!(sku));
        }
        if let Some(images) = &update.images {
            payload.insert("images".to_string(), json!(images));
        }
        if let Some(active) = update.is_active {
            payload.insert("status".to_string(), json!(i64::from(active)));
        }

        self.send(
            Method::PUT,
            &format!("/api/v1/products/{platform_product_id}"),
            Value::Object(payload),
        )
        .await?;
        self.get_product(platform_product_id).await
    }

    async fn delete_product(&self, platform_product_id: &str) -> PlatformResult<()> {
        self.send(
            Method::DELETE,
            &format!("/api/v1/products/{platform_product_id}"),
            json!({ "productId": platform_product_id }),
        )
        .await
    }

    #[instrument(skip(self), fields(platform = "momo"))]
    async fn update_stock(&self, platform_product_id: &str, stock: i64) -> PlatformResult<()> {
        self.send(
            Method::PUT,
            &format!("/api/v1/products/{platform_product_id}/stock"),
            json!({ "productId": platform_product_id, "stockQty": stock }),
        )
        .await
    }

    async fn update_price(&self, platform_product_id: &str, price: Decimal) -> PlatformResult<()> {
        self.send(
            Method::PUT,
            &format!("/api/v1/products/{platform_product_id}/price"),
            json!({ "productId": platform_product_id, "salePrice": money(price) }),
        )
        .await
    }

    #[instrument(skip(self), fields(platform = "momo"))]
    async fn get_orders(&self, query: &OrderQuery) -> PlatformResult<Vec<PlatformOrder>> {
        let mut payload = Map::new();
        payload.insert("page".to_string(), json!(query.page()));
        payload.insert("pageSize".to_string(), json!(query.limit()));
        if let Some(status) = query.status {
            payload.insert("orderStatus".to_string(), json!(order_status_to_native(status)));
        }
        if let Some(start) = query.start {
            payload.insert("startTime".to_string(), json!(start.to_rfc3339()));
        }
        if let Some(end) = query.end {
            payload.insert("endTime".to_string(), json!(end.to_rfc3339()));
        }

        let page: OrderPage = self
            .call(Method::POST, "/api/v1/orders", Value::Object(payload))
            .await?;
        page.orders.into_iter().map(order_from_raw).collect()
    }

    async fn get_order(&self, platform_order_id: &str) -> PlatformResult<PlatformOrder> {
        let raw: Option<Value> = self
            .call(
                Method::GET,
                &format!("/api/v1/orders/{platform_order_id}"),
                json!({ "orderId": platform_order_id }),
            )
            .await?;
        match raw {
            Some(raw) => order_from_raw(raw),
            None => Err(PlatformError::not_found("Order", platform_order_id)),
        }
    }

    async fn update_order_status(
        &self,
        platform_order_id: &str,
        status: OrderStatus,
    ) -> PlatformResult<()> {
        self.send(
            Method::PUT,
            &format!("/api/v1/orders/{platform_order_id}/status"),
            json!({
                "orderId": platform_order_id,
                "orderStatus": order_status_to_native(status),
            }),
        )
        .await
    }

    async fn update_shipping(
        &self,
        platform_order_id: &str,
        tracking_number: &str,
        carrier: Option<&str>,
    ) -> PlatformResult<()> {
        self.send(
            Method::PUT,
            &format!("/api/v1/orders/{platform_order_id}/shipping"),
            json!({
                "orderId": platform_order_id,
                "trackingNo": tracking_number,
                "shippingCarrier": carrier.unwrap_or(DEFAULT_CARRIER),
            }),
        )
        .await
    }

    async fn test_connection(&self) -> PlatformResult<bool> {
        connection_verdict(self.send(Method::GET, "/api/v1/merchant/info", json!({})).await)
    }
}

impl std::fmt::Debug for MomoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MomoClient")
            .field("base_url", &self.base_url)
            .field("merchant_id", &self.merchant_id)
            .finish_non_exhaustive()
    }
}
