//! SHOPLINE Open API client.
//!
//! Requests carry an OAuth bearer token and the store id header. Access
//! tokens expire; [`ShoplineClient::refresh_token`](PlatformAdapter::refresh_token)
//! exchanges the refresh token and switches the client over to the new one.

mod types;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use marketsync_core::{
    CanonicalProduct, OrderStatus, PlatformOrder, PlatformProduct, PlatformType, ProductUpdate,
    ShoplineCredentials, TokenGrant,
};
use reqwest::Method;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use self::types::{Created, ListPage, Order, Product, TokenResponse};
use super::wire::{connection_verdict, endpoint, money};
use super::{OrderQuery, PlatformAdapter, PlatformError, PlatformResult};
use crate::http::{ApiRequest, RequestExecutor};

pub use types::{
    NATIVE_ORDER_STATUSES, order_status_from_native, order_status_to_native,
    product_status_from_native,
};

struct Tokens {
    access: SecretString,
    refresh: Option<SecretString>,
}

/// SHOPLINE client for one store.
pub struct ShoplineClient {
    executor: RequestExecutor,
    base_url: String,
    store_id: String,
    api_key: SecretString,
    tokens: RwLock<Tokens>,
}

impl ShoplineClient {
    #[must_use]
    pub fn new(
        credentials: ShoplineCredentials,
        base_url: impl Into<String>,
        executor: RequestExecutor,
    ) -> Self {
        Self {
            executor,
            base_url: base_url.into(),
            store_id: credentials.store_id,
            api_key: credentials.api_key,
            tokens: RwLock::new(Tokens {
                access: credentials.access_token,
                refresh: credentials.refresh_token,
            }),
        }
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> PlatformResult<ApiRequest> {
        let mut url = endpoint(&self.base_url, path)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        let bearer = format!("Bearer {}", self.tokens.read().await.access.expose_secret());
        Ok(ApiRequest::new(method, url)
            .header("Authorization", bearer)
            .header("X-Store-Id", self.store_id.as_str()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> PlatformResult<T> {
        let request = self.request(Method::GET, path, params).await?;
        self.executor.execute_json(&request).await
    }

    async fn send(&self, method: Method, path: &str, body: Value) -> PlatformResult<()> {
        let request = self.request(method, path, &[]).await?.json(body);
        self.executor.execute(&request).await.map(|_| ())
    }

    fn product_from_raw(&self, raw: Value) -> PlatformResult<PlatformProduct> {
        let product: Product = serde_json::from_value(raw.clone()).map_err(parse_error)?;
        Ok(product.into_platform(&self.store_id, raw))
    }
}

fn parse_error(err: serde_json::Error) -> PlatformError {
    PlatformError::Parse {
        platform: PlatformType::Shopline,
        message: err.to_string(),
    }
}

fn order_from_raw(raw: Value) -> PlatformResult<PlatformOrder> {
    let order: Order = serde_json::from_value(raw.clone()).map_err(parse_error)?;
    Ok(order.into_platform(raw))
}

/// SHOPLINE answers 404 for unknown ids.
fn missing(entity: &str, id: &str) -> impl FnOnce(PlatformError) -> PlatformError {
    let not_found = PlatformError::not_found(entity, id);
    move |err| match err {
        PlatformError::Http { status: 404, .. } => not_found,
        other => other,
    }
}

fn localized(text: &str) -> Value {
    json!({ "zh_tw": text, "en": text })
}

fn price(amount: Decimal) -> Value {
    json!({ "sale_price": money(amount), "original_price": money(amount) })
}

const fn listing_status(active: bool) -> &'static str {
    if active { "active" } else { "draft" }
}

#[async_trait]
impl PlatformAdapter for ShoplineClient {
    fn platform(&self) -> PlatformType {
        PlatformType::Shopline
    }

    #[instrument(skip(self), fields(platform = "shopline", store_id = %self.store_id))]
    async fn refresh_token(&self) -> PlatformResult<TokenGrant> {
        let refresh = self
            .tokens
            .read()
            .await
            .refresh
            .as_ref()
            .map(|t| t.expose_secret().to_string())
            .ok_or_else(|| {
                PlatformError::InvalidRequest("no SHOPLINE refresh token".to_string())
            })?;

        let request =
            ApiRequest::new(Method::POST, endpoint(&self.base_url, "/oauth/token")?).json(json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh,
                "client_id": self.api_key.expose_secret(),
            }));
        let response: TokenResponse = self.executor.execute_json(&request).await?;

        let access = SecretString::from(response.access_token);
        let refresh = response.refresh_token.map(SecretString::from);
        let expires_at =
            (response.expires_in > 0).then(|| Utc::now() + Duration::seconds(response.expires_in));

        let mut tokens = self.tokens.write().await;
        tokens.access = access.clone();
        if let Some(refresh) = &refresh {
            tokens.refresh = Some(refresh.clone());
        }
        debug!("SHOPLINE access token refreshed");

        Ok(TokenGrant {
            access_token: access,
            refresh_token: refresh,
            expires_at,
        })
    }

    #[instrument(skip(self), fields(platform = "shopline"))]
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
        let list: ListPage = self
            .get(
                "/v1/products",
                &[
                    ("page", query.page().to_string()),
                    ("limit", query.limit().to_string()),
                ],
            )
            .await?;
        list.items
            .into_iter()
            .map(|raw| self.product_from_raw(raw))
            .collect()
    }

    async fn get_product(&self, platform_product_id: &str) -> PlatformResult<PlatformProduct> {
        let raw: Value = self
            .get(&format!("/v1/products/{platform_product_id}"), &[])
            .await
            .map_err(missing("Product", platform_product_id))?;
        self.product_from_raw(raw)
    }

    #[instrument(skip_all, fields(platform = "shopline", sku = %product.sku))]
    async fn create_product(&self, product: &CanonicalProduct) -> PlatformResult<PlatformProduct> {
        let images: Vec<Value> = product.images.iter().map(|url| json!({ "url": url })).collect();
        let request = self
            .request(Method::POST, "/v1/products", &[])
            .await?
            .json(json!({
                "sku": product.sku,
                "title": localized(&product.name),
                "description": localized(&product.description),
                "price": price(product.base_price),
                "quantity": 0,
                "status": listing_status(product.is_active),
                "images": images,
            }));
        let created: Created = self.executor.execute_json(&request).await?;
        self.get_product(&created.id).await
    }

    #[instrument(skip(self, update), fields(platform = "shopline"))]
    async fn update_product(
        &self,
        platform_product_id: &str,
        update: &ProductUpdate,
    ) -> PlatformResult<PlatformProduct> {
        let mut body = Map::new();
        if let Some(name) = &update.name {
            body.insert("title".to_string(), localized(name));
        }
        if let Some(description) = &update.description {
            body.insert("description".to_string(), localized(description));
        }
        if let Some(amount) = update.base_price {
            body.insert("price".to_string(), price(amount));
        }
        if let Some(sku) = &update.sku {
            body.insert("sku".to_string(), json!(sku));
        }
        if let Some(images) = &update.images {
            let images: Vec<Value> = images.iter().map(|url| json!({ "url": url })).collect();
            body.insert("images".to_string(), Value::Array(images));
        }
        if let Some(active) = update.is_active {
            body.insert("status".to_string(), json!(listing_status(active)));
        }

        if !body.is_empty() {
            self.send(
                Method::PUT,
                &format!("/v1/products/{platform_product_id}"),
                Value::Object(body),
            )
            .await
            .map_err(missing("Product", platform_product_id))?;
        }
        self.get_product(platform_product_id).await
    }

    async fn delete_product(&self, platform_product_id: &str) -> PlatformResult<()> {
        let request = self
            .request(
                Method::DELETE,
                &format!("/v1/products/{platform_product_id}"),
                &[],
            )
            .await?;
        self.executor
            .execute(&request)
            .await
            .map(|_| ())
            .map_err(missing("Product", platform_product_id))
    }

    #[instrument(skip(self), fields(platform = "shopline"))]
    async fn update_stock(&self, platform_product_id: &str, stock: i64) -> PlatformResult<()> {
        self.send(
            Method::PUT,
            &format!("/v1/products/{platform_product_id}/inventory"),
            json!({ "quantity": stock }),
        )
        .await
    }

    async fn update_price(&self, platform_product_id: &str, amount: Decimal) -> PlatformResult<()> {
        self.send(
            Method::PUT,
            &format!("/v1/products/{platform_product_id}"),
            json!({ "price": price(amount) }),
        )
        .await
    }

    #[instrument(skip(self), fields(platform = "shopline"))]
    async fn get_orders(&self, query: &OrderQuery) -> PlatformResult<Vec<PlatformOrder>> {
        let mut params = vec![
            ("page", query.page().to_string()),
            ("limit", query.limit().to_string()),
        ];
        if let Some(status) = query.status {
            params.push(("status", order_status_to_native(status).to_string()));
        }
        if let Some(start) = query.start {
            params.push(("created_at_min", start.to_rfc3339()));
        }
        if let Some(end) = query.end {
            params.push(("created_at_max", end.to_rfc3339()));
        }

        let list: ListPage = self.get("/v1/orders", &params).await?;
        list.items.into_iter().map(order_from_raw).collect()
    }

    async fn get_order(&self, platform_order_id: &str) -> PlatformResult<PlatformOrder> {
        let raw: Value = self
            .get(&format!("/v1/orders/{platform_order_id}"), &[])
            .await
            .map_err(missing("Order", platform_order_id))?;
        order_from_raw(raw)
    }

    async fn update_order_status(
        &self,
        platform_order_id: &str,
        status: OrderStatus,
    ) -> PlatformResult<()> {
        self.send(
            Method::PUT,
            &format!("/v1/orders/{platform_order_id}"),
            json!({ "status": order_status_to_native(status) }),
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
            Method::POST,
            &format!("/v1/orders/{platform_order_id}/fulfillments"),
            json!({
                "tracking_number": tracking_number,
                "tracking_company": carrier,
                "notify_customer": true,
            }),
        )
        .await
    }

    async fn test_connection(&self) -> PlatformResult<bool> {
        let result = self.get::<Value>("/v1/shop", &[]).await.map(|_| ());
        connection_verdict(result)
    }
}

impl std::fmt::Debug for ShoplineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShoplineClient")
            .field("base_url", &self.base_url)
            .field("store_id", &self.store_id)
            .finish_non_exhaustive()
    }
}
