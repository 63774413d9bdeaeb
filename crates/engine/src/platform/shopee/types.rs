//! Shopee Open Platform v2 wire types.

use marketsync_core::{
    OrderLineItem, PaymentStatus, PlatformOrder, PlatformProduct, PlatformType, ShippingAddress,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::status::{order_status_from_native, product_status_from_native};
use crate::platform::wire::{decimal, non_empty, unix_seconds};
use crate::platform::{PlatformError, PlatformResult};

/// Every Shopee response wraps its payload with an error code and message.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    pub response: Option<T>,
}

impl<T> Envelope<T> {
    fn check(&self) -> PlatformResult<()> {
        if self.error.is_empty() {
            Ok(())
        } else {
            Err(PlatformError::Api {
                platform: PlatformType::Shopee,
                code: self.error.clone(),
                message: self.message.clone(),
            })
        }
    }

    /// The payload, or the API error the envelope carries.
    pub fn into_response(self) -> PlatformResult<T> {
        self.check()?;
        self.response.ok_or_else(|| PlatformError::Parse {
            platform: PlatformType::Shopee,
            message: "response field missing".to_string(),
        })
    }

    /// Success with no payload of interest.
    pub fn into_ack(self) -> PlatformResult<()> {
        self.check()
    }
}

/// `/api/v2/auth/access_token/get` answers at the top level, not in `response`.
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expire_in: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct ItemList {
    #[serde(default)]
    pub item: Vec<ItemRef>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ItemRef {
    pub item_id: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct ItemBaseInfo {
    /// Kept raw so each item's JSON can ride along as `platform_data`.
    #[serde(default)]
    pub item_list: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AddedItem {
    pub item_id: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct Item {
    pub item_id: i64,
    #[serde(default)]
    pub item_sku: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price_info: Vec<PriceInfo>,
    #[serde(default)]
    pub stock_info: Vec<StockInfo>,
    #[serde(default)]
    pub image: Option<ImageInfo>,
    #[serde(default)]
    pub item_status: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct PriceInfo {
    #[serde(default)]
    pub current_price: f64,
}

#[derive(Debug, Deserialize)]
pub(super) struct StockInfo {
    #[serde(default)]
    pub current_stock: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct ImageInfo {
    #[serde(default)]
    pub image_url_list: Vec<String>,
}

impl Item {
    /// Map into the common product shape. `shop_id` builds the storefront URL.
    pub fn into_platform(self, shop_id: &str, raw: serde_json::Value) -> PlatformProduct {
        let id = self.item_id.to_string();
        PlatformProduct {
            sku: non_empty(&self.item_sku).unwrap_or_else(|| format!("SHOPEE-{id}")),
            name: self.item_name,
            description: self.description,
            price: self
                .price_info
                .first()
                .map_or(Decimal::ZERO, |p| decimal(p.current_price)),
            stock: self.stock_info.first().map_or(0, |s| s.current_stock),
            images: self.image.map(|i| i.image_url_list).unwrap_or_default(),
            status: product_status_from_native(&self.item_status),
            url: Some(format!("https://shopee.tw/product/{shop_id}/{id}")),
            platform_data: raw,
            id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderList {
    #[serde(default)]
    pub order_list: Vec<OrderRef>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderRef {
    pub order_sn: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderDetail {
    #[serde(default)]
    pub order_list: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Order {
    pub order_sn: String,
    #[serde(default)]
    pub order_status: String,
    #[serde(default)]
    pub buyer_username: String,
    #[serde(default)]
    pub recipient_address: RecipientAddress,
    #[serde(default)]
    pub item_list: Vec<OrderItem>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub actual_shipping_fee: f64,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub create_time: i64,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RecipientAddress {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub full_address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zipcode: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderItem {
    #[serde(default)]
    pub item_sku: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub model_quantity_purchased: i64,
    #[serde(default)]
    pub model_discounted_price: f64,
}

impl Order {
    /// Map into the common order shape.
    ///
    /// Shopee only hands out orders once they are paid, and its total
    /// already includes shipping, so the subtotal is reported as the total.
    pub fn into_platform(self, raw: serde_json::Value) -> PlatformOrder {
        let total = decimal(self.total_amount);
        let address = self.recipient_address;
        PlatformOrder {
            id: self.order_sn.clone(),
            order_number: self.order_sn,
            status: order_status_from_native(&self.order_status),
            native_status: self.order_status,
            customer_name: self.buyer_username,
            customer_phone: non_empty(&address.phone),
            customer_email: None,
            shipping_address: ShippingAddress {
                name: address.name,
                phone: address.phone,
                address: address.full_address,
                city: address.city,
                state: non_empty(&address.state),
                postal_code: address.zipcode,
                country: "TW".to_string(),
            },
            items: self
                .item_list
                .into_iter()
                .map(|item| OrderLineItem {
                    sku: item.item_sku,
                    name: item.item_name,
                    quantity: item.model_quantity_purchased,
                    price: decimal(item.model_discounted_price),
                })
                .collect(),
            subtotal: total,
            shipping_fee: decimal(self.actual_shipping_fee),
            discount: Decimal::ZERO,
            total,
            payment_method: non_empty(&self.payment_method),
            payment_status: PaymentStatus::Paid,
            created_at: unix_seconds(self.create_time),
            platform_data: raw,
        }
    }
}
