//! momo wire types and status codes.

use marketsync_core::{
    OrderLineItem, OrderStatus, PaymentStatus, PlatformOrder, PlatformProduct, ProductStatus,
    ShippingAddress,
};
use serde::Deserialize;

use crate::platform::wire::{decimal, non_empty, timestamp};

/// Every order status code momo documents.
pub const NATIVE_ORDER_STATUSES: &[i64] = &[0, 1, 2, 3, 4, 5, 6];

/// momo order status code to canonical. Unknown codes are pending.
#[must_use]
pub const fn order_status_from_native(code: i64) -> OrderStatus {
    match code {
        1 => OrderStatus::Confirmed,
        2 => OrderStatus::Processing,
        3 => OrderStatus::Shipped,
        4 => OrderStatus::Delivered,
        5 => OrderStatus::Cancelled,
        6 => OrderStatus::Refunded,
        _ => OrderStatus::Pending,
    }
}

#[must_use]
pub const fn order_status_to_native(status: OrderStatus) -> i64 {
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Confirmed => 1,
        OrderStatus::Processing => 2,
        OrderStatus::Shipped => 3,
        OrderStatus::Delivered => 4,
        OrderStatus::Cancelled => 5,
        OrderStatus::Refunded => 6,
    }
}

#[must_use]
pub const fn product_status_from_native(code: i64) -> ProductStatus {
    match code {
        1 => ProductStatus::Active,
        0 => ProductStatus::Inactive,
        _ => ProductStatus::Pending,
    }
}

/// momo answers `{ "data": ... }`.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductPage {
    #[serde(default)]
    pub products: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreatedProduct {
    pub product_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Product {
    pub product_id: String,
    #[serde(default)]
    pub product_code: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sale_price: f64,
    #[serde(default)]
    pub stock_qty: i64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub product_url: Option<String>,
}

impl Product {
    pub fn into_platform(self, raw: serde_json::Value) -> PlatformProduct {
        PlatformProduct {
            id: self.product_id,
            name: self.product_name,
            sku: self.product_code,
            description: self.description,
            price: decimal(self.sale_price),
            stock: self.stock_qty,
            images: self.images,
            status: product_status_from_native(self.status),
            url: self.product_url.as_deref().and_then(non_empty),
            platform_data: raw,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderPage {
    #[serde(default)]
    pub orders: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Order {
    pub order_id: String,
    #[serde(default)]
    pub order_no: String,
    #[serde(default)]
    pub order_status: i64,
    #[serde(default)]
    pub buyer_name: String,
    #[serde(default)]
    pub buyer_phone: String,
    #[serde(default)]
    pub buyer_email: Option<String>,
    #[serde(default)]
    pub shipping_address: String,
    #[serde(default)]
    pub shipping_city: String,
    #[serde(default)]
    pub shipping_zip: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub shipping_fee: f64,
    #[serde(default)]
    pub discount_amount: f64,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub payment_status: i64,
    #[serde(default)]
    pub create_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderItem {
    #[serde(default)]
    pub product_code: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub qty: i64,
    #[serde(default)]
    pub unit_price: f64,
}

impl Order {
    /// momo reports the paid total; the pre-shipping, pre-discount subtotal
    /// is derived from it.
    pub fn into_platform(self, raw: serde_json::Value) -> PlatformOrder {
        let total = decimal(self.total_amount);
        let shipping_fee = decimal(self.shipping_fee);
        let discount = decimal(self.discount_amount);
        PlatformOrder {
            id: self.order_id,
            order_number: self.order_no,
            native_status: self.order_status.to_string(),
            status: order_status_from_native(self.order_status),
            customer_phone: non_empty(&self.buyer_phone),
            customer_email: self.buyer_email.as_deref().and_then(non_empty),
            shipping_address: ShippingAddress {
                name: self.buyer_name.clone(),
                phone: self.buyer_phone,
                address: self.shipping_address,
                city: self.shipping_city,
                state: None,
                postal_code: self.shipping_zip,
                country: "TW".to_string(),
            },
            customer_name: self.buyer_name,
            items: self
                .items
                .into_iter()
                .map(|item| OrderLineItem {
                    sku: item.product_code,
                    name: item.product_name,
                    quantity: item.qty,
                    price: decimal(item.unit_price),
                })
                .collect(),
            subtotal: total - shipping_fee + discount,
            shipping_fee,
            discount,
            total,
            payment_method: non_empty(&self.payment_method),
            payment_status: if self.payment_status == 1 {
                PaymentStatus::Paid
            } else {
                PaymentStatus::Pending
            },
            created_at: timestamp(&self.create_time),
            platform_data: raw,
        }
    }
}
