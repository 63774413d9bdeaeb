//! SHOPLINE Open API wire types and status mapping.

use marketsync_core::{
    OrderLineItem, OrderStatus, PaymentStatus, PlatformOrder, PlatformProduct, ProductStatus,
    ShippingAddress,
};
use serde::Deserialize;

use crate::platform::wire::{decimal, non_empty, timestamp};

/// Order `status` values SHOPLINE documents.
pub const NATIVE_ORDER_STATUSES: &[&str] = &[
    "pending",
    "paid",
    "confirmed",
    "processing",
    "shipped",
    "completed",
    "cancelled",
    "refunded",
];

/// Canonical status of an order from its `status` and `fulfillment_status`.
///
/// Cancellation and refunds win over fulfillment, which wins over the
/// payment-side status.
#[must_use]
pub fn order_status_from_native(status: &str, fulfillment_status: &str) -> OrderStatus {
    match (status, fulfillment_status) {
        ("cancelled", _) => OrderStatus::Cancelled,
        ("refunded", _) => OrderStatus::Refunded,
        (_, "fulfilled") => OrderStatus::Delivered,
        (_, "partial") => OrderStatus::Shipped,
        ("paid" | "confirmed", _) => OrderStatus::Confirmed,
        ("processing", _) => OrderStatus::Processing,
        ("shipped", _) => OrderStatus::Shipped,
        ("completed", _) => OrderStatus::Delivered,
        _ => OrderStatus::Pending,
    }
}

#[must_use]
pub const fn order_status_to_native(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Confirmed => "confirmed",
        OrderStatus::Processing => "processing",
        OrderStatus::Shipped => "shipped",
        OrderStatus::Delivered => "completed",
        OrderStatus::Cancelled => "cancelled",
        OrderStatus::Refunded => "refunded",
    }
}

#[must_use]
pub fn product_status_from_native(status: &str) -> ProductStatus {
    match status {
        "active" => ProductStatus::Active,
        "hidden" | "draft" => ProductStatus::Inactive,
        _ => ProductStatus::Pending,
    }
}

fn payment_status_from_native(status: &str) -> PaymentStatus {
    match status {
        "paid" => PaymentStatus::Paid,
        "refunded" => PaymentStatus::Refunded,
        "partially_refunded" => PaymentStatus::PartialRefund,
        _ => PaymentStatus::Pending,
    }
}

/// A `{zh_tw, en}` translated field.
#[derive(Debug, Default, Deserialize)]
pub(super) struct Localized {
    #[serde(default)]
    pub zh_tw: Option<String>,
    #[serde(default)]
    pub en: Option<String>,
}

impl Localized {
    /// Traditional Chinese, falling back to English.
    pub fn text(&self) -> String {
        self.zh_tw
            .as_deref()
            .and_then(non_empty)
            .or_else(|| self.en.as_deref().and_then(non_empty))
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ListPage {
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct Created {
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub title: Localized,
    #[serde(default)]
    pub description: Localized,
    #[serde(default)]
    pub price: Price,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub handle: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Price {
    #[serde(default)]
    pub sale_price: f64,
}

#[derive(Debug, Deserialize)]
pub(super) struct Image {
    pub url: String,
}

impl Product {
    pub fn into_platform(self, store_id: &str, raw: serde_json::Value) -> PlatformProduct {
        PlatformProduct {
            name: self.title.text(),
            description: self.description.text(),
            sku: self.sku,
            price: decimal(self.price.sale_price),
            stock: self.quantity,
            images: self.images.into_iter().map(|i| i.url).collect(),
            status: product_status_from_native(&self.status),
            url: non_empty(&self.handle)
                .map(|handle| format!("https://{store_id}.shoplineapp.com/products/{handle}")),
            platform_data: raw,
            id: self.id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct Order {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub order_no: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub fulfillment_status: String,
    #[serde(default)]
    pub customer: Customer,
    #[serde(default)]
    pub shipping_address: Address,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub subtotal: f64,
    #[serde(default)]
    pub shipping_fee: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Customer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Address {
    #[serde(default)]
    pub recipient_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address_1: String,
    #[serde(default)]
    pub address_2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct LineItem {
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub price: f64,
}

impl Order {
    pub fn into_platform(self, raw: serde_json::Value) -> PlatformOrder {
        let address = self.shipping_address;
        let customer = self.customer;
        let recipient = non_empty(&address.recipient_name).unwrap_or(customer.name);
        let phone = non_empty(&address.phone).or_else(|| non_empty(&customer.phone));
        let street = [Some(address.address_1), address.address_2]
            .into_iter()
            .flatten()
            .filter_map(|line| non_empty(&line))
            .collect::<Vec<_>>()
            .join(", ");

        PlatformOrder {
            id: self.id,
            order_number: self.order_no,
            status: order_status_from_native(&self.status, &self.fulfillment_status),
            native_status: self.status,
            customer_email: non_empty(&customer.email),
            shipping_address: ShippingAddress {
                name: recipient.clone(),
                phone: phone.clone().unwrap_or_default(),
                address: street,
                city: address.city,
                state: address.state.as_deref().and_then(non_empty),
                postal_code: address.zip,
                country: non_empty(&address.country).unwrap_or_else(|| "TW".to_string()),
            },
            customer_name: recipient,
            customer_phone: phone,
            items: self
                .line_items
                .into_iter()
                .map(|item| OrderLineItem {
                    sku: item.sku,
                    name: item.title,
                    quantity: item.quantity,
                    price: decimal(item.price),
                })
                .collect(),
            subtotal: decimal(self.subtotal),
            shipping_fee: decimal(self.shipping_fee),
            discount: decimal(self.discount),
            total: decimal(self.total),
            payment_method: non_empty(&self.payment_method),
            payment_status: payment_status_from_native(&self.payment_status),
            created_at: timestamp(&self.created_at),
            platform_data: raw,
        }
    }
}
