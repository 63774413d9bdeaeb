//! Orders pulled from marketplaces.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::currency::CurrencyCode;
use super::id::ConnectionId;
use super::platform::PlatformType;
use super::status::{OrderStatus, PaymentStatus};

/// Where an order ships to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    /// Unit price.
    pub price: Decimal,
}

/// An order in a platform's own representation, mapped into common fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformOrder {
    /// Platform-native order id.
    pub id: String,
    /// Order number shown to merchants and buyers.
    pub order_number: String,
    /// Native status string exactly as the platform reported it.
    pub native_status: String,
    /// `native_status` translated through the platform's status table.
    pub status: OrderStatus,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderLineItem>,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub payment_method: Option<String>,
    pub payment_status: PaymentStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub platform_data: serde_json::Value,
}

/// A platform order in the merchant's canonical order shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalOrder {
    pub platform: PlatformType,
    pub connection_id: ConnectionId,
    pub platform_order_id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderLineItem>,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
    pub currency: CurrencyCode,
    pub payment_method: Option<String>,
    pub payment_status: PaymentStatus,
    pub ordered_at: Option<DateTime<Utc>>,
    pub platform_data: serde_json::Value,
}

impl CanonicalOrder {
    /// Lift a platform order pulled over `connection_id`.
    #[must_use]
    pub fn from_platform(
        platform: PlatformType,
        connection_id: ConnectionId,
        order: PlatformOrder,
    ) -> Self {
        Self {
            platform,
            connection_id,
            platform_order_id: order.id,
            order_number: order.order_number,
            status: order.status,
            customer_name: order.customer_name,
            customer_phone: order.customer_phone,
            customer_email: order.customer_email,
            shipping_address: order.shipping_address,
            items: order.items,
            subtotal: order.subtotal,
            shipping_fee: order.shipping_fee,
            discount: order.discount,
            total_amount: order.total,
            currency: CurrencyCode::default(),
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            ordered_at: order.created_at,
            platform_data: order.platform_data,
        }
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_platform_keeps_native_identity() {
        let order = PlatformOrder {
            id: "240101ABC".to_string(),
            order_number: "240101ABC".to_string(),
            native_status: "READY_TO_SHIP".to_string(),
            status: OrderStatus::Confirmed,
            customer_name: "Lin".to_string(),
            customer_phone: None,
            customer_email: None,
            shipping_address: ShippingAddress::default(),
            items: vec![
                OrderLineItem {
                    sku: "TEA-001".to_string(),
                    name: "Oolong".to_string(),
                    quantity: 2,
                    price: Decimal::new(450, 0),
                },
                OrderLineItem {
                    sku: "CUP-002".to_string(),
                    name: "Cup".to_string(),
                    quantity: 1,
                    price: Decimal::new(120, 0),
                },
            ],
            subtotal: Decimal::new(1020, 0),
            shipping_fee: Decimal::new(60, 0),
            discount: Decimal::ZERO,
            total: Decimal::new(1080, 0),
            payment_method: Some("credit_card".to_string()),
            payment_status: PaymentStatus::Paid,
            created_at: None,
            platform_data: serde_json::Value::Null,
        };

        let connection_id = ConnectionId::generate();
        let canonical = CanonicalOrder::from_platform(PlatformType::Shopee, connection_id, order);

        assert_eq!(canonical.platform_order_id, "240101ABC");
        assert_eq!(canonical.connection_id, connection_id);
        assert_eq!(canonical.status, OrderStatus::Confirmed);
        assert_eq!(canonical.total_amount, Decimal::new(1080, 0));
        assert_eq!(canonical.currency, CurrencyCode::TWD);
        assert_eq!(canonical.item_count(), 3);
    }
}
