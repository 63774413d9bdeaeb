//! Shopee order and item status tables.

use marketsync_core::{OrderStatus, ProductStatus};

/// Every order status Shopee documents.
pub const NATIVE_ORDER_STATUSES: &[&str] = &[
    "UNPAID",
    "READY_TO_SHIP",
    "PROCESSED",
    "SHIPPED",
    "COMPLETED",
    "IN_CANCEL",
    "CANCELLED",
    "TO_RETURN",
];

/// Shopee order status to canonical. Unknown values are treated as pending.
#[must_use]
pub fn order_status_from_native(status: &str) -> OrderStatus {
    match status {
        "READY_TO_SHIP" => OrderStatus::Confirmed,
        "PROCESSED" => OrderStatus::Processing,
        "SHIPPED" => OrderStatus::Shipped,
        "COMPLETED" => OrderStatus::Delivered,
        "CANCELLED" | "IN_CANCEL" => OrderStatus::Cancelled,
        "TO_RETURN" => OrderStatus::Refunded,
        _ => OrderStatus::Pending,
    }
}

/// Canonical order status to the Shopee filter value.
#[must_use]
pub const fn order_status_to_native(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "UNPAID",
        OrderStatus::Confirmed => "READY_TO_SHIP",
        OrderStatus::Processing => "PROCESSED",
        OrderStatus::Shipped => "SHIPPED",
        OrderStatus::Delivered => "COMPLETED",
        OrderStatus::Cancelled => "CANCELLED",
        OrderStatus::Refunded => "TO_RETURN",
    }
}

/// Shopee item status to canonical.
#[must_use]
pub fn product_status_from_native(status: &str) -> ProductStatus {
    match status {
        "NORMAL" => ProductStatus::Active,
        "REVIEWING" => ProductStatus::Pending,
        _ => ProductStatus::Inactive,
    }
}
