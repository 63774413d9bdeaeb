//! Record builders for tests.

use std::collections::HashMap;

use marketsync_core::{
    CanonicalOrder, CanonicalProduct, ConnectionId, InventoryItem, InventoryItemId, OrderLineItem,
    OrderStatus, OrgId, PaymentStatus, PlatformConnection, PlatformOrder, PlatformProduct,
    PlatformType, ProductId, ProductStatus, ShippingAddress, SyncSettings,
};
use rust_decimal::Decimal;
use secrecy::SecretString;

fn secrets(pairs: &[(&str, &str)]) -> HashMap<String, SecretString> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), SecretString::from((*value).to_string())))
        .collect()
}

/// A connected shop with complete credentials for `platform`.
///
/// Platforms without a client get no extra credential fields.
#[must_use]
pub fn connection(org_id: OrgId, platform: PlatformType) -> PlatformConnection {
    let (shop_id, metadata) = match platform {
        PlatformType::Shopee => (
            "5001",
            secrets(&[("partnerId", "1001"), ("partnerKey", "partner-key")]),
        ),
        PlatformType::Momo => (
            "M100",
            secrets(&[
                ("merchantId", "M100"),
                ("apiKey", "momo-key"),
                ("apiSecret", "momo-secret"),
            ]),
        ),
        PlatformType::Shopline => (
            "store-1",
            secrets(&[("storeId", "store-1"), ("apiKey", "shopline-key")]),
        ),
        PlatformType::Ruten | PlatformType::Pchome | PlatformType::Yahoo => ("shop-1", HashMap::new()),
    };

    PlatformConnection {
        id: ConnectionId::generate(),
        org_id,
        platform,
        shop_id: shop_id.to_string(),
        shop_name: Some(format!("{} test shop", platform.display_name())),
        access_token: Some(SecretString::from("access-token".to_string())),
        refresh_token: Some(SecretString::from("refresh-token".to_string())),
        token_expires_at: None,
        is_connected: true,
        last_sync_at: None,
        sync_settings: SyncSettings::default(),
        metadata,
    }
}

#[must_use]
pub fn product(sku: &str) -> CanonicalProduct {
    CanonicalProduct {
        id: ProductId::generate(),
        sku: sku.to_string(),
        name: format!("Tea {sku}"),
        description: String::new(),
        base_price: Decimal::new(450, 0),
        images: Vec::new(),
        is_active: true,
        weight: None,
        brand: None,
    }
}

#[must_use]
pub fn inventory(product: &CanonicalProduct, available: i64) -> InventoryItem {
    InventoryItem {
        id: InventoryItemId::generate(),
        product_id: product.id,
        sku: product.sku.clone(),
        total_stock: available,
        reserved_stock: 0,
        available_stock: available,
    }
}

#[must_use]
pub fn remote(id: &str, stock: i64) -> PlatformProduct {
    PlatformProduct {
        id: id.to_string(),
        name: "Oolong".to_string(),
        sku: "TEA-001".to_string(),
        description: String::new(),
        price: Decimal::new(450, 0),
        stock,
        images: Vec::new(),
        status: ProductStatus::Active,
        url: None,
        platform_data: serde_json::Value::Null,
    }
}

#[must_use]
pub fn platform_order(id: &str) -> PlatformOrder {
    PlatformOrder {
        id: id.to_string(),
        order_number: id.to_string(),
        native_status: "paid".to_string(),
        status: OrderStatus::Confirmed,
        customer_name: "Lin".to_string(),
        customer_phone: None,
        customer_email: None,
        shipping_address: ShippingAddress::default(),
        items: vec![OrderLineItem {
            sku: "TEA-001".to_string(),
            name: "Oolong".to_string(),
            quantity: 1,
            price: Decimal::new(450, 0),
        }],
        subtotal: Decimal::new(450, 0),
        shipping_fee: Decimal::ZERO,
        discount: Decimal::ZERO,
        total: Decimal::new(450, 0),
        payment_method: None,
        payment_status: PaymentStatus::Paid,
        created_at: None,
        platform_data: serde_json::Value::Null,
    }
}

#[must_use]
pub fn order(connection: &PlatformConnection, id: &str) -> CanonicalOrder {
    CanonicalOrder::from_platform(connection.platform, connection.id, platform_order(id))
}
