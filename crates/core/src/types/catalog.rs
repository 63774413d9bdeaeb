//! Canonical catalog records owned by the merchant.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{InventoryItemId, ProductId};

/// A product as the merchant defines it, independent of any marketplace.
///
/// This is the source of truth that gets pushed to platforms. The sync
/// engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalProduct {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_price: Decimal,
    #[serde(default)]
    pub images: Vec<String>,
    pub is_active: bool,
    /// Shipping weight in kilograms.
    #[serde(default)]
    pub weight: Option<Decimal>,
    #[serde(default)]
    pub brand: Option<String>,
}

/// A partial product used for updates; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub base_price: Option<Decimal>,
    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
    pub weight: Option<Decimal>,
    pub brand: Option<String>,
}

impl ProductUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&CanonicalProduct> for ProductUpdate {
    fn from(product: &CanonicalProduct) -> Self {
        Self {
            sku: Some(product.sku.clone()),
            name: Some(product.name.clone()),
            description: Some(product.description.clone()),
            base_price: Some(product.base_price),
            images: Some(product.images.clone()),
            is_active: Some(product.is_active),
            weight: product.weight,
            brand: product.brand.clone(),
        }
    }
}

/// Stock levels for one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub product_id: ProductId,
    pub sku: String,
    pub total_stock: i64,
    pub reserved_stock: i64,
    /// Stock that may be sold; this is what gets pushed to platforms.
    pub available_stock: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(num: i64, scale: u32) -> Decimal {
        Decimal::new(num, scale)
    }

    fn product() -> CanonicalProduct {
        CanonicalProduct {
            id: ProductId::generate(),
            sku: "TEA-001".to_string(),
            name: "Oolong".to_string(),
            description: "High mountain tea".to_string(),
            base_price: dec(45000, 2),
            images: vec!["https://cdn.example.com/tea.jpg".to_string()],
            is_active: true,
            weight: Some(dec(3, 1)),
            brand: None,
        }
    }

    #[test]
    fn test_update_from_product_copies_every_field() {
        let product = product();
        let update = ProductUpdate::from(&product);
        assert_eq!(update.sku.as_deref(), Some("TEA-001"));
        assert_eq!(update.base_price, Some(dec(45000, 2)));
        assert_eq!(update.is_active, Some(true));
        assert!(!update.is_empty());
    }

    #[test]
    fn test_default_update_is_empty() {
        assert!(ProductUpdate::default().is_empty());
    }
}
