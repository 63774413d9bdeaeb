//! Status enums for catalog, order and sync entities.
//!
//! All of these serialize as `snake_case` strings and, with the `postgres`
//! feature, map onto Postgres enum types of the same name.

use serde::{Deserialize, Serialize};

/// Implements `as_str`, `Display` and `FromStr` from a single variant table.
macro_rules! string_enum {
    ($ty:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Storage representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", $label, ": {}"), s)),
                }
            }
        }
    };
}

/// Canonical order status shared by every platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

string_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
    Refunded => "refunded",
});

/// Canonical product status as reported by a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Inactive,
    #[default]
    Pending,
}

string_enum!(ProductStatus, "product status", {
    Active => "active",
    Inactive => "inactive",
    Pending => "pending",
});

/// Merchant-facing state of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "listing_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    #[default]
    Draft,
    Active,
    Inactive,
    Deleted,
}

string_enum!(ListingStatus, "listing status", {
    Draft => "draft",
    Active => "active",
    Inactive => "inactive",
    Deleted => "deleted",
});

impl From<ProductStatus> for ListingStatus {
    fn from(status: ProductStatus) -> Self {
        match status {
            ProductStatus::Active => Self::Active,
            ProductStatus::Inactive => Self::Inactive,
            ProductStatus::Pending => Self::Draft,
        }
    }
}

/// Outcome of the most recent sync attempt for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sync_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
    Failed,
}

string_enum!(SyncStatus, "sync status", {
    Pending => "pending",
    Synced => "synced",
    Failed => "failed",
});

/// Payment state of an imported order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
    PartialRefund,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
    Refunded => "refunded",
    PartialRefund => "partial_refund",
});

/// Kind of orchestrated operation a sync job tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sync_job_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobType {
    ProductPush,
    InventorySync,
    OrderSync,
    FullSync,
}

string_enum!(SyncJobType, "sync job type", {
    ProductPush => "product_push",
    InventorySync => "inventory_sync",
    OrderSync => "order_sync",
    FullSync => "full_sync",
});

/// Lifecycle of a sync job.
///
/// ```text
/// pending -> running -> completed
///               \-----> failed
/// ```
///
/// `completed` and `failed` are terminal; a job is never resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sync_job_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

string_enum!(SyncJobStatus, "sync job status", {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

impl SyncJobStatus {
    /// Whether no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// A pending job may fail without ever running, e.g. when the
    /// orchestrator cannot start it.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Failed)
                | (Self::Running, Self::Completed | Self::Failed)
        )
    }
}

/// Outcome recorded on a sync log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sync_log_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStatus {
    Success,
    Error,
}

string_enum!(SyncLogStatus, "sync log status", {
    Success => "success",
    Error => "error",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_strings_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_serde_matches_as_str() {
        for job_type in SyncJobType::ALL {
            let json = serde_json::to_string(job_type).unwrap();
            assert_eq!(json, format!("\"{}\"", job_type.as_str()));
        }
        let json = serde_json::to_string(&PaymentStatus::PartialRefund).unwrap();
        assert_eq!(json, "\"partial_refund\"");
    }

    #[test]
    fn test_invalid_status_is_rejected() {
        let err = "lost".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err, "invalid order status: lost");
    }

    #[test]
    fn test_job_status_transitions() {
        use SyncJobStatus::{Completed, Failed, Pending, Running};

        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Failed));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Completed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(SyncJobStatus::Completed.is_terminal());
        assert!(SyncJobStatus::Failed.is_terminal());
        assert!(!SyncJobStatus::Running.is_terminal());
    }

    #[test]
    fn test_listing_status_from_product_status() {
        assert_eq!(
            ListingStatus::from(ProductStatus::Active),
            ListingStatus::Active
        );
        assert_eq!(
            ListingStatus::from(ProductStatus::Pending),
            ListingStatus::Draft
        );
    }
}
