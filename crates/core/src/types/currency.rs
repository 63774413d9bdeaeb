//! ISO 4217 currency codes carried on imported orders.

use serde::{Deserialize, Serialize};

/// Currency of an order's monetary amounts.
///
/// The marketplaces integrated today all settle in New Taiwan dollars, so
/// that is the default when a platform does not report a currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "currency_code"))]
pub enum CurrencyCode {
    #[default]
    TWD,
    USD,
    HKD,
    SGD,
    MYR,
}

impl CurrencyCode {
    /// Three-letter ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::TWD => "TWD",
            Self::USD => "USD",
            Self::HKD => "HKD",
            Self::SGD => "SGD",
            Self::MYR => "MYR",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TWD" => Ok(Self::TWD),
            "USD" => Ok(Self::USD),
            "HKD" => Ok(Self::HKD),
            "SGD" => Ok(Self::SGD),
            "MYR" => Ok(Self::MYR),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}
