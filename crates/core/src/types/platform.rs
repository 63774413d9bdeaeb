//! Marketplace platforms a merchant can connect.

use serde::{Deserialize, Serialize};

/// A third-party marketplace.
///
/// Every variant can be stored on a connection, but only the platforms for
/// which [`PlatformType::is_implemented`] returns `true` have a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "platform_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Shopee,
    Momo,
    Shopline,
    Ruten,
    Pchome,
    Yahoo,
}

impl PlatformType {
    /// All known platforms, implemented or not.
    pub const ALL: [Self; 6] = [
        Self::Shopee,
        Self::Momo,
        Self::Shopline,
        Self::Ruten,
        Self::Pchome,
        Self::Yahoo,
    ];

    /// Lowercase identifier used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shopee => "shopee",
            Self::Momo => "momo",
            Self::Shopline => "shopline",
            Self::Ruten => "ruten",
            Self::Pchome => "pchome",
            Self::Yahoo => "yahoo",
        }
    }

    /// Human-readable marketplace name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Shopee => "Shopee",
            Self::Momo => "momo",
            Self::Shopline => "SHOPLINE",
            Self::Ruten => "Ruten",
            Self::Pchome => "PChome",
            Self::Yahoo => "Yahoo",
        }
    }

    /// Whether a platform client exists for this marketplace.
    #[must_use]
    pub const fn is_implemented(self) -> bool {
        matches!(self, Self::Shopee | Self::Momo | Self::Shopline)
    }
}

impl std::fmt::Display for PlatformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlatformType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid platform: {s}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trips_through_from_str() {
        for platform in PlatformType::ALL {
            assert_eq!(
                platform.to_string().parse::<PlatformType>().unwrap(),
                platform
            );
        }
    }

    #[test]
    fn test_from_str_ignores_case() {
        assert_eq!(
            "Shopee".parse::<PlatformType>().unwrap(),
            PlatformType::Shopee
        );
        assert!("amazon".parse::<PlatformType>().is_err());
    }

    #[test]
    fn test_only_three_platforms_are_implemented() {
        let implemented: Vec<_> = PlatformType::ALL
            .into_iter()
            .filter(|p| p.is_implemented())
            .collect();
        assert_eq!(
            implemented,
            vec![
                PlatformType::Shopee,
                PlatformType::Momo,
                PlatformType::Shopline
            ]
        );
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&PlatformType::Pchome).unwrap();
        assert_eq!(json, "\"pchome\"");
    }
}
