//! Marketplace credentials.
//!
//! Credentials arrive as a loose bag of optional fields ([`RawCredentials`]),
//! either from a stored [`PlatformConnection`] or from a caller. Converting
//! the bag into [`PlatformCredentials`] checks that every field the target
//! platform needs is present, so a client can never be built with holes in
//! its credentials.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use super::connection::PlatformConnection;
use super::platform::PlatformType;

/// Errors raised while validating credentials.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// One or more required fields are absent or blank.
    #[error("{platform} credentials are missing required field(s): {}", .fields.join(", "))]
    MissingFields {
        platform: PlatformType,
        fields: Vec<&'static str>,
    },

    /// The credential bag does not say which platform it is for.
    #[error("credentials do not name a platform")]
    MissingPlatform,

    /// No client exists for this platform yet.
    #[error("Platform {0} is not yet implemented")]
    UnimplementedPlatform(PlatformType),
}

/// Shopee Open Platform credentials.
#[derive(Clone)]
pub struct ShopeeCredentials {
    pub partner_id: String,
    pub partner_key: SecretString,
    pub shop_id: String,
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
}

/// momo merchant API credentials.
#[derive(Clone)]
pub struct MomoCredentials {
    pub merchant_id: String,
    pub api_key: SecretString,
    pub api_secret: SecretString,
}

/// SHOPLINE Open API credentials.
#[derive(Clone)]
pub struct ShoplineCredentials {
    pub store_id: String,
    pub api_key: SecretString,
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
}

/// Complete credentials for one implemented platform.
#[derive(Clone)]
pub enum PlatformCredentials {
    Shopee(ShopeeCredentials),
    Momo(MomoCredentials),
    Shopline(ShoplineCredentials),
}

impl PlatformCredentials {
    /// The platform these credentials authenticate against.
    #[must_use]
    pub const fn platform(&self) -> PlatformType {
        match self {
            Self::Shopee(_) => PlatformType::Shopee,
            Self::Momo(_) => PlatformType::Momo,
            Self::Shopline(_) => PlatformType::Shopline,
        }
    }

    /// Check that no required field is blank.
    ///
    /// The typed variants can still be built by hand with empty strings, so
    /// client construction calls this before anything else.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::MissingFields`] naming every blank field.
    pub fn validate(&self) -> Result<(), CredentialError> {
        let mut missing = Vec::new();
        let mut require = |name: &'static str, value: &str| {
            if value.trim().is_empty() {
                missing.push(name);
            }
        };

        match self {
            Self::Shopee(c) => {
                require("partnerId", &c.partner_id);
                require("partnerKey", c.partner_key.expose_secret());
                require("shopId", &c.shop_id);
                require("accessToken", c.access_token.expose_secret());
            }
            Self::Momo(c) => {
                require("merchantId", &c.merchant_id);
                require("apiKey", c.api_key.expose_secret());
                require("apiSecret", c.api_secret.expose_secret());
            }
            Self::Shopline(c) => {
                require("storeId", &c.store_id);
                require("apiKey", c.api_key.expose_secret());
                require("accessToken", c.access_token.expose_secret());
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CredentialError::MissingFields {
                platform: self.platform(),
                fields: missing,
            })
        }
    }
}

impl fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shopee(c) => f
                .debug_struct("Shopee")
                .field("partner_id", &c.partner_id)
                .field("shop_id", &c.shop_id)
                .finish_non_exhaustive(),
            Self::Momo(c) => f
                .debug_struct("Momo")
                .field("merchant_id", &c.merchant_id)
                .finish_non_exhaustive(),
            Self::Shopline(c) => f
                .debug_struct("Shopline")
                .field("store_id", &c.store_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Loosely-typed credentials as stored or submitted.
///
/// Field names follow the camelCase names used in connection metadata.
#[derive(Clone, Default)]
pub struct RawCredentials {
    pub platform: Option<PlatformType>,
    pub shop_id: Option<String>,
    pub partner_id: Option<String>,
    pub partner_key: Option<SecretString>,
    pub merchant_id: Option<String>,
    pub store_id: Option<String>,
    pub api_key: Option<SecretString>,
    pub api_secret: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
}

impl RawCredentials {
    /// Start an empty bag for `platform`.
    #[must_use]
    pub fn new(platform: PlatformType) -> Self {
        Self {
            platform: Some(platform),
            ..Self::default()
        }
    }

    /// Collect credentials from a stored connection.
    ///
    /// Shop id and OAuth tokens come from the connection itself; everything
    /// else comes from its metadata. Shopee's partner key may be stored as
    /// either `partnerKey` or `apiSecret`.
    #[must_use]
    pub fn from_connection(connection: &PlatformConnection) -> Self {
        let text = |key: &str| {
            connection
                .metadata
                .get(key)
                .map(|value| value.expose_secret().to_string())
        };
        let secret = |key: &str| connection.metadata.get(key).cloned();

        Self {
            platform: Some(connection.platform),
            shop_id: Some(connection.shop_id.clone()),
            partner_id: text("partnerId"),
            partner_key: secret("partnerKey").or_else(|| secret("apiSecret")),
            merchant_id: text("merchantId"),
            store_id: text("storeId"),
            api_key: secret("apiKey"),
            api_secret: secret("apiSecret"),
            access_token: connection.access_token.clone(),
            refresh_token: connection.refresh_token.clone(),
        }
    }
}

impl fmt::Debug for RawCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<SecretString>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("RawCredentials")
            .field("platform", &self.platform)
            .field("shop_id", &self.shop_id)
            .field("partner_id", &self.partner_id)
            .field("partner_key", &redact(&self.partner_key))
            .field("merchant_id", &self.merchant_id)
            .field("store_id", &self.store_id)
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &redact(&self.api_secret))
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

/// Tracks which required fields are missing while taking the present ones.
struct FieldCollector {
    missing: Vec<&'static str>,
}

impl FieldCollector {
    const fn new() -> Self {
        Self {
            missing: Vec::new(),
        }
    }

    fn text(&mut self, name: &'static str, value: Option<String>) -> String {
        match value {
            Some(v) if !v.trim().is_empty() => v,
            _ => {
                self.missing.push(name);
                String::new()
            }
        }
    }

    fn secret(&mut self, name: &'static str, value: Option<SecretString>) -> SecretString {
        match value {
            Some(v) if !v.expose_secret().trim().is_empty() => v,
            _ => {
                self.missing.push(name);
                SecretString::from(String::new())
            }
        }
    }

    fn finish(
        self,
        platform: PlatformType,
        credentials: PlatformCredentials,
    ) -> Result<PlatformCredentials, CredentialError> {
        if self.missing.is_empty() {
            Ok(credentials)
        } else {
            Err(CredentialError::MissingFields {
                platform,
                fields: self.missing,
            })
        }
    }
}

impl TryFrom<RawCredentials> for PlatformCredentials {
    type Error = CredentialError;

    fn try_from(raw: RawCredentials) -> Result<Self, Self::Error> {
        let Some(platform) = raw.platform else {
            return Err(CredentialError::MissingPlatform);
        };

        let mut fields = FieldCollector::new();
        let credentials = match platform {
            PlatformType::Shopee => Self::Shopee(ShopeeCredentials {
                partner_id: fields.text("partnerId", raw.partner_id),
                partner_key: fields.secret("partnerKey", raw.partner_key),
                shop_id: fields.text("shopId", raw.shop_id),
                access_token: fields.secret("accessToken", raw.access_token),
                refresh_token: raw.refresh_token,
            }),
            PlatformType::Momo => Self::Momo(MomoCredentials {
                merchant_id: fields.text("merchantId", raw.merchant_id),
                api_key: fields.secret("apiKey", raw.api_key),
                api_secret: fields.secret("apiSecret", raw.api_secret),
            }),
            PlatformType::Shopline => Self::Shopline(ShoplineCredentials {
                store_id: fields.text("storeId", raw.store_id),
                api_key: fields.secret("apiKey", raw.api_key),
                access_token: fields.secret("accessToken", raw.access_token),
                refresh_token: raw.refresh_token,
            }),
            PlatformType::Ruten | PlatformType::Pchome | PlatformType::Yahoo => {
                return Err(CredentialError::UnimplementedPlatform(platform));
            }
        };

        fields.finish(platform, credentials)
    }
}
