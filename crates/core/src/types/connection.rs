//! A merchant's authorized link to one marketplace shop.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::id::{ConnectionId, OrgId};
use super::platform::PlatformType;

/// Per-connection switches for what the sync engine may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    pub auto_sync: bool,
    pub sync_interval_minutes: u32,
    pub sync_inventory: bool,
    pub sync_orders: bool,
    pub sync_prices: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval_minutes: 30,
            sync_inventory: true,
            sync_orders: true,
            sync_prices: false,
        }
    }
}

/// An authorized marketplace shop.
///
/// Platform credentials beyond the shop id and OAuth tokens (partner ids,
/// API keys, secrets) live in `metadata` under their camelCase names.
/// The sync engine treats a connection as read-only; token refreshes are
/// written back through the connection store.
#[derive(Clone)]
pub struct PlatformConnection {
    pub id: ConnectionId,
    pub org_id: OrgId,
    pub platform: PlatformType,
    pub shop_id: String,
    pub shop_name: Option<String>,
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub is_connected: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sync_settings: SyncSettings,
    pub metadata: HashMap<String, SecretString>,
}

impl PlatformConnection {
    /// Short label used in logs and error messages, e.g. `shopee:12345`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}:{}", self.platform, self.shop_id)
    }
}

impl fmt::Debug for PlatformConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut metadata_keys: Vec<_> = self.metadata.keys().collect();
        metadata_keys.sort();
        f.debug_struct("PlatformConnection")
            .field("id", &self.id)
            .field("org_id", &self.org_id)
            .field("platform", &self.platform)
            .field("shop_id", &self.shop_id)
            .field("shop_name", &self.shop_name)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_expires_at", &self.token_expires_at)
            .field("is_connected", &self.is_connected)
            .field("last_sync_at", &self.last_sync_at)
            .field("sync_settings", &self.sync_settings)
            .field("metadata_keys", &metadata_keys)
            .finish()
    }
}

/// Tokens returned by a platform's refresh endpoint.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_prints_secrets() {
        let mut metadata = HashMap::new();
        metadata.insert(
            "apiSecret".to_string(),
            SecretString::from("hunter2".to_string()),
        );
        let conn = PlatformConnection {
            id: ConnectionId::generate(),
            org_id: OrgId::generate(),
            platform: PlatformType::Momo,
            shop_id: "M1".to_string(),
            shop_name: Some("Tea House".to_string()),
            access_token: Some(SecretString::from("tok-abc".to_string())),
            refresh_token: None,
            token_expires_at: None,
            is_connected: true,
            last_sync_at: None,
            sync_settings: SyncSettings::default(),
            metadata,
        };

        let debug = format!("{conn:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("tok-abc"));
        assert!(debug.contains("apiSecret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_sync_settings_defaults_fill_missing_fields() {
        let settings: SyncSettings = serde_json::from_str(r#"{"syncOrders": false}"#)
            .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert!(!settings.sync_orders);
        assert!(settings.sync_inventory);
        assert_eq!(settings.sync_interval_minutes, 30);
    }
}
