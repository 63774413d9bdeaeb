//! Client construction and connection checks through the public factory.

use marketsync::{PlatformError, test_platform_connection};
use marketsync_core::{CredentialError, PlatformType, RawCredentials};
use marketsync_integration_tests::World;
use secrecy::SecretString;
use serde_json::json;

fn secret(value: &str) -> Option<SecretString> {
    Some(SecretString::from(value.to_string()))
}

fn momo_credentials() -> RawCredentials {
    RawCredentials {
        merchant_id: Some("M100".to_string()),
        api_key: secret("momo-key"),
        api_secret: secret("momo-secret"),
        ..RawCredentials::new(PlatformType::Momo)
    }
}

// ============================================================================
// Credential validation
// ============================================================================

#[tokio::test]
async fn test_missing_api_secret_is_rejected_before_any_request() {
    let world = World::new();
    let credentials = RawCredentials {
        api_secret: None,
        ..momo_credentials()
    };

    let err = world
        .factory()
        .create_from_raw(credentials)
        .err()
        .expect("momo without a secret must not build");

    assert_eq!(
        err,
        CredentialError::MissingFields {
            platform: PlatformType::Momo,
            fields: vec!["apiSecret"],
        }
    );
    assert!(world.transport.requests().is_empty());
}

#[tokio::test]
async fn test_blank_fields_are_all_named() {
    let world = World::new();
    let credentials = RawCredentials {
        partner_id: Some("  ".to_string()),
        shop_id: Some("5001".to_string()),
        ..RawCredentials::new(PlatformType::Shopee)
    };

    let err = world
        .factory()
        .create_from_raw(credentials)
        .err()
        .expect("blank shopee credentials must not build");

    let message = err.to_string();
    assert!(message.contains("partnerId"), "{message}");
    assert!(message.contains("partnerKey"), "{message}");
    assert!(message.contains("accessToken"), "{message}");
    assert!(!message.contains("shopId"), "{message}");
}

#[tokio::test]
async fn test_platforms_without_a_client_are_reported() {
    let world = World::new();

    let err = world
        .factory()
        .create_from_raw(RawCredentials::new(PlatformType::Ruten))
        .err()
        .expect("ruten has no client");

    assert_eq!(err, CredentialError::UnimplementedPlatform(PlatformType::Ruten));
    assert_eq!(err.to_string(), "Platform ruten is not yet implemented");
}

#[tokio::test]
async fn test_complete_credentials_build_the_matching_client() {
    let world = World::new();

    let client = world
        .factory()
        .create_from_raw(momo_credentials())
        .expect("complete momo credentials");

    assert_eq!(client.platform(), PlatformType::Momo);
    assert!(world.transport.requests().is_empty());
}

// ============================================================================
// Connection check
// ============================================================================

#[tokio::test]
async fn test_check_accepts_a_reachable_merchant() {
    let world = World::new();
    world
        .transport
        .on("/api/v1/merchant/info", 200, json!({"data": {"merchantId": "M100"}}));

    let (ok, reason) = test_platform_connection(&world.factory(), momo_credentials()).await;

    assert!(ok);
    assert!(reason.is_none());
    assert_eq!(world.transport.requests_to("/api/v1/merchant/info").len(), 1);
}

#[tokio::test]
async fn test_check_reports_rejected_credentials() {
    let world = World::new();
    world
        .transport
        .on("/api/v1/merchant/info", 401, json!({"message": "bad signature"}));

    let (ok, reason) = test_platform_connection(&world.factory(), momo_credentials()).await;

    assert!(!ok);
    assert_eq!(reason.as_deref(), Some("momo rejected the credentials"));
}

#[tokio::test]
async fn test_check_reports_missing_fields_without_calling_out() {
    let world = World::new();
    let credentials = RawCredentials {
        api_secret: None,
        ..momo_credentials()
    };

    let (ok, reason) = test_platform_connection(&world.factory(), credentials).await;

    assert!(!ok);
    assert!(reason.expect("a reason").contains("apiSecret"));
    assert!(world.transport.requests().is_empty());
}

#[tokio::test]
async fn test_check_passes_network_failures_through() {
    let world = World::new();
    world.transport.fail("/api/v1/merchant/info", "connection reset");

    let (ok, reason) = test_platform_connection(&world.factory(), momo_credentials()).await;

    assert!(!ok);
    assert_eq!(reason.as_deref(), Some("connection reset"));
    // The network failure is retried before the check gives up.
    assert_eq!(world.transport.requests_to("/api/v1/merchant/info").len(), 3);
}

#[tokio::test]
async fn test_unsupported_operations_are_semantic_errors() {
    let world = World::new();
    let client = world
        .factory()
        .create_from_raw(RawCredentials {
            shop_id: Some("5001".to_string()),
            partner_id: Some("1001".to_string()),
            partner_key: secret("partner-key"),
            access_token: secret("access-token"),
            ..RawCredentials::new(PlatformType::Shopee)
        })
        .expect("complete shopee credentials");

    let err = client
        .update_order_status("2401010001", marketsync_core::OrderStatus::Shipped)
        .await
        .expect_err("shopee orders move through logistics");

    assert!(matches!(err, PlatformError::Unsupported { .. }), "{err:?}");
    assert!(!err.is_retryable());
    assert!(world.transport.requests().is_empty());
}
