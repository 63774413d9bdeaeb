//! Every platform's status tables cover every canonical status.

use marketsync::platform::{momo, shopee, shopline};
use marketsync_core::{OrderStatus, ProductStatus};

#[test]
fn test_every_canonical_status_has_a_native_filter_value() {
    for &status in OrderStatus::ALL {
        let native = shopee::order_status_to_native(status);
        assert!(
            shopee::NATIVE_ORDER_STATUSES.contains(&native),
            "shopee {status:?} -> {native}"
        );

        let code = momo::order_status_to_native(status);
        assert!(
            momo::NATIVE_ORDER_STATUSES.contains(&code),
            "momo {status:?} -> {code}"
        );

        let native = shopline::order_status_to_native(status);
        assert!(
            shopline::NATIVE_ORDER_STATUSES.contains(&native),
            "shopline {status:?} -> {native}"
        );
    }
}

#[test]
fn test_canonical_statuses_survive_a_round_trip() {
    for &status in OrderStatus::ALL {
        assert_eq!(
            shopee::order_status_from_native(shopee::order_status_to_native(status)),
            status
        );
        assert_eq!(
            momo::order_status_from_native(momo::order_status_to_native(status)),
            status
        );
        assert_eq!(
            shopline::order_status_from_native(shopline::order_status_to_native(status), ""),
            status
        );
    }
}

#[test]
fn test_unknown_native_values_fall_back_to_pending() {
    assert_eq!(shopee::order_status_from_native("SOMETHING_NEW"), OrderStatus::Pending);
    assert_eq!(momo::order_status_from_native(99), OrderStatus::Pending);
    assert_eq!(shopline::order_status_from_native("archived", ""), OrderStatus::Pending);

    assert_eq!(shopee::product_status_from_native("BANNED"), ProductStatus::Inactive);
    assert_eq!(momo::product_status_from_native(7), ProductStatus::Pending);
    assert_eq!(shopline::product_status_from_native("archived"), ProductStatus::Pending);
}

#[test]
fn test_shopline_fulfillment_outranks_payment_status() {
    assert_eq!(
        shopline::order_status_from_native("paid", "fulfilled"),
        OrderStatus::Delivered
    );
    assert_eq!(
        shopline::order_status_from_native("paid", "partial"),
        OrderStatus::Shipped
    );
    assert_eq!(
        shopline::order_status_from_native("refunded", "fulfilled"),
        OrderStatus::Refunded
    );
}
