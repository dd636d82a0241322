//! Native record builders for tests and demos.

use serde_json::json;

use crate::native::{NativeProduct, NativePurchase};
use crate::types::OneTimePurchaseOfferDetail;

/// Fixed transaction date used by the purchase fixtures (2023-11-14T22:13:20Z).
pub const TRANSACTION_DATE: i64 = 1_700_000_000_000;

/// An iOS catalog entry. `product_type` is `in-app` or `subs`.
pub fn ios_product(id: &str, product_type: &str) -> NativeProduct {
    let subs = product_type == "subs";
    NativeProduct {
        id: Some(id.to_string()),
        title: Some(format!("{id} title")),
        description: Some(format!("{id} description")),
        product_type: Some(product_type.to_string()),
        display_name: Some(format!("{id} display")),
        display_price: Some("$4.99".to_string()),
        currency: Some("USD".to_string()),
        price: Some(4.99),
        platform: Some("ios".to_string()),
        display_name_ios: Some(format!("{id} display")),
        is_family_shareable_ios: Some(false),
        json_representation_ios: Some(format!(r#"{{"id":"{id}"}}"#)),
        type_ios: Some(if subs { "autoRenewable" } else { "nonConsumable" }.to_string()),
        introductory_price_ios: subs.then(|| "$0.99".to_string()),
        introductory_price_payment_mode_ios: subs.then(|| "PAYASYOUGO".to_string()),
        subscription_period_number_ios: subs.then(|| "1".to_string()),
        subscription_period_unit_ios: subs.then(|| "MONTH".to_string()),
        ..Default::default()
    }
}

/// An Android catalog entry. `product_type` is `inapp` or `subs`.
///
/// Subscriptions carry one offer whose token is `offer-token-<id>`.
pub fn android_product(id: &str, product_type: &str) -> NativeProduct {
    let subs = product_type == "subs";
    let offers = json!([{
        "basePlanId": "monthly",
        "offerToken": format!("offer-token-{id}"),
        "offerTags": [],
        "pricingPhases": {
            "pricingPhaseList": [{
                "formattedPrice": "$9.99",
                "priceCurrencyCode": "USD",
                "priceAmountMicros": "9990000",
                "billingPeriod": "P1M",
                "billingCycleCount": 0,
                "recurrenceMode": 1
            }]
        }
    }]);

    NativeProduct {
        id: Some(id.to_string()),
        title: Some(format!("{id} (Example App)")),
        description: Some(format!("{id} description")),
        product_type: Some(product_type.to_string()),
        display_price: Some(if subs { "$9.99" } else { "$0.99" }.to_string()),
        currency: Some("USD".to_string()),
        price: Some(if subs { 9.99 } else { 0.99 }),
        platform: Some("android".to_string()),
        name_android: Some(id.to_string()),
        one_time_purchase_offer_details_android: (!subs).then(|| OneTimePurchaseOfferDetail {
            formatted_price: "$0.99".to_string(),
            price_currency_code: "USD".to_string(),
            price_amount_micros: "990000".to_string(),
        }),
        subscription_offer_details_android: subs.then(|| offers.to_string()),
        ..Default::default()
    }
}

/// A purchased, unfinished iOS transaction.
pub fn ios_purchase(id: &str, product_id: &str) -> NativePurchase {
    NativePurchase {
        id: Some(id.to_string()),
        product_id: Some(product_id.to_string()),
        transaction_date: Some(TRANSACTION_DATE),
        purchase_token: Some(format!("jws-{id}")),
        platform: Some("ios".to_string()),
        quantity: Some(1),
        purchase_state: Some("purchased".to_string()),
        is_auto_renewing: Some(false),
        quantity_ios: Some(1),
        original_transaction_date_ios: Some(TRANSACTION_DATE),
        original_transaction_identifier_ios: Some(id.to_string()),
        environment_ios: Some("Sandbox".to_string()),
        jws_representation_ios: Some(format!("jws-{id}")),
        ..Default::default()
    }
}

/// A purchased, unacknowledged Android purchase.
pub fn android_purchase(id: &str, product_id: &str, token: &str) -> NativePurchase {
    NativePurchase {
        id: Some(id.to_string()),
        product_id: Some(product_id.to_string()),
        ids: Some(vec![product_id.to_string()]),
        transaction_date: Some(TRANSACTION_DATE),
        purchase_token: Some(token.to_string()),
        platform: Some("android".to_string()),
        quantity: Some(1),
        purchase_state: Some("purchased".to_string()),
        is_auto_renewing: Some(false),
        data_android: Some(format!(r#"{{"orderId":"{id}","productId":"{product_id}"}}"#)),
        signature_android: Some("signature".to_string()),
        purchase_state_android: Some(1),
        is_acknowledged_android: Some(false),
        package_name_android: Some("com.example.app".to_string()),
        purchase_token_android: Some(token.to_string()),
        ..Default::default()
    }
}
