//! End-to-end purchase flows against the mock bridge

mod common;

use common::{recorder, TestContext};
use iapkit_lib::native::{
    NativeAvailablePurchasesOptions, NativeError, NativeFinishParams, NativeRequestPurchase,
};
use iapkit_lib::testing::{fixtures, BridgeCall};
use iapkit_lib::{
    AndroidPurchaseRequest, AndroidSubscriptionOffer, AndroidValidationOptions, ErrorCode,
    IapConfig, IapError, IosPurchaseRequest, Platform, ProductQueryType, ProductType, Purchase,
    PurchaseState, ReceiptValidationResult, RequestPurchaseProps,
};

#[tokio::test]
async fn test_android_subscription_purchase_end_to_end() {
    let ctx = TestContext::connected(Platform::Android).await;
    ctx.bridge
        .set_products(vec![fixtures::android_product("pro_monthly", "subs")]);
    let (seen, listener) = recorder::<Purchase>();
    let _subscription = ctx.client.purchase_updated_listener(listener);

    let subscriptions = ctx
        .client
        .fetch_subscriptions(&["pro_monthly".to_string()])
        .await
        .unwrap();
    assert_eq!(subscriptions.len(), 1);
    let offer = &subscriptions[0].offers_android()[0];

    let props = RequestPurchaseProps::new().with_android(
        AndroidPurchaseRequest::new(["pro_monthly"]).with_subscription_offers(vec![
            AndroidSubscriptionOffer {
                sku: "pro_monthly".into(),
                offer_token: offer.offer_token.clone(),
            },
        ]),
    );
    let direct = ctx
        .client
        .request_purchase(&props, ProductType::Subs)
        .await
        .unwrap();
    assert!(direct.is_empty());

    let request = ctx
        .bridge
        .calls()
        .into_iter()
        .find_map(|call| match call {
            BridgeCall::RequestPurchase(NativeRequestPurchase::Android(android)) => Some(android),
            _ => None,
        })
        .expect("purchase request sent");
    let offers = request.subscription_offers.expect("offers forwarded");
    assert_eq!(offers[0].offer_token, "offer-token-pro_monthly");

    // The store reports the outcome through the native listener.
    let mut native = fixtures::android_purchase("GPA.1", "pro_monthly", "tok-1");
    native.auto_renewing_android = Some(true);
    native.is_auto_renewing = Some(true);
    ctx.bridge.emit_purchase(native);

    let purchase = seen.lock().unwrap()[0].clone();
    assert_eq!(purchase.purchase_state, PurchaseState::Purchased);
    assert_eq!(purchase.purchase_token.as_deref(), Some("tok-1"));

    let outcome = ctx
        .client
        .finish_transaction(&purchase, false)
        .await
        .unwrap();
    assert!(outcome.success);
    assert!(ctx.bridge.calls().contains(&BridgeCall::FinishTransaction(
        NativeFinishParams::Android {
            purchase_token: "tok-1".into(),
            is_consumable: false,
        }
    )));
}

#[tokio::test]
async fn test_ios_double_finish_is_idempotent() {
    let ctx = TestContext::connected(Platform::Ios).await;
    ctx.bridge
        .set_available_purchases("ios", vec![fixtures::ios_purchase("2000001", "premium")]);
    let purchase = ctx.client.get_available_purchases(None).await.unwrap()[0].clone();

    let first = ctx.client.finish_transaction(&purchase, false).await.unwrap();
    assert!(first.success);
    assert!(!first.already_finished);

    let second = ctx.client.finish_transaction(&purchase, false).await.unwrap();
    assert!(second.success);
    assert!(second.already_finished);
}

#[tokio::test]
async fn test_ios_finish_failure_is_normalized() {
    let ctx = TestContext::connected(Platform::Ios).await;
    ctx.bridge.fail_next(
        "finishTransaction",
        NativeError::with_code("networkError", "The network connection was lost"),
    );
    let purchase = iapkit_lib::convert::to_purchase(&fixtures::ios_purchase("t1", "premium"))
        .unwrap();

    let err = ctx
        .client
        .finish_transaction(&purchase, false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NetworkError);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_android_available_purchases_query_both_types() {
    let ctx = TestContext::connected(Platform::Android).await;
    ctx.bridge.set_available_purchases(
        "inapp",
        vec![fixtures::android_purchase("GPA.1", "coins", "tok-1")],
    );
    ctx.bridge.set_available_purchases(
        "subs",
        vec![
            fixtures::android_purchase("GPA.2", "pro", "tok-2"),
            fixtures::android_purchase("GPA.3", "pro_yearly", "tok-3"),
        ],
    );

    let purchases = ctx.client.get_available_purchases(None).await.unwrap();
    assert_eq!(purchases.len(), 3);

    let queried: Vec<String> = ctx
        .bridge
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BridgeCall::GetAvailablePurchases(NativeAvailablePurchasesOptions::Android(q)) => {
                Some(q.product_type)
            }
            _ => None,
        })
        .collect();
    assert_eq!(queried, vec!["inapp".to_string(), "subs".to_string()]);
}

#[tokio::test]
async fn test_android_available_purchases_keep_shared_product_ids() {
    let ctx = TestContext::connected(Platform::Android).await;
    ctx.bridge.set_available_purchases(
        "inapp",
        vec![fixtures::android_purchase("GPA.1", "pro", "tok-1")],
    );
    ctx.bridge.set_available_purchases(
        "subs",
        vec![fixtures::android_purchase("GPA.2", "pro", "tok-2")],
    );

    let purchases = ctx.client.get_available_purchases(None).await.unwrap();
    let ids: Vec<&str> = purchases.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["GPA.1", "GPA.2"]);
    assert!(purchases.iter().all(|p| p.product_id == "pro"));
    let tokens: Vec<_> = purchases.iter().map(|p| p.purchase_token.as_deref()).collect();
    assert_eq!(tokens, vec![Some("tok-1"), Some("tok-2")]);
}

#[tokio::test]
async fn test_fetch_all_on_android_queries_each_type() {
    let ctx = TestContext::connected(Platform::Android).await;
    ctx.bridge.set_products(vec![
        fixtures::android_product("coins", "inapp"),
        fixtures::android_product("pro", "subs"),
    ]);

    let products = ctx
        .client
        .fetch_products(&["coins".into(), "pro".into()], ProductQueryType::All)
        .await
        .unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(
        ctx.bridge
            .count_calls(|call| matches!(call, BridgeCall::FetchProducts { .. })),
        2
    );
}

#[tokio::test]
async fn test_fetch_rejects_empty_skus_without_native_call() {
    let ctx = TestContext::connected(Platform::Ios).await;
    let err = ctx
        .client
        .fetch_products(&[], ProductQueryType::InApp)
        .await
        .unwrap_err();
    assert!(matches!(err, IapError::Validation(_)));
    assert_eq!(
        ctx.bridge
            .count_calls(|call| matches!(call, BridgeCall::FetchProducts { .. })),
        0
    );
}

#[tokio::test]
async fn test_missing_platform_section_is_rejected() {
    let ctx = TestContext::connected(Platform::Ios).await;
    let props = RequestPurchaseProps::new().with_android(AndroidPurchaseRequest::new(["coins"]));
    let err = ctx
        .client
        .request_purchase(&props, ProductType::InApp)
        .await
        .unwrap_err();
    assert!(matches!(err, IapError::Validation(_)));
}

#[tokio::test]
async fn test_ios_subscription_honours_auto_finish_config() {
    let config = IapConfig::default()
        .with_platform(Platform::Ios)
        .with_auto_finish_subscriptions_ios(false);
    let ctx = TestContext::with_config(config);
    let props = RequestPurchaseProps::new().with_ios(IosPurchaseRequest::new("premium"));
    ctx.client
        .request_purchase(&props, ProductType::Subs)
        .await
        .unwrap();

    let sent = ctx.bridge.calls().into_iter().find_map(|call| match call {
        BridgeCall::RequestPurchase(NativeRequestPurchase::Ios(ios)) => Some(ios),
        _ => None,
    });
    assert_eq!(
        sent.unwrap().and_dangerously_finish_transaction_automatically,
        Some(false)
    );
}

#[tokio::test]
async fn test_validate_receipt_per_platform() {
    let ios = TestContext::connected(Platform::Ios).await;
    match ios.client.validate_receipt("premium", None).await.unwrap() {
        ReceiptValidationResult::Ios(result) => {
            assert!(result.is_valid);
            assert_eq!(result.jws_representation, "jws-premium");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let android = TestContext::connected(Platform::Android).await;
    let options = AndroidValidationOptions {
        package_name: "com.example.app".into(),
        product_token: "tok-1".into(),
        access_token: "access".into(),
        is_sub: false,
    };
    match android
        .client
        .validate_receipt("coins", Some(options))
        .await
        .unwrap()
    {
        ReceiptValidationResult::Android(result) => {
            assert_eq!(result.product_id.as_deref(), Some("coins"));
            assert!(!result.auto_renewing);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_active_subscriptions_on_android() {
    let ctx = TestContext::connected(Platform::Android).await;
    let mut sub = fixtures::android_purchase("GPA.2", "pro", "tok-2");
    sub.auto_renewing_android = Some(true);
    ctx.bridge.set_available_purchases("subs", vec![sub]);
    ctx.bridge.set_available_purchases(
        "inapp",
        vec![fixtures::android_purchase("GPA.1", "coins", "tok-1")],
    );

    let active = ctx.client.get_active_subscriptions(None).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].product_id, "pro");
    assert!(ctx
        .client
        .has_active_subscriptions(Some(&["pro".to_string()]))
        .await
        .unwrap());
    assert!(!ctx
        .client
        .has_active_subscriptions(Some(&["other".to_string()]))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_minimal_ios_event_then_consumable_finish() {
    let ctx = TestContext::connected(Platform::Ios).await;
    let (seen, listener) = recorder::<Purchase>();
    let _subscription = ctx.client.purchase_updated_listener(listener);

    ctx.bridge.emit_purchase(iapkit_lib::native::NativePurchase {
        id: Some("t1".into()),
        product_id: Some("p1".into()),
        transaction_date: Some(1_700_000_000_000),
        platform: Some("ios".into()),
        quantity: Some(1),
        purchase_state: Some("purchased".into()),
        is_auto_renewing: Some(false),
        ..Default::default()
    });

    let purchase = seen.lock().unwrap()[0].clone();
    assert_eq!(purchase.id, "t1");
    assert_eq!(purchase.product_id, "p1");
    assert_eq!(purchase.transaction_receipt, "");

    let outcome = ctx.client.finish_transaction(&purchase, true).await.unwrap();
    assert!(outcome.success);
}
