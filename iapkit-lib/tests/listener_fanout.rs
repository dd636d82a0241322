//! Integration tests for listener fan-out through the native callbacks

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{recorder, TestContext};
use iapkit_lib::native::NativeError;
use iapkit_lib::testing::fixtures;
use iapkit_lib::{ErrorCode, Platform, Purchase, PurchaseError};

#[tokio::test]
async fn test_fan_out_and_removal() {
    let ctx = TestContext::connected(Platform::Android).await;
    let counters: Vec<_> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    let subscriptions: Vec<_> = counters
        .iter()
        .map(|counter| {
            let counter = Arc::clone(counter);
            ctx.client.purchase_updated_listener(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    ctx.bridge
        .emit_purchase(fixtures::android_purchase("GPA.1", "coins", "tok-1"));
    let counts: Vec<_> = counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    assert_eq!(counts, vec![1, 1, 1]);

    subscriptions[1].remove();
    subscriptions[1].remove();
    assert!(!subscriptions[1].is_active());

    ctx.bridge
        .emit_purchase(fixtures::android_purchase("GPA.2", "coins", "tok-2"));
    let counts: Vec<_> = counters.iter().map(|c| c.load(Ordering::SeqCst)).collect();
    assert_eq!(counts, vec![2, 1, 2]);

    // Still a single native callback per event kind.
    assert_eq!(ctx.bridge.listener_counts(), (1, 1, 0));
}

#[tokio::test]
async fn test_invalid_purchase_events_are_dropped() {
    let ctx = TestContext::connected(Platform::Ios).await;
    let (seen, listener) = recorder::<Purchase>();
    let _subscription = ctx.client.purchase_updated_listener(listener);

    let mut missing_product = fixtures::ios_purchase("t1", "premium");
    missing_product.product_id = None;
    ctx.bridge.emit_purchase(missing_product);

    let mut platformless = fixtures::ios_purchase("t2", "premium");
    platformless.platform = None;
    ctx.bridge.emit_purchase(platformless);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, "t2");
    assert_eq!(seen[0].platform(), Platform::Ios);
    assert_eq!(seen[0].transaction_receipt, "");
}

#[tokio::test]
async fn test_panicking_listener_does_not_starve_others() {
    let ctx = TestContext::connected(Platform::Ios).await;
    let _bad = ctx
        .client
        .purchase_updated_listener(|_| panic!("listener failure"));
    let (seen, listener) = recorder::<Purchase>();
    let _good = ctx.client.purchase_updated_listener(listener);

    ctx.bridge.emit_purchase(fixtures::ios_purchase("t1", "premium"));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_errors_are_normalized_for_listeners() {
    let ctx = TestContext::connected(Platform::Android).await;
    let (seen, listener) = recorder::<PurchaseError>();
    let _subscription = ctx.client.purchase_error_listener(listener);

    ctx.bridge.emit_error(
        NativeError::with_code("USER_CANCELED", "User canceled the purchase")
            .with_response_code(1)
            .with_product_id("coins"),
    );

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].code, ErrorCode::UserCancelled);
    assert_eq!(seen[0].product_id.as_deref(), Some("coins"));
    assert_eq!(seen[0].platform, Some(Platform::Android));
}

#[tokio::test]
async fn test_promoted_product_listener_is_inert_on_android() {
    let ctx = TestContext::connected(Platform::Android).await;
    let subscription = ctx.client.promoted_product_listener_ios(|_| {});
    ctx.bridge
        .emit_promoted(fixtures::ios_product("premium", "subs"));
    subscription.remove();
    assert!(!subscription.is_active());
    assert_eq!(ctx.bridge.listener_counts(), (1, 1, 0));
}

#[tokio::test]
async fn test_promoted_product_on_ios() {
    let ctx = TestContext::connected(Platform::Ios).await;
    let (seen, listener) = recorder::<iapkit_lib::Product>();
    let _subscription = ctx.client.promoted_product_listener_ios(listener);

    ctx.bridge
        .emit_promoted(fixtures::ios_product("premium", "subs"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].is_subscription());
}

#[tokio::test]
async fn test_listeners_run_in_registration_order() {
    let ctx = TestContext::connected(Platform::Ios).await;
    let order = Arc::new(Mutex::new(Vec::new()));
    let _subscriptions: Vec<_> = (0..3)
        .map(|index| {
            let order = Arc::clone(&order);
            ctx.client
                .purchase_updated_listener(move |_| order.lock().unwrap().push(index))
        })
        .collect();

    ctx.bridge.emit_purchase(fixtures::ios_purchase("t1", "premium"));
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_listener_added_during_emit_fires_on_next_event() {
    let ctx = TestContext::connected(Platform::Android).await;
    let late_calls = Arc::new(AtomicUsize::new(0));
    let late_subscriptions = Arc::new(Mutex::new(Vec::new()));

    let client = ctx.client.clone();
    let calls = Arc::clone(&late_calls);
    let added = Arc::clone(&late_subscriptions);
    let _adder = ctx.client.purchase_updated_listener(move |_| {
        let mut added = added.lock().unwrap();
        if added.is_empty() {
            let calls = Arc::clone(&calls);
            added.push(client.purchase_updated_listener(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }
    });

    ctx.bridge
        .emit_purchase(fixtures::android_purchase("GPA.1", "coins", "tok-1"));
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    assert_eq!(late_subscriptions.lock().unwrap().len(), 1);

    ctx.bridge
        .emit_purchase(fixtures::android_purchase("GPA.2", "coins", "tok-2"));
    assert_eq!(late_calls.load(Ordering::SeqCst), 1);
}
