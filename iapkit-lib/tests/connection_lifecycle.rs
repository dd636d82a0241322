//! Integration tests for the connection lifecycle

mod common;

use common::TestContext;
use iapkit_lib::native::NativeError;
use iapkit_lib::testing::{BridgeCall, MockBridge, MockBridgeFactory};
use iapkit_lib::{ConnectionState, ErrorCode, IapClient, IapConfig, IapError, Platform};

#[tokio::test]
async fn test_listeners_installed_before_native_init() {
    let ctx = TestContext::new(Platform::Ios);
    assert!(ctx.client.init_connection().await.unwrap());

    assert_eq!(ctx.bridge.listeners_at_init(), Some((1, 1, 1)));
    assert_eq!(ctx.client.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_concurrent_init_shares_one_attempt() {
    let ctx = TestContext::new(Platform::Android);
    let (a, b, c) = (ctx.client.clone(), ctx.client.clone(), ctx.client.clone());

    let (ra, rb, rc) = tokio::join!(a.init_connection(), b.init_connection(), c.init_connection());

    assert!(ra.unwrap() && rb.unwrap() && rc.unwrap());
    assert_eq!(ctx.factory.creations(), 1);
    assert_eq!(
        ctx.bridge.count_calls(|call| *call == BridgeCall::InitConnection),
        1
    );
    // Exactly one set of native callbacks.
    assert_eq!(ctx.bridge.listener_counts(), (1, 1, 0));
}

#[tokio::test]
async fn test_concurrent_init_failure_is_shared() {
    let ctx = TestContext::new(Platform::Ios);
    ctx.bridge.fail_next(
        "initConnection",
        NativeError::with_code("E_NETWORK_ERROR", "offline"),
    );

    let (ra, rb) = tokio::join!(ctx.client.init_connection(), ctx.client.init_connection());

    assert_eq!(ra.unwrap_err().code(), ErrorCode::NetworkError);
    assert_eq!(rb.unwrap_err().code(), ErrorCode::NetworkError);
    assert_eq!(ctx.client.state(), ConnectionState::Uninitialized);
    assert_eq!(ctx.bridge.listener_counts(), (0, 0, 0));

    // A later attempt starts fresh.
    assert!(ctx.client.init_connection().await.unwrap());
    assert_eq!(
        ctx.bridge.count_calls(|call| *call == BridgeCall::InitConnection),
        2
    );
}

#[tokio::test]
async fn test_init_when_connected_is_a_noop() {
    let ctx = TestContext::connected(Platform::Ios).await;
    assert!(ctx.client.init_connection().await.unwrap());
    assert_eq!(
        ctx.bridge.count_calls(|call| *call == BridgeCall::InitConnection),
        1
    );
}

#[tokio::test]
async fn test_end_then_reconnect_reuses_bridge() {
    let ctx = TestContext::connected(Platform::Android).await;

    assert!(ctx.client.end_connection().await.unwrap());
    assert_eq!(ctx.client.state(), ConnectionState::Ended);
    assert_eq!(ctx.bridge.listener_counts(), (0, 0, 0));

    assert!(ctx.client.init_connection().await.unwrap());
    assert_eq!(ctx.factory.creations(), 1);
    assert_eq!(ctx.bridge.listener_counts(), (1, 1, 0));
}

#[tokio::test]
async fn test_end_without_bridge() {
    let ctx = TestContext::new(Platform::Ios);
    assert!(ctx.client.end_connection().await.unwrap());
    assert_eq!(ctx.factory.creations(), 0);
    assert!(ctx.bridge.calls().is_empty());
}

#[tokio::test]
async fn test_bridge_unavailable_then_recovered() {
    common::init_tracing();
    let bridge = MockBridge::new(Platform::Ios);
    let factory = MockBridgeFactory::failing(
        bridge.clone(),
        NativeError::new("TurboModuleRegistry: 'RNIap' could not be found"),
    );
    let client = IapClient::new(
        IapConfig::default().with_platform(Platform::Ios),
        factory.clone(),
    )
    .unwrap();

    let err = client.init_connection().await.unwrap_err();
    match &err {
        IapError::BridgeUnavailable(message) => assert!(message.contains("RNIap")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_retryable());

    factory.recover();
    assert!(client.init_connection().await.unwrap());
    assert_eq!(factory.creations(), 2);
}

#[tokio::test]
async fn test_operations_create_bridge_lazily() {
    let ctx = TestContext::new(Platform::Ios);
    assert_eq!(ctx.factory.creations(), 0);

    let purchases = ctx.client.get_available_purchases(None).await.unwrap();
    assert!(purchases.is_empty());
    assert_eq!(ctx.factory.creations(), 1);
    assert!(!ctx.client.is_connected());
}

#[test]
fn test_init_connection_without_a_tokio_runtime() {
    let ctx = TestContext::new(Platform::Android);
    let connected = futures::executor::block_on(ctx.client.init_connection()).unwrap();

    assert!(connected);
    assert_eq!(ctx.client.state(), ConnectionState::Connected);
    assert_eq!(ctx.factory.creations(), 1);
}
