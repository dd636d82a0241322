//! Common test utilities for iapkit-lib integration tests

use std::sync::{Arc, Mutex, Once};

use iapkit_lib::testing::{MockBridge, MockBridgeFactory};
use iapkit_lib::{IapClient, IapConfig, Platform};

static TRACING: Once = Once::new();

/// Install a test subscriber once; honours `RUST_LOG`.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Client wired to a fresh mock bridge for `platform`
#[allow(dead_code)]
pub struct TestContext {
    pub client: IapClient,
    pub bridge: Arc<MockBridge>,
    pub factory: Arc<MockBridgeFactory>,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new(platform: Platform) -> Self {
        Self::with_config(IapConfig::default().with_platform(platform))
    }

    pub fn with_config(config: IapConfig) -> Self {
        init_tracing();
        let platform = config.platform.expect("test configs name a platform");
        let bridge = MockBridge::new(platform);
        let factory = MockBridgeFactory::new(Arc::clone(&bridge));
        let client = IapClient::new(config, factory.clone()).expect("client");
        Self {
            client,
            bridge,
            factory,
        }
    }

    /// Connected context
    pub async fn connected(platform: Platform) -> Self {
        let ctx = Self::new(platform);
        assert!(ctx.client.init_connection().await.unwrap());
        ctx
    }
}

/// Collects values delivered to a listener
#[allow(dead_code)]
pub fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |value: &T| sink.lock().unwrap().push(value.clone()))
}
