//! Testing utilities for iapkit integrations.
//!
//! [`MockBridge`] is an in-memory [`crate::NativeBridge`] that records every
//! call, returns scripted responses and lets tests fire native events through
//! the callbacks the client installed. [`fixtures`] builds realistic native
//! records for both platforms.
//!
//! # Usage
//!
//! ```rust
//! use iapkit_lib::testing::{fixtures, MockBridge, MockBridgeFactory};
//! use iapkit_lib::{IapClient, IapConfig, Platform};
//!
//! let bridge = MockBridge::new(Platform::Ios);
//! bridge.set_products(vec![fixtures::ios_product("premium", "subs")]);
//!
//! let factory = MockBridgeFactory::new(bridge.clone());
//! let client = IapClient::new(IapConfig::default().with_platform(Platform::Ios), factory).unwrap();
//! # let _ = client;
//! ```

pub mod fixtures;
mod mock_bridge;

pub use mock_bridge::{BridgeCall, MockBridge, MockBridgeFactory};
