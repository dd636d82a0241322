//! iapkit library.
//!
//! A cross-platform in-app purchase layer that sits between application code
//! and a native store bridge (StoreKit on iOS, Play Billing on Android). The
//! native side is injected through the [`NativeBridge`] trait; this crate
//! normalizes everything that crosses it.
//!
//! # Features
//!
//! - **Error Normalization**: Every native failure becomes a [`PurchaseError`] with a closed [`ErrorCode`]
//! - **Type Bridge**: Loosely typed native records become validated [`Product`] and [`Purchase`] values
//! - **Request Builders**: One purchase request shape, translated per platform
//! - **Listener Fan-out**: Any number of application listeners behind one native callback
//! - **Transaction Finishing**: Finish, acknowledge and consume with idempotent iOS semantics
//! - **Connection Orchestration**: Lazy bridge creation and a single in-flight connection attempt
//!
//! # Example
//!
//! ```ignore
//! use iapkit_lib::prelude::*;
//!
//! let client = IapClient::new(IapConfig::default(), bridge_factory)?;
//! let _updates = client.purchase_updated_listener(|purchase| {
//!     println!("purchased {}", purchase.product_id);
//! });
//! client.init_connection().await?;
//!
//! let products = client
//!     .fetch_products(&["premium".into()], ProductQueryType::Subs)
//!     .await?;
//! client
//!     .request_purchase(&RequestPurchaseProps::for_sku("premium"), ProductType::Subs)
//!     .await?;
//! ```

pub mod bridge;
pub mod config;
pub mod connection;
pub mod convert;
pub mod errors;
pub mod finish;
pub mod listeners;
pub mod native;
pub mod normalize;
pub mod platform;
pub mod prelude;
pub mod request;
pub mod subscriptions;
pub mod types;

/// Test utilities: a scriptable in-memory bridge and native fixtures.
pub mod testing;

pub use bridge::{BridgeFactory, BridgeResult, NativeBridge};
pub use config::IapConfig;
pub use connection::{ConnectionState, IapClient};
pub use errors::{ErrorCode, IapError, PurchaseError};
pub use finish::FinishOutcome;
pub use listeners::Subscription;
pub use normalize::{
    error_code_from_native, is_recoverable_error, is_user_cancelled_error, normalize_error,
    user_friendly_message,
};
pub use request::{
    AndroidPurchaseRequest, AndroidSubscriptionOffer, AvailablePurchasesOptions, DiscountOffer,
    IosPurchaseRequest, RequestPurchaseProps,
};
pub use subscriptions::ActiveSubscription;
pub use types::{
    AndroidValidationOptions, DeepLinkOptions, Platform, Product, ProductQueryType, ProductType,
    Purchase, PurchaseState, ReceiptValidationResult, SubscriptionProduct,
};

/// Common result alias for iapkit operations.
pub type Result<T> = std::result::Result<T, IapError>;
