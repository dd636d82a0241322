//! Prelude module for convenient imports.
//!
//! ```rust
//! use iapkit_lib::prelude::*;
//! ```
//!
//! ## What's Included
//!
//! - Client: `IapClient`, `IapConfig`, `ConnectionState`
//! - Error types: `IapError`, `PurchaseError`, `ErrorCode`, `Result`
//! - Domain types: `Product`, `Purchase`, `Platform` and friends
//! - Request builders: `RequestPurchaseProps` and the per-platform requests
//! - Bridge traits: `NativeBridge`, `BridgeFactory`

// Client
pub use crate::connection::{ConnectionState, IapClient};
pub use crate::config::IapConfig;

// Error handling
pub use crate::errors::{ErrorCode, IapError, PurchaseError};
pub use crate::Result;

// Domain types
pub use crate::finish::FinishOutcome;
pub use crate::listeners::Subscription;
pub use crate::subscriptions::ActiveSubscription;
pub use crate::types::{
    Platform, Product, ProductQueryType, ProductType, Purchase, PurchaseState,
    SubscriptionProduct,
};

// Requests
pub use crate::request::{
    AndroidPurchaseRequest, AvailablePurchasesOptions, IosPurchaseRequest, RequestPurchaseProps,
};

// Bridge traits
pub use crate::bridge::{BridgeFactory, NativeBridge};
