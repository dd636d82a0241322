//! Per-platform behavior behind one interface.
//!
//! The client picks an adapter once, from the configured or detected
//! platform, instead of branching on the platform at every call site:
//!
//! - [`IosAdapter`]: StoreKit request shapes, finish by transaction id
//! - [`AndroidAdapter`]: Play Billing request shapes, acknowledge/consume by token
//!
//! Both adapters are stateless and live in statics.

mod android;
mod ios;

use async_trait::async_trait;
use serde_json::Value;

use crate::bridge::NativeBridge;
use crate::config::IapConfig;
use crate::finish::FinishOutcome;
use crate::native::{NativeAvailablePurchasesOptions, NativeRequestPurchase};
use crate::request::{AvailablePurchasesOptions, FetchProductsQuery, RequestPurchaseProps};
use crate::types::{Platform, ProductQueryType, ProductType, Purchase, ReceiptValidationResult};
use crate::Result;

pub use android::AndroidAdapter;
pub use ios::IosAdapter;

/// Platform-specific request building, completion and result parsing.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Platform served by this adapter.
    fn platform(&self) -> Platform;

    /// Build the native purchase payload, applying platform defaults.
    fn build_purchase_request(
        &self,
        props: &RequestPurchaseProps,
        product_type: ProductType,
        config: &IapConfig,
    ) -> Result<NativeRequestPurchase>;

    /// Native available-purchases queries, in the order they must be issued.
    fn available_purchases_queries(
        &self,
        options: &AvailablePurchasesOptions,
    ) -> Vec<NativeAvailablePurchasesOptions>;

    /// Native catalog queries, in the order they must be issued.
    fn fetch_products_queries(
        &self,
        skus: &[String],
        query_type: ProductQueryType,
    ) -> Vec<FetchProductsQuery>;

    /// Complete a purchase with this platform's primitive.
    async fn finish(
        &self,
        bridge: &dyn NativeBridge,
        purchase: &Purchase,
        is_consumable: bool,
        config: &IapConfig,
    ) -> Result<FinishOutcome>;

    /// Interpret the native receipt-validation payload.
    fn parse_receipt_validation(&self, value: Value) -> Result<ReceiptValidationResult>;
}

static IOS: IosAdapter = IosAdapter;
static ANDROID: AndroidAdapter = AndroidAdapter;

/// The adapter for `platform`.
pub fn adapter_for(platform: Platform) -> &'static dyn PlatformAdapter {
    match platform {
        Platform::Ios => &IOS,
        Platform::Android => &ANDROID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_selection() {
        assert_eq!(adapter_for(Platform::Ios).platform(), Platform::Ios);
        assert_eq!(adapter_for(Platform::Android).platform(), Platform::Android);
    }
}
