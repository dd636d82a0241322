//! The native bridge boundary.
//!
//! A [`NativeBridge`] is the opaque async RPC surface exposed by the platform
//! runtime (StoreKit on iOS, Play Billing on Android). The engine never
//! constructs one directly: it asks a [`BridgeFactory`] exactly once, through
//! [`crate::IapClient`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::native::{
    NativeAvailablePurchasesOptions, NativeError, NativeFinishParams, NativeFinishResult,
    NativeProduct, NativePurchase, NativeReceiptValidationProps, NativeRequestPurchase,
};
use crate::types::{DeepLinkOptions, SubscriptionStatusIos};

/// Result type for raw bridge calls. Errors are normalized by the caller.
pub type BridgeResult<T> = std::result::Result<T, NativeError>;

/// Native purchase-updated callback.
pub type NativePurchaseCallback = Arc<dyn Fn(NativePurchase) + Send + Sync>;

/// Native purchase-error callback.
pub type NativeErrorCallback = Arc<dyn Fn(NativeError) + Send + Sync>;

/// Native promoted-product callback (iOS).
pub type NativeProductCallback = Arc<dyn Fn(NativeProduct) + Send + Sync>;

/// Operations the native commerce runtime exposes.
///
/// Listener removal is by callback identity: implementations must remove the
/// entry that is `Arc::ptr_eq` to the argument, not an arbitrary one.
///
/// Platform-qualified operations default to returning
/// [`NativeError::unsupported`], so a bridge only implements the set its
/// platform offers.
#[async_trait]
pub trait NativeBridge: Send + Sync {
    /// Open the connection to the store service.
    async fn init_connection(&self) -> BridgeResult<bool>;

    /// Close the connection to the store service.
    async fn end_connection(&self) -> BridgeResult<bool>;

    /// Query catalog entries. `product_type` is `inapp` or `subs`.
    async fn fetch_products(
        &self,
        skus: &[String],
        product_type: &str,
    ) -> BridgeResult<Vec<NativeProduct>>;

    /// Start a purchase flow.
    ///
    /// Bridges that deliver results only through the purchase-updated
    /// listener return `Ok(None)`.
    async fn request_purchase(
        &self,
        request: NativeRequestPurchase,
    ) -> BridgeResult<Option<Vec<NativePurchase>>>;

    /// List purchases the store still considers owned or unfinished.
    async fn get_available_purchases(
        &self,
        options: NativeAvailablePurchasesOptions,
    ) -> BridgeResult<Vec<NativePurchase>>;

    /// Finish (iOS), acknowledge or consume (Android) a transaction.
    async fn finish_transaction(&self, params: NativeFinishParams)
        -> BridgeResult<NativeFinishResult>;

    /// Validate a receipt or purchase token. The payload is platform-shaped.
    async fn validate_receipt(&self, props: NativeReceiptValidationProps) -> BridgeResult<Value>;

    fn add_purchase_updated_listener(&self, callback: NativePurchaseCallback);

    fn remove_purchase_updated_listener(&self, callback: &NativePurchaseCallback);

    fn add_purchase_error_listener(&self, callback: NativeErrorCallback);

    fn remove_purchase_error_listener(&self, callback: &NativeErrorCallback);

    /// Register for promoted-product notifications. No-op where unsupported.
    fn add_promoted_product_listener(&self, _callback: NativeProductCallback) {}

    fn remove_promoted_product_listener(&self, _callback: &NativeProductCallback) {}

    /// Storefront country code (ISO 3166-1 alpha-3).
    async fn get_storefront_ios(&self) -> BridgeResult<String> {
        Err(NativeError::unsupported("getStorefrontIOS"))
    }

    async fn get_promoted_product_ios(&self) -> BridgeResult<Option<NativeProduct>> {
        Err(NativeError::unsupported("getPromotedProductIOS"))
    }

    async fn request_purchase_on_promoted_product_ios(&self) -> BridgeResult<bool> {
        Err(NativeError::unsupported("requestPurchaseOnPromotedProductIOS"))
    }

    /// Present the refund sheet. Returns the refund request status.
    async fn begin_refund_request_ios(&self, _sku: &str) -> BridgeResult<Option<String>> {
        Err(NativeError::unsupported("beginRefundRequestIOS"))
    }

    async fn subscription_status_ios(&self, _sku: &str) -> BridgeResult<Vec<SubscriptionStatusIos>> {
        Err(NativeError::unsupported("subscriptionStatusIOS"))
    }

    async fn current_entitlement_ios(&self, _sku: &str) -> BridgeResult<Option<NativePurchase>> {
        Err(NativeError::unsupported("currentEntitlementIOS"))
    }

    async fn latest_transaction_ios(&self, _sku: &str) -> BridgeResult<Option<NativePurchase>> {
        Err(NativeError::unsupported("latestTransactionIOS"))
    }

    async fn is_eligible_for_intro_offer_ios(&self, _group_id: &str) -> BridgeResult<bool> {
        Err(NativeError::unsupported("isEligibleForIntroOfferIOS"))
    }

    /// Base64 app receipt.
    async fn get_receipt_data_ios(&self) -> BridgeResult<String> {
        Err(NativeError::unsupported("getReceiptDataIOS"))
    }

    async fn get_pending_transactions_ios(&self) -> BridgeResult<Vec<NativePurchase>> {
        Err(NativeError::unsupported("getPendingTransactionsIOS"))
    }

    async fn clear_transaction_ios(&self) -> BridgeResult<bool> {
        Err(NativeError::unsupported("clearTransactionIOS"))
    }

    async fn sync_ios(&self) -> BridgeResult<bool> {
        Err(NativeError::unsupported("syncIOS"))
    }

    async fn present_code_redemption_sheet_ios(&self) -> BridgeResult<bool> {
        Err(NativeError::unsupported("presentCodeRedemptionSheetIOS"))
    }

    /// Present the manage-subscriptions sheet. Returns purchases whose status changed.
    async fn show_manage_subscriptions_ios(&self) -> BridgeResult<Vec<NativePurchase>> {
        Err(NativeError::unsupported("showManageSubscriptionsIOS"))
    }

    /// Billing country code reported by Play Billing.
    async fn get_storefront_android(&self) -> BridgeResult<String> {
        Err(NativeError::unsupported("getStorefrontAndroid"))
    }

    async fn deep_link_to_subscriptions_android(
        &self,
        _options: DeepLinkOptions,
    ) -> BridgeResult<()> {
        Err(NativeError::unsupported("deepLinkToSubscriptionsAndroid"))
    }
}

/// Creates the process-wide bridge instance.
#[async_trait]
pub trait BridgeFactory: Send + Sync {
    async fn create(&self) -> BridgeResult<Arc<dyn NativeBridge>>;
}

#[async_trait]
impl<F> BridgeFactory for F
where
    F: Fn() -> BridgeResult<Arc<dyn NativeBridge>> + Send + Sync,
{
    async fn create(&self) -> BridgeResult<Arc<dyn NativeBridge>> {
        (self)()
    }
}
