//! In-memory native bridge.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::bridge::{
    BridgeFactory, BridgeResult, NativeBridge, NativeErrorCallback, NativeProductCallback,
    NativePurchaseCallback,
};
use crate::native::{
    NativeAvailablePurchasesOptions, NativeError, NativeFinishParams, NativeFinishResult,
    NativeProduct, NativePurchase, NativeReceiptValidationProps, NativeRequestPurchase,
    NativeResult,
};
use crate::types::{DeepLinkOptions, Platform, ProductType, SubscriptionStatusIos};

/// One recorded bridge call.
#[derive(Clone, Debug, PartialEq)]
pub enum BridgeCall {
    InitConnection,
    EndConnection,
    FetchProducts {
        skus: Vec<String>,
        product_type: String,
    },
    RequestPurchase(NativeRequestPurchase),
    GetAvailablePurchases(NativeAvailablePurchasesOptions),
    FinishTransaction(NativeFinishParams),
    ValidateReceipt(NativeReceiptValidationProps),
    /// A platform-qualified operation, by native name.
    PlatformOp(&'static str),
}

#[derive(Default)]
struct MockState {
    calls: Vec<BridgeCall>,
    products: Vec<NativeProduct>,
    available: HashMap<String, Vec<NativePurchase>>,
    purchase_response: Option<Vec<NativePurchase>>,
    failures: HashMap<String, NativeError>,
    finish_result: Option<NativeFinishResult>,
    finished_ios: HashSet<String>,
    validation: Option<Value>,
    storefront: Option<String>,
    promoted: Option<NativeProduct>,
    listeners_at_init: Option<(usize, usize, usize)>,
    purchase_listeners: Vec<NativePurchaseCallback>,
    error_listeners: Vec<NativeErrorCallback>,
    promoted_listeners: Vec<NativeProductCallback>,
}

/// Scripted in-memory [`NativeBridge`].
///
/// Available purchases are keyed by query: `ios` for iOS, `inapp` / `subs`
/// for Android. Finishing the same iOS transaction twice fails the second
/// time with a "Transaction not found" message, as StoreKit does.
pub struct MockBridge {
    platform: Platform,
    state: Mutex<MockState>,
}

impl MockBridge {
    pub fn new(platform: Platform) -> Arc<Self> {
        Arc::new(Self {
            platform,
            state: Mutex::new(MockState::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<BridgeCall> {
        self.state().calls.clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&BridgeCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn set_products(&self, products: Vec<NativeProduct>) {
        self.state().products = products;
    }

    /// Script the result of an available-purchases query (`ios`, `inapp` or `subs`).
    pub fn set_available_purchases(&self, query: &str, purchases: Vec<NativePurchase>) {
        self.state().available.insert(query.to_string(), purchases);
    }

    /// Script the direct result of `request_purchase`.
    pub fn set_purchase_response(&self, purchases: Option<Vec<NativePurchase>>) {
        self.state().purchase_response = purchases;
    }

    /// Fail the next call to the operation with native name `operation`.
    pub fn fail_next(&self, operation: &str, error: NativeError) {
        self.state().failures.insert(operation.to_string(), error);
    }

    /// Script the result of every subsequent `finish_transaction`.
    pub fn set_finish_result(&self, result: NativeFinishResult) {
        self.state().finish_result = Some(result);
    }

    pub fn set_validation_response(&self, value: Value) {
        self.state().validation = Some(value);
    }

    pub fn set_storefront(&self, country_code: impl Into<String>) {
        self.state().storefront = Some(country_code.into());
    }

    pub fn set_promoted_product(&self, product: Option<NativeProduct>) {
        self.state().promoted = product;
    }

    /// Installed native callbacks: (purchase-updated, purchase-error, promoted-product).
    pub fn listener_counts(&self) -> (usize, usize, usize) {
        let state = self.state();
        (
            state.purchase_listeners.len(),
            state.error_listeners.len(),
            state.promoted_listeners.len(),
        )
    }

    /// Listener counts observed when `init_connection` was last called.
    pub fn listeners_at_init(&self) -> Option<(usize, usize, usize)> {
        self.state().listeners_at_init
    }

    /// Fire a native purchase-updated event.
    pub fn emit_purchase(&self, purchase: NativePurchase) {
        let listeners = self.state().purchase_listeners.clone();
        for listener in listeners {
            listener(purchase.clone());
        }
    }

    /// Fire a native purchase-error event.
    pub fn emit_error(&self, error: NativeError) {
        let listeners = self.state().error_listeners.clone();
        for listener in listeners {
            listener(error.clone());
        }
    }

    /// Fire a native promoted-product event.
    pub fn emit_promoted(&self, product: NativeProduct) {
        let listeners = self.state().promoted_listeners.clone();
        for listener in listeners {
            listener(product.clone());
        }
    }

    /// Record `call` and consume a scripted failure for `operation`.
    fn enter(&self, operation: &str, call: BridgeCall) -> BridgeResult<()> {
        let mut state = self.state();
        state.calls.push(call);
        match state.failures.remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn enter_platform(&self, operation: &'static str, platform: Platform) -> BridgeResult<()> {
        self.enter(operation, BridgeCall::PlatformOp(operation))?;
        if platform == self.platform {
            Ok(())
        } else {
            Err(NativeError::unsupported(operation))
        }
    }

    fn available(&self, query: &str) -> Vec<NativePurchase> {
        self.state().available.get(query).cloned().unwrap_or_default()
    }

    fn find_ios_purchase(&self, sku: &str) -> Option<NativePurchase> {
        self.available("ios")
            .into_iter()
            .find(|p| p.product_id.as_deref() == Some(sku))
    }
}

fn matches_type(product: &NativeProduct, product_type: &str) -> bool {
    if product_type == "all" {
        return true;
    }
    product
        .product_type
        .as_deref()
        .and_then(|t| t.parse::<ProductType>().ok())
        .map_or(product_type == "inapp", |t| t.native_name() == product_type)
}

#[async_trait]
impl NativeBridge for MockBridge {
    async fn init_connection(&self) -> BridgeResult<bool> {
        let counts = self.listener_counts();
        self.state().listeners_at_init = Some(counts);
        self.enter("initConnection", BridgeCall::InitConnection)?;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        Ok(true)
    }

    async fn end_connection(&self) -> BridgeResult<bool> {
        self.enter("endConnection", BridgeCall::EndConnection)?;
        Ok(true)
    }

    async fn fetch_products(
        &self,
        skus: &[String],
        product_type: &str,
    ) -> BridgeResult<Vec<NativeProduct>> {
        self.enter(
            "fetchProducts",
            BridgeCall::FetchProducts {
                skus: skus.to_vec(),
                product_type: product_type.to_string(),
            },
        )?;
        let products = self.state().products.clone();
        Ok(products
            .into_iter()
            .filter(|p| p.id.as_ref().is_some_and(|id| skus.contains(id)))
            .filter(|p| matches_type(p, product_type))
            .collect())
    }

    async fn request_purchase(
        &self,
        request: NativeRequestPurchase,
    ) -> BridgeResult<Option<Vec<NativePurchase>>> {
        self.enter("requestPurchase", BridgeCall::RequestPurchase(request))?;
        Ok(self.state().purchase_response.clone())
    }

    async fn get_available_purchases(
        &self,
        options: NativeAvailablePurchasesOptions,
    ) -> BridgeResult<Vec<NativePurchase>> {
        let query = match &options {
            NativeAvailablePurchasesOptions::Ios(_) => "ios".to_string(),
            NativeAvailablePurchasesOptions::Android(android) => android.product_type.clone(),
        };
        self.enter(
            "getAvailablePurchases",
            BridgeCall::GetAvailablePurchases(options),
        )?;
        Ok(self.available(&query))
    }

    async fn finish_transaction(
        &self,
        params: NativeFinishParams,
    ) -> BridgeResult<NativeFinishResult> {
        self.enter("finishTransaction", BridgeCall::FinishTransaction(params.clone()))?;
        let mut state = self.state();
        match params {
            NativeFinishParams::Ios { transaction_id } => {
                if !state.finished_ios.insert(transaction_id.clone()) {
                    return Err(NativeError::new(format!(
                        "Transaction not found: {transaction_id}"
                    )));
                }
                Ok(state
                    .finish_result
                    .clone()
                    .unwrap_or(NativeFinishResult::Bool(true)))
            }
            NativeFinishParams::Android { purchase_token, .. } => Ok(state
                .finish_result
                .clone()
                .unwrap_or_else(|| {
                    NativeFinishResult::Structured(NativeResult {
                        purchase_token: Some(purchase_token),
                        ..NativeResult::ok()
                    })
                })),
        }
    }

    async fn validate_receipt(&self, props: NativeReceiptValidationProps) -> BridgeResult<Value> {
        let sku = props.sku.clone();
        self.enter("validateReceipt", BridgeCall::ValidateReceipt(props))?;
        if let Some(value) = self.state().validation.clone() {
            return Ok(value);
        }
        Ok(match self.platform {
            Platform::Ios => json!({
                "isValid": true,
                "receiptData": "mock-receipt",
                "jwsRepresentation": format!("jws-{sku}"),
            }),
            Platform::Android => json!({
                "productId": sku,
                "autoRenewing": false,
                "purchaseState": 0,
            }),
        })
    }

    fn add_purchase_updated_listener(&self, callback: NativePurchaseCallback) {
        self.state().purchase_listeners.push(callback);
    }

    fn remove_purchase_updated_listener(&self, callback: &NativePurchaseCallback) {
        self.state()
            .purchase_listeners
            .retain(|existing| !Arc::ptr_eq(existing, callback));
    }

    fn add_purchase_error_listener(&self, callback: NativeErrorCallback) {
        self.state().error_listeners.push(callback);
    }

    fn remove_purchase_error_listener(&self, callback: &NativeErrorCallback) {
        self.state()
            .error_listeners
            .retain(|existing| !Arc::ptr_eq(existing, callback));
    }

    fn add_promoted_product_listener(&self, callback: NativeProductCallback) {
        self.state().promoted_listeners.push(callback);
    }

    fn remove_promoted_product_listener(&self, callback: &NativeProductCallback) {
        self.state()
            .promoted_listeners
            .retain(|existing| !Arc::ptr_eq(existing, callback));
    }

    async fn get_storefront_ios(&self) -> BridgeResult<String> {
        self.enter_platform("getStorefrontIOS", Platform::Ios)?;
        Ok(self.state().storefront.clone().unwrap_or_else(|| "USA".to_string()))
    }

    async fn get_promoted_product_ios(&self) -> BridgeResult<Option<NativeProduct>> {
        self.enter_platform("getPromotedProductIOS", Platform::Ios)?;
        Ok(self.state().promoted.clone())
    }

    async fn request_purchase_on_promoted_product_ios(&self) -> BridgeResult<bool> {
        self.enter_platform("requestPurchaseOnPromotedProductIOS", Platform::Ios)?;
        Ok(self.state().promoted.is_some())
    }

    async fn begin_refund_request_ios(&self, _sku: &str) -> BridgeResult<Option<String>> {
        self.enter_platform("beginRefundRequestIOS", Platform::Ios)?;
        Ok(Some("success".to_string()))
    }

    async fn subscription_status_ios(&self, sku: &str) -> BridgeResult<Vec<SubscriptionStatusIos>> {
        self.enter_platform("subscriptionStatusIOS", Platform::Ios)?;
        Ok(self
            .find_ios_purchase(sku)
            .map(|_| SubscriptionStatusIos {
                state: "subscribed".to_string(),
                renewal_info: None,
            })
            .into_iter()
            .collect())
    }

    async fn current_entitlement_ios(&self, sku: &str) -> BridgeResult<Option<NativePurchase>> {
        self.enter_platform("currentEntitlementIOS", Platform::Ios)?;
        Ok(self.find_ios_purchase(sku))
    }

    async fn latest_transaction_ios(&self, sku: &str) -> BridgeResult<Option<NativePurchase>> {
        self.enter_platform("latestTransactionIOS", Platform::Ios)?;
        Ok(self.find_ios_purchase(sku))
    }

    async fn is_eligible_for_intro_offer_ios(&self, _group_id: &str) -> BridgeResult<bool> {
        self.enter_platform("isEligibleForIntroOfferIOS", Platform::Ios)?;
        Ok(true)
    }

    async fn get_receipt_data_ios(&self) -> BridgeResult<String> {
        self.enter_platform("getReceiptDataIOS", Platform::Ios)?;
        Ok("mock-receipt".to_string())
    }

    async fn get_pending_transactions_ios(&self) -> BridgeResult<Vec<NativePurchase>> {
        self.enter_platform("getPendingTransactionsIOS", Platform::Ios)?;
        let finished = self.state().finished_ios.clone();
        Ok(self
            .available("ios")
            .into_iter()
            .filter(|p| p.id.as_ref().is_some_and(|id| !finished.contains(id)))
            .collect())
    }

    async fn clear_transaction_ios(&self) -> BridgeResult<bool> {
        self.enter_platform("clearTransactionIOS", Platform::Ios)?;
        Ok(true)
    }

    async fn sync_ios(&self) -> BridgeResult<bool> {
        self.enter_platform("syncIOS", Platform::Ios)?;
        Ok(true)
    }

    async fn present_code_redemption_sheet_ios(&self) -> BridgeResult<bool> {
        self.enter_platform("presentCodeRedemptionSheetIOS", Platform::Ios)?;
        Ok(true)
    }

    async fn show_manage_subscriptions_ios(&self) -> BridgeResult<Vec<NativePurchase>> {
        self.enter_platform("showManageSubscriptionsIOS", Platform::Ios)?;
        Ok(Vec::new())
    }

    async fn get_storefront_android(&self) -> BridgeResult<String> {
        self.enter_platform("getStorefrontAndroid", Platform::Android)?;
        Ok(self.state().storefront.clone().unwrap_or_else(|| "US".to_string()))
    }

    async fn deep_link_to_subscriptions_android(
        &self,
        _options: DeepLinkOptions,
    ) -> BridgeResult<()> {
        self.enter_platform("deepLinkToSubscriptionsAndroid", Platform::Android)
    }
}

/// [`BridgeFactory`] handing out one shared [`MockBridge`].
pub struct MockBridgeFactory {
    bridge: Arc<MockBridge>,
    creations: AtomicUsize,
    failure: Mutex<Option<NativeError>>,
}

impl MockBridgeFactory {
    pub fn new(bridge: Arc<MockBridge>) -> Arc<Self> {
        Arc::new(Self {
            bridge,
            creations: AtomicUsize::new(0),
            failure: Mutex::new(None),
        })
    }

    /// A factory whose every `create` fails with `error`.
    pub fn failing(bridge: Arc<MockBridge>, error: NativeError) -> Arc<Self> {
        let factory = Self::new(bridge);
        *factory.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
        factory
    }

    /// Stop failing subsequent `create` calls.
    pub fn recover(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Number of `create` calls so far, failed ones included.
    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BridgeFactory for MockBridgeFactory {
    async fn create(&self) -> BridgeResult<Arc<dyn NativeBridge>> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match failure {
            Some(err) => Err(err),
            None => Ok(Arc::clone(&self.bridge) as Arc<dyn NativeBridge>),
        }
    }
}
