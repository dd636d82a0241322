//! The client: owns the native bridge and sequences the connection lifecycle.
//!
//! The bridge is created lazily, at most once per client, through the
//! [`BridgeFactory`] supplied at construction. Native callbacks are attached
//! before the native connection is initialized, so no purchase event can
//! arrive while no listener is installed.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::bridge::{BridgeFactory, NativeBridge};
use crate::config::IapConfig;
use crate::convert::{to_product, to_products, to_purchase, to_purchases, to_subscription_product};
use crate::errors::{IapError, PurchaseError};
use crate::finish::{self, FinishOutcome};
use crate::listeners::{ListenerManager, Subscription};
use crate::native::{NativeError, NativeProduct, NativePurchase, NativeReceiptValidationProps};
use crate::normalize::normalize_error;
use crate::platform::{adapter_for, PlatformAdapter};
use crate::request::{
    build_available_purchases_query, build_fetch_products_request, build_purchase_request,
    AvailablePurchasesOptions, RequestPurchaseProps,
};
use crate::subscriptions::{active_subscriptions, ActiveSubscription};
use crate::types::{
    AndroidValidationOptions, DeepLinkOptions, Platform, Product, ProductQueryType, ProductType,
    Purchase, ReceiptValidationResult, SubscriptionProduct, SubscriptionStatusIos,
};
use crate::Result;

/// Factory failure messages that mean the native runtime is not loaded yet.
const RUNTIME_NOT_READY_SIGNATURES: &[&str] = &[
    "not ready",
    "nitromodules",
    "turbomodule",
    "native module",
    "could not be found",
];

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Connected,
    Ended,
}

type InitFuture = Shared<BoxFuture<'static, Result<bool>>>;

struct ClientInner {
    config: IapConfig,
    adapter: &'static dyn PlatformAdapter,
    factory: Arc<dyn BridgeFactory>,
    bridge: OnceCell<Arc<dyn NativeBridge>>,
    listeners: ListenerManager,
    state: Mutex<ConnectionState>,
    pending_init: Mutex<Option<InitFuture>>,
}

impl ClientInner {
    fn platform(&self) -> Platform {
        self.adapter.platform()
    }

    fn state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state() = state;
    }

    fn native_error(&self, err: NativeError) -> IapError {
        normalize_error(err, Some(self.platform())).into()
    }

    fn creation_error(&self, err: NativeError) -> IapError {
        let message = err.message.to_lowercase();
        if RUNTIME_NOT_READY_SIGNATURES
            .iter()
            .any(|signature| message.contains(signature))
        {
            IapError::BridgeUnavailable(format!(
                "the native purchase module is not available ({}). Make sure the native \
                 module is installed and linked, and that the app was rebuilt after installing it",
                err.message
            ))
        } else {
            self.native_error(err)
        }
    }

    async fn bridge(&self) -> Result<Arc<dyn NativeBridge>> {
        let bridge = self
            .bridge
            .get_or_try_init(|| async {
                self.factory
                    .create()
                    .await
                    .map_err(|err| self.creation_error(err))
            })
            .await?;
        Ok(Arc::clone(bridge))
    }

    async fn connect_once(self: Arc<Self>) -> Result<bool> {
        let previous = {
            let mut state = self.state();
            let previous = *state;
            *state = ConnectionState::Connecting;
            previous
        };
        let result = self.connect(previous).await;
        *self.pending_init.lock().unwrap_or_else(|e| e.into_inner()) = None;
        result
    }

    async fn connect(&self, previous: ConnectionState) -> Result<bool> {
        let fallback = match previous {
            ConnectionState::Ended => ConnectionState::Ended,
            _ => ConnectionState::Uninitialized,
        };

        let bridge = match self.bridge().await {
            Ok(bridge) => bridge,
            Err(err) => {
                self.set_state(fallback);
                return Err(err);
            }
        };

        self.listeners.attach(bridge.as_ref());
        match bridge.init_connection().await {
            Ok(true) => {
                self.listeners.mark_connected(true);
                self.set_state(ConnectionState::Connected);
                debug!(platform = %self.platform(), "store connection established");
                Ok(true)
            }
            Ok(false) => {
                self.listeners.detach(bridge.as_ref());
                self.set_state(fallback);
                warn!(platform = %self.platform(), "native layer declined the connection");
                Ok(false)
            }
            Err(err) => {
                self.listeners.detach(bridge.as_ref());
                self.set_state(fallback);
                Err(self.native_error(err))
            }
        }
    }

    fn purchases(&self, natives: Vec<NativePurchase>) -> Vec<Purchase> {
        let natives: Vec<_> = natives
            .into_iter()
            .map(|native| self.tag_purchase(native))
            .collect();
        to_purchases(&natives)
    }

    fn purchase(&self, native: Option<NativePurchase>) -> Option<Purchase> {
        native.and_then(|native| to_purchase(&self.tag_purchase(native)))
    }

    fn tag_purchase(&self, mut native: NativePurchase) -> NativePurchase {
        native
            .platform
            .get_or_insert_with(|| self.platform().as_str().to_string());
        native
    }

    fn tag_product(&self, mut native: NativeProduct) -> NativeProduct {
        native
            .platform
            .get_or_insert_with(|| self.platform().as_str().to_string());
        native
    }
}

/// Cross-platform purchase client.
///
/// Cheap to clone; clones share the bridge, listeners and connection state.
///
/// # Example
///
/// ```rust
/// use iapkit_lib::testing::{fixtures, MockBridge, MockBridgeFactory};
/// use iapkit_lib::{IapClient, IapConfig, Platform, ProductQueryType};
///
/// # tokio_test_block(async {
/// let bridge = MockBridge::new(Platform::Android);
/// bridge.set_products(vec![fixtures::android_product("coins", "inapp")]);
///
/// let config = IapConfig::default().with_platform(Platform::Android);
/// let client = IapClient::new(config, MockBridgeFactory::new(bridge)).unwrap();
///
/// let subscription = client.purchase_updated_listener(|purchase| {
///     println!("purchased {}", purchase.product_id);
/// });
/// client.init_connection().await.unwrap();
///
/// let products = client
///     .fetch_products(&["coins".to_string()], ProductQueryType::InApp)
///     .await
///     .unwrap();
/// assert_eq!(products.len(), 1);
///
/// subscription.remove();
/// client.end_connection().await.unwrap();
/// # });
/// # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
/// #     futures::executor::block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct IapClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for IapClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IapClient")
            .field("platform", &self.platform())
            .field("state", &self.state())
            .finish()
    }
}

impl IapClient {
    /// Create a client. Fails when no platform is configured and the running
    /// target is neither iOS nor Android.
    pub fn new(config: IapConfig, factory: Arc<dyn BridgeFactory>) -> Result<Self> {
        let platform = config.resolve_platform()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                adapter: adapter_for(platform),
                factory,
                bridge: OnceCell::new(),
                listeners: ListenerManager::new(platform),
                state: Mutex::new(ConnectionState::Uninitialized),
                pending_init: Mutex::new(None),
                config,
            }),
        })
    }

    pub fn platform(&self) -> Platform {
        self.inner.platform()
    }

    pub fn config(&self) -> &IapConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open the store connection.
    ///
    /// Overlapping calls share one in-flight attempt and observe the same
    /// result. Returns `Ok(true)` immediately when already connected.
    #[tracing::instrument(skip(self), fields(platform = %self.platform()))]
    pub async fn init_connection(&self) -> Result<bool> {
        let pending = {
            if *self.inner.state() == ConnectionState::Connected {
                return Ok(true);
            }
            let mut pending = self
                .inner
                .pending_init
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            match pending.as_ref() {
                Some(in_flight) => in_flight.clone(),
                None => {
                    let inner: Weak<ClientInner> = Arc::downgrade(&self.inner);
                    let attempt = async move {
                        match inner.upgrade() {
                            Some(inner) => inner.connect_once().await,
                            None => Err(IapError::BridgeUnavailable("client was dropped".into())),
                        }
                    }
                    .boxed()
                    .shared();
                    *pending = Some(attempt.clone());
                    attempt
                }
            }
        };
        pending.await
    }

    /// Close the store connection and release the native callbacks.
    ///
    /// The bridge is kept for a later [`init_connection`](Self::init_connection).
    #[tracing::instrument(skip(self), fields(platform = %self.platform()))]
    pub async fn end_connection(&self) -> Result<bool> {
        let Some(bridge) = self.inner.bridge.get().cloned() else {
            self.inner.set_state(ConnectionState::Ended);
            return Ok(true);
        };
        self.inner.listeners.detach(bridge.as_ref());
        self.inner.listeners.mark_connected(false);
        let result = bridge.end_connection().await;
        self.inner.set_state(ConnectionState::Ended);
        result.map_err(|err| self.inner.native_error(err))
    }

    /// Fetch catalog entries. An empty `skus` list is rejected.
    #[tracing::instrument(skip(self), fields(platform = %self.platform()))]
    pub async fn fetch_products(
        &self,
        skus: &[String],
        query_type: ProductQueryType,
    ) -> Result<Vec<Product>> {
        let queries = build_fetch_products_request(skus, query_type, self.platform())?;
        let bridge = self.inner.bridge().await?;

        let mut products = Vec::new();
        for query in queries {
            let natives = bridge
                .fetch_products(&query.skus, query.product_type)
                .await
                .map_err(|err| self.inner.native_error(err))?;
            let natives: Vec<_> = natives
                .into_iter()
                .map(|native| self.inner.tag_product(native))
                .collect();
            products.extend(to_products(&natives));
        }
        Ok(products)
    }

    /// Fetch subscription products.
    pub async fn fetch_subscriptions(&self, skus: &[String]) -> Result<Vec<SubscriptionProduct>> {
        Ok(self
            .fetch_products(skus, ProductQueryType::Subs)
            .await?
            .into_iter()
            .map(to_subscription_product)
            .collect())
    }

    /// Start a purchase.
    ///
    /// Most native layers report the outcome through the purchase-updated
    /// listener; purchases returned directly are passed through. Native
    /// callbacks are attached by [`IapClient::init_connection`], so a purchase
    /// started before it completes can finish without any listener firing.
    #[tracing::instrument(skip(self, props), fields(platform = %self.platform()))]
    pub async fn request_purchase(
        &self,
        props: &RequestPurchaseProps,
        product_type: ProductType,
    ) -> Result<Vec<Purchase>> {
        self.warn_if_not_listening("requestPurchase");
        let request =
            build_purchase_request(props, product_type, self.platform(), &self.inner.config)?;
        let bridge = self.inner.bridge().await?;
        let natives = bridge
            .request_purchase(request)
            .await
            .map_err(|err| self.inner.native_error(err))?;
        Ok(self.inner.purchases(natives.unwrap_or_default()))
    }

    /// List purchases the store still reports. On Android the `inapp` and
    /// `subs` results are concatenated.
    #[tracing::instrument(skip(self, options), fields(platform = %self.platform()))]
    pub async fn get_available_purchases(
        &self,
        options: Option<AvailablePurchasesOptions>,
    ) -> Result<Vec<Purchase>> {
        let options = options.unwrap_or_default();
        let queries = build_available_purchases_query(&options, self.platform())?;
        let bridge = self.inner.bridge().await?;

        let mut natives = Vec::new();
        for query in queries {
            natives.extend(
                bridge
                    .get_available_purchases(query)
                    .await
                    .map_err(|err| self.inner.native_error(err))?,
            );
        }
        Ok(self.inner.purchases(natives))
    }

    /// Finish (iOS), consume or acknowledge (Android) a purchase.
    ///
    /// Finishing an iOS transaction the store already finished succeeds.
    #[tracing::instrument(skip(self, purchase), fields(platform = %self.platform(), transaction_id = %purchase.id))]
    pub async fn finish_transaction(
        &self,
        purchase: &Purchase,
        is_consumable: bool,
    ) -> Result<FinishOutcome> {
        let bridge = self.inner.bridge().await?;
        finish::finish_transaction(
            bridge.as_ref(),
            self.platform(),
            purchase,
            is_consumable,
            &self.inner.config,
        )
        .await
    }

    /// Acknowledge a non-consumable Android purchase. No-op on iOS.
    pub async fn acknowledge_purchase_android(&self, purchase_token: &str) -> Result<FinishOutcome> {
        if !self.android_only("acknowledgePurchaseAndroid") {
            return Ok(FinishOutcome::default());
        }
        let bridge = self.inner.bridge().await?;
        finish::acknowledge_purchase_android(bridge.as_ref(), purchase_token).await
    }

    /// Consume an Android purchase. No-op on iOS.
    pub async fn consume_purchase_android(&self, purchase_token: &str) -> Result<FinishOutcome> {
        if !self.android_only("consumePurchaseAndroid") {
            return Ok(FinishOutcome::default());
        }
        let bridge = self.inner.bridge().await?;
        finish::consume_purchase_android(bridge.as_ref(), purchase_token).await
    }

    /// Register a purchase-updated listener.
    pub fn purchase_updated_listener<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Purchase) + Send + Sync + 'static,
    {
        self.inner.listeners.purchase_updated_listener(callback)
    }

    /// Register a purchase-error listener.
    pub fn purchase_error_listener<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&PurchaseError) + Send + Sync + 'static,
    {
        self.inner.listeners.purchase_error_listener(callback)
    }

    /// Register a promoted-product listener. Inert on Android.
    pub fn promoted_product_listener_ios<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Product) + Send + Sync + 'static,
    {
        self.inner.listeners.promoted_product_listener_ios(callback)
    }

    /// Validate a receipt (iOS) or purchase token (Android).
    ///
    /// Android requires `android_options`.
    #[tracing::instrument(skip(self, android_options), fields(platform = %self.platform()))]
    pub async fn validate_receipt(
        &self,
        sku: &str,
        android_options: Option<AndroidValidationOptions>,
    ) -> Result<ReceiptValidationResult> {
        if sku.trim().is_empty() {
            return Err(IapError::validation("sku is required for receipt validation"));
        }
        if self.platform() == Platform::Android && android_options.is_none() {
            return Err(IapError::validation(
                "android options are required for receipt validation on Android",
            ));
        }
        let bridge = self.inner.bridge().await?;
        let value = bridge
            .validate_receipt(NativeReceiptValidationProps {
                sku: sku.to_string(),
                android_options,
            })
            .await
            .map_err(|err| self.inner.native_error(err))?;
        self.inner.adapter.parse_receipt_validation(value)
    }

    /// Active subscriptions among available purchases, optionally limited to `subscription_ids`.
    #[tracing::instrument(skip(self), fields(platform = %self.platform()))]
    pub async fn get_active_subscriptions(
        &self,
        subscription_ids: Option<&[String]>,
    ) -> Result<Vec<ActiveSubscription>> {
        let purchases = self.get_available_purchases(None).await?;
        let now_ms = chrono::Utc::now().timestamp_millis();
        Ok(active_subscriptions(
            &purchases,
            subscription_ids,
            now_ms,
            &self.inner.config,
        ))
    }

    pub async fn has_active_subscriptions(&self, subscription_ids: Option<&[String]>) -> Result<bool> {
        Ok(!self.get_active_subscriptions(subscription_ids).await?.is_empty())
    }

    /// Re-sync with the store (iOS) and list available purchases.
    #[tracing::instrument(skip(self), fields(platform = %self.platform()))]
    pub async fn restore_purchases(&self) -> Result<Vec<Purchase>> {
        if self.platform() == Platform::Ios {
            if let Err(err) = self.sync_ios().await {
                warn!(error = %err, "store sync failed; listing cached purchases");
            }
        }
        self.get_available_purchases(None).await
    }

    /// Storefront country code for the signed-in store account.
    pub async fn get_storefront(&self) -> Result<String> {
        let bridge = self.inner.bridge().await?;
        let storefront = match self.platform() {
            Platform::Ios => bridge.get_storefront_ios().await,
            Platform::Android => bridge.get_storefront_android().await,
        };
        storefront.map_err(|err| self.inner.native_error(err))
    }

    /// Open the platform subscription management screen.
    pub async fn deep_link_to_subscriptions(&self, options: DeepLinkOptions) -> Result<()> {
        match self.platform() {
            Platform::Ios => self.show_manage_subscriptions_ios().await.map(|_| ()),
            Platform::Android => self.deep_link_to_subscriptions_android(options).await,
        }
    }

    /// Returns whether native events are being delivered to listeners.
    fn warn_if_not_listening(&self, operation: &str) -> bool {
        let state = self.state();
        if state == ConnectionState::Connected {
            true
        } else {
            warn!(
                operation,
                ?state,
                "called before init_connection; purchase events will not reach listeners"
            );
            false
        }
    }

    fn ios_only(&self, operation: &str) -> bool {
        if self.platform() == Platform::Ios {
            true
        } else {
            warn!(operation, "iOS-only operation called on Android; ignoring");
            false
        }
    }

    fn android_only(&self, operation: &str) -> bool {
        if self.platform() == Platform::Android {
            true
        } else {
            warn!(operation, "Android-only operation called on iOS; ignoring");
            false
        }
    }

    /// Run an iOS-only bridge call, or return `empty` on Android.
    async fn ios_call<T, F, Fut>(&self, operation: &str, empty: T, call: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn NativeBridge>) -> Fut,
        Fut: Future<Output = std::result::Result<T, NativeError>>,
    {
        if !self.ios_only(operation) {
            return Ok(empty);
        }
        let bridge = self.inner.bridge().await?;
        call(bridge).await.map_err(|err| self.inner.native_error(err))
    }

    pub async fn get_storefront_ios(&self) -> Result<String> {
        self.ios_call("getStorefrontIOS", String::new(), |bridge| async move {
            bridge.get_storefront_ios().await
        })
        .await
    }

    /// The product the App Store is promoting, if any.
    pub async fn get_promoted_product_ios(&self) -> Result<Option<Product>> {
        let native = self
            .ios_call("getPromotedProductIOS", None, |bridge| async move {
                bridge.get_promoted_product_ios().await
            })
            .await?;
        Ok(native.and_then(|native| to_product(&self.inner.tag_product(native))))
    }

    /// Complete the purchase of the currently promoted product.
    pub async fn request_purchase_on_promoted_product_ios(&self) -> Result<bool> {
        self.ios_call("requestPurchaseOnPromotedProductIOS", false, |bridge| async move {
            bridge.request_purchase_on_promoted_product_ios().await
        })
        .await
    }

    /// Present the refund request sheet for `sku`.
    pub async fn begin_refund_request_ios(&self, sku: &str) -> Result<Option<String>> {
        let sku = sku.to_string();
        self.ios_call("beginRefundRequestIOS", None, |bridge| async move {
            bridge.begin_refund_request_ios(&sku).await
        })
        .await
    }

    pub async fn subscription_status_ios(&self, sku: &str) -> Result<Vec<SubscriptionStatusIos>> {
        let sku = sku.to_string();
        self.ios_call("subscriptionStatusIOS", Vec::new(), |bridge| async move {
            bridge.subscription_status_ios(&sku).await
        })
        .await
    }

    pub async fn current_entitlement_ios(&self, sku: &str) -> Result<Option<Purchase>> {
        let sku = sku.to_string();
        let native = self
            .ios_call("currentEntitlementIOS", None, |bridge| async move {
                bridge.current_entitlement_ios(&sku).await
            })
            .await?;
        Ok(self.inner.purchase(native))
    }

    pub async fn latest_transaction_ios(&self, sku: &str) -> Result<Option<Purchase>> {
        let sku = sku.to_string();
        let native = self
            .ios_call("latestTransactionIOS", None, |bridge| async move {
                bridge.latest_transaction_ios(&sku).await
            })
            .await?;
        Ok(self.inner.purchase(native))
    }

    pub async fn is_eligible_for_intro_offer_ios(&self, group_id: &str) -> Result<bool> {
        let group_id = group_id.to_string();
        self.ios_call("isEligibleForIntroOfferIOS", false, |bridge| async move {
            bridge.is_eligible_for_intro_offer_ios(&group_id).await
        })
        .await
    }

    /// Base64 app receipt.
    pub async fn get_receipt_data_ios(&self) -> Result<String> {
        self.ios_call("getReceiptDataIOS", String::new(), |bridge| async move {
            bridge.get_receipt_data_ios().await
        })
        .await
    }

    pub async fn get_pending_transactions_ios(&self) -> Result<Vec<Purchase>> {
        let natives = self
            .ios_call("getPendingTransactionsIOS", Vec::new(), |bridge| async move {
                bridge.get_pending_transactions_ios().await
            })
            .await?;
        Ok(self.inner.purchases(natives))
    }

    pub async fn clear_transaction_ios(&self) -> Result<bool> {
        self.ios_call("clearTransactionIOS", false, |bridge| async move {
            bridge.clear_transaction_ios().await
        })
        .await
    }

    pub async fn sync_ios(&self) -> Result<bool> {
        self.ios_call("syncIOS", false, |bridge| async move { bridge.sync_ios().await })
            .await
    }

    pub async fn present_code_redemption_sheet_ios(&self) -> Result<bool> {
        self.ios_call("presentCodeRedemptionSheetIOS", false, |bridge| async move {
            bridge.present_code_redemption_sheet_ios().await
        })
        .await
    }

    /// Present the subscription management sheet. Returns purchases whose
    /// status changed while it was open.
    pub async fn show_manage_subscriptions_ios(&self) -> Result<Vec<Purchase>> {
        let natives = self
            .ios_call("showManageSubscriptionsIOS", Vec::new(), |bridge| async move {
                bridge.show_manage_subscriptions_ios().await
            })
            .await?;
        Ok(self.inner.purchases(natives))
    }

    pub async fn deep_link_to_subscriptions_android(&self, options: DeepLinkOptions) -> Result<()> {
        if !self.android_only("deepLinkToSubscriptionsAndroid") {
            return Ok(());
        }
        let bridge = self.inner.bridge().await?;
        bridge
            .deep_link_to_subscriptions_android(options)
            .await
            .map_err(|err| self.inner.native_error(err))
    }
}
