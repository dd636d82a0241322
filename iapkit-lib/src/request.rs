//! Unified request types and the builders that turn them into native payloads.
//!
//! Application code describes a purchase once, with optional per-platform
//! sections. The builders pick the section for the target platform, check its
//! required fields and apply platform defaults. Missing fields are programmer
//! errors and surface as [`IapError::Validation`] before any native call.

use serde::{Deserialize, Serialize};

use crate::config::IapConfig;
use crate::errors::IapError;
use crate::native::{NativeAvailablePurchasesOptions, NativeRequestPurchase};
use crate::platform::adapter_for;
use crate::types::{Platform, ProductQueryType, ProductType};
use crate::Result;

/// StoreKit promotional offer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountOffer {
    pub identifier: String,
    pub key_identifier: String,
    pub nonce: String,
    pub signature: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// iOS section of a purchase request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IosPurchaseRequest {
    pub sku: String,
    /// Finish the transaction natively without waiting for `finish_transaction`.
    #[serde(default)]
    pub and_dangerously_finish_transaction_automatically: Option<bool>,
    #[serde(default)]
    pub app_account_token: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub with_offer: Option<DiscountOffer>,
}

impl IosPurchaseRequest {
    pub fn new(sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            ..Default::default()
        }
    }

    pub fn with_auto_finish(mut self, enabled: bool) -> Self {
        self.and_dangerously_finish_transaction_automatically = Some(enabled);
        self
    }

    pub fn with_app_account_token(mut self, token: impl Into<String>) -> Self {
        self.app_account_token = Some(token.into());
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_offer(mut self, offer: DiscountOffer) -> Self {
        self.with_offer = Some(offer);
        self
    }
}

/// Android subscription offer selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidSubscriptionOffer {
    pub sku: String,
    pub offer_token: String,
}

/// Android section of a purchase request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidPurchaseRequest {
    pub skus: Vec<String>,
    #[serde(default)]
    pub obfuscated_account_id_android: Option<String>,
    #[serde(default)]
    pub obfuscated_profile_id_android: Option<String>,
    #[serde(default)]
    pub is_offer_personalized: Option<bool>,
    #[serde(default)]
    pub subscription_offers: Option<Vec<AndroidSubscriptionOffer>>,
    /// Token of the subscription being replaced (upgrade/downgrade).
    #[serde(default)]
    pub purchase_token_android: Option<String>,
    /// Play Billing `ReplacementMode`.
    #[serde(default)]
    pub replacement_mode_android: Option<i32>,
}

impl AndroidPurchaseRequest {
    pub fn new<I, S>(skus: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skus: skus.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_subscription_offers(mut self, offers: Vec<AndroidSubscriptionOffer>) -> Self {
        self.subscription_offers = Some(offers);
        self
    }

    pub fn with_obfuscated_account_id(mut self, id: impl Into<String>) -> Self {
        self.obfuscated_account_id_android = Some(id.into());
        self
    }

    pub fn with_replacement(mut self, purchase_token: impl Into<String>, mode: i32) -> Self {
        self.purchase_token_android = Some(purchase_token.into());
        self.replacement_mode_android = Some(mode);
        self
    }
}

/// A platform-agnostic purchase request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPurchaseProps {
    #[serde(default)]
    pub ios: Option<IosPurchaseRequest>,
    #[serde(default)]
    pub android: Option<AndroidPurchaseRequest>,
}

impl RequestPurchaseProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ios(mut self, ios: IosPurchaseRequest) -> Self {
        self.ios = Some(ios);
        self
    }

    pub fn with_android(mut self, android: AndroidPurchaseRequest) -> Self {
        self.android = Some(android);
        self
    }

    /// Request the same product on both platforms.
    pub fn for_sku(sku: impl Into<String>) -> Self {
        let sku = sku.into();
        Self::new()
            .with_ios(IosPurchaseRequest::new(sku.clone()))
            .with_android(AndroidPurchaseRequest::new([sku]))
    }
}

/// Options for listing available purchases.
///
/// The iOS flags exist under a legacy and a current name; either being set
/// enables the native flag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailablePurchasesOptions {
    /// Deprecated name of `also_publish_to_event_listener_ios`.
    #[serde(default)]
    pub also_publish_to_event_listener: Option<bool>,
    #[serde(default, rename = "alsoPublishToEventListenerIOS")]
    pub also_publish_to_event_listener_ios: Option<bool>,
    /// Deprecated name of `only_include_active_items_ios`.
    #[serde(default)]
    pub only_include_active_items: Option<bool>,
    #[serde(default, rename = "onlyIncludeActiveItemsIOS")]
    pub only_include_active_items_ios: Option<bool>,
}

/// One native catalog query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchProductsQuery {
    pub skus: Vec<String>,
    /// Native type name: `inapp`, `subs` or `all`.
    pub product_type: &'static str,
}

/// Build the native purchase payload for `platform`.
pub fn build_purchase_request(
    props: &RequestPurchaseProps,
    product_type: ProductType,
    platform: Platform,
    config: &IapConfig,
) -> Result<NativeRequestPurchase> {
    adapter_for(platform).build_purchase_request(props, product_type, config)
}

/// Build the native available-purchases queries for `platform`.
///
/// iOS issues one query. Android issues two, `inapp` then `subs`, whose
/// results the caller concatenates.
pub fn build_available_purchases_query(
    options: &AvailablePurchasesOptions,
    platform: Platform,
) -> Result<Vec<NativeAvailablePurchasesOptions>> {
    Ok(adapter_for(platform).available_purchases_queries(options))
}

/// Build the native catalog queries for `skus`.
pub fn build_fetch_products_request(
    skus: &[String],
    query_type: ProductQueryType,
    platform: Platform,
) -> Result<Vec<FetchProductsQuery>> {
    if skus.is_empty() || skus.iter().all(|s| s.trim().is_empty()) {
        return Err(IapError::validation("skus must not be empty"));
    }
    Ok(adapter_for(platform).fetch_products_queries(skus, query_type))
}
