//! Play Billing adapter.

use async_trait::async_trait;
use serde_json::Value;

use super::PlatformAdapter;
use crate::bridge::NativeBridge;
use crate::config::IapConfig;
use crate::errors::IapError;
use crate::finish::{complete_android, FinishOutcome};
use crate::native::{
    NativeAvailablePurchasesAndroid, NativeAvailablePurchasesOptions, NativeRequestPurchase,
    NativeRequestPurchaseAndroid, NativeSubscriptionOffer,
};
use crate::request::{AvailablePurchasesOptions, FetchProductsQuery, RequestPurchaseProps};
use crate::types::{
    Platform, ProductQueryType, ProductType, Purchase, ReceiptValidationAndroid,
    ReceiptValidationResult,
};
use crate::Result;

/// Adapter for Google Play.
#[derive(Clone, Copy, Debug, Default)]
pub struct AndroidAdapter;

/// Play Developer API encodes some integers as strings.
fn lenient_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn lenient_i32(value: Option<&Value>) -> Option<i32> {
    lenient_i64(value).and_then(|n| i32::try_from(n).ok())
}

#[async_trait]
impl PlatformAdapter for AndroidAdapter {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    fn build_purchase_request(
        &self,
        props: &RequestPurchaseProps,
        product_type: ProductType,
        _config: &IapConfig,
    ) -> Result<NativeRequestPurchase> {
        let android = props
            .android
            .as_ref()
            .filter(|android| {
                !android.skus.is_empty() && android.skus.iter().all(|sku| !sku.trim().is_empty())
            })
            .ok_or_else(|| {
                IapError::validation(
                    "android.skus must be a non-empty list of non-blank skus for Android purchases",
                )
            })?;

        let offers = android.subscription_offers.as_ref().map(|offers| {
            offers
                .iter()
                .map(|offer| NativeSubscriptionOffer {
                    sku: offer.sku.clone(),
                    offer_token: offer.offer_token.clone(),
                })
                .collect::<Vec<_>>()
        });
        let subscription_offers = match product_type {
            ProductType::Subs => Some(offers.unwrap_or_default()),
            ProductType::InApp => offers,
        };

        Ok(NativeRequestPurchase::Android(NativeRequestPurchaseAndroid {
            skus: android.skus.clone(),
            obfuscated_account_id_android: android.obfuscated_account_id_android.clone(),
            obfuscated_profile_id_android: android.obfuscated_profile_id_android.clone(),
            is_offer_personalized: android.is_offer_personalized,
            subscription_offers,
            purchase_token_android: android.purchase_token_android.clone(),
            replacement_mode_android: android.replacement_mode_android,
        }))
    }

    fn available_purchases_queries(
        &self,
        _options: &AvailablePurchasesOptions,
    ) -> Vec<NativeAvailablePurchasesOptions> {
        [ProductType::InApp, ProductType::Subs]
            .iter()
            .map(|product_type| {
                NativeAvailablePurchasesOptions::Android(NativeAvailablePurchasesAndroid {
                    product_type: product_type.native_name().to_string(),
                })
            })
            .collect()
    }

    fn fetch_products_queries(
        &self,
        skus: &[String],
        query_type: ProductQueryType,
    ) -> Vec<FetchProductsQuery> {
        query_type
            .product_types()
            .iter()
            .map(|product_type| FetchProductsQuery {
                skus: skus.to_vec(),
                product_type: product_type.native_name(),
            })
            .collect()
    }

    async fn finish(
        &self,
        bridge: &dyn NativeBridge,
        purchase: &Purchase,
        is_consumable: bool,
        _config: &IapConfig,
    ) -> Result<FinishOutcome> {
        let token = purchase.completion_token().unwrap_or_default();
        complete_android(bridge, token, is_consumable).await
    }

    fn parse_receipt_validation(&self, value: Value) -> Result<ReceiptValidationResult> {
        let Some(resource) = value.as_object() else {
            return Err(IapError::Serialization(
                "expected a purchase resource object".to_string(),
            ));
        };
        Ok(ReceiptValidationResult::Android(ReceiptValidationAndroid {
            auto_renewing: resource
                .get("autoRenewing")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            product_id: resource
                .get("productId")
                .and_then(Value::as_str)
                .map(str::to_string),
            purchase_state: lenient_i32(resource.get("purchaseState")),
            expiry_time_millis: lenient_i64(resource.get("expiryTimeMillis")),
            cancel_reason: lenient_i32(resource.get("cancelReason")),
            raw: value.clone(),
        }))
    }
}
