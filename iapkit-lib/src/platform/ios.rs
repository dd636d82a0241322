//! StoreKit adapter.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::PlatformAdapter;
use crate::bridge::NativeBridge;
use crate::config::IapConfig;
use crate::convert::to_purchase;
use crate::errors::IapError;
use crate::finish::{finish_ios, FinishOutcome};
use crate::native::{
    NativeAvailablePurchasesIos, NativeAvailablePurchasesOptions, NativeDiscountOffer,
    NativePurchase, NativeRequestPurchase, NativeRequestPurchaseIos,
};
use crate::request::{AvailablePurchasesOptions, FetchProductsQuery, RequestPurchaseProps};
use crate::types::{
    Platform, ProductQueryType, ProductType, Purchase, ReceiptValidationIos,
    ReceiptValidationResult,
};
use crate::Result;

/// Adapter for the Apple App Store.
#[derive(Clone, Copy, Debug, Default)]
pub struct IosAdapter;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidationPayload {
    #[serde(default)]
    is_valid: bool,
    #[serde(default)]
    receipt_data: String,
    #[serde(default)]
    jws_representation: String,
    #[serde(default)]
    latest_transaction: Option<NativePurchase>,
}

#[async_trait]
impl PlatformAdapter for IosAdapter {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    fn build_purchase_request(
        &self,
        props: &RequestPurchaseProps,
        product_type: ProductType,
        config: &IapConfig,
    ) -> Result<NativeRequestPurchase> {
        let ios = props
            .ios
            .as_ref()
            .filter(|ios| !ios.sku.trim().is_empty())
            .ok_or_else(|| IapError::validation("ios.sku is required for iOS purchases"))?;

        let auto_finish = match (product_type, ios.and_dangerously_finish_transaction_automatically) {
            (_, Some(explicit)) => Some(explicit),
            (ProductType::Subs, None) => Some(config.auto_finish_subscriptions_ios),
            (ProductType::InApp, None) => None,
        };

        Ok(NativeRequestPurchase::Ios(NativeRequestPurchaseIos {
            sku: ios.sku.clone(),
            and_dangerously_finish_transaction_automatically: auto_finish,
            app_account_token: ios.app_account_token.clone(),
            quantity: ios.quantity,
            with_offer: ios.with_offer.as_ref().map(|offer| NativeDiscountOffer {
                identifier: offer.identifier.clone(),
                key_identifier: offer.key_identifier.clone(),
                nonce: offer.nonce.clone(),
                signature: offer.signature.clone(),
                timestamp: offer.timestamp.to_string(),
            }),
        }))
    }

    fn available_purchases_queries(
        &self,
        options: &AvailablePurchasesOptions,
    ) -> Vec<NativeAvailablePurchasesOptions> {
        let also_publish = options.also_publish_to_event_listener.unwrap_or(false)
            || options.also_publish_to_event_listener_ios.unwrap_or(false);
        let only_active = options.only_include_active_items.unwrap_or(false)
            || options.only_include_active_items_ios.unwrap_or(false);

        vec![NativeAvailablePurchasesOptions::Ios(
            NativeAvailablePurchasesIos {
                also_publish_to_event_listener: also_publish,
                also_publish_to_event_listener_ios: also_publish,
                only_include_active_items: only_active,
                only_include_active_items_ios: only_active,
            },
        )]
    }

    fn fetch_products_queries(
        &self,
        skus: &[String],
        query_type: ProductQueryType,
    ) -> Vec<FetchProductsQuery> {
        // StoreKit resolves every type in one lookup.
        let product_type = match query_type {
            ProductQueryType::InApp => "inapp",
            ProductQueryType::Subs => "subs",
            ProductQueryType::All => "all",
        };
        vec![FetchProductsQuery {
            skus: skus.to_vec(),
            product_type,
        }]
    }

    async fn finish(
        &self,
        bridge: &dyn NativeBridge,
        purchase: &Purchase,
        _is_consumable: bool,
        config: &IapConfig,
    ) -> Result<FinishOutcome> {
        finish_ios(bridge, purchase, config).await
    }

    fn parse_receipt_validation(&self, value: Value) -> Result<ReceiptValidationResult> {
        let payload: ValidationPayload = serde_json::from_value(value)?;
        let latest_transaction = payload.latest_transaction.and_then(|mut native| {
            native.platform.get_or_insert_with(|| Platform::Ios.as_str().to_string());
            to_purchase(&native)
        });
        Ok(ReceiptValidationResult::Ios(ReceiptValidationIos {
            is_valid: payload.is_valid,
            receipt_data: payload.receipt_data,
            jws_representation: payload.jws_representation,
            latest_transaction,
        }))
    }
}
