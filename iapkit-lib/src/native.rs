//! Wire shapes exchanged with the native bridge.
//!
//! Native records are flat and optional-heavy: nothing is trusted until it
//! passes the gates in [`crate::convert`]. Outgoing payloads are built by
//! [`crate::request`] and the platform adapters.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{AndroidValidationOptions, OneTimePurchaseOfferDetail};

/// Product record as emitted by the native layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NativeProduct {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub display_name: Option<String>,
    pub display_price: Option<String>,
    pub currency: Option<String>,
    pub price: Option<f64>,
    pub debug_description: Option<String>,
    pub platform: Option<String>,

    #[serde(rename = "displayNameIOS")]
    pub display_name_ios: Option<String>,
    #[serde(rename = "isFamilyShareableIOS")]
    pub is_family_shareable_ios: Option<bool>,
    #[serde(rename = "jsonRepresentationIOS")]
    pub json_representation_ios: Option<String>,
    #[serde(rename = "typeIOS")]
    pub type_ios: Option<String>,
    #[serde(rename = "subscriptionInfoIOS")]
    pub subscription_info_ios: Option<Value>,
    #[serde(rename = "introductoryPriceIOS")]
    pub introductory_price_ios: Option<String>,
    #[serde(rename = "introductoryPriceAsAmountIOS")]
    pub introductory_price_as_amount_ios: Option<String>,
    #[serde(rename = "introductoryPricePaymentModeIOS")]
    pub introductory_price_payment_mode_ios: Option<String>,
    #[serde(rename = "introductoryPriceNumberOfPeriodsIOS")]
    pub introductory_price_number_of_periods_ios: Option<String>,
    #[serde(rename = "introductoryPriceSubscriptionPeriodIOS")]
    pub introductory_price_subscription_period_ios: Option<String>,
    #[serde(rename = "subscriptionPeriodNumberIOS")]
    pub subscription_period_number_ios: Option<String>,
    #[serde(rename = "subscriptionPeriodUnitIOS")]
    pub subscription_period_unit_ios: Option<String>,

    pub name_android: Option<String>,
    pub one_time_purchase_offer_details_android: Option<OneTimePurchaseOfferDetail>,
    /// JSON-encoded array of subscription offers.
    pub subscription_offer_details_android: Option<String>,
}

/// Purchase record as emitted by the native layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NativePurchase {
    pub id: Option<String>,
    pub product_id: Option<String>,
    pub ids: Option<Vec<String>>,
    pub transaction_date: Option<i64>,
    pub transaction_receipt: Option<String>,
    pub purchase_token: Option<String>,
    pub platform: Option<String>,
    pub quantity: Option<u32>,
    pub purchase_state: Option<String>,
    pub is_auto_renewing: Option<bool>,

    #[serde(rename = "quantityIOS")]
    pub quantity_ios: Option<u32>,
    #[serde(rename = "originalTransactionDateIOS")]
    pub original_transaction_date_ios: Option<i64>,
    #[serde(rename = "originalTransactionIdentifierIOS")]
    pub original_transaction_identifier_ios: Option<String>,
    pub app_account_token: Option<String>,
    #[serde(rename = "expirationDateIOS")]
    pub expiration_date_ios: Option<i64>,
    #[serde(rename = "webOrderLineItemIdIOS")]
    pub web_order_line_item_id_ios: Option<String>,
    #[serde(rename = "environmentIOS")]
    pub environment_ios: Option<String>,
    #[serde(rename = "storefrontCountryCodeIOS")]
    pub storefront_country_code_ios: Option<String>,
    #[serde(rename = "appBundleIdIOS")]
    pub app_bundle_id_ios: Option<String>,
    #[serde(rename = "productTypeIOS")]
    pub product_type_ios: Option<String>,
    #[serde(rename = "subscriptionGroupIdIOS")]
    pub subscription_group_id_ios: Option<String>,
    #[serde(rename = "isUpgradedIOS")]
    pub is_upgraded_ios: Option<bool>,
    #[serde(rename = "ownershipTypeIOS")]
    pub ownership_type_ios: Option<String>,
    #[serde(rename = "reasonIOS")]
    pub reason_ios: Option<String>,
    #[serde(rename = "transactionReasonIOS")]
    pub transaction_reason_ios: Option<String>,
    #[serde(rename = "revocationDateIOS")]
    pub revocation_date_ios: Option<i64>,
    #[serde(rename = "revocationReasonIOS")]
    pub revocation_reason_ios: Option<String>,
    #[serde(rename = "offerIOS")]
    pub offer_ios: Option<Value>,
    #[serde(rename = "currencyCodeIOS")]
    pub currency_code_ios: Option<String>,
    #[serde(rename = "priceIOS")]
    pub price_ios: Option<f64>,
    #[serde(rename = "jwsRepresentationIOS")]
    pub jws_representation_ios: Option<String>,

    pub data_android: Option<String>,
    pub signature_android: Option<String>,
    pub auto_renewing_android: Option<bool>,
    pub purchase_state_android: Option<i32>,
    pub is_acknowledged_android: Option<bool>,
    pub package_name_android: Option<String>,
    pub developer_payload_android: Option<String>,
    pub obfuscated_account_id_android: Option<String>,
    pub obfuscated_profile_id_android: Option<String>,
    pub purchase_token_android: Option<String>,
}

/// Failure reported by the native layer, either as a rejected call or as a
/// purchase-error event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NativeError {
    /// Native code in whatever vocabulary the platform uses.
    pub code: Option<String>,
    pub message: String,
    pub response_code: Option<i32>,
    pub debug_message: Option<String>,
    pub product_id: Option<String>,
}

impl NativeError {
    /// Create an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Create an error with a native code.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Attach a platform response code.
    pub fn with_response_code(mut self, response_code: i32) -> Self {
        self.response_code = Some(response_code);
        self
    }

    /// Attach the product the failure relates to.
    pub fn with_product_id(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    /// Error returned by bridges for operations they do not implement.
    pub fn unsupported(operation: &str) -> Self {
        Self::with_code(
            "feature-not-supported",
            format!("{operation} is not supported by this bridge"),
        )
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for NativeError {}

/// StoreKit promotional offer, as forwarded to the native layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeDiscountOffer {
    pub identifier: String,
    pub key_identifier: String,
    pub nonce: String,
    pub signature: String,
    /// Epoch milliseconds rendered as a string; the native field is string-typed.
    pub timestamp: String,
}

/// Android subscription offer selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeSubscriptionOffer {
    pub sku: String,
    pub offer_token: String,
}

/// iOS purchase payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeRequestPurchaseIos {
    pub sku: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub and_dangerously_finish_transaction_automatically: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_account_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_offer: Option<NativeDiscountOffer>,
}

/// Android purchase payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeRequestPurchaseAndroid {
    pub skus: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscated_account_id_android: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscated_profile_id_android: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_offer_personalized: Option<bool>,
    /// `Some(vec![])` and `None` mean different things to the native layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_offers: Option<Vec<NativeSubscriptionOffer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_token_android: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_mode_android: Option<i32>,
}

/// Platform-specific purchase payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum NativeRequestPurchase {
    Ios(NativeRequestPurchaseIos),
    Android(NativeRequestPurchaseAndroid),
}

/// iOS available-purchases options. Legacy and current flag names are both written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeAvailablePurchasesIos {
    pub also_publish_to_event_listener: bool,
    #[serde(rename = "alsoPublishToEventListenerIOS")]
    pub also_publish_to_event_listener_ios: bool,
    pub only_include_active_items: bool,
    #[serde(rename = "onlyIncludeActiveItemsIOS")]
    pub only_include_active_items_ios: bool,
}

/// Android available-purchases options; one product type per call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeAvailablePurchasesAndroid {
    /// `inapp` or `subs`.
    #[serde(rename = "type")]
    pub product_type: String,
}

/// Platform-specific available-purchases options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum NativeAvailablePurchasesOptions {
    Ios(NativeAvailablePurchasesIos),
    Android(NativeAvailablePurchasesAndroid),
}

/// Parameters for the unified native completion call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum NativeFinishParams {
    #[serde(rename_all = "camelCase")]
    Ios { transaction_id: String },
    /// Consume when `is_consumable`, acknowledge otherwise.
    #[serde(rename_all = "camelCase")]
    Android {
        purchase_token: String,
        is_consumable: bool,
    },
}

/// Structured result returned by Play Billing completion calls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NativeResult {
    /// Play Billing response code; `0` is `OK`.
    pub response_code: i32,
    pub code: Option<String>,
    pub message: Option<String>,
    pub debug_message: Option<String>,
    pub purchase_token: Option<String>,
}

impl NativeResult {
    /// Play Billing `BillingResponseCode.OK`.
    pub const OK: i32 = 0;

    /// A successful result.
    pub fn ok() -> Self {
        Self {
            response_code: Self::OK,
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.response_code == Self::OK
    }
}

/// Result of the native completion call: StoreKit answers with a boolean,
/// Play Billing with a structured result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NativeFinishResult {
    Bool(bool),
    Structured(NativeResult),
}

/// Receipt validation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeReceiptValidationProps {
    pub sku: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_options: Option<AndroidValidationOptions>,
}
