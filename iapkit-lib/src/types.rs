//! Stable domain model handed to application code.
//!
//! Everything here is produced by the type bridge in [`crate::convert`] from a
//! validated native record. Platform-only fields live in the `details`
//! variant matching the value's platform, so an iOS purchase can never carry
//! Android fields and vice versa.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::IapError;

/// Store platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Apple App Store (StoreKit).
    Ios,
    /// Google Play (Play Billing).
    Android,
}

impl Platform {
    /// Lowercase platform name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
        }
    }

    /// Platform of the running target.
    ///
    /// Fails on any target that is neither iOS nor Android.
    pub fn current() -> Result<Self, IapError> {
        if cfg!(target_os = "ios") {
            Ok(Self::Ios)
        } else if cfg!(target_os = "android") {
            Ok(Self::Android)
        } else {
            Err(IapError::UnsupportedPlatform(std::env::consts::OS.to_string()))
        }
    }
}

impl FromStr for Platform {
    type Err = IapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            other => Err(IapError::UnsupportedPlatform(other.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog product type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    /// One-time purchase (consumable or non-consumable).
    #[serde(rename = "in-app", alias = "inapp")]
    InApp,
    /// Auto-renewing subscription.
    #[serde(rename = "subs")]
    Subs,
}

impl ProductType {
    /// Unified type name (`in-app` / `subs`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InApp => "in-app",
            Self::Subs => "subs",
        }
    }

    /// Type name used by native queries (`inapp` / `subs`).
    pub fn native_name(&self) -> &'static str {
        match self {
            Self::InApp => "inapp",
            Self::Subs => "subs",
        }
    }
}

impl FromStr for ProductType {
    type Err = IapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-app" | "inapp" => Ok(Self::InApp),
            "subs" => Ok(Self::Subs),
            other => Err(IapError::validation(format!("unknown product type '{other}'"))),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product type filter for catalog queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductQueryType {
    /// One-time products only.
    #[default]
    InApp,
    /// Subscriptions only.
    Subs,
    /// Both, queried one after the other.
    All,
}

impl ProductQueryType {
    /// Concrete product types covered by this filter, in query order.
    pub fn product_types(&self) -> &'static [ProductType] {
        match self {
            Self::InApp => &[ProductType::InApp],
            Self::Subs => &[ProductType::Subs],
            Self::All => &[ProductType::InApp, ProductType::Subs],
        }
    }
}

impl From<ProductType> for ProductQueryType {
    fn from(product_type: ProductType) -> Self {
        match product_type {
            ProductType::InApp => Self::InApp,
            ProductType::Subs => Self::Subs,
        }
    }
}

/// Android one-time purchase pricing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneTimePurchaseOfferDetail {
    /// Store-formatted price.
    pub formatted_price: String,
    /// ISO 4217 currency code.
    pub price_currency_code: String,
    /// Price in micro-units, as a decimal string.
    pub price_amount_micros: String,
}

/// One pricing phase of an Android subscription offer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPhase {
    pub formatted_price: String,
    pub price_currency_code: String,
    pub price_amount_micros: String,
    /// ISO 8601 period, e.g. `P1M`.
    pub billing_period: String,
    pub billing_cycle_count: i32,
    pub recurrence_mode: i32,
}

/// Wrapper matching the Play Billing `pricingPhases` shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPhases {
    pub pricing_phase_list: Vec<PricingPhase>,
}

/// Android subscription offer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOfferDetail {
    pub base_plan_id: String,
    #[serde(default)]
    pub offer_id: Option<String>,
    /// Token that must be passed back when purchasing this offer.
    pub offer_token: String,
    #[serde(default)]
    pub offer_tags: Vec<String>,
    #[serde(default)]
    pub pricing_phases: PricingPhases,
}

/// iOS-only product fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductIos {
    #[serde(rename = "displayNameIOS")]
    pub display_name_ios: String,
    #[serde(rename = "isFamilyShareableIOS")]
    pub is_family_shareable_ios: bool,
    #[serde(rename = "jsonRepresentationIOS")]
    pub json_representation_ios: String,
    /// StoreKit product type (`consumable`, `autoRenewable`, ...).
    #[serde(rename = "typeIOS")]
    pub type_ios: String,
    #[serde(rename = "subscriptionInfoIOS", skip_serializing_if = "Option::is_none")]
    pub subscription_info_ios: Option<Value>,
    #[serde(rename = "introductoryPriceIOS", skip_serializing_if = "Option::is_none")]
    pub introductory_price_ios: Option<String>,
    #[serde(
        rename = "introductoryPriceAsAmountIOS",
        skip_serializing_if = "Option::is_none"
    )]
    pub introductory_price_as_amount_ios: Option<String>,
    #[serde(
        rename = "introductoryPricePaymentModeIOS",
        skip_serializing_if = "Option::is_none"
    )]
    pub introductory_price_payment_mode_ios: Option<String>,
    #[serde(
        rename = "introductoryPriceNumberOfPeriodsIOS",
        skip_serializing_if = "Option::is_none"
    )]
    pub introductory_price_number_of_periods_ios: Option<String>,
    #[serde(
        rename = "introductoryPriceSubscriptionPeriodIOS",
        skip_serializing_if = "Option::is_none"
    )]
    pub introductory_price_subscription_period_ios: Option<String>,
    #[serde(
        rename = "subscriptionPeriodNumberIOS",
        skip_serializing_if = "Option::is_none"
    )]
    pub subscription_period_number_ios: Option<String>,
    #[serde(
        rename = "subscriptionPeriodUnitIOS",
        skip_serializing_if = "Option::is_none"
    )]
    pub subscription_period_unit_ios: Option<String>,
}

/// Android-only product fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductAndroid {
    pub name_android: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_time_purchase_offer_details_android: Option<OneTimePurchaseOfferDetail>,
    /// Lifted from `one_time_purchase_offer_details_android.formatted_price`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_time_purchase_offer_formatted_price: Option<String>,
    /// Lifted from `one_time_purchase_offer_details_android.price_currency_code`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_time_purchase_offer_price_currency_code: Option<String>,
    #[serde(default)]
    pub subscription_offer_details_android: Vec<SubscriptionOfferDetail>,
}

/// Platform-qualified product extension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum ProductDetails {
    Ios(ProductIos),
    Android(ProductAndroid),
}

/// A purchasable catalog entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Store-formatted price; empty when the store did not provide one.
    pub display_price: String,
    /// ISO 4217 code; empty when the store did not provide one.
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_description: Option<String>,
    #[serde(flatten)]
    pub details: ProductDetails,
}

impl Product {
    /// Platform this product was fetched from.
    pub fn platform(&self) -> Platform {
        match self.details {
            ProductDetails::Ios(_) => Platform::Ios,
            ProductDetails::Android(_) => Platform::Android,
        }
    }

    /// iOS extension, if this is an iOS product.
    pub fn ios(&self) -> Option<&ProductIos> {
        match &self.details {
            ProductDetails::Ios(ios) => Some(ios),
            ProductDetails::Android(_) => None,
        }
    }

    /// Android extension, if this is an Android product.
    pub fn android(&self) -> Option<&ProductAndroid> {
        match &self.details {
            ProductDetails::Android(android) => Some(android),
            ProductDetails::Ios(_) => None,
        }
    }

    /// Whether this is a subscription product.
    pub fn is_subscription(&self) -> bool {
        self.product_type == ProductType::Subs
    }
}

/// A [`Product`] narrowed to its subscription view.
///
/// Construct with [`crate::convert::to_subscription_product`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionProduct(pub(crate) Product);

impl SubscriptionProduct {
    /// Android offers available for this subscription.
    pub fn offers_android(&self) -> &[SubscriptionOfferDetail] {
        self.0
            .android()
            .map(|a| a.subscription_offer_details_android.as_slice())
            .unwrap_or(&[])
    }

    /// iOS subscription period as `(number, unit)`.
    pub fn subscription_period_ios(&self) -> Option<(&str, &str)> {
        let ios = self.0.ios()?;
        Some((
            ios.subscription_period_number_ios.as_deref()?,
            ios.subscription_period_unit_ios.as_deref()?,
        ))
    }

    /// iOS introductory price, formatted by the store.
    pub fn introductory_price_ios(&self) -> Option<&str> {
        self.0.ios()?.introductory_price_ios.as_deref()
    }

    /// Unwrap back to the general product.
    pub fn into_inner(self) -> Product {
        self.0
    }
}

impl Deref for SubscriptionProduct {
    type Target = Product;

    fn deref(&self) -> &Product {
        &self.0
    }
}

/// Normalized purchase state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseState {
    Purchased,
    Pending,
    Failed,
    Restored,
    Deferred,
    Unknown,
}

impl PurchaseState {
    /// Map a native state string.
    pub fn from_native(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "purchased" | "purchase" => Self::Purchased,
            "pending" | "purchasing" => Self::Pending,
            "failed" => Self::Failed,
            "restored" => Self::Restored,
            "deferred" => Self::Deferred,
            _ => Self::Unknown,
        }
    }

    /// Map a Play Billing `Purchase.PurchaseState` integer.
    pub fn from_android_state(state: i32) -> Self {
        match state {
            1 => Self::Purchased,
            2 => Self::Pending,
            _ => Self::Unknown,
        }
    }
}

/// iOS-only purchase fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchaseIos {
    #[serde(rename = "quantityIOS", skip_serializing_if = "Option::is_none")]
    pub quantity_ios: Option<u32>,
    #[serde(rename = "originalTransactionDateIOS", skip_serializing_if = "Option::is_none")]
    pub original_transaction_date_ios: Option<i64>,
    #[serde(
        rename = "originalTransactionIdentifierIOS",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_transaction_identifier_ios: Option<String>,
    #[serde(rename = "appAccountToken", skip_serializing_if = "Option::is_none")]
    pub app_account_token: Option<String>,
    #[serde(rename = "expirationDateIOS", skip_serializing_if = "Option::is_none")]
    pub expiration_date_ios: Option<i64>,
    #[serde(rename = "webOrderLineItemIdIOS", skip_serializing_if = "Option::is_none")]
    pub web_order_line_item_id_ios: Option<String>,
    #[serde(rename = "environmentIOS", skip_serializing_if = "Option::is_none")]
    pub environment_ios: Option<String>,
    #[serde(rename = "storefrontCountryCodeIOS", skip_serializing_if = "Option::is_none")]
    pub storefront_country_code_ios: Option<String>,
    #[serde(rename = "appBundleIdIOS", skip_serializing_if = "Option::is_none")]
    pub app_bundle_id_ios: Option<String>,
    #[serde(rename = "productTypeIOS", skip_serializing_if = "Option::is_none")]
    pub product_type_ios: Option<String>,
    #[serde(rename = "subscriptionGroupIdIOS", skip_serializing_if = "Option::is_none")]
    pub subscription_group_id_ios: Option<String>,
    #[serde(rename = "isUpgradedIOS", skip_serializing_if = "Option::is_none")]
    pub is_upgraded_ios: Option<bool>,
    #[serde(rename = "ownershipTypeIOS", skip_serializing_if = "Option::is_none")]
    pub ownership_type_ios: Option<String>,
    #[serde(rename = "reasonIOS", skip_serializing_if = "Option::is_none")]
    pub reason_ios: Option<String>,
    #[serde(rename = "transactionReasonIOS", skip_serializing_if = "Option::is_none")]
    pub transaction_reason_ios: Option<String>,
    #[serde(rename = "revocationDateIOS", skip_serializing_if = "Option::is_none")]
    pub revocation_date_ios: Option<i64>,
    #[serde(rename = "revocationReasonIOS", skip_serializing_if = "Option::is_none")]
    pub revocation_reason_ios: Option<String>,
    #[serde(rename = "offerIOS", skip_serializing_if = "Option::is_none")]
    pub offer_ios: Option<Value>,
    #[serde(rename = "currencyCodeIOS", skip_serializing_if = "Option::is_none")]
    pub currency_code_ios: Option<String>,
    #[serde(rename = "priceIOS", skip_serializing_if = "Option::is_none")]
    pub price_ios: Option<f64>,
    #[serde(rename = "jwsRepresentationIOS", skip_serializing_if = "Option::is_none")]
    pub jws_representation_ios: Option<String>,
}

/// Android-only purchase fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseAndroid {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_android: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_android: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_renewing_android: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_state_android: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_acknowledged_android: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name_android: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_payload_android: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscated_account_id_android: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obfuscated_profile_id_android: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_token_android: Option<String>,
}

/// Platform-qualified purchase extension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum PurchaseDetails {
    Ios(PurchaseIos),
    Android(PurchaseAndroid),
}

/// One transaction instance.
///
/// `id` and `product_id` are never empty: records failing that check are
/// dropped by the type bridge before they reach application code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    /// Transaction identifier.
    pub id: String,
    pub product_id: String,
    /// All product ids covered by this transaction (Android multi-SKU purchases).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    /// Epoch milliseconds.
    pub transaction_date: i64,
    /// Always empty; receipts are fetched through receipt validation.
    pub transaction_receipt: String,
    /// Opaque continuation token (Play purchase token or StoreKit JWS).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_token: Option<String>,
    pub quantity: u32,
    pub purchase_state: PurchaseState,
    pub is_auto_renewing: bool,
    #[serde(flatten)]
    pub details: PurchaseDetails,
}

impl Purchase {
    /// Platform this purchase came from.
    pub fn platform(&self) -> Platform {
        match self.details {
            PurchaseDetails::Ios(_) => Platform::Ios,
            PurchaseDetails::Android(_) => Platform::Android,
        }
    }

    pub fn ios(&self) -> Option<&PurchaseIos> {
        match &self.details {
            PurchaseDetails::Ios(ios) => Some(ios),
            PurchaseDetails::Android(_) => None,
        }
    }

    pub fn android(&self) -> Option<&PurchaseAndroid> {
        match &self.details {
            PurchaseDetails::Android(android) => Some(android),
            PurchaseDetails::Ios(_) => None,
        }
    }

    /// Token used to complete this purchase on Android.
    ///
    /// Falls back to the Android-qualified token field when the unified one is absent.
    pub fn completion_token(&self) -> Option<&str> {
        self.purchase_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                self.android()
                    .and_then(|a| a.purchase_token_android.as_deref())
                    .filter(|t| !t.is_empty())
            })
    }
}

/// Options for Play Developer API receipt validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidValidationOptions {
    pub package_name: String,
    pub product_token: String,
    pub access_token: String,
    #[serde(default)]
    pub is_sub: bool,
}

/// iOS receipt validation outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptValidationIos {
    pub is_valid: bool,
    #[serde(default)]
    pub receipt_data: String,
    #[serde(default)]
    pub jws_representation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_transaction: Option<Purchase>,
}

/// Android receipt validation outcome (Play Developer API purchase resource).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptValidationAndroid {
    #[serde(default)]
    pub auto_renewing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_state: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time_millis: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<i32>,
    /// The complete resource as returned by the store.
    #[serde(default)]
    pub raw: Value,
}

/// Receipt validation result for either platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum ReceiptValidationResult {
    Ios(ReceiptValidationIos),
    Android(ReceiptValidationAndroid),
}

/// StoreKit subscription status entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusIos {
    /// `subscribed`, `expired`, `inBillingRetryPeriod`, ...
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renewal_info: Option<Value>,
}

/// Options for opening the platform subscription management screen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepLinkOptions {
    /// Android: subscription to focus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku_android: Option<String>,
    /// Android: application package name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name_android: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parse() {
        assert_eq!("ios".parse::<Platform>().unwrap(), Platform::Ios);
        assert_eq!("Android".parse::<Platform>().unwrap(), Platform::Android);
        assert!(matches!(
            "web".parse::<Platform>(),
            Err(IapError::UnsupportedPlatform(p)) if p == "web"
        ));
    }

    #[test]
    fn test_product_type_names() {
        assert_eq!("inapp".parse::<ProductType>().unwrap(), ProductType::InApp);
        assert_eq!(ProductType::InApp.as_str(), "in-app");
        assert_eq!(ProductType::InApp.native_name(), "inapp");
        let parsed: ProductType = serde_json::from_str("\"inapp\"").unwrap();
        assert_eq!(parsed, ProductType::InApp);
        assert_eq!(
            ProductQueryType::All.product_types(),
            &[ProductType::InApp, ProductType::Subs]
        );
    }

    #[test]
    fn test_purchase_state_mapping() {
        assert_eq!(PurchaseState::from_native("PURCHASED"), PurchaseState::Purchased);
        assert_eq!(PurchaseState::from_android_state(2), PurchaseState::Pending);
        assert_eq!(PurchaseState::from_android_state(0), PurchaseState::Unknown);
        assert_eq!(PurchaseState::from_native("refunded"), PurchaseState::Unknown);
    }

    #[test]
    fn test_purchase_serializes_platform_tag() {
        let purchase = Purchase {
            id: "t1".into(),
            product_id: "p1".into(),
            ids: None,
            transaction_date: 1,
            transaction_receipt: String::new(),
            purchase_token: None,
            quantity: 1,
            purchase_state: PurchaseState::Purchased,
            is_auto_renewing: false,
            details: PurchaseDetails::Ios(PurchaseIos::default()),
        };
        let json = serde_json::to_value(&purchase).unwrap();
        assert_eq!(json["platform"], "ios");
        assert_eq!(json["productId"], "p1");
        assert_eq!(purchase.platform(), Platform::Ios);
    }

    #[test]
    fn test_completion_token_fallback() {
        let purchase = Purchase {
            id: "GPA.1".into(),
            product_id: "coins".into(),
            ids: None,
            transaction_date: 1,
            transaction_receipt: String::new(),
            purchase_token: Some(String::new()),
            quantity: 1,
            purchase_state: PurchaseState::Purchased,
            is_auto_renewing: false,
            details: PurchaseDetails::Android(PurchaseAndroid {
                purchase_token_android: Some("tok".into()),
                ..Default::default()
            }),
        };
        assert_eq!(purchase.completion_token(), Some("tok"));
    }
}
