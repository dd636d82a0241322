//! Type bridge between native wire records and the domain model.
//!
//! Native records are checked by [`is_valid_product`] / [`is_valid_purchase`]
//! before conversion. Records that fail are dropped with a warning by the
//! batch helpers and the listener manager; they never reach application code.

use tracing::{debug, warn};

use crate::errors::PurchaseError;
use crate::native::{NativeError, NativeProduct, NativePurchase};
use crate::normalize::normalize_error;
use crate::types::{
    Platform, Product, ProductAndroid, ProductDetails, ProductIos, ProductType, Purchase,
    PurchaseAndroid, PurchaseDetails, PurchaseIos, PurchaseState, SubscriptionOfferDetail,
    SubscriptionProduct,
};

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// A native product is usable when it has a non-empty `id`.
pub fn is_valid_product(native: Option<&NativeProduct>) -> bool {
    native.is_some_and(|p| non_empty(&p.id))
}

/// A native purchase is usable when it has non-empty `id` and `productId`.
pub fn is_valid_purchase(native: Option<&NativePurchase>) -> bool {
    native.is_some_and(|p| non_empty(&p.id) && non_empty(&p.product_id))
}

fn product_platform(native: &NativeProduct) -> Option<Platform> {
    if let Some(platform) = native.platform.as_deref().and_then(|p| p.parse().ok()) {
        return Some(platform);
    }
    if native.name_android.is_some()
        || native.one_time_purchase_offer_details_android.is_some()
        || native.subscription_offer_details_android.is_some()
    {
        Some(Platform::Android)
    } else if native.display_name_ios.is_some() || native.type_ios.is_some() {
        Some(Platform::Ios)
    } else {
        None
    }
}

fn purchase_platform(native: &NativePurchase) -> Option<Platform> {
    if let Some(platform) = native.platform.as_deref().and_then(|p| p.parse().ok()) {
        return Some(platform);
    }
    if native.purchase_token_android.is_some()
        || native.purchase_state_android.is_some()
        || native.package_name_android.is_some()
    {
        Some(Platform::Android)
    } else if native.original_transaction_identifier_ios.is_some()
        || native.jws_representation_ios.is_some()
    {
        Some(Platform::Ios)
    } else {
        None
    }
}

fn product_type(native: &NativeProduct) -> ProductType {
    if let Some(product_type) = native.product_type.as_deref().and_then(|t| t.parse().ok()) {
        return product_type;
    }
    match native.type_ios.as_deref() {
        Some("autoRenewable" | "auto-renewable") => ProductType::Subs,
        _ => ProductType::InApp,
    }
}

/// Parse the JSON-encoded Android offer list. Malformed input yields no offers.
fn parse_offer_details(raw: Option<&str>) -> Vec<SubscriptionOfferDetail> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str(raw) {
        Ok(offers) => offers,
        Err(err) => {
            debug!(error = %err, "ignoring malformed subscriptionOfferDetailsAndroid");
            Vec::new()
        }
    }
}

/// Convert a native product record.
///
/// Returns `None` when `id` or `title` is missing, or when the platform
/// cannot be determined.
pub fn to_product(native: &NativeProduct) -> Option<Product> {
    if !non_empty(&native.id) || !non_empty(&native.title) {
        return None;
    }
    let platform = product_platform(native)?;

    let details = match platform {
        Platform::Ios => ProductDetails::Ios(ProductIos {
            display_name_ios: native
                .display_name_ios
                .clone()
                .or_else(|| native.display_name.clone())
                .unwrap_or_default(),
            is_family_shareable_ios: native.is_family_shareable_ios.unwrap_or(false),
            json_representation_ios: native.json_representation_ios.clone().unwrap_or_default(),
            type_ios: native.type_ios.clone().unwrap_or_default(),
            subscription_info_ios: native.subscription_info_ios.clone(),
            introductory_price_ios: native.introductory_price_ios.clone(),
            introductory_price_as_amount_ios: native.introductory_price_as_amount_ios.clone(),
            introductory_price_payment_mode_ios: native
                .introductory_price_payment_mode_ios
                .clone(),
            introductory_price_number_of_periods_ios: native
                .introductory_price_number_of_periods_ios
                .clone(),
            introductory_price_subscription_period_ios: native
                .introductory_price_subscription_period_ios
                .clone(),
            subscription_period_number_ios: native.subscription_period_number_ios.clone(),
            subscription_period_unit_ios: native.subscription_period_unit_ios.clone(),
        }),
        Platform::Android => {
            let one_time = native.one_time_purchase_offer_details_android.clone();
            ProductDetails::Android(ProductAndroid {
                name_android: native.name_android.clone().unwrap_or_default(),
                one_time_purchase_offer_formatted_price: one_time
                    .as_ref()
                    .map(|o| o.formatted_price.clone()),
                one_time_purchase_offer_price_currency_code: one_time
                    .as_ref()
                    .map(|o| o.price_currency_code.clone()),
                one_time_purchase_offer_details_android: one_time,
                subscription_offer_details_android: parse_offer_details(
                    native.subscription_offer_details_android.as_deref(),
                ),
            })
        }
    };

    Some(Product {
        id: native.id.clone().unwrap_or_default(),
        title: native.title.clone().unwrap_or_default(),
        description: native.description.clone().unwrap_or_default(),
        product_type: product_type(native),
        display_name: native.display_name.clone(),
        display_price: native.display_price.clone().unwrap_or_default(),
        currency: native.currency.clone().unwrap_or_default(),
        price: native.price,
        debug_description: native.debug_description.clone(),
        details,
    })
}

/// Narrow a product to its subscription view.
///
/// Non-subscription products are accepted with a warning.
pub fn to_subscription_product(product: Product) -> SubscriptionProduct {
    if !product.is_subscription() {
        warn!(
            product_id = %product.id,
            product_type = %product.product_type,
            "treating non-subscription product as a subscription"
        );
    }
    SubscriptionProduct(product)
}

/// Rebuild the native record for a product.
pub fn to_native_product(product: &Product) -> NativeProduct {
    let mut native = NativeProduct {
        id: Some(product.id.clone()),
        title: Some(product.title.clone()),
        description: Some(product.description.clone()),
        product_type: Some(product.product_type.as_str().to_string()),
        display_name: product.display_name.clone(),
        display_price: Some(product.display_price.clone()),
        currency: Some(product.currency.clone()),
        price: product.price,
        debug_description: product.debug_description.clone(),
        platform: Some(product.platform().as_str().to_string()),
        ..Default::default()
    };

    match &product.details {
        ProductDetails::Ios(ios) => {
            native.display_name_ios = Some(ios.display_name_ios.clone());
            native.is_family_shareable_ios = Some(ios.is_family_shareable_ios);
            native.json_representation_ios = Some(ios.json_representation_ios.clone());
            native.type_ios = Some(ios.type_ios.clone());
            native.subscription_info_ios = ios.subscription_info_ios.clone();
            native.introductory_price_ios = ios.introductory_price_ios.clone();
            native.introductory_price_as_amount_ios = ios.introductory_price_as_amount_ios.clone();
            native.introductory_price_payment_mode_ios =
                ios.introductory_price_payment_mode_ios.clone();
            native.introductory_price_number_of_periods_ios =
                ios.introductory_price_number_of_periods_ios.clone();
            native.introductory_price_subscription_period_ios =
                ios.introductory_price_subscription_period_ios.clone();
            native.subscription_period_number_ios = ios.subscription_period_number_ios.clone();
            native.subscription_period_unit_ios = ios.subscription_period_unit_ios.clone();
        }
        ProductDetails::Android(android) => {
            native.name_android = Some(android.name_android.clone());
            native.one_time_purchase_offer_details_android =
                android.one_time_purchase_offer_details_android.clone();
            if !android.subscription_offer_details_android.is_empty() {
                native.subscription_offer_details_android =
                    serde_json::to_string(&android.subscription_offer_details_android).ok();
            }
        }
    }
    native
}

fn purchase_state(native: &NativePurchase) -> PurchaseState {
    match (&native.purchase_state, native.purchase_state_android) {
        (Some(state), _) => PurchaseState::from_native(state),
        (None, Some(state)) => PurchaseState::from_android_state(state),
        (None, None) => PurchaseState::Unknown,
    }
}

/// Convert a native purchase record.
///
/// Returns `None` when the record fails [`is_valid_purchase`] or its platform
/// cannot be determined. `transaction_receipt` is always empty.
pub fn to_purchase(native: &NativePurchase) -> Option<Purchase> {
    if !is_valid_purchase(Some(native)) {
        return None;
    }
    let platform = purchase_platform(native)?;

    let (details, fallback_token, fallback_auto_renewing) = match platform {
        Platform::Ios => (
            PurchaseDetails::Ios(PurchaseIos {
                quantity_ios: native.quantity_ios,
                original_transaction_date_ios: native.original_transaction_date_ios,
                original_transaction_identifier_ios: native
                    .original_transaction_identifier_ios
                    .clone(),
                app_account_token: native.app_account_token.clone(),
                expiration_date_ios: native.expiration_date_ios,
                web_order_line_item_id_ios: native.web_order_line_item_id_ios.clone(),
                environment_ios: native.environment_ios.clone(),
                storefront_country_code_ios: native.storefront_country_code_ios.clone(),
                app_bundle_id_ios: native.app_bundle_id_ios.clone(),
                product_type_ios: native.product_type_ios.clone(),
                subscription_group_id_ios: native.subscription_group_id_ios.clone(),
                is_upgraded_ios: native.is_upgraded_ios,
                ownership_type_ios: native.ownership_type_ios.clone(),
                reason_ios: native.reason_ios.clone(),
                transaction_reason_ios: native.transaction_reason_ios.clone(),
                revocation_date_ios: native.revocation_date_ios,
                revocation_reason_ios: native.revocation_reason_ios.clone(),
                offer_ios: native.offer_ios.clone(),
                currency_code_ios: native.currency_code_ios.clone(),
                price_ios: native.price_ios,
                jws_representation_ios: native.jws_representation_ios.clone(),
            }),
            native.jws_representation_ios.clone(),
            None,
        ),
        Platform::Android => (
            PurchaseDetails::Android(PurchaseAndroid {
                data_android: native.data_android.clone(),
                signature_android: native.signature_android.clone(),
                auto_renewing_android: native.auto_renewing_android,
                purchase_state_android: native.purchase_state_android,
                is_acknowledged_android: native.is_acknowledged_android,
                package_name_android: native.package_name_android.clone(),
                developer_payload_android: native.developer_payload_android.clone(),
                obfuscated_account_id_android: native.obfuscated_account_id_android.clone(),
                obfuscated_profile_id_android: native.obfuscated_profile_id_android.clone(),
                purchase_token_android: native.purchase_token_android.clone(),
            }),
            native.purchase_token_android.clone(),
            native.auto_renewing_android,
        ),
    };

    Some(Purchase {
        id: native.id.clone().unwrap_or_default(),
        product_id: native.product_id.clone().unwrap_or_default(),
        ids: native.ids.clone(),
        transaction_date: native.transaction_date.unwrap_or_default(),
        transaction_receipt: String::new(),
        purchase_token: native
            .purchase_token
            .clone()
            .filter(|t| !t.is_empty())
            .or(fallback_token),
        quantity: native.quantity.or(native.quantity_ios).unwrap_or(1),
        purchase_state: purchase_state(native),
        is_auto_renewing: native
            .is_auto_renewing
            .or(fallback_auto_renewing)
            .unwrap_or(false),
        details,
    })
}

/// Convert a native purchase-error event.
pub fn to_purchase_error(native: &NativeError, platform: Option<Platform>) -> PurchaseError {
    normalize_error(native, platform)
}

/// Convert a batch of native products, dropping invalid records.
pub fn to_products(natives: &[NativeProduct]) -> Vec<Product> {
    natives
        .iter()
        .filter_map(|native| {
            let product = is_valid_product(Some(native))
                .then(|| to_product(native))
                .flatten();
            if product.is_none() {
                warn!(id = ?native.id, "dropping invalid native product");
            }
            product
        })
        .collect()
}

/// Convert a batch of native purchases, dropping invalid records.
pub fn to_purchases(natives: &[NativePurchase]) -> Vec<Purchase> {
    natives
        .iter()
        .filter_map(|native| {
            let purchase = to_purchase(native);
            if purchase.is_none() {
                warn!(
                    id = ?native.id,
                    product_id = ?native.product_id,
                    "dropping invalid native purchase"
                );
            }
            purchase
        })
        .collect()
}
