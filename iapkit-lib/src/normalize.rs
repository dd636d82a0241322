//! Error normalization.
//!
//! Every native failure passes through [`normalize_error`] before it reaches
//! application code. The functions here are pure: they never panic and never
//! fail, falling back to [`ErrorCode::Unknown`] for anything they do not
//! recognize.

use serde_json::Value;

use crate::errors::{ErrorCode, PurchaseError};
use crate::native::NativeError;
use crate::types::Platform;

/// An error shape as received from the native layer or a caller.
#[derive(Clone, Debug, PartialEq)]
pub enum RawError {
    /// Nothing was supplied.
    Missing,
    /// A thrown error. Its message may carry a JSON payload.
    Error { message: String },
    /// A bare string: JSON, `"CODE: message"`, or free text.
    Text(String),
    /// An object that already separates code and message.
    Structured {
        code: Option<String>,
        message: Option<String>,
        response_code: Option<i32>,
        debug_message: Option<String>,
        product_id: Option<String>,
    },
    /// An arbitrary JSON value.
    Json(Value),
}

impl RawError {
    /// Wrap a thrown error by its display text.
    pub fn error(err: &impl std::fmt::Display) -> Self {
        Self::Error {
            message: err.to_string(),
        }
    }
}

impl From<&str> for RawError {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawError {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Value> for RawError {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<NativeError> for RawError {
    fn from(err: NativeError) -> Self {
        Self::Structured {
            code: err.code,
            message: Some(err.message),
            response_code: err.response_code,
            debug_message: err.debug_message,
            product_id: err.product_id,
        }
    }
}

impl From<&NativeError> for RawError {
    fn from(err: &NativeError) -> Self {
        Self::from(err.clone())
    }
}

impl<T: Into<RawError>> From<Option<T>> for RawError {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Into::into)
    }
}

/// Normalize any native error shape into a [`PurchaseError`].
///
/// 1. Missing input yields `Unknown` / `"Unknown error occurred"`.
/// 2. Error-like input: its message is parsed as JSON; otherwise the plain
///    message is kept under `Unknown`.
/// 3. Strings are parsed as JSON, then split on `"<CODE>: <message>"`,
///    otherwise kept whole under `Unknown`.
/// 4. The code is looked up through [`error_code_from_native`].
pub fn normalize_error(raw: impl Into<RawError>, platform: Option<Platform>) -> PurchaseError {
    let mut err = match raw.into() {
        RawError::Missing => PurchaseError::unknown(),
        RawError::Error { message } => {
            from_json_text(&message, platform).unwrap_or_else(|| unknown_with(message))
        }
        RawError::Text(text) => from_text(text, platform),
        RawError::Structured {
            code,
            message,
            response_code,
            debug_message,
            product_id,
        } => from_parts(
            Parts {
                code,
                message,
                response_code,
                debug_message,
                product_id,
            },
            platform,
        ),
        RawError::Json(value) => from_value(value, platform),
    };

    if platform.is_some() {
        err.platform = platform;
    }
    err
}

struct Parts {
    code: Option<String>,
    message: Option<String>,
    response_code: Option<i32>,
    debug_message: Option<String>,
    product_id: Option<String>,
}

fn unknown_with(message: String) -> PurchaseError {
    if message.trim().is_empty() {
        PurchaseError::unknown()
    } else {
        PurchaseError::new(ErrorCode::Unknown, message)
    }
}

fn from_parts(parts: Parts, platform: Option<Platform>) -> PurchaseError {
    let code = match (&parts.code, parts.response_code) {
        (Some(code), _) => error_code_from_native(code, platform),
        (None, Some(response_code)) => error_code_from_native(&response_code.to_string(), platform),
        (None, None) => ErrorCode::Unknown,
    };
    let message = parts
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| PurchaseError::unknown().message);

    let mut err = PurchaseError::new(code, message);
    err.response_code = parts.response_code;
    err.debug_message = parts.debug_message;
    err.product_id = parts.product_id;
    err
}

fn from_text(text: String, platform: Option<Platform>) -> PurchaseError {
    if let Some(err) = from_json_text(&text, platform) {
        return err;
    }
    if let Some((code, message)) = split_coded_message(&text) {
        let mut err = unknown_with(message.trim().to_string());
        err.code = error_code_from_native(code, platform);
        return err;
    }
    unknown_with(text)
}

/// Parse `text` as a JSON object carrying `code` and/or `message`.
fn from_json_text(text: &str, platform: Option<Platform>) -> Option<PurchaseError> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    let object = value.as_object()?;
    if !object.contains_key("code") && !object.contains_key("message") {
        return None;
    }
    Some(from_value(value, platform))
}

fn from_value(value: Value, platform: Option<Platform>) -> PurchaseError {
    match value {
        Value::Null => PurchaseError::unknown(),
        Value::String(text) => from_text(text, platform),
        Value::Object(map) => {
            let text = |key: &str| match map.get(key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            let number = |key: &str| {
                map.get(key)
                    .and_then(Value::as_i64)
                    .and_then(|n| i32::try_from(n).ok())
            };
            let parsed_platform = text("platform").and_then(|p| p.parse::<Platform>().ok());
            let mut err = from_parts(
                Parts {
                    code: text("code"),
                    message: text("message"),
                    response_code: number("responseCode"),
                    debug_message: text("debugMessage"),
                    product_id: text("productId"),
                },
                platform.or(parsed_platform),
            );
            err.platform = parsed_platform;
            err
        }
        other => unknown_with(other.to_string()),
    }
}

/// Split `"<CODE>: <message>"` where `<CODE>` is a bare code token.
fn split_coded_message(text: &str) -> Option<(&str, &str)> {
    let (code, message) = text.split_once(": ")?;
    let is_token = !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    is_token.then_some((code, message))
}

/// Canonical lookup key: camelCase split, lowercased, `_` as `-`, `e-` prefix removed.
fn canonical_key(code: &str) -> String {
    let mut key = String::with_capacity(code.len() + 4);
    let mut prev: Option<char> = None;
    for c in code.trim().chars() {
        if c.is_ascii_uppercase()
            && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            key.push('-');
        }
        key.push(if c == '_' { '-' } else { c.to_ascii_lowercase() });
        prev = Some(c);
    }
    match key.strip_prefix("e-") {
        Some(rest) => rest.to_string(),
        None => key,
    }
}

fn shared_code(key: &str) -> Option<ErrorCode> {
    match key {
        "user-canceled" | "cancelled" | "canceled" => Some(ErrorCode::UserCancelled),
        "network" => Some(ErrorCode::NetworkError),
        "unknown-error" => Some(ErrorCode::Unknown),
        "connection-init" | "init-connection-failed" => Some(ErrorCode::InitConnection),
        "item-already-owned" => Some(ErrorCode::AlreadyOwned),
        "deferred" => Some(ErrorCode::DeferredPayment),
        _ => ErrorCode::ALL.into_iter().find(|c| c.as_str() == key),
    }
}

fn ios_code(key: &str) -> Option<ErrorCode> {
    let code = match key {
        // SKError.Code
        "0" => ErrorCode::Unknown,
        "1" | "client-invalid" => ErrorCode::BillingUnavailable,
        "2" | "payment-cancelled" | "payment-canceled" => ErrorCode::UserCancelled,
        "3" | "payment-invalid" => ErrorCode::DeveloperError,
        "4" | "payment-not-allowed" | "purchase-not-allowed" => ErrorCode::BillingUnavailable,
        "5" | "store-product-not-available" => ErrorCode::ItemUnavailable,
        "6" | "cloud-service-permission-denied" => ErrorCode::ServiceError,
        "7" | "cloud-service-network-connection-failed" => ErrorCode::NetworkError,
        "8" | "cloud-service-revoked" => ErrorCode::ServiceError,
        // StoreKit 2 errors
        "product-unavailable" | "not-available-in-storefront" => ErrorCode::ItemUnavailable,
        "system-error" => ErrorCode::ServiceError,
        "not-entitled" => ErrorCode::ItemNotOwned,
        "unverified" | "failed-verification" => ErrorCode::TransactionValidationFailed,
        "invalid-offer-identifier"
        | "invalid-offer-price"
        | "invalid-offer-signature"
        | "invalid-signature"
        | "missing-offer-parameters" => ErrorCode::DeveloperError,
        _ => return None,
    };
    Some(code)
}

fn android_code(key: &str) -> Option<ErrorCode> {
    // BillingClient.BillingResponseCode
    let code = match key {
        "1" | "user-canceled" => ErrorCode::UserCancelled,
        "2" | "service-unavailable" => ErrorCode::ServiceError,
        "3" | "billing-unavailable" => ErrorCode::BillingUnavailable,
        "4" | "item-unavailable" => ErrorCode::ItemUnavailable,
        "5" | "developer-error" => ErrorCode::DeveloperError,
        "6" | "error" => ErrorCode::PurchaseError,
        "7" | "item-already-owned" => ErrorCode::AlreadyOwned,
        "8" | "item-not-owned" => ErrorCode::ItemNotOwned,
        "12" | "network-error" => ErrorCode::NetworkError,
        "-1" | "service-disconnected" => ErrorCode::ServiceDisconnected,
        "-2" | "feature-not-supported" => ErrorCode::FeatureNotSupported,
        "-3" | "service-timeout" => ErrorCode::ServiceError,
        _ => return None,
    };
    Some(code)
}

/// Map a native error code onto the closed [`ErrorCode`] taxonomy.
///
/// Accepts legacy `E_`-prefixed codes, kebab-case codes, StoreKit names and
/// SKError integers (iOS), and Play Billing response names and integers
/// (Android), case-insensitively. Unrecognized codes become
/// [`ErrorCode::Unknown`].
pub fn error_code_from_native(code: &str, platform: Option<Platform>) -> ErrorCode {
    let key = canonical_key(code);
    shared_code(&key)
        .or_else(|| match platform {
            Some(Platform::Ios) => ios_code(&key),
            Some(Platform::Android) => android_code(&key),
            None => None,
        })
        .unwrap_or(ErrorCode::Unknown)
}

/// Whether the user dismissed the purchase.
pub fn is_user_cancelled_error(err: &PurchaseError) -> bool {
    err.code == ErrorCode::UserCancelled
}

/// Whether the failure was a transient problem talking to the store.
pub fn is_recoverable_error(err: &PurchaseError) -> bool {
    matches!(
        err.code,
        ErrorCode::NetworkError
            | ErrorCode::ServiceError
            | ErrorCode::RemoteError
            | ErrorCode::ConnectionClosed
            | ErrorCode::ServiceDisconnected
            | ErrorCode::InitConnection
            | ErrorCode::SyncError
    )
}

/// Message suitable for display to end users.
///
/// Falls back to the native message for codes without dedicated copy.
pub fn user_friendly_message(err: &PurchaseError) -> String {
    let text = match err.code {
        ErrorCode::UserCancelled => "Purchase was cancelled by user",
        ErrorCode::NetworkError => "Network connection error. Please check your internet connection and try again.",
        ErrorCode::ItemUnavailable => "This item is not available for purchase",
        ErrorCode::SkuNotFound => "The requested product could not be found",
        ErrorCode::BillingUnavailable => "Billing is not available on this device",
        ErrorCode::DeferredPayment => "Purchase is pending approval",
        ErrorCode::AlreadyOwned => "You already own this item",
        ErrorCode::IapNotAvailable => "In-app purchases are not available on this device",
        ErrorCode::ServiceError | ErrorCode::ServiceDisconnected | ErrorCode::RemoteError => {
            "The store service is temporarily unavailable. Please try again later."
        }
        _ => return err.message.clone(),
    };
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coded_string() {
        let err = normalize_error("E_USER_CANCELLED: cancelled", None);
        assert_eq!(err.code, ErrorCode::UserCancelled);
        assert_eq!(err.message, "cancelled");
    }

    #[test]
    fn test_plain_error() {
        let err = normalize_error(RawError::error(&"plain text"), None);
        assert_eq!(err.code, ErrorCode::Unknown);
        assert_eq!(err.message, "plain text");
    }

    #[test]
    fn test_missing() {
        let err = normalize_error(None::<String>, None);
        assert_eq!(err, PurchaseError::unknown());
        assert_eq!(err.message, "Unknown error occurred");
    }

    #[test]
    fn test_json_message_inside_error() {
        let err = normalize_error(
            RawError::Error {
                message: r#"{"code":"E_NETWORK_ERROR","message":"offline","responseCode":12}"#.into(),
            },
            Some(Platform::Android),
        );
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert_eq!(err.message, "offline");
        assert_eq!(err.response_code, Some(12));
        assert_eq!(err.platform, Some(Platform::Android));
    }

    #[test]
    fn test_free_text_with_colon_is_not_split() {
        let err = normalize_error("Something went wrong: try again", None);
        assert_eq!(err.code, ErrorCode::Unknown);
        assert_eq!(err.message, "Something went wrong: try again");
    }

    #[test]
    fn test_vocabularies_collapse() {
        for code in ["E_USER_CANCELLED", "user-cancelled", "userCancelled", "USER_CANCELED"] {
            assert_eq!(
                error_code_from_native(code, Some(Platform::Android)),
                ErrorCode::UserCancelled,
                "{code}"
            );
        }
        assert_eq!(error_code_from_native("E_IAP_NOT_AVAILABLE", None), ErrorCode::IapNotAvailable);
        assert_eq!(error_code_from_native("productUnavailable", Some(Platform::Ios)), ErrorCode::ItemUnavailable);
        assert_eq!(error_code_from_native("7", Some(Platform::Android)), ErrorCode::AlreadyOwned);
        assert_eq!(error_code_from_native("-1", Some(Platform::Android)), ErrorCode::ServiceDisconnected);
        assert_eq!(error_code_from_native("2", Some(Platform::Ios)), ErrorCode::UserCancelled);
        assert_eq!(error_code_from_native("2", None), ErrorCode::Unknown);
        assert_eq!(error_code_from_native("E_SOMETHING_NEW", None), ErrorCode::Unknown);
    }

    #[test]
    fn test_response_code_without_code() {
        let native = NativeError {
            message: "owned".into(),
            response_code: Some(7),
            ..Default::default()
        };
        let err = normalize_error(native, Some(Platform::Android));
        assert_eq!(err.code, ErrorCode::AlreadyOwned);
    }

    #[test]
    fn test_classifiers() {
        let cancelled = PurchaseError::new(ErrorCode::UserCancelled, "x");
        assert!(is_user_cancelled_error(&cancelled));
        assert!(!is_recoverable_error(&cancelled));
        assert_eq!(user_friendly_message(&cancelled), "Purchase was cancelled by user");

        let sync = PurchaseError::new(ErrorCode::SyncError, "sync failed");
        assert!(is_recoverable_error(&sync));
        assert_eq!(user_friendly_message(&sync), "sync failed");
    }
}
