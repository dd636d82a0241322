//! Error types for iapkit operations.
//!
//! Two layers live here:
//!
//! - [`ErrorCode`] and [`PurchaseError`]: the closed, store-facing taxonomy every
//!   native failure is normalized into before it reaches application code.
//! - [`IapError`]: the library error returned from fallible operations. Store
//!   failures travel inside [`IapError::Purchase`]; the remaining variants are
//!   programmer or integration errors raised directly by this crate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Platform;

/// Closed set of purchase error codes.
///
/// Native vocabularies (StoreKit names, Play Billing response codes, legacy
/// `E_`-prefixed strings) are collapsed onto these members by
/// [`crate::normalize::error_code_from_native`]. Anything unrecognized becomes
/// [`ErrorCode::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// The user dismissed the purchase sheet.
    UserCancelled,
    /// Device could not reach the store.
    NetworkError,
    /// Store service failed or is temporarily unavailable.
    ServiceError,
    /// Store backend returned an error.
    RemoteError,
    /// Connection to the billing service was closed.
    ConnectionClosed,
    /// Billing service disconnected mid-operation.
    ServiceDisconnected,
    /// Connection initialization failed.
    InitConnection,
    /// Transaction sync with the store failed.
    SyncError,
    /// Requested item is not available for purchase.
    ItemUnavailable,
    /// Requested SKU does not exist in the store catalog.
    SkuNotFound,
    /// Billing is not available on this device or account.
    BillingUnavailable,
    /// Purchase awaits approval (Ask to Buy, pending payment method).
    DeferredPayment,
    /// Store could not verify the transaction.
    TransactionValidationFailed,
    /// In-app purchases are not available in this environment.
    IapNotAvailable,
    /// Purchase flow was interrupted.
    Interrupted,
    /// Product query failed.
    QueryProduct,
    /// The user already owns this item.
    AlreadyOwned,
    /// The user does not own the item being consumed or acknowledged.
    ItemNotOwned,
    /// Invalid arguments were passed to the native API.
    DeveloperError,
    /// Connection has not been initialized.
    NotPrepared,
    /// Transaction is pending.
    Pending,
    /// Generic purchase failure reported by the store.
    PurchaseError,
    /// Receipt could not be retrieved or validated.
    ReceiptFailed,
    /// Requested feature is not supported by the installed store.
    FeatureNotSupported,
    /// A product query was issued without any SKUs.
    EmptySkuList,
    /// Catch-all for unrecognized native codes.
    Unknown,
}

impl ErrorCode {
    /// Every member of the taxonomy, in declaration order.
    pub const ALL: [ErrorCode; 26] = [
        Self::UserCancelled,
        Self::NetworkError,
        Self::ServiceError,
        Self::RemoteError,
        Self::ConnectionClosed,
        Self::ServiceDisconnected,
        Self::InitConnection,
        Self::SyncError,
        Self::ItemUnavailable,
        Self::SkuNotFound,
        Self::BillingUnavailable,
        Self::DeferredPayment,
        Self::TransactionValidationFailed,
        Self::IapNotAvailable,
        Self::Interrupted,
        Self::QueryProduct,
        Self::AlreadyOwned,
        Self::ItemNotOwned,
        Self::DeveloperError,
        Self::NotPrepared,
        Self::Pending,
        Self::PurchaseError,
        Self::ReceiptFailed,
        Self::FeatureNotSupported,
        Self::EmptySkuList,
        Self::Unknown,
    ];

    /// Canonical kebab-case code string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserCancelled => "user-cancelled",
            Self::NetworkError => "network-error",
            Self::ServiceError => "service-error",
            Self::RemoteError => "remote-error",
            Self::ConnectionClosed => "connection-closed",
            Self::ServiceDisconnected => "service-disconnected",
            Self::InitConnection => "init-connection",
            Self::SyncError => "sync-error",
            Self::ItemUnavailable => "item-unavailable",
            Self::SkuNotFound => "sku-not-found",
            Self::BillingUnavailable => "billing-unavailable",
            Self::DeferredPayment => "deferred-payment",
            Self::TransactionValidationFailed => "transaction-validation-failed",
            Self::IapNotAvailable => "iap-not-available",
            Self::Interrupted => "interrupted",
            Self::QueryProduct => "query-product",
            Self::AlreadyOwned => "already-owned",
            Self::ItemNotOwned => "item-not-owned",
            Self::DeveloperError => "developer-error",
            Self::NotPrepared => "not-prepared",
            Self::Pending => "pending",
            Self::PurchaseError => "purchase-error",
            Self::ReceiptFailed => "receipt-failed",
            Self::FeatureNotSupported => "feature-not-supported",
            Self::EmptySkuList => "empty-sku-list",
            Self::Unknown => "unknown",
        }
    }

    /// Legacy `E_`-prefixed spelling (e.g. `E_USER_CANCELLED`).
    pub fn legacy_code(&self) -> String {
        format!("E_{}", self.as_str().replace('-', "_").to_uppercase())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized purchase error as seen by application code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseError {
    /// Normalized error code; always a member of [`ErrorCode`].
    pub code: ErrorCode,
    /// Human-readable message, passed through from the native layer when available.
    pub message: String,
    /// Raw platform response code, if the native layer supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<i32>,
    /// Extra diagnostic text from the native layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_message: Option<String>,
    /// Product the failure relates to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// Platform that produced the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl PurchaseError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            response_code: None,
            debug_message: None,
            product_id: None,
            platform: None,
        }
    }

    /// The catch-all error produced when nothing usable was supplied.
    pub fn unknown() -> Self {
        Self::new(ErrorCode::Unknown, "Unknown error occurred")
    }

    /// Set the platform response code.
    pub fn with_response_code(mut self, response_code: i32) -> Self {
        self.response_code = Some(response_code);
        self
    }

    /// Set the debug message.
    pub fn with_debug_message(mut self, debug_message: impl Into<String>) -> Self {
        self.debug_message = Some(debug_message.into());
        self
    }

    /// Set the product id.
    pub fn with_product_id(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    /// Set the originating platform.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }
}

impl fmt::Display for PurchaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PurchaseError {}

/// Library error for iapkit operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum IapError {
    /// A request was missing required platform fields. Raised before any native call.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A native store failure, already normalized.
    #[error("purchase failed: {0}")]
    Purchase(#[from] PurchaseError),

    /// The native bridge could not be created.
    #[error("native bridge unavailable: {0}")]
    BridgeUnavailable(String),

    /// The running platform is neither iOS nor Android.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// A native payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl IapError {
    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Map this error onto the purchase error taxonomy.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::DeveloperError,
            Self::Purchase(err) => err.code,
            Self::BridgeUnavailable(_) => ErrorCode::IapNotAvailable,
            Self::UnsupportedPlatform(_) => ErrorCode::FeatureNotSupported,
            Self::Serialization(_) => ErrorCode::Unknown,
        }
    }

    /// The normalized purchase error, if this is a store failure.
    pub fn as_purchase_error(&self) -> Option<&PurchaseError> {
        match self {
            Self::Purchase(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Purchase(err) => crate::normalize::is_recoverable_error(err),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for IapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_strings() {
        assert_eq!(ErrorCode::UserCancelled.as_str(), "user-cancelled");
        assert_eq!(ErrorCode::IapNotAvailable.legacy_code(), "E_IAP_NOT_AVAILABLE");
        assert_eq!(
            ErrorCode::TransactionValidationFailed.legacy_code(),
            "E_TRANSACTION_VALIDATION_FAILED"
        );
    }

    #[test]
    fn test_serde_matches_as_str() {
        for code in ErrorCode::ALL {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_error_display() {
        let err = PurchaseError::new(ErrorCode::NetworkError, "offline")
            .with_platform(Platform::Android)
            .with_response_code(12);
        assert_eq!(err.to_string(), "network-error: offline");
        assert_eq!(err.response_code, Some(12));

        let wrapped = IapError::from(err);
        assert!(wrapped.to_string().contains("offline"));
        assert_eq!(wrapped.code(), ErrorCode::NetworkError);
        assert!(wrapped.is_retryable());
    }

    #[test]
    fn test_validation_is_not_retryable() {
        let err = IapError::validation("ios.sku is required");
        assert_eq!(err.code(), ErrorCode::DeveloperError);
        assert!(!err.is_retryable());
        assert!(err.as_purchase_error().is_none());
    }
}
