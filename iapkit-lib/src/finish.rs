//! Transaction completion.
//!
//! iOS finishes a transaction by id. Android acknowledges (non-consumable) or
//! consumes (consumable) by purchase token; both go through the same native
//! call with an `is_consumable` flag.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bridge::NativeBridge;
use crate::config::IapConfig;
use crate::errors::{IapError, PurchaseError};
use crate::native::{NativeError, NativeFinishParams, NativeFinishResult, NativeResult};
use crate::normalize::{normalize_error, RawError};
use crate::platform::adapter_for;
use crate::types::{Platform, Purchase};
use crate::Result;

/// Native codes reporting that a transaction was already finished.
const ALREADY_FINISHED_CODES: &[&str] = &[
    "transaction-not-found",
    "already-finished",
    "E_TRANSACTION_NOT_FOUND",
    "E_ALREADY_FINISHED",
];

/// Result of completing a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishOutcome {
    pub success: bool,
    /// The store reported the transaction as already finished.
    #[serde(default)]
    pub already_finished: bool,
    /// Structured Play Billing result, when the native layer returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<NativeResult>,
}

impl FinishOutcome {
    fn from_native(result: NativeFinishResult) -> Self {
        match result {
            NativeFinishResult::Bool(success) => Self {
                success,
                ..Default::default()
            },
            NativeFinishResult::Structured(result) => Self {
                success: result.is_ok(),
                already_finished: false,
                result: Some(result),
            },
        }
    }
}

/// Complete `purchase` with the primitive `platform` requires.
pub async fn finish_transaction(
    bridge: &dyn NativeBridge,
    platform: Platform,
    purchase: &Purchase,
    is_consumable: bool,
    config: &IapConfig,
) -> Result<FinishOutcome> {
    adapter_for(platform)
        .finish(bridge, purchase, is_consumable, config)
        .await
}

/// Whether a native finish failure means the transaction is already finished.
///
/// Structured codes are checked first; message fragments from
/// `config.already_finished_patterns` are the fallback.
pub fn is_already_finished(err: &NativeError, config: &IapConfig) -> bool {
    if let Some(code) = err.code.as_deref() {
        if ALREADY_FINISHED_CODES
            .iter()
            .any(|known| known.eq_ignore_ascii_case(code))
        {
            return true;
        }
    }
    let message = err.message.to_lowercase();
    config
        .already_finished_patterns
        .iter()
        .any(|pattern| !pattern.is_empty() && message.contains(&pattern.to_lowercase()))
}

pub(crate) async fn finish_ios(
    bridge: &dyn NativeBridge,
    purchase: &Purchase,
    config: &IapConfig,
) -> Result<FinishOutcome> {
    if purchase.id.trim().is_empty() {
        return Err(IapError::validation("purchase.id is required to finish an iOS transaction"));
    }

    let params = NativeFinishParams::Ios {
        transaction_id: purchase.id.clone(),
    };
    match bridge.finish_transaction(params).await {
        Ok(result) => finished(FinishOutcome::from_native(result), Platform::Ios),
        Err(err) if is_already_finished(&err, config) => {
            debug!(
                transaction_id = %purchase.id,
                error = %err,
                "transaction already finished"
            );
            Ok(FinishOutcome {
                success: true,
                already_finished: true,
                result: None,
            })
        }
        Err(err) => Err(normalize_error(err, Some(Platform::Ios)).into()),
    }
}

/// Acknowledge or consume an Android purchase by token.
pub async fn complete_android(
    bridge: &dyn NativeBridge,
    purchase_token: &str,
    is_consumable: bool,
) -> Result<FinishOutcome> {
    if purchase_token.trim().is_empty() {
        return Err(IapError::validation(
            "purchase token is required to complete an Android purchase",
        ));
    }

    let params = NativeFinishParams::Android {
        purchase_token: purchase_token.to_string(),
        is_consumable,
    };
    match bridge.finish_transaction(params).await {
        Ok(result) => finished(FinishOutcome::from_native(result), Platform::Android),
        Err(err) => Err(normalize_error(err, Some(Platform::Android)).into()),
    }
}

/// Acknowledge a non-consumable Android purchase.
pub async fn acknowledge_purchase_android(
    bridge: &dyn NativeBridge,
    purchase_token: &str,
) -> Result<FinishOutcome> {
    complete_android(bridge, purchase_token, false).await
}

/// Consume an Android purchase so it can be bought again.
pub async fn consume_purchase_android(
    bridge: &dyn NativeBridge,
    purchase_token: &str,
) -> Result<FinishOutcome> {
    complete_android(bridge, purchase_token, true).await
}

/// A structured non-OK result is a store failure and is normalized.
fn finished(outcome: FinishOutcome, platform: Platform) -> Result<FinishOutcome> {
    match &outcome.result {
        Some(result) if !result.is_ok() => Err(result_error(result, platform).into()),
        _ => Ok(outcome),
    }
}

fn result_error(result: &NativeResult, platform: Platform) -> PurchaseError {
    normalize_error(
        RawError::Structured {
            code: result.code.clone(),
            message: result.message.clone(),
            response_code: Some(result.response_code),
            debug_message: result.debug_message.clone(),
            product_id: None,
        },
        Some(platform),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::testing::{fixtures, BridgeCall, MockBridge};
    use crate::convert::to_purchase;

    fn ios_purchase(id: &str) -> Purchase {
        to_purchase(&fixtures::ios_purchase(id, "p1")).unwrap()
    }

    #[test]
    fn test_already_finished_by_code() {
        let config = IapConfig::default();
        let err = NativeError::with_code("E_TRANSACTION_NOT_FOUND", "gone");
        assert!(is_already_finished(&err, &config));
        let err = NativeError::with_code("transaction-not-found", "gone");
        assert!(is_already_finished(&err, &config));
    }

    #[test]
    fn test_already_finished_by_message() {
        let config = IapConfig::default();
        assert!(is_already_finished(
            &NativeError::new("Transaction Not Found for id 42"),
            &config
        ));
        assert!(!is_already_finished(&NativeError::new("network down"), &config));

        let strict = IapConfig::default().with_already_finished_patterns(Vec::<String>::new());
        assert!(!is_already_finished(
            &NativeError::new("Transaction not found"),
            &strict
        ));
    }

    #[tokio::test]
    async fn test_ios_finish_twice_succeeds() {
        let bridge = MockBridge::new(Platform::Ios);
        let config = IapConfig::default();
        let purchase = ios_purchase("t1");

        let first = finish_ios(bridge.as_ref(), &purchase, &config).await.unwrap();
        assert!(first.success);
        assert!(!first.already_finished);

        let second = finish_ios(bridge.as_ref(), &purchase, &config).await.unwrap();
        assert!(second.success);
        assert!(second.already_finished);
    }

    #[tokio::test]
    async fn test_ios_requires_id() {
        let bridge = MockBridge::new(Platform::Ios);
        let mut purchase = ios_purchase("t1");
        purchase.id = String::new();
        let err = finish_ios(bridge.as_ref(), &purchase, &IapConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IapError::Validation(_)));
        assert!(bridge.calls().is_empty());
    }

    #[tokio::test]
    async fn test_android_wrappers_set_flag() {
        let bridge = MockBridge::new(Platform::Android);
        acknowledge_purchase_android(bridge.as_ref(), "tok-a").await.unwrap();
        let outcome = consume_purchase_android(bridge.as_ref(), "tok-c").await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.result.as_ref().map(|r| r.response_code), Some(0));

        assert_eq!(
            bridge.calls(),
            vec![
                BridgeCall::FinishTransaction(NativeFinishParams::Android {
                    purchase_token: "tok-a".into(),
                    is_consumable: false,
                }),
                BridgeCall::FinishTransaction(NativeFinishParams::Android {
                    purchase_token: "tok-c".into(),
                    is_consumable: true,
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_android_requires_token() {
        let bridge = MockBridge::new(Platform::Android);
        let err = complete_android(bridge.as_ref(), "", true).await.unwrap_err();
        assert!(matches!(err, IapError::Validation(_)));
    }

    #[tokio::test]
    async fn test_android_failure_is_normalized() {
        let bridge = MockBridge::new(Platform::Android);
        bridge.fail_next(
            "finishTransaction",
            NativeError::with_code("ITEM_NOT_OWNED", "not owned").with_response_code(8),
        );
        let err = complete_android(bridge.as_ref(), "tok", false).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ItemNotOwned);
    }

    #[tokio::test]
    async fn test_android_non_ok_result_is_error() {
        let bridge = MockBridge::new(Platform::Android);
        bridge.set_finish_result(NativeFinishResult::Structured(NativeResult {
            response_code: 8,
            code: Some("ITEM_NOT_OWNED".into()),
            message: Some("Item not owned".into()),
            ..Default::default()
        }));
        let err = complete_android(bridge.as_ref(), "tok", true).await.unwrap_err();
        let purchase_error = err.as_purchase_error().unwrap();
        assert_eq!(purchase_error.code, ErrorCode::ItemNotOwned);
        assert_eq!(purchase_error.response_code, Some(8));
    }
}
