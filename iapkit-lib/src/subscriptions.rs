//! Active subscription projection over available purchases.

use serde::{Deserialize, Serialize};

use crate::config::IapConfig;
use crate::types::{Purchase, PurchaseDetails, PurchaseState};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// A currently active subscription, derived from the [`Purchase`] that backs it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSubscription {
    pub product_id: String,
    pub is_active: bool,
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_token: Option<String>,
    pub transaction_date: i64,
    #[serde(rename = "expirationDateIOS", skip_serializing_if = "Option::is_none")]
    pub expiration_date_ios: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_renewing_android: Option<bool>,
    #[serde(rename = "environmentIOS", skip_serializing_if = "Option::is_none")]
    pub environment_ios: Option<String>,
    /// iOS only: expiration falls within the configured warning window.
    pub will_expire_soon: bool,
    /// iOS only: whole days until expiration, rounded up.
    #[serde(rename = "daysUntilExpirationIOS", skip_serializing_if = "Option::is_none")]
    pub days_until_expiration_ios: Option<i64>,
}

fn looks_like_subscription(purchase: &Purchase) -> bool {
    match &purchase.details {
        PurchaseDetails::Ios(ios) => {
            ios.expiration_date_ios.is_some()
                || ios
                    .product_type_ios
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case("autoRenewable"))
        }
        PurchaseDetails::Android(android) => {
            purchase.is_auto_renewing || android.auto_renewing_android.is_some()
        }
    }
}

fn project(purchase: &Purchase, now_ms: i64, config: &IapConfig) -> ActiveSubscription {
    let mut active = ActiveSubscription {
        product_id: purchase.product_id.clone(),
        is_active: false,
        transaction_id: purchase.id.clone(),
        purchase_token: purchase.purchase_token.clone(),
        transaction_date: purchase.transaction_date,
        expiration_date_ios: None,
        auto_renewing_android: None,
        environment_ios: None,
        will_expire_soon: false,
        days_until_expiration_ios: None,
    };

    match &purchase.details {
        PurchaseDetails::Ios(ios) => {
            active.expiration_date_ios = ios.expiration_date_ios;
            active.environment_ios = ios.environment_ios.clone();
            match ios.expiration_date_ios {
                Some(expires) => {
                    // An out-of-range expiration is treated as expired.
                    let remaining = expires.checked_sub(now_ms).filter(|r| *r > 0);
                    active.is_active = remaining.is_some();
                    if let Some(remaining) = remaining {
                        let window = i64::from(config.expiry_warning_window_days) * DAY_MS;
                        active.will_expire_soon = remaining <= window;
                        active.days_until_expiration_ios =
                            Some(remaining.saturating_add(DAY_MS - 1) / DAY_MS);
                    }
                }
                None => active.is_active = true,
            }
        }
        PurchaseDetails::Android(android) => {
            active.auto_renewing_android = android.auto_renewing_android;
            active.is_active = purchase.purchase_state == PurchaseState::Purchased;
        }
    }
    active
}

/// Project `purchases` onto active subscriptions.
///
/// With `subscription_ids`, only those products are considered; otherwise
/// every subscription-shaped purchase is. Inactive entries are omitted.
pub fn active_subscriptions(
    purchases: &[Purchase],
    subscription_ids: Option<&[String]>,
    now_ms: i64,
    config: &IapConfig,
) -> Vec<ActiveSubscription> {
    purchases
        .iter()
        .filter(|purchase| match subscription_ids {
            Some(ids) => ids.iter().any(|id| *id == purchase.product_id),
            None => looks_like_subscription(purchase),
        })
        .map(|purchase| project(purchase, now_ms, config))
        .filter(|active| active.is_active)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::to_purchase;
    use crate::testing::fixtures;

    const NOW: i64 = 1_700_000_000_000;

    fn ios_sub(id: &str, expires: Option<i64>) -> Purchase {
        let mut native = fixtures::ios_purchase(id, "premium");
        native.expiration_date_ios = expires;
        native.product_type_ios = Some("autoRenewable".into());
        to_purchase(&native).unwrap()
    }

    #[test]
    fn test_ios_expiry_window() {
        let config = IapConfig::default();
        let purchases = vec![
            ios_sub("soon", Some(NOW + 2 * DAY_MS + 1)),
            ios_sub("later", Some(NOW + 30 * DAY_MS)),
            ios_sub("expired", Some(NOW - 1)),
        ];
        let active = active_subscriptions(&purchases, None, NOW, &config);
        assert_eq!(active.len(), 2);
        assert!(active[0].will_expire_soon);
        assert_eq!(active[0].days_until_expiration_ios, Some(3));
        assert!(!active[1].will_expire_soon);
        assert_eq!(active[1].days_until_expiration_ios, Some(30));
    }

    #[test]
    fn test_ios_extreme_expiration_dates() {
        let config = IapConfig::default();
        let expired = active_subscriptions(&[ios_sub("min", Some(i64::MIN))], None, NOW, &config);
        assert!(expired.is_empty());

        let active = active_subscriptions(&[ios_sub("max", Some(i64::MAX))], None, NOW, &config);
        assert_eq!(active.len(), 1);
        assert!(!active[0].will_expire_soon);
        assert_eq!(active[0].days_until_expiration_ios, Some((i64::MAX - NOW) / DAY_MS + 1));
    }

    #[test]
    fn test_ios_without_expiration_is_active() {
        let purchases = vec![ios_sub("t1", None)];
        let ids = vec!["premium".to_string()];
        let active = active_subscriptions(&purchases, Some(&ids), NOW, &IapConfig::default());
        assert_eq!(active.len(), 1);
        assert!(!active[0].will_expire_soon);
        assert_eq!(active[0].days_until_expiration_ios, None);
    }

    #[test]
    fn test_android_state() {
        let mut purchased = fixtures::android_purchase("GPA.1", "pro", "tok-1");
        purchased.auto_renewing_android = Some(true);
        let mut pending = fixtures::android_purchase("GPA.2", "pro", "tok-2");
        pending.purchase_state = Some("pending".into());
        let purchases: Vec<_> = [purchased, pending]
            .iter()
            .filter_map(to_purchase)
            .collect();
        let ids = vec!["pro".to_string()];
        let active = active_subscriptions(&purchases, Some(&ids), NOW, &IapConfig::default());
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].transaction_id, "GPA.1");
        assert_eq!(active[0].auto_renewing_android, Some(true));
        assert!(!active[0].will_expire_soon);
    }

    #[test]
    fn test_id_filter_excludes_other_products() {
        let purchases = vec![ios_sub("t1", None)];
        let ids = vec!["other".to_string()];
        assert!(active_subscriptions(&purchases, Some(&ids), NOW, &IapConfig::default()).is_empty());
    }
}
