//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::errors::IapError;
use crate::types::Platform;

/// Configuration for [`crate::IapClient`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IapConfig {
    /// Platform to target. `None` detects the running target.
    #[serde(default)]
    pub platform: Option<Platform>,

    /// Default for the iOS auto-finish flag on subscription purchases.
    #[serde(default = "default_auto_finish_subscriptions_ios")]
    pub auto_finish_subscriptions_ios: bool,

    /// Message fragments (case-insensitive) identifying an iOS finish error
    /// for a transaction that is already finished.
    #[serde(default = "default_already_finished_patterns")]
    pub already_finished_patterns: Vec<String>,

    /// iOS subscriptions expiring within this many days are flagged as expiring soon.
    #[serde(default = "default_expiry_warning_window_days")]
    pub expiry_warning_window_days: u32,
}

fn default_auto_finish_subscriptions_ios() -> bool {
    true
}

fn default_already_finished_patterns() -> Vec<String> {
    vec![
        "transaction not found".to_string(),
        "already finished".to_string(),
    ]
}

fn default_expiry_warning_window_days() -> u32 {
    7
}

impl Default for IapConfig {
    fn default() -> Self {
        Self {
            platform: None,
            auto_finish_subscriptions_ios: default_auto_finish_subscriptions_ios(),
            already_finished_patterns: default_already_finished_patterns(),
            expiry_warning_window_days: default_expiry_warning_window_days(),
        }
    }
}

impl IapConfig {
    /// Load a configuration from a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, IapError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Target a specific platform instead of detecting it.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Set the default iOS auto-finish flag for subscriptions.
    pub fn with_auto_finish_subscriptions_ios(mut self, enabled: bool) -> Self {
        self.auto_finish_subscriptions_ios = enabled;
        self
    }

    /// Replace the already-finished message patterns.
    pub fn with_already_finished_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.already_finished_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the expiry warning window.
    pub fn with_expiry_warning_window_days(mut self, days: u32) -> Self {
        self.expiry_warning_window_days = days;
        self
    }

    /// Resolve the configured or detected platform.
    pub fn resolve_platform(&self) -> Result<Platform, IapError> {
        match self.platform {
            Some(platform) => Ok(platform),
            None => Platform::current(),
        }
    }
}
