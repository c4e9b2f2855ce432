//! Payment configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Payment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    /// Prefix of invoice payloads that renew an existing subscription;
    /// payloads look like `<prefix>:<subscription_id>:<country>`
    #[serde(default = "default_renewal_payload_prefix")]
    pub renewal_payload_prefix: String,

    /// Currency recorded on zero-amount promocode subscriptions
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

impl PaymentsConfig {
    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let prefix = self.renewal_payload_prefix.trim();
        if prefix.is_empty() || prefix.contains(':') {
            return Err(ValidationError::InvalidRenewalPrefix);
        }
        let currency = self.default_currency.trim();
        if currency.is_empty() || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency);
        }
        Ok(())
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            renewal_payload_prefix: default_renewal_payload_prefix(),
            default_currency: default_currency(),
        }
    }
}

fn default_renewal_payload_prefix() -> String {
    "vpn_renewal_v1".to_string()
}

fn default_currency() -> String {
    "RUB".to_string()
}
