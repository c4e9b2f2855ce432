//! Chat notification configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::foundation::ExternalUserId;

/// Notification configuration (Telegram Bot API)
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Bot token; unset disables outbound messages
    #[serde(default)]
    pub bot_token: Option<Secret<String>>,

    /// Bot API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Chat that receives sweep summaries
    #[serde(default)]
    pub admin_chat_id: Option<i64>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl NotificationConfig {
    /// The configured token, ignoring blank values.
    pub fn bot_token(&self) -> Option<&str> {
        self.bot_token
            .as_ref()
            .map(|token| token.expose_secret().as_str())
            .filter(|token| !token.trim().is_empty())
    }

    pub fn admin_chat(&self) -> Option<ExternalUserId> {
        self.admin_chat_id.map(ExternalUserId::new)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate notification configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let url = self.api_base_url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ValidationError::InvalidNotificationUrl);
        }
        if self.timeout_secs == 0 || self.timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base_url: default_api_base_url(),
            admin_chat_id: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_timeout() -> u64 {
    10
}
