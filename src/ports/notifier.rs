//! Notifier port.
//!
//! Outbound messages to users and the admin chat. Every caller treats
//! delivery as best-effort.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::ExternalUserId;

/// Port for sending chat notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a plain text message.
    async fn send_text(&self, to: ExternalUserId, text: &str) -> Result<(), NotificationError>;

    /// Send a file with an optional caption.
    async fn send_document(
        &self,
        to: ExternalUserId,
        filename: &str,
        content: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<(), NotificationError>;
}

/// Errors from the notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    /// No bot token is configured.
    #[error("notifier is not configured")]
    NotConfigured,

    /// The chat API answered with a non-success status.
    #[error("chat API returned {status}: {body}")]
    Http { status: u16, body: String },

    /// The request could not be sent or timed out.
    #[error("network error: {0}")]
    Network(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_is_object_safe() {
        fn _accepts_dyn(_notifier: &dyn Notifier) {}
    }
}
