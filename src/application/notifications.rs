//! Best-effort user and admin notifications.
//!
//! Delivery failures never fail the operation that triggered them; they
//! are logged and dropped.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::foundation::{ExternalUserId, Timestamp};
use crate::ports::Notifier;

/// Wraps a [`Notifier`] with swallow-and-log semantics.
#[derive(Clone)]
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
    admin_chat: Option<ExternalUserId>,
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>, admin_chat: Option<ExternalUserId>) -> Self {
        Self {
            notifier,
            admin_chat,
        }
    }

    pub fn admin_chat(&self) -> Option<ExternalUserId> {
        self.admin_chat
    }

    /// Sends `text`; returns whether it was delivered.
    pub async fn notify(&self, to: ExternalUserId, text: &str) -> bool {
        match self.notifier.send_text(to, text).await {
            Ok(()) => {
                debug!(to = %to, "Notification sent");
                true
            }
            Err(e) => {
                warn!(to = %to, error = %e, "Failed to send notification");
                false
            }
        }
    }

    /// Sends `text` to the admin chat, when one is configured.
    pub async fn notify_admin(&self, text: &str) -> bool {
        match self.admin_chat {
            Some(chat) => self.notify(chat, text).await,
            None => false,
        }
    }

    /// Sends a file to the admin chat, when one is configured.
    pub async fn notify_admin_document(
        &self,
        filename: &str,
        content: Vec<u8>,
        caption: Option<&str>,
    ) -> bool {
        let Some(chat) = self.admin_chat else {
            return false;
        };
        match self
            .notifier
            .send_document(chat, filename, content, caption)
            .await
        {
            Ok(()) => {
                debug!(to = %chat, filename, "Document sent");
                true
            }
            Err(e) => {
                warn!(to = %chat, filename, error = %e, "Failed to send document");
                false
            }
        }
    }
}

pub fn key_revoked_text(server_name: &str) -> String {
    format!(
        "Your VPN subscription for {} has expired and the access key was disabled.\n\
         Renew the subscription to get a new key.",
        server_name
    )
}

pub fn renewal_confirmation_text(server_name: &str, old_until: Timestamp, new_until: Timestamp) -> String {
    format!(
        "Subscription for {} renewed.\nWas active until: {}\nNow active until: {}",
        server_name,
        old_until.format_short(),
        new_until.format_short()
    )
}

pub fn referral_bonus_text(redeemer: &str, old_until: Timestamp, new_until: Timestamp) -> String {
    format!(
        "{} used your referral code. You got +1 month!\nWas active until: {}\nNow active until: {}",
        redeemer,
        old_until.format_short(),
        new_until.format_short()
    )
}

pub fn renewal_reminder_text(server_name: &str, active_until: Timestamp) -> String {
    format!(
        "Your VPN subscription for {} expires on {}.\nRenew it to keep your access key.",
        server_name,
        active_until.format_short()
    )
}

pub fn broadcast_report_text(target: &str, sent: usize, total: usize, recipients: &[String]) -> String {
    let mut text = format!(
        "Broadcast finished\nTarget: {}\nDelivered: {} of {}",
        target, sent, total
    );
    if !recipients.is_empty() {
        text.push_str("\nRecipients:\n");
        text.push_str(&recipients.join("\n"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::telegram::RecordingNotifier;

    #[tokio::test]
    async fn failures_are_swallowed() {
        let recorder = RecordingNotifier::new();
        recorder.fail_all(true);
        let service = NotificationService::new(Arc::new(recorder.clone()), None);

        assert!(!service.notify(ExternalUserId::new(1), "hello").await);
        assert!(recorder.sent().is_empty());
    }

    #[tokio::test]
    async fn admin_messages_need_an_admin_chat() {
        let recorder = RecordingNotifier::new();
        let without = NotificationService::new(Arc::new(recorder.clone()), None);
        assert!(!without.notify_admin("summary").await);

        let with = NotificationService::new(Arc::new(recorder.clone()), Some(ExternalUserId::new(42)));
        assert!(with.notify_admin("summary").await);
        assert_eq!(recorder.texts_to(ExternalUserId::new(42)), vec!["summary".to_string()]);
    }

    #[test]
    fn reminder_mentions_server_and_date() {
        let until = Timestamp::parse_rfc3339("2024-05-02T10:00:00Z").unwrap();
        let text = renewal_reminder_text("Netherlands", until);
        assert!(text.contains("Netherlands"));
        assert!(text.contains("2024-05-02 10:00 UTC"));
    }

    #[tokio::test]
    async fn admin_documents_go_to_admin_chat() {
        use crate::adapters::telegram::SentMessage;

        let recorder = RecordingNotifier::new();
        let service = NotificationService::new(Arc::new(recorder.clone()), Some(ExternalUserId::new(42)));
        assert!(service
            .notify_admin_document("stats.json", b"{}".to_vec(), Some("Daily stats"))
            .await);
        assert_eq!(
            recorder.sent(),
            vec![SentMessage::Document {
                to: ExternalUserId::new(42),
                filename: "stats.json".to_string(),
                size: 2,
                caption: Some("Daily stats".to_string()),
            }]
        );

        let without = NotificationService::new(Arc::new(recorder.clone()), None);
        assert!(!without.notify_admin_document("stats.json", Vec::new(), None).await);
    }

    #[test]
    fn broadcast_report_lists_recipients() {
        let text = broadcast_report_text("all", 2, 3, &["@neo".to_string(), "7".to_string()]);
        assert!(text.contains("Delivered: 2 of 3"));
        assert!(text.ends_with("@neo\n7"));
    }
}
