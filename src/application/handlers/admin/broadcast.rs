//! BroadcastHandler - Command sending one message to a group of users.
//!
//! Only the configured admin chat may broadcast. Delivery is best-effort
//! per recipient; the admin gets a report listing who was reached.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::info;

use crate::application::notifications::broadcast_report_text;
use crate::application::NotificationService;
use crate::domain::entitlement::SubscriptionKind;
use crate::domain::foundation::{DomainError, ErrorCode, ExternalUserId, Timestamp};
use crate::domain::user::{BroadcastTarget, User};
use crate::ports::UserRepository;

/// Sends in flight at once.
const BROADCAST_CONCURRENCY: usize = 16;

#[derive(Debug, Clone)]
pub struct BroadcastCommand {
    pub admin_external_id: ExternalUserId,
    pub message: String,
    pub target: BroadcastTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResult {
    pub target: BroadcastTarget,
    pub total: usize,
    pub sent_count: usize,
    /// Display names of the users reached, sorted.
    pub recipients: Vec<String>,
}

pub struct BroadcastHandler {
    users: Arc<dyn UserRepository>,
    notifications: NotificationService,
}

impl BroadcastHandler {
    pub fn new(users: Arc<dyn UserRepository>, notifications: NotificationService) -> Self {
        Self {
            users,
            notifications,
        }
    }

    pub async fn handle(&self, cmd: BroadcastCommand) -> Result<BroadcastResult, DomainError> {
        let message = cmd.message.trim();
        if message.is_empty() {
            return Err(DomainError::validation("message", "message is required"));
        }
        if self.notifications.admin_chat() != Some(cmd.admin_external_id) {
            return Err(DomainError::new(
                ErrorCode::Forbidden,
                "Only the admin chat can broadcast",
            ));
        }

        let audience = self.audience(cmd.target).await?;
        let sends: Vec<_> = audience
            .iter()
            .map(|user| async move {
                self.notifications
                    .notify(user.external_id, message)
                    .await
                    .then(|| user.display_name())
            })
            .collect();
        let mut recipients: Vec<String> = stream::iter(sends)
            .buffer_unordered(BROADCAST_CONCURRENCY)
            .filter_map(|reached| async move { reached })
            .collect()
            .await;
        recipients.sort();

        let result = BroadcastResult {
            target: cmd.target,
            total: audience.len(),
            sent_count: recipients.len(),
            recipients,
        };
        info!(
            target = %result.target,
            sent = result.sent_count,
            total = result.total,
            "Broadcast finished"
        );
        self.notifications
            .notify_admin(&broadcast_report_text(
                result.target.as_str(),
                result.sent_count,
                result.total,
                &result.recipients,
            ))
            .await;
        Ok(result)
    }

    async fn audience(&self, target: BroadcastTarget) -> Result<Vec<User>, DomainError> {
        match target {
            BroadcastTarget::All => self.users.list_all().await,
            BroadcastTarget::WithSubscription => {
                self.users
                    .list_with_active_subscription(SubscriptionKind::Vpn, Timestamp::now())
                    .await
            }
            BroadcastTarget::WithoutSubscription => {
                self.users
                    .list_without_subscription(SubscriptionKind::Vpn)
                    .await
            }
        }
    }
}
