//! RenewalReminderHandler - Periodic reminder for subscriptions expiring
//! tomorrow (UTC).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::application::notifications::renewal_reminder_text;
use crate::application::{EntitlementLedger, NotificationService, PeriodicTask, TaskError};
use crate::config::PaymentsConfig;
use crate::domain::entitlement::{renewal_payload, EntitlementError};
use crate::domain::foundation::{ExternalUserId, SubscriptionId, Timestamp};
use crate::ports::{ProvisionerRegistry, UserRepository};

/// One reminder attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub subscription_id: SubscriptionId,
    pub external_id: ExternalUserId,
    /// Invoice payload that renews this subscription in place.
    pub renewal_payload: String,
    pub delivered: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RenewalReminderResult {
    pub reminders: Vec<Reminder>,
}

impl RenewalReminderResult {
    pub fn delivered_count(&self) -> usize {
        self.reminders.iter().filter(|r| r.delivered).count()
    }
}

pub struct RenewalReminderHandler {
    users: Arc<dyn UserRepository>,
    entitlements: EntitlementLedger,
    registry: Arc<ProvisionerRegistry>,
    notifications: NotificationService,
    config: PaymentsConfig,
}

impl RenewalReminderHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        entitlements: EntitlementLedger,
        registry: Arc<ProvisionerRegistry>,
        notifications: NotificationService,
        config: PaymentsConfig,
    ) -> Self {
        Self {
            users,
            entitlements,
            registry,
            notifications,
            config,
        }
    }

    pub async fn handle(&self, now: Timestamp) -> Result<RenewalReminderResult, EntitlementError> {
        let from = now.start_of_day().add_days(1);
        let to = from.add_days(1);
        let expiring = self.entitlements.expiring_between(from, to).await?;

        let mut result = RenewalReminderResult::default();
        for subscription in expiring {
            let user = match self.users.find_by_id(subscription.user_id).await {
                Ok(Some(user)) => user,
                Ok(None) => continue,
                Err(e) => {
                    warn!(user_id = %subscription.user_id, error = %e, "Failed to look up user for reminder");
                    continue;
                }
            };

            let server = subscription
                .country
                .as_ref()
                .map(|country| self.registry.display_name(country))
                .unwrap_or_else(|| "VPN".to_string());
            let delivered = self
                .notifications
                .notify(
                    user.external_id,
                    &renewal_reminder_text(&server, subscription.active_until),
                )
                .await;

            result.reminders.push(Reminder {
                subscription_id: subscription.id,
                external_id: user.external_id,
                renewal_payload: renewal_payload(
                    &self.config.renewal_payload_prefix,
                    subscription.id,
                    subscription.country.as_ref(),
                ),
                delivered,
            });
        }

        info!(
            reminded = result.delivered_count(),
            candidates = result.reminders.len(),
            "Renewal reminders sent"
        );
        Ok(result)
    }
}

#[async_trait]
impl PeriodicTask for RenewalReminderHandler {
    fn name(&self) -> &'static str {
        "renewal_reminder"
    }

    async fn run_once(&self, now: Timestamp) -> Result<String, TaskError> {
        self.handle(now)
            .await
            .map(|result| format!("reminded {}", result.delivered_count()))
            .map_err(|e| TaskError::Failed(e.message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::{nl, ts, TestContext};

    fn handler(ctx: &TestContext) -> RenewalReminderHandler {
        RenewalReminderHandler::new(
            Arc::new(ctx.store.clone()),
            ctx.entitlements.clone(),
            ctx.registry.clone(),
            ctx.notifications.clone(),
            ctx.payments.clone(),
        )
    }

    #[tokio::test]
    async fn reminds_only_rows_expiring_tomorrow() {
        let ctx = TestContext::new();
        let tomorrow_user = ctx.user(1).await;
        let later_user = ctx.user(2).await;
        let due = ctx.paid_vpn(&tomorrow_user, Some(nl()), Timestamp::now()).await;
        let later = ctx.paid_vpn(&later_user, Some(nl()), Timestamp::now()).await;
        ctx.store
            .set_active_until(due.id, ts("2024-03-11T15:00:00Z"))
            .await;
        ctx.store
            .set_active_until(later.id, ts("2024-03-12T00:00:00Z"))
            .await;

        let result = handler(&ctx).handle(ts("2024-03-10T09:00:00Z")).await.unwrap();

        assert_eq!(result.reminders.len(), 1);
        let reminder = &result.reminders[0];
        assert_eq!(reminder.subscription_id, due.id);
        assert!(reminder.delivered);
        assert_eq!(
            reminder.renewal_payload,
            format!("vpn_renewal_v1:{}:nl", due.id)
        );
        let texts = ctx.recorder.texts_to(tomorrow_user.external_id);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("Netherlands"));
        assert!(ctx.recorder.texts_to(later_user.external_id).is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_not_raised() {
        let ctx = TestContext::new();
        let user = ctx.user(1).await;
        let due = ctx.paid_vpn(&user, Some(nl()), Timestamp::now()).await;
        ctx.store
            .set_active_until(due.id, ts("2024-03-11T01:00:00Z"))
            .await;
        ctx.recorder.fail_all(true);

        let result = handler(&ctx).handle(ts("2024-03-10T23:00:00Z")).await.unwrap();
        assert_eq!(result.reminders.len(), 1);
        assert_eq!(result.delivered_count(), 0);
    }
}
