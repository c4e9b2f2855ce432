//! Expiration Sweep Coordinator - revokes keys of lapsed entitlements.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::entitlement::ExpiredEntitlement;
use crate::domain::foundation::Timestamp;
use crate::domain::sweep::{RevokedEntitlement, SweepError, SweepReport};
use crate::ports::UserRepository;

use super::notifications::key_revoked_text;
use super::scheduler::{PeriodicTask, SingleFlight, TaskError};
use super::{AccessKeyBinder, EntitlementLedger, NotificationService};

/// One sweep over lapsed entitlements that still hold a live key.
#[derive(Clone)]
pub struct ExpirationSweep {
    entitlements: EntitlementLedger,
    binder: AccessKeyBinder,
    users: Arc<dyn UserRepository>,
    notifications: NotificationService,
    in_flight: SingleFlight,
}

impl ExpirationSweep {
    pub fn new(
        entitlements: EntitlementLedger,
        binder: AccessKeyBinder,
        users: Arc<dyn UserRepository>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            entitlements,
            binder,
            users,
            notifications,
            in_flight: SingleFlight::new(),
        }
    }

    /// Runs one sweep.
    ///
    /// A failing row is recorded in the report and the sweep moves on.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` when another sweep holds the flag, or the listing
    /// query failed.
    pub async fn run(&self, now: Timestamp) -> Result<SweepReport, SweepError> {
        let _guard = self.in_flight.try_acquire().ok_or(SweepError::AlreadyRunning)?;

        let expired = self.entitlements.expire(now).await?;
        let mut report = SweepReport::new(now);

        for row in expired {
            let subscription_id = row.subscription_id;
            match self.revoke_one(row, now).await {
                Ok(entry) => report.record_revoked(entry),
                Err(reason) => {
                    warn!(subscription_id = %subscription_id, reason = %reason, "Sweep row failed");
                    report.record_failure(subscription_id, reason);
                }
            }
        }

        info!(
            revoked = report.revoked_count(),
            failures = report.failures.len(),
            "Expiration sweep finished"
        );

        if report.revoked_count() > 0 {
            self.notifications.notify_admin(&report.admin_summary()).await;
        }
        Ok(report)
    }

    async fn revoke_one(
        &self,
        row: ExpiredEntitlement,
        now: Timestamp,
    ) -> Result<RevokedEntitlement, String> {
        let country = row
            .country
            .clone()
            .ok_or_else(|| "subscription has no country".to_string())?;
        if !self.binder.registry().contains(&country) {
            return Err(format!("no provider configured for '{}'", country));
        }

        self.binder
            .revoke(&row.access_key, now)
            .await
            .map_err(|e| e.message())?;

        let external_id = match self.users.find_by_id(row.user_id).await {
            Ok(Some(user)) => {
                let server = self.binder.registry().display_name(&country);
                self.notifications
                    .notify(user.external_id, &key_revoked_text(&server))
                    .await;
                Some(user.external_id)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(user_id = %row.user_id, error = %e, "Failed to look up user for notification");
                None
            }
        };

        Ok(RevokedEntitlement {
            subscription_id: row.subscription_id,
            user_id: row.user_id,
            external_id,
            country,
            access_key_id: row.access_key.id,
        })
    }
}

#[async_trait]
impl PeriodicTask for ExpirationSweep {
    fn name(&self) -> &'static str {
        "expiration_sweep"
    }

    async fn run_once(&self, now: Timestamp) -> Result<String, TaskError> {
        match self.run(now).await {
            Ok(report) => Ok(format!(
                "revoked {}, failed {}",
                report.revoked_count(),
                report.failures.len()
            )),
            Err(SweepError::AlreadyRunning) => Err(TaskError::AlreadyRunning(self.name().to_string())),
            Err(e) => Err(TaskError::Failed(e.message())),
        }
    }
}
