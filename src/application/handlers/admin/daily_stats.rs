//! DailyStatsHandler - Periodic report of the last 24 hours for the admin.
//!
//! The summary goes out as a chat message; the full breakdown follows as
//! a JSON attachment.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::application::{
    EntitlementLedger, NotificationService, PeriodicTask, PromotionLedger, TaskError,
};
use crate::domain::entitlement::SubscriptionKind;
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::ports::UserRepository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromocodeLine {
    pub name: String,
    pub times_used: u32,
    /// 0 means unlimited.
    pub usage_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralLine {
    pub referrer: String,
    pub receiver: String,
    pub used_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStatsResult {
    pub from: Timestamp,
    pub to: Timestamp,
    pub total_users: u64,
    pub active_vpn: u64,
    pub paid_created: usize,
    pub free_created: usize,
    /// Minor units per currency over the paid rows created in the window.
    pub revenue_minor: BTreeMap<String, i64>,
    pub expired: usize,
    pub promocodes: Vec<PromocodeLine>,
    pub referrals: Vec<ReferralLine>,
    #[serde(skip)]
    pub report_delivered: bool,
}

pub struct DailyStatsHandler {
    users: Arc<dyn UserRepository>,
    entitlements: EntitlementLedger,
    promotions: PromotionLedger,
    notifications: NotificationService,
}

impl DailyStatsHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        entitlements: EntitlementLedger,
        promotions: PromotionLedger,
        notifications: NotificationService,
    ) -> Self {
        Self {
            users,
            entitlements,
            promotions,
            notifications,
        }
    }

    pub async fn handle(&self, now: Timestamp) -> Result<DailyStatsResult, DomainError> {
        let from = now.add_days(-1);

        let created = self.entitlements.created_between(from, now).await?;
        let mut paid_created = 0;
        let mut free_created = 0;
        let mut revenue_minor = BTreeMap::new();
        for row in created.iter().filter(|row| row.kind == SubscriptionKind::Vpn) {
            if row.amount_minor > 0 {
                paid_created += 1;
                *revenue_minor.entry(row.currency.clone()).or_insert(0) += row.amount_minor;
            } else {
                free_created += 1;
            }
        }

        let mut names = HashMap::new();
        let mut referrals = Vec::new();
        for usage in self.promotions.referral_usages_between(from, now).await? {
            referrals.push(ReferralLine {
                referrer: self.name_of(&mut names, usage.referrer).await?,
                receiver: self.name_of(&mut names, usage.receiver).await?,
                used_at: usage.used_at,
            });
        }

        let mut result = DailyStatsResult {
            from,
            to: now,
            total_users: self.users.count_all().await?,
            active_vpn: self.entitlements.count_active(SubscriptionKind::Vpn, now).await?,
            paid_created,
            free_created,
            revenue_minor,
            expired: self.entitlements.expiring_between(from, now).await?.len(),
            promocodes: self
                .promotions
                .usage_report()
                .await?
                .into_iter()
                .map(|code| PromocodeLine {
                    name: code.name,
                    times_used: code.times_used,
                    usage_limit: code.usage_limit,
                })
                .collect(),
            referrals,
            report_delivered: false,
        };

        result.report_delivered = self.notifications.notify_admin(&report_text(&result)).await;
        match serde_json::to_vec_pretty(&result) {
            Ok(json) => {
                let filename = format!("daily_stats_{}.json", now.as_datetime().format("%Y-%m-%d"));
                self.notifications
                    .notify_admin_document(&filename, json, Some("Daily stats"))
                    .await;
            }
            Err(e) => warn!(error = %e, "Failed to encode daily stats"),
        }

        info!(
            users = result.total_users,
            active_vpn = result.active_vpn,
            paid = result.paid_created,
            free = result.free_created,
            "Daily stats reported"
        );
        Ok(result)
    }

    async fn name_of(
        &self,
        cache: &mut HashMap<UserId, String>,
        user_id: UserId,
    ) -> Result<String, DomainError> {
        if let Some(name) = cache.get(&user_id) {
            return Ok(name.clone());
        }
        let name = self
            .users
            .find_by_id(user_id)
            .await?
            .map(|user| user.display_name())
            .unwrap_or_else(|| format!("user {}", user_id));
        cache.insert(user_id, name.clone());
        Ok(name)
    }
}

fn report_text(stats: &DailyStatsResult) -> String {
    let revenue = if stats.revenue_minor.is_empty() {
        "0".to_string()
    } else {
        stats
            .revenue_minor
            .iter()
            .map(|(currency, minor)| format!("{}.{:02} {}", minor / 100, minor % 100, currency))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut text = format!(
        "Stats for the last 24h\n\
         Users: {}\n\
         Active VPN: {}\n\
         New paid: {} ({})\n\
         New free: {}\n\
         Expired: {}",
        stats.total_users,
        stats.active_vpn,
        stats.paid_created,
        revenue,
        stats.free_created,
        stats.expired,
    );
    if !stats.referrals.is_empty() {
        text.push_str("\nReferrals:");
        for referral in &stats.referrals {
            text.push_str(&format!("\n{} -> {}", referral.referrer, referral.receiver));
        }
    }
    text
}

#[async_trait]
impl PeriodicTask for DailyStatsHandler {
    fn name(&self) -> &'static str {
        "daily_stats"
    }

    async fn run_once(&self, now: Timestamp) -> Result<String, TaskError> {
        let result = self
            .handle(now)
            .await
            .map_err(|e| TaskError::Failed(e.message))?;
        if self.notifications.admin_chat().is_some() && !result.report_delivered {
            return Err(TaskError::Failed("stats report was not delivered".to_string()));
        }
        Ok(format!(
            "paid {}, free {}",
            result.paid_created, result.free_created
        ))
    }
}
