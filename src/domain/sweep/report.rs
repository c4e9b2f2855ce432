//! Expiration sweep report.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    AccessKeyId, CountryCode, ExternalUserId, SubscriptionId, Timestamp, UserId,
};

/// One lapsed entitlement whose key was revoked during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedEntitlement {
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub external_id: Option<ExternalUserId>,
    pub country: CountryCode,
    pub access_key_id: AccessKeyId,
}

/// A row the run could not process. Retried on the next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub subscription_id: SubscriptionId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub started_at: Timestamp,
    pub revoked: Vec<RevokedEntitlement>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn new(started_at: Timestamp) -> Self {
        Self {
            started_at,
            revoked: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record_revoked(&mut self, entry: RevokedEntitlement) {
        self.revoked.push(entry);
    }

    pub fn record_failure(&mut self, subscription_id: SubscriptionId, reason: impl Into<String>) {
        self.failures.push(SweepFailure {
            subscription_id,
            reason: reason.into(),
        });
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }

    /// Summary text sent to the admin chat after a run that revoked keys.
    pub fn admin_summary(&self) -> String {
        let mut text = format!(
            "Expired subscriptions swept at {}\nRevoked keys: {}",
            self.started_at.format_short(),
            self.revoked.len()
        );
        for entry in &self.revoked {
            let who = entry
                .external_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| format!("user #{}", entry.user_id));
            text.push_str(&format!(
                "\n- subscription {} ({}, {})",
                entry.subscription_id,
                who,
                entry.country.label()
            ));
        }
        if !self.failures.is_empty() {
            text.push_str(&format!("\nFailures: {}", self.failures.len()));
            for failure in &self.failures {
                text.push_str(&format!(
                    "\n- subscription {}: {}",
                    failure.subscription_id, failure.reason
                ));
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_summary_lists_revocations_and_failures() {
        let mut report = SweepReport::new(Timestamp::parse_rfc3339("2024-01-02T03:04:00Z").unwrap());
        report.record_revoked(RevokedEntitlement {
            subscription_id: SubscriptionId::new(11),
            user_id: UserId::new(1),
            external_id: Some(ExternalUserId::new(1001)),
            country: CountryCode::new("nl").unwrap(),
            access_key_id: AccessKeyId::new(5),
        });
        report.record_failure(SubscriptionId::new(12), "remote delete failed");

        let summary = report.admin_summary();
        assert!(summary.contains("Revoked keys: 1"));
        assert!(summary.contains("subscription 11 (1001, NL)"));
        assert!(summary.contains("subscription 12: remote delete failed"));
        assert_eq!(report.revoked_count(), 1);
    }
}
