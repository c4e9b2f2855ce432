//! Promotion & Referral Ledger - promocode counters and eligibility.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::entitlement::SubscriptionKind;
use crate::domain::foundation::{ErrorCode, PromocodeId, SubscriptionId, Timestamp, UserId};
use crate::domain::promotion::{
    new_referral_promocode, normalize_code, EligibilityPolicy, Promocode, PromotionError,
    Redemption, RedemptionDenial, RedemptionOutcome, ReferralUsage, RollbackOutcome,
};
use crate::ports::PromocodeRepository;

use super::EntitlementLedger;

/// Service over promocodes and their usages.
#[derive(Clone)]
pub struct PromotionLedger {
    promocodes: Arc<dyn PromocodeRepository>,
    entitlements: EntitlementLedger,
    policy: EligibilityPolicy,
}

impl PromotionLedger {
    pub fn new(
        promocodes: Arc<dyn PromocodeRepository>,
        entitlements: EntitlementLedger,
        policy: EligibilityPolicy,
    ) -> Self {
        Self {
            promocodes,
            entitlements,
            policy,
        }
    }

    pub fn policy(&self) -> EligibilityPolicy {
        self.policy
    }

    /// Validates and consumes one use of `code` for `user_id`.
    ///
    /// Checks run in a fixed order: existence, self-referral, prior use,
    /// usage limit, then eligibility. Policy rejections come back as
    /// [`RedemptionOutcome::Denied`]; only store failures are errors.
    pub async fn redeem(
        &self,
        code: &str,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<RedemptionOutcome, PromotionError> {
        let name = match normalize_code(code) {
            Ok(name) => name,
            Err(_) => return Ok(RedemptionOutcome::denied(RedemptionDenial::EmptyCode)),
        };

        let promocode = match self.promocodes.find_by_name(&name).await? {
            Some(promocode) => promocode,
            None => return Ok(RedemptionOutcome::denied(RedemptionDenial::NotFound)),
        };

        if let Some(reason) = self.denial_for(&promocode, user_id, now).await? {
            debug!(user_id = %user_id, promocode = %promocode.name, ?reason, "Promocode denied");
            return Ok(RedemptionOutcome::denied(reason));
        }

        // The limit is re-checked inside the increment itself.
        if !self.promocodes.try_increment_usage(promocode.id, now).await? {
            return Ok(RedemptionOutcome::denied(RedemptionDenial::LimitReached));
        }

        if let Err(e) = self.promocodes.insert_usage(promocode.id, user_id, now).await {
            if let Err(undo) = self.promocodes.decrement_usage(promocode.id).await {
                warn!(
                    promocode_id = %promocode.id,
                    error = %undo,
                    "Failed to undo usage increment"
                );
            }
            return match e.code {
                ErrorCode::Conflict => Ok(RedemptionOutcome::denied(RedemptionDenial::AlreadyUsed)),
                _ => Err(e.into()),
            };
        }

        info!(
            user_id = %user_id,
            promocode_id = %promocode.id,
            promocode = %promocode.name,
            months = promocode.months,
            "Promocode redeemed"
        );
        let months = promocode.months;
        Ok(RedemptionOutcome::Granted(Redemption { promocode, months }))
    }

    async fn denial_for(
        &self,
        promocode: &Promocode,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<Option<RedemptionDenial>, PromotionError> {
        if promocode.is_owned_by(user_id) {
            return Ok(Some(RedemptionDenial::OwnCode));
        }
        if self.promocodes.has_used(promocode.id, user_id).await? {
            return Ok(Some(RedemptionDenial::AlreadyUsed));
        }
        if promocode.limit_reached() {
            return Ok(Some(RedemptionDenial::LimitReached));
        }
        if !promocode.allow_for_old_users && self.is_existing_customer(user_id, now).await? {
            return Ok(Some(RedemptionDenial::NewUsersOnly));
        }
        Ok(None)
    }

    async fn is_existing_customer(
        &self,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<bool, PromotionError> {
        let existing = match self.policy {
            EligibilityPolicy::EverHad => {
                self.entitlements
                    .has_ever_had(user_id, SubscriptionKind::Vpn)
                    .await?
            }
            EligibilityPolicy::CurrentlyActive => {
                self.entitlements
                    .has_any_active(user_id, SubscriptionKind::Vpn, now)
                    .await?
            }
        };
        Ok(existing)
    }

    /// Undoes a redemption: the named code, or the user's newest usage.
    ///
    /// The outcome names the subscription the redemption granted; deleting
    /// it is left to the caller.
    pub async fn rollback(
        &self,
        user_id: UserId,
        code: Option<&str>,
    ) -> Result<RollbackOutcome, PromotionError> {
        let promocode_id = match code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(raw) => {
                let name = normalize_code(raw)?;
                self.promocodes
                    .find_by_name(&name)
                    .await?
                    .ok_or_else(|| PromotionError::promocode_not_found(name))?
                    .id
            }
            None => match self.promocodes.last_used_by(user_id).await? {
                Some(id) => id,
                None => return Ok(RollbackOutcome::NothingToRollback),
            },
        };

        let Some(usage) = self.promocodes.delete_usage(promocode_id, user_id).await? else {
            return Ok(RollbackOutcome::NothingToRollback);
        };
        self.promocodes.decrement_usage(promocode_id).await?;

        info!(
            user_id = %user_id,
            promocode_id = %promocode_id,
            subscription_id = ?usage.subscription_id,
            "Promocode usage rolled back"
        );
        Ok(RollbackOutcome::RolledBack {
            promocode_id,
            subscription_id: usage.subscription_id,
        })
    }

    /// Links a redemption to the subscription it granted.
    pub async fn link_grant(
        &self,
        promocode_id: PromocodeId,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<(), PromotionError> {
        if self
            .promocodes
            .link_usage_subscription(promocode_id, user_id, subscription_id)
            .await?
        {
            Ok(())
        } else {
            Err(PromotionError::infrastructure(format!(
                "No usage of promocode {} by user {} to link",
                promocode_id, user_id
            )))
        }
    }

    /// The user's referral code, created on first request.
    pub async fn get_or_create_referral_code(
        &self,
        user_id: UserId,
    ) -> Result<Promocode, PromotionError> {
        Ok(self
            .promocodes
            .insert_or_get(&new_referral_promocode(user_id))
            .await?)
    }

    /// Codes used at least once, most used first.
    pub async fn usage_report(&self) -> Result<Vec<Promocode>, PromotionError> {
        Ok(self.promocodes.list_with_usage().await?)
    }

    /// Referral redemptions in `[from, to)`, oldest first.
    pub async fn referral_usages_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<ReferralUsage>, PromotionError> {
        Ok(self.promocodes.referral_usages_between(from, to).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::entitlement::{ChargeRefs, PaidSubscriptionRequest};
    use crate::domain::foundation::CountryCode;
    use crate::domain::promotion::{referral_code_name, NewPromocode};

    fn ledger(policy: EligibilityPolicy) -> (PromotionLedger, InMemoryStore) {
        let store = InMemoryStore::new();
        let entitlements = EntitlementLedger::new(Arc::new(store.clone()));
        (
            PromotionLedger::new(Arc::new(store.clone()), entitlements, policy),
            store,
        )
    }

    async fn seed(store: &InMemoryStore, name: &str, limit: u32, old_users: bool) -> Promocode {
        store
            .insert_or_get(&NewPromocode {
                name: name.to_string(),
                promoted_by: None,
                usage_limit: limit,
                months: 2,
                allow_for_old_users: old_users,
            })
            .await
            .unwrap()
    }

    async fn give_expired_vpn(store: &InMemoryStore, user: UserId) {
        let sub = EntitlementLedger::new(Arc::new(store.clone()))
            .mark_paid(
                PaidSubscriptionRequest {
                    user_id: user,
                    kind: SubscriptionKind::Vpn,
                    country: Some(CountryCode::new("nl").unwrap()),
                    provider: "telegram".to_string(),
                    amount_minor: 100,
                    currency: "RUB".to_string(),
                    charge_refs: ChargeRefs::default(),
                    months: None,
                    access_key_id: None,
                    paid_at: Timestamp::now(),
                },
                Timestamp::now(),
            )
            .await
            .unwrap();
        store
            .set_active_until(sub.id, Timestamp::now().add_days(-3))
            .await;
    }

    fn denial(outcome: RedemptionOutcome) -> RedemptionDenial {
        match outcome {
            RedemptionOutcome::Denied { reason } => reason,
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_code_is_denied() {
        let (ledger, _) = ledger(EligibilityPolicy::EverHad);
        let outcome = ledger.redeem("  ", UserId::new(1), Timestamp::now()).await.unwrap();
        assert_eq!(denial(outcome), RedemptionDenial::EmptyCode);
    }

    #[tokio::test]
    async fn unknown_code_is_denied() {
        let (ledger, _) = ledger(EligibilityPolicy::EverHad);
        let outcome = ledger.redeem("nope", UserId::new(1), Timestamp::now()).await.unwrap();
        assert_eq!(denial(outcome), RedemptionDenial::NotFound);
    }

    #[tokio::test]
    async fn redeem_matches_case_insensitively_and_only_once() {
        let (ledger, store) = ledger(EligibilityPolicy::EverHad);
        seed(&store, "spring", 0, true).await;
        let user = UserId::new(1);

        let first = ledger.redeem(" SPRING ", user, Timestamp::now()).await.unwrap();
        let second = ledger.redeem("spring", user, Timestamp::now()).await.unwrap();

        match first {
            RedemptionOutcome::Granted(redemption) => assert_eq!(redemption.months, 2),
            other => panic!("expected grant, got {:?}", other),
        }
        assert_eq!(denial(second), RedemptionDenial::AlreadyUsed);
    }

    #[tokio::test]
    async fn own_referral_code_is_denied_before_other_checks() {
        let (ledger, _) = ledger(EligibilityPolicy::EverHad);
        let owner = UserId::new(5);
        let code = ledger.get_or_create_referral_code(owner).await.unwrap();

        let outcome = ledger.redeem(&code.name, owner, Timestamp::now()).await.unwrap();
        assert_eq!(denial(outcome), RedemptionDenial::OwnCode);
    }

    #[tokio::test]
    async fn limit_reached_is_denied() {
        let (ledger, store) = ledger(EligibilityPolicy::EverHad);
        seed(&store, "one-shot", 1, true).await;

        ledger.redeem("one-shot", UserId::new(1), Timestamp::now()).await.unwrap();
        let outcome = ledger.redeem("one-shot", UserId::new(2), Timestamp::now()).await.unwrap();

        assert_eq!(denial(outcome), RedemptionDenial::LimitReached);
    }

    #[tokio::test]
    async fn ever_had_policy_denies_lapsed_customers() {
        let (ledger, store) = ledger(EligibilityPolicy::EverHad);
        seed(&store, "welcome", 0, false).await;
        give_expired_vpn(&store, UserId::new(1)).await;

        let outcome = ledger.redeem("welcome", UserId::new(1), Timestamp::now()).await.unwrap();
        assert_eq!(denial(outcome), RedemptionDenial::NewUsersOnly);
    }

    #[tokio::test]
    async fn currently_active_policy_admits_lapsed_customers() {
        let (ledger, store) = ledger(EligibilityPolicy::CurrentlyActive);
        seed(&store, "welcome", 0, false).await;
        give_expired_vpn(&store, UserId::new(1)).await;

        let outcome = ledger.redeem("welcome", UserId::new(1), Timestamp::now()).await.unwrap();
        assert!(outcome.is_granted());
    }

    #[tokio::test]
    async fn rollback_restores_counter_and_allows_reuse() {
        let (ledger, store) = ledger(EligibilityPolicy::EverHad);
        let seeded = seed(&store, "spring", 0, true).await;
        let user = UserId::new(1);
        ledger.redeem("spring", user, Timestamp::now()).await.unwrap();

        ledger
            .link_grant(seeded.id, user, SubscriptionId::new(500))
            .await
            .unwrap();

        let outcome = ledger.rollback(user, None).await.unwrap();
        assert_eq!(
            outcome,
            RollbackOutcome::RolledBack {
                promocode_id: seeded.id,
                subscription_id: Some(SubscriptionId::new(500)),
            }
        );
        let reloaded = store.find_by_id(seeded.id).await.unwrap().unwrap();
        assert_eq!(reloaded.times_used, 0);

        let again = ledger.redeem("spring", user, Timestamp::now()).await.unwrap();
        assert!(again.is_granted());
    }

    #[tokio::test]
    async fn rollback_without_usage_is_noop() {
        let (ledger, store) = ledger(EligibilityPolicy::EverHad);
        seed(&store, "spring", 0, true).await;

        assert_eq!(
            ledger.rollback(UserId::new(1), None).await.unwrap(),
            RollbackOutcome::NothingToRollback
        );
        assert_eq!(
            ledger.rollback(UserId::new(1), Some("spring")).await.unwrap(),
            RollbackOutcome::NothingToRollback
        );
    }

    #[tokio::test]
    async fn linking_without_usage_fails() {
        let (ledger, store) = ledger(EligibilityPolicy::EverHad);
        let seeded = seed(&store, "spring", 0, true).await;

        let err = ledger
            .link_grant(seeded.id, UserId::new(1), SubscriptionId::new(1))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn rollback_of_unknown_code_is_not_found() {
        let (ledger, _) = ledger(EligibilityPolicy::EverHad);
        let err = ledger.rollback(UserId::new(1), Some("ghost")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PromocodeNotFound);
    }

    #[tokio::test]
    async fn referral_code_is_idempotent() {
        let (ledger, _) = ledger(EligibilityPolicy::EverHad);
        let first = ledger.get_or_create_referral_code(UserId::new(3)).await.unwrap();
        let second = ledger.get_or_create_referral_code(UserId::new(3)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.name, referral_code_name(UserId::new(3)));
        assert_eq!(first.promoted_by, Some(UserId::new(3)));
    }

    #[tokio::test]
    async fn usage_report_lists_used_codes_only() {
        let (ledger, store) = ledger(EligibilityPolicy::EverHad);
        seed(&store, "used", 0, true).await;
        seed(&store, "unused", 0, true).await;
        ledger.redeem("used", UserId::new(1), Timestamp::now()).await.unwrap();

        let report = ledger.usage_report().await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].name, "used");
    }
}
