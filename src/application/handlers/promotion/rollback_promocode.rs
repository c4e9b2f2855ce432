//! RollbackPromocodeHandler - Command handler undoing a redemption and the
//! subscription row it granted.
//!
//! A granted row can carry a country and a bound key by the time it is
//! rolled back. The key is revoked unless another active row of the same
//! bucket stays behind, in which case it is re-bound to that row so the
//! expiry sweep still finds it.

use std::sync::Arc;

use tracing::info;

use crate::application::{AccessKeyBinder, EntitlementLedger, PromotionLedger};
use crate::domain::entitlement::Subscription;
use crate::domain::foundation::{ExternalUserId, SubscriptionId, Timestamp, UserId};
use crate::domain::promotion::{PromotionError, RollbackOutcome};
use crate::ports::UserRepository;

#[derive(Debug, Clone)]
pub struct RollbackPromocodeCommand {
    pub external_id: ExternalUserId,
    /// The code to roll back; the newest usage when absent.
    pub code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RollbackPromocodeResult {
    pub outcome: RollbackOutcome,
    pub subscription_deleted: bool,
    /// Set when the deleted row's key was revoked with it.
    pub key_revoked: bool,
}

pub struct RollbackPromocodeHandler {
    users: Arc<dyn UserRepository>,
    promotions: PromotionLedger,
    entitlements: EntitlementLedger,
    binder: AccessKeyBinder,
}

impl RollbackPromocodeHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        promotions: PromotionLedger,
        entitlements: EntitlementLedger,
        binder: AccessKeyBinder,
    ) -> Self {
        Self {
            users,
            promotions,
            entitlements,
            binder,
        }
    }

    pub async fn handle(
        &self,
        cmd: RollbackPromocodeCommand,
    ) -> Result<RollbackPromocodeResult, PromotionError> {
        let now = Timestamp::now();
        let user = self
            .users
            .find_by_external_id(cmd.external_id)
            .await?
            .ok_or_else(|| PromotionError::user_not_found(cmd.external_id))?;

        let outcome = self.promotions.rollback(user.id, cmd.code.as_deref()).await?;
        let (subscription_deleted, key_revoked) = match outcome {
            RollbackOutcome::RolledBack {
                subscription_id: Some(subscription_id),
                ..
            } => self.remove_grant(user.id, subscription_id, now).await?,
            RollbackOutcome::RolledBack {
                subscription_id: None,
                ..
            }
            | RollbackOutcome::NothingToRollback => (false, false),
        };

        info!(
            external_id = %user.external_id,
            ?outcome,
            subscription_deleted,
            key_revoked,
            "Promocode rollback"
        );
        Ok(RollbackPromocodeResult {
            outcome,
            subscription_deleted,
            key_revoked,
        })
    }

    /// Deletes the granted row and settles its key. Returns
    /// `(deleted, key_revoked)`.
    async fn remove_grant(
        &self,
        user_id: UserId,
        subscription_id: SubscriptionId,
        now: Timestamp,
    ) -> Result<(bool, bool), PromotionError> {
        let grant = match self.entitlements.find_optional(subscription_id).await? {
            Some(row) if row.user_id == user_id && row.is_promocode_issued() => row,
            _ => return Ok((false, false)),
        };
        let covered = self.other_active_row(&grant, now).await?;

        // Revoke before deleting so a failed remote call leaves the row in place.
        let mut key_revoked = false;
        let bound_key = match (&grant.access_key_id, &grant.country) {
            (Some(key_id), Some(country)) => self
                .binder
                .get_active(user_id, country)
                .await?
                .filter(|key| key.id == *key_id),
            _ => None,
        };
        if let (Some(key), false) = (&bound_key, covered) {
            self.binder.revoke(key, now).await?;
            key_revoked = true;
        }

        let deleted = self
            .entitlements
            .delete_promocode_subscription(user_id, subscription_id)
            .await?
            .is_some();

        if let (Some(key), true) = (&bound_key, covered) {
            self.entitlements
                .attach_access_key(user_id, grant.kind, grant.country.as_ref(), key.id)
                .await?;
        }
        Ok((deleted, key_revoked))
    }

    async fn other_active_row(&self, grant: &Subscription, now: Timestamp) -> Result<bool, PromotionError> {
        Ok(self
            .entitlements
            .list_for_user(grant.user_id)
            .await?
            .iter()
            .any(|row| {
                row.id != grant.id
                    && row.in_bucket(grant.kind, grant.country.as_ref())
                    && row.is_active_at(&now)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::entitlement::{
        AssignPromocodeCountryCommand, AssignPromocodeCountryHandler,
    };
    use crate::application::handlers::promotion::{RedeemPromocodeCommand, RedeemPromocodeHandler};
    use crate::application::handlers::test_support::{nl, TestContext};
    use crate::application::handlers::{IssueKeyCommand, IssueKeyHandler, IssueKeyOutcome};
    use crate::domain::promotion::{NewPromocode, Promocode};
    use crate::ports::PromocodeRepository;

    async fn promocode(ctx: &TestContext, name: &str, months: u32) -> Promocode {
        ctx.store
            .insert_or_get(&NewPromocode {
                name: name.to_string(),
                promoted_by: None,
                usage_limit: 0,
                months,
                allow_for_old_users: true,
            })
            .await
            .unwrap()
    }

    async fn redeem(ctx: &TestContext, external_id: ExternalUserId, code: &str) -> Subscription {
        RedeemPromocodeHandler::new(
            Arc::new(ctx.store.clone()),
            ctx.promotions.clone(),
            ctx.entitlements.clone(),
            ctx.notifications.clone(),
            ctx.payments.clone(),
        )
        .handle(RedeemPromocodeCommand {
            external_id,
            code: code.to_string(),
        })
        .await
        .unwrap()
        .subscription
        .unwrap()
    }

    async fn rollback(
        ctx: &TestContext,
        external_id: ExternalUserId,
        code: Option<&str>,
    ) -> RollbackPromocodeResult {
        RollbackPromocodeHandler::new(
            Arc::new(ctx.store.clone()),
            ctx.promotions.clone(),
            ctx.entitlements.clone(),
            ctx.binder.clone(),
        )
        .handle(RollbackPromocodeCommand {
            external_id,
            code: code.map(str::to_string),
        })
        .await
        .unwrap()
    }

    async fn bind_nl_key(ctx: &TestContext, external_id: ExternalUserId) -> crate::domain::access::AccessKey {
        AssignPromocodeCountryHandler::new(Arc::new(ctx.store.clone()), ctx.entitlements.clone())
            .handle(AssignPromocodeCountryCommand {
                external_id,
                country: "nl".to_string(),
            })
            .await
            .unwrap();
        let outcome = IssueKeyHandler::new(
            Arc::new(ctx.store.clone()),
            ctx.entitlements.clone(),
            ctx.binder.clone(),
        )
        .handle(IssueKeyCommand {
            external_id,
            country: "nl".to_string(),
        })
        .await
        .unwrap();
        match outcome {
            IssueKeyOutcome::Issued { key, .. } => key,
            other => panic!("expected a key, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rollback_removes_usage_and_subscription() {
        let ctx = TestContext::new();
        let user = ctx.user(1).await;
        let promo = promocode(&ctx, "spring", 1).await;
        let granted = redeem(&ctx, user.external_id, "spring").await;
        assert_eq!(ctx.store.subscription_count().await, 1);

        let result = rollback(&ctx, user.external_id, None).await;

        assert_eq!(
            result.outcome,
            RollbackOutcome::RolledBack {
                promocode_id: promo.id,
                subscription_id: Some(granted.id),
            }
        );
        assert!(result.subscription_deleted);
        assert!(!result.key_revoked);
        assert_eq!(ctx.store.subscription_count().await, 0);
        assert!(!ctx.store.has_used(promo.id, user.id).await.unwrap());
    }

    #[tokio::test]
    async fn rollback_of_named_code_deletes_only_its_grant() {
        let ctx = TestContext::new();
        let user = ctx.user(1).await;
        let alpha = promocode(&ctx, "alpha", 1).await;
        let beta = promocode(&ctx, "beta", 6).await;
        let alpha_row = redeem(&ctx, user.external_id, "alpha").await;
        let beta_row = redeem(&ctx, user.external_id, "beta").await;

        let result = rollback(&ctx, user.external_id, Some("alpha")).await;

        assert_eq!(
            result.outcome,
            RollbackOutcome::RolledBack {
                promocode_id: alpha.id,
                subscription_id: Some(alpha_row.id),
            }
        );
        let remaining = ctx.entitlements.list_for_user(user.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, beta_row.id);
        assert_eq!(remaining[0].active_until, beta_row.active_until);
        assert!(ctx.store.has_used(beta.id, user.id).await.unwrap());
        assert!(!ctx.store.has_used(alpha.id, user.id).await.unwrap());
    }

    #[tokio::test]
    async fn rollback_revokes_key_bound_to_deleted_grant() {
        let ctx = TestContext::new();
        let user = ctx.user(1).await;
        promocode(&ctx, "spring", 1).await;
        redeem(&ctx, user.external_id, "spring").await;
        bind_nl_key(&ctx, user.external_id).await;
        assert_eq!(ctx.store.live_key_count().await, 1);

        let result = rollback(&ctx, user.external_id, None).await;

        assert!(result.subscription_deleted);
        assert!(result.key_revoked);
        assert_eq!(ctx.store.live_key_count().await, 0);
        assert_eq!(ctx.store.subscription_count().await, 0);
        let far_future = Timestamp::now().add_days(400);
        assert!(ctx.entitlements.expire(far_future).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rollback_rebinds_key_when_paid_row_covers_country() {
        let ctx = TestContext::new();
        let user = ctx.user(1).await;
        ctx.paid_vpn(&user, Some(nl()), Timestamp::now()).await;
        promocode(&ctx, "spring", 1).await;
        redeem(&ctx, user.external_id, "spring").await;
        let key = bind_nl_key(&ctx, user.external_id).await;

        let result = rollback(&ctx, user.external_id, None).await;

        assert!(result.subscription_deleted);
        assert!(!result.key_revoked);
        assert_eq!(ctx.store.live_key_count().await, 1);
        let remaining = ctx.entitlements.list_for_user(user.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].access_key_id, Some(key.id));
        let far_future = Timestamp::now().add_days(400);
        let expired = ctx.entitlements.expire(far_future).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].access_key.id, key.id);
    }

    #[tokio::test]
    async fn nothing_to_rollback_keeps_subscriptions() {
        let ctx = TestContext::new();
        let user = ctx.user(1).await;
        ctx.paid_vpn(&user, None, Timestamp::now()).await;

        let result = rollback(&ctx, user.external_id, None).await;

        assert_eq!(result.outcome, RollbackOutcome::NothingToRollback);
        assert!(!result.subscription_deleted);
        assert_eq!(ctx.store.subscription_count().await, 1);
    }
}
