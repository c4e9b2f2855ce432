//! ValidateRenewalHandler - Query handler deciding whether a subscription
//! can still be renewed in place.
//!
//! Renewal keeps the bound access key, so a row whose key was revoked or
//! replaced must be bought anew instead.

use std::sync::Arc;

use serde::Serialize;

use crate::application::EntitlementLedger;
use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::SubscriptionId;
use crate::ports::AccessKeyRepository;

/// Query for renewal validity.
#[derive(Debug, Clone)]
pub struct ValidateRenewalQuery {
    pub subscription_id: SubscriptionId,
}

/// Why a subscription cannot be renewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalInvalidReason {
    SubscriptionNotFound,
    MissingCountry,
    KeyRevoked,
    KeyChanged,
}

/// Renewal validity verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RenewalValidity {
    Valid,
    Invalid { reason: RenewalInvalidReason },
}

impl RenewalValidity {
    fn invalid(reason: RenewalInvalidReason) -> Self {
        RenewalValidity::Invalid { reason }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, RenewalValidity::Valid)
    }
}

/// Handler for renewal validity checks.
pub struct ValidateRenewalHandler {
    entitlements: EntitlementLedger,
    keys: Arc<dyn AccessKeyRepository>,
}

impl ValidateRenewalHandler {
    pub fn new(entitlements: EntitlementLedger, keys: Arc<dyn AccessKeyRepository>) -> Self {
        Self { entitlements, keys }
    }

    pub async fn handle(
        &self,
        query: ValidateRenewalQuery,
    ) -> Result<RenewalValidity, EntitlementError> {
        let subscription = match self.entitlements.find_optional(query.subscription_id).await? {
            Some(subscription) => subscription,
            None => return Ok(RenewalValidity::invalid(RenewalInvalidReason::SubscriptionNotFound)),
        };

        // Nothing bound yet: the renewed row will get a key on issue.
        let bound_key = match subscription.access_key_id {
            Some(id) => id,
            None => return Ok(RenewalValidity::Valid),
        };

        let country = match subscription.country.as_ref() {
            Some(country) => country,
            None => return Ok(RenewalValidity::invalid(RenewalInvalidReason::MissingCountry)),
        };

        match self.keys.find_live(subscription.user_id, country).await? {
            None => Ok(RenewalValidity::invalid(RenewalInvalidReason::KeyRevoked)),
            Some(live) if live.id != bound_key => {
                Ok(RenewalValidity::invalid(RenewalInvalidReason::KeyChanged))
            }
            Some(_) => Ok(RenewalValidity::Valid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::{nl, TestContext};
    use crate::domain::foundation::Timestamp;

    fn handler(ctx: &TestContext) -> ValidateRenewalHandler {
        ValidateRenewalHandler::new(ctx.entitlements.clone(), Arc::new(ctx.store.clone()))
    }

    async fn check(ctx: &TestContext, id: SubscriptionId) -> RenewalValidity {
        handler(ctx)
            .handle(ValidateRenewalQuery { subscription_id: id })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_subscription_is_invalid() {
        let ctx = TestContext::new();
        assert_eq!(
            check(&ctx, SubscriptionId::new(77)).await,
            RenewalValidity::invalid(RenewalInvalidReason::SubscriptionNotFound)
        );
    }

    #[tokio::test]
    async fn unbound_subscription_is_valid() {
        let ctx = TestContext::new();
        let user = ctx.user(1).await;
        let sub = ctx.paid_vpn(&user, Some(nl()), Timestamp::now()).await;

        assert!(check(&ctx, sub.id).await.is_valid());
    }

    #[tokio::test]
    async fn bound_live_key_is_valid_until_revoked_or_replaced() {
        let ctx = TestContext::new();
        let user = ctx.user(1).await;
        let key = ctx
            .binder
            .issue(user.id, &nl(), "tg:1:nl", Timestamp::now())
            .await
            .unwrap();
        let sub = ctx.paid_vpn(&user, Some(nl()), Timestamp::now()).await;
        ctx.entitlements
            .attach_access_key(user.id, sub.kind, Some(&nl()), key.id)
            .await
            .unwrap();
        assert!(check(&ctx, sub.id).await.is_valid());

        ctx.binder.revoke(&key, Timestamp::now()).await.unwrap();
        assert_eq!(
            check(&ctx, sub.id).await,
            RenewalValidity::invalid(RenewalInvalidReason::KeyRevoked)
        );

        ctx.binder
            .issue(user.id, &nl(), "tg:1:nl", Timestamp::now())
            .await
            .unwrap();
        assert_eq!(
            check(&ctx, sub.id).await,
            RenewalValidity::invalid(RenewalInvalidReason::KeyChanged)
        );
    }
}
