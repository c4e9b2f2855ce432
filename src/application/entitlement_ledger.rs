//! Entitlement Ledger - subscription rows and their period arithmetic.
//!
//! The repository performs each write as one atomic store operation; the
//! ledger adds ownership checks and maps port failures into
//! [`EntitlementError`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::entitlement::{
    ActiveUntil, EntitlementError, ExpiredEntitlement, PaidSubscriptionRequest, Subscription,
    SubscriptionKind,
};
use crate::domain::foundation::{
    AccessKeyId, CountryCode, ErrorCode, SubscriptionId, Timestamp, UserId,
};
use crate::domain::promotion::REFERRAL_BONUS_MONTHS;
use crate::ports::{Extension, SubscriptionRepository};

/// Service over the subscription store.
#[derive(Clone)]
pub struct EntitlementLedger {
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl EntitlementLedger {
    pub fn new(subscriptions: Arc<dyn SubscriptionRepository>) -> Self {
        Self { subscriptions }
    }

    /// Latest `active_until` of the (user, kind, country) bucket and whether
    /// it lies strictly after `now`. `None` when the bucket is empty.
    pub async fn active_until(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        country: Option<&CountryCode>,
        now: Timestamp,
    ) -> Result<Option<ActiveUntil>, EntitlementError> {
        let latest = self
            .subscriptions
            .latest_active_until(user_id, kind, country)
            .await?;
        Ok(latest.map(|until| ActiveUntil::at(until, &now)))
    }

    /// Any active row of this kind, in any country.
    pub async fn has_any_active(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        now: Timestamp,
    ) -> Result<bool, EntitlementError> {
        Ok(self.subscriptions.has_any_active(user_id, kind, now).await?)
    }

    /// Any paid row of this kind, expired or not.
    pub async fn has_ever_had(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
    ) -> Result<bool, EntitlementError> {
        Ok(self.subscriptions.has_ever_had(user_id, kind).await?)
    }

    /// Records a payment as a new paid row.
    ///
    /// The new window starts at `max(now, current active_until)` of the
    /// bucket, so early payments stack instead of overlapping.
    pub async fn mark_paid(
        &self,
        request: PaidSubscriptionRequest,
        now: Timestamp,
    ) -> Result<Subscription, EntitlementError> {
        let request = request.validated()?;
        let subscription = self.subscriptions.insert_paid(&request, now).await?;

        info!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            kind = %subscription.kind,
            country = subscription.country.as_ref().map(CountryCode::as_str).unwrap_or("-"),
            active_until = %subscription.active_until.format_short(),
            "Subscription marked paid"
        );
        Ok(subscription)
    }

    /// Extends one row in place by `months`.
    pub async fn renew(
        &self,
        subscription_id: SubscriptionId,
        months: u32,
    ) -> Result<Extension, EntitlementError> {
        let extension = self
            .subscriptions
            .extend(subscription_id, months)
            .await
            .map_err(|e| match e.code {
                ErrorCode::SubscriptionNotFound => {
                    EntitlementError::subscription_not_found(subscription_id)
                }
                _ => EntitlementError::from(e),
            })?;

        info!(
            subscription_id = %subscription_id,
            months,
            old_until = %extension.old_until.format_short(),
            new_until = %extension.new_until.format_short(),
            "Subscription renewed"
        );
        Ok(extension)
    }

    /// Renewal on behalf of a user; the row must belong to them.
    pub async fn renew_owned(
        &self,
        user_id: UserId,
        subscription_id: SubscriptionId,
        months: u32,
    ) -> Result<(Subscription, Extension), EntitlementError> {
        let subscription = self.find(subscription_id).await?;
        if subscription.user_id != user_id {
            return Err(EntitlementError::not_owner(subscription_id, user_id));
        }
        let extension = self.renew(subscription_id, months).await?;
        Ok((subscription, extension))
    }

    /// Adds one month to the referrer's currently most-active row.
    ///
    /// # Errors
    ///
    /// `NoActiveSubscription` when the referrer has nothing active to extend.
    pub async fn credit_referral_bonus(
        &self,
        referrer: UserId,
        kind: SubscriptionKind,
        now: Timestamp,
    ) -> Result<Extension, EntitlementError> {
        let extension = self
            .subscriptions
            .extend_most_active(referrer, kind, REFERRAL_BONUS_MONTHS, now)
            .await?
            .ok_or_else(|| EntitlementError::no_active_subscription(referrer))?;

        info!(
            referrer = %referrer,
            subscription_id = %extension.subscription_id,
            new_until = %extension.new_until.format_short(),
            "Referral bonus credited"
        );
        Ok(extension)
    }

    /// Sets the country of the newest country-less promocode row. Returns
    /// false (and changes nothing) when there is no such row.
    pub async fn assign_country(
        &self,
        user_id: UserId,
        country: &CountryCode,
    ) -> Result<bool, EntitlementError> {
        let assigned = self
            .subscriptions
            .assign_promocode_country(user_id, country)
            .await?;
        debug!(user_id = %user_id, country = %country, assigned, "Promocode country assignment");
        Ok(assigned)
    }

    /// Lapsed vpn rows whose bound key is still live, oldest first.
    pub async fn expire(&self, now: Timestamp) -> Result<Vec<ExpiredEntitlement>, EntitlementError> {
        Ok(self.subscriptions.find_expired_with_live_keys(now).await?)
    }

    /// The user's rows, newest first.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Subscription>, EntitlementError> {
        Ok(self.subscriptions.list_by_user(user_id).await?)
    }

    pub async fn find(&self, subscription_id: SubscriptionId) -> Result<Subscription, EntitlementError> {
        self.subscriptions
            .find_by_id(subscription_id)
            .await?
            .ok_or_else(|| EntitlementError::subscription_not_found(subscription_id))
    }

    pub async fn find_optional(
        &self,
        subscription_id: SubscriptionId,
    ) -> Result<Option<Subscription>, EntitlementError> {
        Ok(self.subscriptions.find_by_id(subscription_id).await?)
    }

    /// Paid vpn rows with `from <= active_until < to`.
    pub async fn expiring_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Subscription>, EntitlementError> {
        Ok(self.subscriptions.find_expiring_between(from, to).await?)
    }

    /// Rows of every kind created in `[from, to)`, oldest first.
    pub async fn created_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Subscription>, EntitlementError> {
        Ok(self.subscriptions.list_created_between(from, to).await?)
    }

    pub async fn count_active(
        &self,
        kind: SubscriptionKind,
        now: Timestamp,
    ) -> Result<u64, EntitlementError> {
        Ok(self.subscriptions.count_active(kind, now).await?)
    }

    /// The user's most recently paid row of `kind`.
    pub async fn latest_paid_of_kind(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
    ) -> Result<Option<Subscription>, EntitlementError> {
        Ok(self.subscriptions.latest_paid_of_kind(user_id, kind).await?)
    }

    /// Deletes a promocode-issued row of the user; `None` when there is no
    /// such row.
    pub async fn delete_promocode_subscription(
        &self,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<Option<Subscription>, EntitlementError> {
        Ok(self
            .subscriptions
            .delete_promocode_subscription(user_id, subscription_id)
            .await?)
    }

    /// Binds a key to the newest row of the bucket.
    ///
    /// This is the one write into subscriptions made on behalf of the
    /// access-key binder.
    pub async fn attach_access_key(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        country: Option<&CountryCode>,
        key_id: AccessKeyId,
    ) -> Result<bool, EntitlementError> {
        Ok(self
            .subscriptions
            .attach_access_key(user_id, kind, country, key_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::entitlement::ChargeRefs;

    fn ts(value: &str) -> Timestamp {
        Timestamp::parse_rfc3339(value).unwrap()
    }

    fn nl() -> CountryCode {
        CountryCode::new("nl").unwrap()
    }

    fn request(user: i64, country: Option<CountryCode>, months: Option<u32>) -> PaidSubscriptionRequest {
        PaidSubscriptionRequest {
            user_id: UserId::new(user),
            kind: SubscriptionKind::Vpn,
            country,
            provider: "telegram".to_string(),
            amount_minor: 15000,
            currency: "rub".to_string(),
            charge_refs: ChargeRefs::new(Some("tg_1".to_string()), None),
            months,
            access_key_id: None,
            paid_at: ts("2024-03-01T00:00:00Z"),
        }
    }

    fn ledger() -> (EntitlementLedger, InMemoryStore) {
        let store = InMemoryStore::new();
        (EntitlementLedger::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn empty_bucket_has_no_active_until() {
        let (ledger, _) = ledger();
        let result = ledger
            .active_until(UserId::new(1), SubscriptionKind::Vpn, Some(&nl()), Timestamp::now())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn mark_paid_normalizes_currency() {
        let (ledger, _) = ledger();
        let sub = ledger
            .mark_paid(request(1, Some(nl()), None), ts("2024-03-01T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(sub.currency, "RUB");
        assert_eq!(sub.active_until, ts("2024-04-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn mark_paid_rejects_blank_currency() {
        let (ledger, store) = ledger();
        let mut bad = request(1, Some(nl()), None);
        bad.currency = " ".to_string();

        let err = ledger.mark_paid(bad, Timestamp::now()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert_eq!(store.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn renew_unknown_subscription_is_not_found() {
        let (ledger, _) = ledger();
        let err = ledger.renew(SubscriptionId::new(404), 1).await.unwrap_err();
        assert_eq!(err, EntitlementError::subscription_not_found(SubscriptionId::new(404)));
    }

    #[tokio::test]
    async fn renew_owned_rejects_foreign_subscription() {
        let (ledger, _) = ledger();
        let sub = ledger
            .mark_paid(request(1, Some(nl()), None), ts("2024-03-01T00:00:00Z"))
            .await
            .unwrap();

        let err = ledger
            .renew_owned(UserId::new(2), sub.id, 1)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn renew_adds_months_to_existing_until() {
        let (ledger, _) = ledger();
        let sub = ledger
            .mark_paid(request(1, Some(nl()), None), ts("2024-03-01T00:00:00Z"))
            .await
            .unwrap();

        let (_, extension) = ledger.renew_owned(UserId::new(1), sub.id, 1).await.unwrap();
        assert_eq!(extension.old_until, ts("2024-04-01T00:00:00Z"));
        assert_eq!(extension.new_until, ts("2024-05-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn referral_bonus_requires_active_row() {
        let (ledger, _) = ledger();
        let err = ledger
            .credit_referral_bonus(UserId::new(9), SubscriptionKind::Vpn, Timestamp::now())
            .await
            .unwrap_err();
        assert_eq!(err, EntitlementError::no_active_subscription(UserId::new(9)));
    }

    #[tokio::test]
    async fn assign_country_without_promocode_row_is_noop() {
        let (ledger, _) = ledger();
        ledger
            .mark_paid(request(1, None, None), ts("2024-03-01T00:00:00Z"))
            .await
            .unwrap();

        assert!(!ledger.assign_country(UserId::new(1), &nl()).await.unwrap());
    }
}
