//! In-memory subscription repository.

use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::HashMap;

use crate::domain::entitlement::{
    compute_active_until, extended_until, ExpiredEntitlement, PaidSubscriptionRequest, Subscription,
    SubscriptionKind, SubscriptionStatus,
};
use crate::domain::foundation::{
    AccessKeyId, CountryCode, DomainError, ErrorCode, SubscriptionId, Timestamp, UserId,
};
use crate::ports::{Extension, SubscriptionRepository};

use super::store::StoreState;
use super::InMemoryStore;

/// Most recently paid first, ties broken by id.
fn latest_paid_first(rows: &mut [&mut Subscription]) {
    rows.sort_by_key(|s| Reverse((s.paid_at, s.id)));
}

fn is_paid_vpn(sub: &Subscription) -> bool {
    sub.status == SubscriptionStatus::Paid && sub.kind == SubscriptionKind::Vpn
}

fn bucket_max(
    state: &StoreState,
    user_id: UserId,
    kind: SubscriptionKind,
    country: Option<&CountryCode>,
) -> Option<Timestamp> {
    state
        .subscriptions
        .iter()
        .filter(|s| {
            s.user_id == user_id
                && s.status == SubscriptionStatus::Paid
                && s.in_bucket(kind, country)
        })
        .map(|s| s.active_until)
        .max()
}

/// Extends a row from its bucket maximum; `None` when the row is unknown.
fn extend_in_place(state: &mut StoreState, id: SubscriptionId, months: u32) -> Option<Extension> {
    let row = state.subscriptions.iter().find(|s| s.id == id)?;
    let (user_id, kind, country, old_until) =
        (row.user_id, row.kind, row.country.clone(), row.active_until);
    let new_until = extended_until(
        old_until,
        bucket_max(state, user_id, kind, country.as_ref()),
        months,
    );

    let row = state.subscriptions.iter_mut().find(|s| s.id == id)?;
    row.active_until = new_until;
    Some(Extension {
        subscription_id: id,
        old_until,
        new_until,
    })
}

#[async_trait]
impl SubscriptionRepository for InMemoryStore {
    async fn latest_active_until(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        country: Option<&CountryCode>,
    ) -> Result<Option<Timestamp>, DomainError> {
        let state = self.state.read().await;
        Ok(bucket_max(&state, user_id, kind, country))
    }

    async fn has_any_active(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        let state = self.state.read().await;
        Ok(state.subscriptions.iter().any(|s| {
            s.user_id == user_id
                && s.kind == kind
                && s.status == SubscriptionStatus::Paid
                && s.is_active_at(&now)
        }))
    }

    async fn has_ever_had(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
    ) -> Result<bool, DomainError> {
        let state = self.state.read().await;
        Ok(state.subscriptions.iter().any(|s| {
            s.user_id == user_id && s.kind == kind && s.status == SubscriptionStatus::Paid
        }))
    }

    async fn insert_paid(
        &self,
        request: &PaidSubscriptionRequest,
        now: Timestamp,
    ) -> Result<Subscription, DomainError> {
        // Read, compute and insert under one write guard.
        let mut state = self.state.write().await;
        let current = bucket_max(&state, request.user_id, request.kind, request.country.as_ref());
        let active_until = compute_active_until(request.kind, now, current, request.months);

        let subscription = Subscription {
            id: SubscriptionId::new(state.next_id()),
            user_id: request.user_id,
            kind: request.kind,
            country: request.country.clone(),
            status: SubscriptionStatus::Paid,
            provider: request.provider.clone(),
            amount_minor: request.amount_minor,
            currency: request.currency.clone(),
            paid_at: request.paid_at,
            active_until,
            access_key_id: request.access_key_id,
            charge_refs: request.charge_refs.clone(),
            created_at: now,
        };
        state.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn find_by_id(&self, id: SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let state = self.state.read().await;
        Ok(state.subscriptions.iter().find(|s| s.id == id).cloned())
    }

    async fn extend(&self, id: SubscriptionId, months: u32) -> Result<Extension, DomainError> {
        let mut state = self.state.write().await;
        extend_in_place(&mut state, id, months).ok_or_else(|| {
            DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription not found: {}", id),
            )
        })
    }

    async fn extend_most_active(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        months: u32,
        now: Timestamp,
    ) -> Result<Option<Extension>, DomainError> {
        let mut state = self.state.write().await;
        let target = state
            .subscriptions
            .iter()
            .filter(|s| {
                s.user_id == user_id
                    && s.kind == kind
                    && s.status == SubscriptionStatus::Paid
                    && s.is_active_at(&now)
            })
            .max_by_key(|s| (s.active_until, s.id))
            .map(|s| s.id);

        Ok(target.and_then(|id| extend_in_place(&mut state, id, months)))
    }

    async fn assign_promocode_country(
        &self,
        user_id: UserId,
        country: &CountryCode,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        let mut candidates: Vec<&mut Subscription> = state
            .subscriptions
            .iter_mut()
            .filter(|s| {
                s.user_id == user_id
                    && is_paid_vpn(s)
                    && s.country.is_none()
                    && s.is_promocode_issued()
            })
            .collect();
        latest_paid_first(&mut candidates);

        match candidates.into_iter().next() {
            Some(row) => {
                row.country = Some(country.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_promocode_subscription(
        &self,
        user_id: UserId,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError> {
        let mut state = self.state.write().await;
        let Some(index) = state
            .subscriptions
            .iter()
            .position(|s| s.id == id && s.user_id == user_id && s.is_promocode_issued())
        else {
            return Ok(None);
        };
        Ok(Some(state.subscriptions.remove(index)))
    }

    async fn attach_access_key(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        country: Option<&CountryCode>,
        key_id: AccessKeyId,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        let mut candidates: Vec<&mut Subscription> = state
            .subscriptions
            .iter_mut()
            .filter(|s| {
                s.user_id == user_id
                    && s.status == SubscriptionStatus::Paid
                    && s.in_bucket(kind, country)
            })
            .collect();
        latest_paid_first(&mut candidates);

        match candidates.into_iter().next() {
            Some(row) => {
                row.access_key_id = Some(key_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_expired_with_live_keys(
        &self,
        now: Timestamp,
    ) -> Result<Vec<ExpiredEntitlement>, DomainError> {
        let state = self.state.read().await;

        let superseded = |sub: &Subscription| {
            state.subscriptions.iter().any(|newer| {
                newer.user_id == sub.user_id
                    && is_paid_vpn(newer)
                    && newer.country == sub.country
                    && newer.is_active_at(&now)
            })
        };

        // One entry per key, carrying its latest lapsed row.
        let mut by_key: HashMap<AccessKeyId, ExpiredEntitlement> = HashMap::new();
        for sub in state
            .subscriptions
            .iter()
            .filter(|s| is_paid_vpn(s) && s.is_expired_at(&now) && !superseded(s))
        {
            let Some(key_id) = sub.access_key_id else {
                continue;
            };
            let Some(key) = state
                .access_keys
                .iter()
                .find(|k| k.id == key_id && k.is_live())
            else {
                continue;
            };

            let replace = by_key
                .get(&key_id)
                .map_or(true, |seen| (sub.active_until, sub.id) > (seen.active_until, seen.subscription_id));
            if replace {
                by_key.insert(
                    key_id,
                    ExpiredEntitlement {
                        subscription_id: sub.id,
                        user_id: sub.user_id,
                        country: sub.country.clone(),
                        active_until: sub.active_until,
                        access_key: key.clone(),
                    },
                );
            }
        }

        let mut expired: Vec<ExpiredEntitlement> = by_key.into_values().collect();
        expired.sort_by_key(|e| (e.active_until, e.subscription_id));
        Ok(expired)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Subscription>, DomainError> {
        let state = self.state.read().await;
        let mut rows: Vec<Subscription> = state
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| Reverse((s.paid_at, s.id)));
        Ok(rows)
    }

    async fn find_expiring_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError> {
        let state = self.state.read().await;
        let mut rows: Vec<Subscription> = state
            .subscriptions
            .iter()
            .filter(|s| is_paid_vpn(s) && s.active_until >= from && s.active_until < to)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.active_until, s.id));
        Ok(rows)
    }

    async fn list_created_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError> {
        let state = self.state.read().await;
        let mut rows: Vec<Subscription> = state
            .subscriptions
            .iter()
            .filter(|s| s.created_at >= from && s.created_at < to)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.created_at, s.id));
        Ok(rows)
    }

    async fn count_active(&self, kind: SubscriptionKind, now: Timestamp) -> Result<u64, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.status == SubscriptionStatus::Paid && s.kind == kind && s.is_active_at(&now))
            .count() as u64)
    }

    async fn latest_paid_of_kind(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
    ) -> Result<Option<Subscription>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id && s.status == SubscriptionStatus::Paid && s.kind == kind)
            .max_by_key(|s| (s.paid_at, s.id))
            .cloned())
    }
}
