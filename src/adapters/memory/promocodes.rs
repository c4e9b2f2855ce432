//! In-memory promocode repository.

use async_trait::async_trait;
use std::cmp::Reverse;

use crate::domain::foundation::{
    DomainError, ErrorCode, PromocodeId, SubscriptionId, Timestamp, UserId,
};
use crate::domain::promotion::{NewPromocode, Promocode, PromocodeUsage, ReferralUsage};
use crate::ports::PromocodeRepository;

use super::store::UsageRow;
use super::InMemoryStore;

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn not_found(id: PromocodeId) -> DomainError {
    DomainError::new(
        ErrorCode::PromocodeNotFound,
        format!("Promocode not found: {}", id),
    )
}

#[async_trait]
impl PromocodeRepository for InMemoryStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Promocode>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .promocodes
            .iter()
            .find(|p| same_name(&p.name, name))
            .cloned())
    }

    async fn find_by_id(&self, id: PromocodeId) -> Result<Option<Promocode>, DomainError> {
        let state = self.state.read().await;
        Ok(state.promocodes.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_or_get(&self, promocode: &NewPromocode) -> Result<Promocode, DomainError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .promocodes
            .iter()
            .find(|p| same_name(&p.name, &promocode.name))
        {
            return Ok(existing.clone());
        }

        let stored = Promocode {
            id: PromocodeId::new(state.next_id()),
            name: promocode.name.trim().to_string(),
            promoted_by: promocode.promoted_by,
            times_used: 0,
            usage_limit: promocode.usage_limit,
            months: promocode.months,
            allow_for_old_users: promocode.allow_for_old_users,
            created_at: Timestamp::now(),
            last_used_at: None,
        };
        state.promocodes.push(stored.clone());
        Ok(stored)
    }

    async fn try_increment_usage(
        &self,
        id: PromocodeId,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        let promo = state
            .promocodes
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found(id))?;
        if promo.limit_reached() {
            return Ok(false);
        }
        promo.times_used += 1;
        promo.last_used_at = Some(at);
        Ok(true)
    }

    async fn decrement_usage(&self, id: PromocodeId) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        let promo = state
            .promocodes
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found(id))?;
        promo.times_used = promo.times_used.saturating_sub(1);
        Ok(())
    }

    async fn insert_usage(
        &self,
        id: PromocodeId,
        user_id: UserId,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        if state
            .usages
            .iter()
            .any(|u| u.promocode_id == id && u.user_id == user_id)
        {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                format!("User {} already used promocode {}", user_id, id),
            ));
        }
        let seq = state.next_id();
        state.usages.push(UsageRow {
            promocode_id: id,
            user_id,
            subscription_id: None,
            used_at: at,
            seq,
        });
        Ok(())
    }

    async fn has_used(&self, id: PromocodeId, user_id: UserId) -> Result<bool, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .usages
            .iter()
            .any(|u| u.promocode_id == id && u.user_id == user_id))
    }

    async fn link_usage_subscription(
        &self,
        id: PromocodeId,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        match state
            .usages
            .iter_mut()
            .find(|u| u.promocode_id == id && u.user_id == user_id)
        {
            Some(usage) => {
                usage.subscription_id = Some(subscription_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_usage(
        &self,
        id: PromocodeId,
        user_id: UserId,
    ) -> Result<Option<PromocodeUsage>, DomainError> {
        let mut state = self.state.write().await;
        let Some(index) = state
            .usages
            .iter()
            .position(|u| u.promocode_id == id && u.user_id == user_id)
        else {
            return Ok(None);
        };
        let row = state.usages.remove(index);
        Ok(Some(PromocodeUsage {
            promocode_id: row.promocode_id,
            user_id: row.user_id,
            subscription_id: row.subscription_id,
            used_at: row.used_at,
        }))
    }

    async fn last_used_by(&self, user_id: UserId) -> Result<Option<PromocodeId>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .usages
            .iter()
            .filter(|u| u.user_id == user_id)
            .max_by_key(|u| (u.used_at, u.seq))
            .map(|u| u.promocode_id))
    }

    async fn list_with_usage(&self) -> Result<Vec<Promocode>, DomainError> {
        let state = self.state.read().await;
        let mut used: Vec<Promocode> = state
            .promocodes
            .iter()
            .filter(|p| p.times_used > 0)
            .cloned()
            .collect();
        used.sort_by(|a, b| {
            Reverse(a.times_used)
                .cmp(&Reverse(b.times_used))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(used)
    }

    async fn referral_usages_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<ReferralUsage>, DomainError> {
        let state = self.state.read().await;
        let mut usages: Vec<(i64, ReferralUsage)> = state
            .usages
            .iter()
            .filter(|u| u.used_at >= from && u.used_at < to)
            .filter_map(|u| {
                let referrer = state
                    .promocodes
                    .iter()
                    .find(|p| p.id == u.promocode_id)?
                    .promoted_by?;
                Some((
                    u.seq,
                    ReferralUsage {
                        promocode_id: u.promocode_id,
                        referrer,
                        receiver: u.user_id,
                        used_at: u.used_at,
                    },
                ))
            })
            .collect();
        usages.sort_by_key(|(seq, usage)| (usage.used_at, *seq));
        Ok(usages.into_iter().map(|(_, usage)| usage).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited(name: &str, limit: u32) -> NewPromocode {
        NewPromocode {
            name: name.to_string(),
            promoted_by: None,
            usage_limit: limit,
            months: 1,
            allow_for_old_users: true,
        }
    }

    #[tokio::test]
    async fn lookup_ignores_case_and_whitespace() {
        let store = InMemoryStore::new();
        store.insert_or_get(&limited("Spring", 0)).await.unwrap();

        assert!(store.find_by_name("  spring ").await.unwrap().is_some());
        assert!(store.find_by_name("summer").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_or_get_is_idempotent() {
        let store = InMemoryStore::new();
        let a = store.insert_or_get(&limited("Spring", 0)).await.unwrap();
        let b = store.insert_or_get(&limited("SPRING", 5)).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.usage_limit, 0);
    }

    #[tokio::test]
    async fn increment_stops_at_limit() {
        let store = InMemoryStore::new();
        let promo = store.insert_or_get(&limited("ONCE", 1)).await.unwrap();

        assert!(store.try_increment_usage(promo.id, Timestamp::now()).await.unwrap());
        assert!(!store.try_increment_usage(promo.id, Timestamp::now()).await.unwrap());
    }

    #[tokio::test]
    async fn decrement_floors_at_zero() {
        let store = InMemoryStore::new();
        let promo = store.insert_or_get(&limited("ZERO", 0)).await.unwrap();
        store.decrement_usage(promo.id).await.unwrap();

        let stored = PromocodeRepository::find_by_id(&store, promo.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.times_used, 0);
    }

    #[tokio::test]
    async fn duplicate_usage_is_a_conflict() {
        let store = InMemoryStore::new();
        let promo = store.insert_or_get(&limited("DUP", 0)).await.unwrap();
        store
            .insert_usage(promo.id, UserId::new(1), Timestamp::now())
            .await
            .unwrap();

        let err = store
            .insert_usage(promo.id, UserId::new(1), Timestamp::now())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn deleted_usage_carries_its_linked_subscription() {
        let store = InMemoryStore::new();
        let promo = store.insert_or_get(&limited("LINKED", 0)).await.unwrap();
        let user = UserId::new(1);
        store.insert_usage(promo.id, user, Timestamp::now()).await.unwrap();

        assert!(store
            .link_usage_subscription(promo.id, user, SubscriptionId::new(77))
            .await
            .unwrap());
        let deleted = store.delete_usage(promo.id, user).await.unwrap().unwrap();

        assert_eq!(deleted.subscription_id, Some(SubscriptionId::new(77)));
        assert!(store.delete_usage(promo.id, user).await.unwrap().is_none());
        assert!(!store
            .link_usage_subscription(promo.id, user, SubscriptionId::new(78))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn referral_usages_skip_admin_codes_and_other_days() {
        let store = InMemoryStore::new();
        let referral = store
            .insert_or_get(&NewPromocode {
                promoted_by: Some(UserId::new(42)),
                ..limited("referral_42_48e7e333cd", 50)
            })
            .await
            .unwrap();
        let admin = store.insert_or_get(&limited("SPRING", 0)).await.unwrap();
        let day = Timestamp::parse_rfc3339("2024-03-10T12:00:00Z").unwrap();
        store.insert_usage(referral.id, UserId::new(7), day).await.unwrap();
        store.insert_usage(admin.id, UserId::new(8), day).await.unwrap();
        store
            .insert_usage(referral.id, UserId::new(9), day.add_days(-3))
            .await
            .unwrap();

        let usages = store
            .referral_usages_between(day.add_days(-1), day.add_days(1))
            .await
            .unwrap();

        assert_eq!(
            usages,
            vec![ReferralUsage {
                promocode_id: referral.id,
                referrer: UserId::new(42),
                receiver: UserId::new(7),
                used_at: day,
            }]
        );
    }
}
