//! Shared in-memory state plus the user and payment repositories.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::access::AccessKey;
use crate::domain::entitlement::{
    CountryRequest, NewCountryRequest, NewPayment, Payment, Subscription, SubscriptionKind,
    SubscriptionStatus,
};
use crate::domain::foundation::{
    CountryRequestId, DomainError, ExternalUserId, PaymentId, PromocodeId, SubscriptionId,
    Timestamp, UserId,
};
use crate::domain::promotion::Promocode;
use crate::domain::user::{User, UserProfile};
use crate::ports::{CountryRequestRepository, PaymentRepository, UserRepository};

/// In-memory implementation of all repository ports.
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    pub(super) state: Arc<RwLock<StoreState>>,
}

#[derive(Debug, Default)]
pub(super) struct StoreState {
    sequence: i64,
    pub(super) users: Vec<User>,
    pub(super) subscriptions: Vec<Subscription>,
    pub(super) access_keys: Vec<AccessKey>,
    pub(super) promocodes: Vec<Promocode>,
    pub(super) usages: Vec<UsageRow>,
    pub(super) payments: Vec<Payment>,
    pub(super) country_requests: Vec<CountryRequest>,
}

#[derive(Debug, Clone)]
pub(super) struct UsageRow {
    pub(super) promocode_id: PromocodeId,
    pub(super) user_id: UserId,
    pub(super) subscription_id: Option<SubscriptionId>,
    pub(super) used_at: Timestamp,
    pub(super) seq: i64,
}

impl StoreState {
    /// Next value of the shared id sequence.
    pub(super) fn next_id(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }

    fn users_where(&self, keep: impl Fn(&User) -> bool) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().filter(|u| keep(u)).cloned().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        users
    }

    fn has_paid_row(&self, user_id: UserId, kind: SubscriptionKind, active_at: Option<&Timestamp>) -> bool {
        self.subscriptions.iter().any(|s| {
            s.user_id == user_id
                && s.status == SubscriptionStatus::Paid
                && s.kind == kind
                && active_at.map_or(true, |now| s.is_active_at(now))
        })
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscription rows (tests).
    pub async fn subscription_count(&self) -> usize {
        self.state.read().await.subscriptions.len()
    }

    /// Number of live access keys (tests).
    pub async fn live_key_count(&self) -> usize {
        self.state
            .read()
            .await
            .access_keys
            .iter()
            .filter(|key| key.is_live())
            .count()
    }

    /// Overwrite a row's `active_until` (tests that need a lapsed row).
    pub async fn set_active_until(&self, id: SubscriptionId, until: Timestamp) -> bool {
        let mut state = self.state.write().await;
        match state.subscriptions.iter_mut().find(|s| s.id == id) {
            Some(row) => {
                row.active_until = until;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn upsert(
        &self,
        external_id: ExternalUserId,
        profile: &UserProfile,
        at: Timestamp,
    ) -> Result<User, DomainError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .users
            .iter_mut()
            .find(|u| u.external_id == external_id)
        {
            existing.username = profile.username.clone();
            existing.first_name = profile.first_name.clone();
            existing.last_name = profile.last_name.clone();
            existing.language_code = profile.language_code.clone();
            existing.last_activity_at = at;
            return Ok(existing.clone());
        }

        let user = User {
            id: UserId::new(state.next_id()),
            external_id,
            username: profile.username.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            language_code: profile.language_code.clone(),
            created_at: at,
            last_activity_at: at,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_external_id(
        &self,
        external_id: ExternalUserId,
    ) -> Result<Option<User>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, DomainError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn count_all(&self) -> Result<u64, DomainError> {
        Ok(self.state.read().await.users.len() as u64)
    }

    async fn list_all(&self) -> Result<Vec<User>, DomainError> {
        Ok(self.state.read().await.users_where(|_| true))
    }

    async fn list_with_active_subscription(
        &self,
        kind: SubscriptionKind,
        now: Timestamp,
    ) -> Result<Vec<User>, DomainError> {
        let state = self.state.read().await;
        Ok(state.users_where(|u| state.has_paid_row(u.id, kind, Some(&now))))
    }

    async fn list_without_subscription(
        &self,
        kind: SubscriptionKind,
    ) -> Result<Vec<User>, DomainError> {
        let state = self.state.read().await;
        Ok(state.users_where(|u| !state.has_paid_row(u.id, kind, None)))
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert(&self, payment: &NewPayment) -> Result<Payment, DomainError> {
        let mut state = self.state.write().await;
        let record = Payment {
            id: PaymentId::new(state.next_id()),
            subscription_id: payment.subscription_id,
            user_id: payment.user_id,
            provider: payment.provider.clone(),
            amount_minor: payment.amount_minor,
            currency: payment.currency.clone(),
            paid_at: payment.paid_at,
            charge_refs: payment.charge_refs.clone(),
            months: payment.months,
        };
        state.payments.push(record.clone());
        Ok(record)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Payment>, DomainError> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at).then(b.id.cmp(&a.id)));
        Ok(payments)
    }
}

#[async_trait]
impl CountryRequestRepository for InMemoryStore {
    async fn insert(
        &self,
        request: &NewCountryRequest,
        at: Timestamp,
    ) -> Result<CountryRequest, DomainError> {
        let mut state = self.state.write().await;
        let record = CountryRequest {
            id: CountryRequestId::new(state.next_id()),
            user_id: request.user_id,
            subscription_id: request.subscription_id,
            text: request.text.clone(),
            created_at: at,
        };
        state.country_requests.push(record.clone());
        Ok(record)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<CountryRequest>, DomainError> {
        let state = self.state.read().await;
        let mut requests: Vec<CountryRequest> = state
            .country_requests
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_creates_then_refreshes() {
        let store = InMemoryStore::new();
        let first = store
            .upsert(
                ExternalUserId::new(100),
                &UserProfile {
                    username: Some("neo".to_string()),
                    ..Default::default()
                },
                Timestamp::now(),
            )
            .await
            .unwrap();

        let second = store
            .upsert(
                ExternalUserId::new(100),
                &UserProfile {
                    username: Some("the_one".to_string()),
                    ..Default::default()
                },
                Timestamp::now(),
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.username.as_deref(), Some("the_one"));
        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn unknown_external_id_is_none() {
        let store = InMemoryStore::new();
        assert!(store
            .find_by_external_id(ExternalUserId::new(1))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn users_split_by_vpn_history() {
        use crate::domain::entitlement::{ChargeRefs, PaidSubscriptionRequest};
        use crate::ports::SubscriptionRepository;

        let store = InMemoryStore::new();
        let now = Timestamp::parse_rfc3339("2024-03-01T00:00:00Z").unwrap();
        let mut users = Vec::new();
        for external_id in [1, 2, 3] {
            users.push(
                store
                    .upsert(ExternalUserId::new(external_id), &UserProfile::default(), now)
                    .await
                    .unwrap(),
            );
        }
        let paid = |user: &User, paid_at: Timestamp| PaidSubscriptionRequest {
            user_id: user.id,
            kind: SubscriptionKind::Vpn,
            country: None,
            provider: "telegram".to_string(),
            amount_minor: 100,
            currency: "XTR".to_string(),
            charge_refs: ChargeRefs::default(),
            months: None,
            access_key_id: None,
            paid_at,
        };
        // User 1 is active, user 2 lapsed in January, user 3 never paid.
        store.insert_paid(&paid(&users[0], now), now).await.unwrap();
        let lapsed_at = now.add_days(-60);
        store.insert_paid(&paid(&users[1], lapsed_at), lapsed_at).await.unwrap();

        let ids = |list: Vec<User>| list.into_iter().map(|u| u.id).collect::<Vec<_>>();
        assert_eq!(store.count_all().await.unwrap(), 3);
        assert_eq!(ids(store.list_all().await.unwrap()).len(), 3);
        assert_eq!(
            ids(store
                .list_with_active_subscription(SubscriptionKind::Vpn, now)
                .await
                .unwrap()),
            vec![users[0].id]
        );
        assert_eq!(
            ids(store
                .list_without_subscription(SubscriptionKind::Vpn)
                .await
                .unwrap()),
            vec![users[2].id]
        );
    }
}
