//! Shared fixture for the integration tests: in-memory store, a mock
//! provisioner serving two countries and a recording notifier.

#![allow(dead_code)]

use std::sync::Arc;

use vpn_entitlements::adapters::memory::InMemoryStore;
use vpn_entitlements::adapters::outline::MockProvisioner;
use vpn_entitlements::adapters::telegram::RecordingNotifier;
use vpn_entitlements::application::{
    AccessKeyBinder, EntitlementLedger, ExpirationSweep, NotificationService, PromotionLedger,
};
use vpn_entitlements::domain::entitlement::{
    ChargeRefs, PaidSubscriptionRequest, Subscription, SubscriptionKind,
};
use vpn_entitlements::domain::foundation::{CountryCode, ExternalUserId, Timestamp};
use vpn_entitlements::domain::promotion::EligibilityPolicy;
use vpn_entitlements::domain::user::{User, UserProfile};
use vpn_entitlements::ports::{PromocodeRepository, ProvisionerRegistry, UserRepository};

pub const ADMIN_CHAT: i64 = 1;

pub fn ts(value: &str) -> Timestamp {
    Timestamp::parse_rfc3339(value).unwrap()
}

pub fn country(code: &str) -> CountryCode {
    CountryCode::new(code).unwrap()
}

pub struct Fixture {
    pub store: InMemoryStore,
    pub provisioner: MockProvisioner,
    pub recorder: RecordingNotifier,
    pub registry: Arc<ProvisionerRegistry>,
    pub entitlements: EntitlementLedger,
    pub binder: AccessKeyBinder,
    pub notifications: NotificationService,
}

impl Fixture {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let provisioner = MockProvisioner::new();
        let recorder = RecordingNotifier::new();
        let registry = Arc::new(
            ProvisionerRegistry::new()
                .with_server(country("hk"), "Hong Kong", Arc::new(provisioner.clone()))
                .with_server(country("kz"), "Kazakhstan", Arc::new(provisioner.clone())),
        );
        let entitlements = EntitlementLedger::new(Arc::new(store.clone()));
        let binder = AccessKeyBinder::new(Arc::new(store.clone()), registry.clone());
        let notifications = NotificationService::new(
            Arc::new(recorder.clone()),
            Some(ExternalUserId::new(ADMIN_CHAT)),
        );
        Self {
            store,
            provisioner,
            recorder,
            registry,
            entitlements,
            binder,
            notifications,
        }
    }

    pub fn promotions(&self) -> PromotionLedger {
        self.promotions_over(Arc::new(self.store.clone()))
    }

    pub fn promotions_over(&self, promocodes: Arc<dyn PromocodeRepository>) -> PromotionLedger {
        PromotionLedger::new(promocodes, self.entitlements.clone(), EligibilityPolicy::EverHad)
    }

    pub fn sweep(&self) -> ExpirationSweep {
        ExpirationSweep::new(
            self.entitlements.clone(),
            self.binder.clone(),
            Arc::new(self.store.clone()),
            self.notifications.clone(),
        )
    }

    pub async fn user(&self, external_id: i64) -> User {
        self.store
            .upsert(
                ExternalUserId::new(external_id),
                &UserProfile {
                    username: Some(format!("user{}", external_id)),
                    ..Default::default()
                },
                Timestamp::now(),
            )
            .await
            .unwrap()
    }

    /// One-month vpn payment for `country` at `now`.
    pub async fn pay_vpn(&self, user: &User, country: Option<CountryCode>, now: Timestamp) -> Subscription {
        self.entitlements
            .mark_paid(vpn_request(user, country, now), now)
            .await
            .unwrap()
    }
}

pub fn vpn_request(user: &User, country: Option<CountryCode>, now: Timestamp) -> PaidSubscriptionRequest {
    PaidSubscriptionRequest {
        user_id: user.id,
        kind: SubscriptionKind::Vpn,
        country,
        provider: "telegram".to_string(),
        amount_minor: 15000,
        currency: "RUB".to_string(),
        charge_refs: ChargeRefs::new(Some("tg_charge".to_string()), None),
        months: None,
        access_key_id: None,
        paid_at: now,
    }
}
