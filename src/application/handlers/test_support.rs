//! Shared wiring for handler tests: in-memory store, mock provisioner with
//! two countries, and a recording notifier.

use std::sync::Arc;

use crate::adapters::memory::InMemoryStore;
use crate::adapters::outline::MockProvisioner;
use crate::adapters::telegram::RecordingNotifier;
use crate::application::{AccessKeyBinder, EntitlementLedger, NotificationService, PromotionLedger};
use crate::config::PaymentsConfig;
use crate::domain::entitlement::{ChargeRefs, PaidSubscriptionRequest, Subscription, SubscriptionKind};
use crate::domain::foundation::{CountryCode, ExternalUserId, Timestamp};
use crate::domain::promotion::EligibilityPolicy;
use crate::domain::user::{User, UserProfile};
use crate::ports::{ProvisionerRegistry, UserRepository};

pub const ADMIN_CHAT: i64 = 999;

pub fn nl() -> CountryCode {
    CountryCode::new("nl").unwrap()
}

pub fn de() -> CountryCode {
    CountryCode::new("de").unwrap()
}

pub fn ts(value: &str) -> Timestamp {
    Timestamp::parse_rfc3339(value).unwrap()
}

pub struct TestContext {
    pub store: InMemoryStore,
    pub provisioner: MockProvisioner,
    pub recorder: RecordingNotifier,
    pub registry: Arc<ProvisionerRegistry>,
    pub entitlements: EntitlementLedger,
    pub binder: AccessKeyBinder,
    pub promotions: PromotionLedger,
    pub notifications: NotificationService,
    pub payments: PaymentsConfig,
}

impl TestContext {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let provisioner = MockProvisioner::new();
        let recorder = RecordingNotifier::new();
        let registry = Arc::new(
            ProvisionerRegistry::new()
                .with_server(nl(), "Netherlands", Arc::new(provisioner.clone()))
                .with_server(de(), "Germany", Arc::new(provisioner.clone())),
        );
        let entitlements = EntitlementLedger::new(Arc::new(store.clone()));
        let binder = AccessKeyBinder::new(Arc::new(store.clone()), registry.clone());
        let promotions = PromotionLedger::new(
            Arc::new(store.clone()),
            entitlements.clone(),
            EligibilityPolicy::EverHad,
        );
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
            promotions,
            notifications,
            payments: PaymentsConfig::default(),
        }
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

    /// Paid vpn row starting at `now` for one month.
    pub async fn paid_vpn(&self, user: &User, country: Option<CountryCode>, now: Timestamp) -> Subscription {
        self.entitlements
            .mark_paid(
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
                },
                now,
            )
            .await
            .unwrap()
    }
}
