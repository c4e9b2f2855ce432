//! Composition of the application services over a set of repositories.

use std::sync::Arc;

use crate::config::{AppConfig, PaymentsConfig, SchedulerConfig};
use crate::ports::{
    AccessKeyRepository, CountryRequestRepository, Notifier, PaymentRepository,
    PromocodeRepository, ProvisionerRegistry, SubscriptionRepository, UserRepository,
};

use super::handlers::{DailyStatsHandler, RenewalReminderHandler};
use super::{
    AccessKeyBinder, EntitlementLedger, ExpirationSweep, NotificationService, PromotionLedger,
    Scheduler,
};

/// The repository ports the engine runs on.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub access_keys: Arc<dyn AccessKeyRepository>,
    pub promocodes: Arc<dyn PromocodeRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub country_requests: Arc<dyn CountryRequestRepository>,
}

impl Repositories {
    /// All ports backed by one store (the in-memory adapter).
    pub fn shared<S>(store: S) -> Self
    where
        S: UserRepository
            + SubscriptionRepository
            + AccessKeyRepository
            + PromocodeRepository
            + PaymentRepository
            + CountryRequestRepository
            + Clone
            + 'static,
    {
        Self {
            users: Arc::new(store.clone()),
            subscriptions: Arc::new(store.clone()),
            access_keys: Arc::new(store.clone()),
            promocodes: Arc::new(store.clone()),
            payments: Arc::new(store.clone()),
            country_requests: Arc::new(store),
        }
    }
}

/// Wired application services.
#[derive(Clone)]
pub struct Engine {
    pub repositories: Repositories,
    pub registry: Arc<ProvisionerRegistry>,
    pub entitlements: EntitlementLedger,
    pub binder: AccessKeyBinder,
    pub promotions: PromotionLedger,
    pub notifications: NotificationService,
    pub sweep: ExpirationSweep,
    pub payments_config: PaymentsConfig,
}

impl Engine {
    pub fn new(
        repositories: Repositories,
        registry: Arc<ProvisionerRegistry>,
        notifier: Arc<dyn Notifier>,
        config: &AppConfig,
    ) -> Self {
        let entitlements = EntitlementLedger::new(repositories.subscriptions.clone());
        let binder = AccessKeyBinder::new(repositories.access_keys.clone(), registry.clone());
        let promotions = PromotionLedger::new(
            repositories.promocodes.clone(),
            entitlements.clone(),
            config.promotion.eligibility_policy,
        );
        let notifications = NotificationService::new(notifier, config.notification.admin_chat());
        let sweep = ExpirationSweep::new(
            entitlements.clone(),
            binder.clone(),
            repositories.users.clone(),
            notifications.clone(),
        );

        Self {
            repositories,
            registry,
            entitlements,
            binder,
            promotions,
            notifications,
            sweep,
            payments_config: config.payments.clone(),
        }
    }

    pub fn renewal_reminder_handler(&self) -> RenewalReminderHandler {
        RenewalReminderHandler::new(
            self.repositories.users.clone(),
            self.entitlements.clone(),
            self.registry.clone(),
            self.notifications.clone(),
            self.payments_config.clone(),
        )
    }

    pub fn daily_stats_handler(&self) -> DailyStatsHandler {
        DailyStatsHandler::new(
            self.repositories.users.clone(),
            self.entitlements.clone(),
            self.promotions.clone(),
            self.notifications.clone(),
        )
    }

    /// Scheduler running the expiration sweep, renewal reminder and admin
    /// stats report.
    pub fn scheduler(&self, config: &SchedulerConfig) -> Scheduler {
        Scheduler::new()
            .with_task(Arc::new(self.sweep.clone()), config.sweep_interval())
            .with_task(
                Arc::new(self.renewal_reminder_handler()),
                config.reminder_interval(),
            )
            .with_task(
                Arc::new(self.daily_stats_handler()),
                config.daily_stats_interval(),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::adapters::telegram::RecordingNotifier;

    #[test]
    fn scheduler_registers_every_task() {
        let engine = Engine::new(
            Repositories::shared(InMemoryStore::new()),
            Arc::new(ProvisionerRegistry::new()),
            Arc::new(RecordingNotifier::new()),
            &AppConfig::default(),
        );
        let scheduler = engine.scheduler(&SchedulerConfig::default());
        assert_eq!(
            scheduler.task_names(),
            vec!["expiration_sweep", "renewal_reminder", "daily_stats"]
        );
    }
}
