//! MarkPaidHandler - Command handler for confirmed payments.
//!
//! A payment either renews an existing subscription (the charge carries a
//! renewal payload) or creates a new paid row.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::notifications::renewal_confirmation_text;
use crate::application::{EntitlementLedger, NotificationService};
use crate::config::PaymentsConfig;
use crate::domain::entitlement::{
    ChargeRefs, EntitlementError, NewPayment, PaidSubscriptionRequest, Provenance, Subscription,
    SubscriptionKind,
};
use crate::domain::foundation::{CountryCode, ExternalUserId, SubscriptionId, Timestamp};
use crate::domain::user::User;
use crate::ports::{AccessKeyRepository, Extension, PaymentRepository, UserRepository};

/// Command to record a confirmed payment.
#[derive(Debug, Clone)]
pub struct MarkPaidCommand {
    pub external_id: ExternalUserId,
    pub kind: String,
    pub country: Option<String>,
    pub provider: String,
    pub amount_minor: i64,
    pub currency: String,
    pub telegram_charge_id: Option<String>,
    pub provider_charge_id: Option<String>,
    pub months: Option<u32>,
}

/// Result of a recorded payment.
#[derive(Debug, Clone)]
pub struct MarkPaidResult {
    /// The new row, or the renewed row with its extended `active_until`.
    pub subscription: Subscription,
    /// Set when the payment renewed an existing subscription.
    pub renewal: Option<Extension>,
}

/// Handler for confirmed payments.
pub struct MarkPaidHandler {
    users: Arc<dyn UserRepository>,
    keys: Arc<dyn AccessKeyRepository>,
    payments: Arc<dyn PaymentRepository>,
    entitlements: EntitlementLedger,
    notifications: NotificationService,
    config: PaymentsConfig,
}

impl MarkPaidHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        keys: Arc<dyn AccessKeyRepository>,
        payments: Arc<dyn PaymentRepository>,
        entitlements: EntitlementLedger,
        notifications: NotificationService,
        config: PaymentsConfig,
    ) -> Self {
        Self {
            users,
            keys,
            payments,
            entitlements,
            notifications,
            config,
        }
    }

    pub async fn handle(&self, cmd: MarkPaidCommand) -> Result<MarkPaidResult, EntitlementError> {
        let now = Timestamp::now();

        // 1. Validate input
        let kind: SubscriptionKind = cmd.kind.parse()?;
        if cmd.currency.trim().is_empty() {
            return Err(EntitlementError::validation("currency", "currency is required"));
        }
        let charge_refs = ChargeRefs::new(cmd.telegram_charge_id.clone(), cmd.provider_charge_id.clone());
        let provenance = match kind {
            SubscriptionKind::Vpn => charge_refs.provenance(&self.config.renewal_payload_prefix)?,
            _ => Provenance::Purchase,
        };
        let country = CountryCode::parse_optional(cmd.country.as_deref())?;
        if kind == SubscriptionKind::Vpn && country.is_none() && provenance != Provenance::Promocode {
            return Err(EntitlementError::validation(
                "country",
                "country is required for vpn subscriptions",
            ));
        }

        // 2. Resolve user
        let user = self
            .users
            .find_by_external_id(cmd.external_id)
            .await?
            .ok_or_else(|| EntitlementError::user_not_found(cmd.external_id))?;

        // 3. Renewal or new purchase
        match provenance {
            Provenance::Renewal { subscription_id, .. } => {
                self.renew(&cmd, &user, subscription_id, charge_refs, now).await
            }
            _ => self.purchase(&cmd, &user, kind, country, charge_refs, now).await,
        }
    }

    async fn renew(
        &self,
        cmd: &MarkPaidCommand,
        user: &User,
        subscription_id: SubscriptionId,
        charge_refs: ChargeRefs,
        now: Timestamp,
    ) -> Result<MarkPaidResult, EntitlementError> {
        let months = 1;
        let (subscription, extension) = self
            .entitlements
            .renew_owned(user.id, subscription_id, months)
            .await?;

        // The renewal already happened; a missing audit record is surfaced.
        self.payments
            .insert(&NewPayment {
                subscription_id,
                user_id: user.id,
                provider: cmd.provider.trim().to_lowercase(),
                amount_minor: cmd.amount_minor,
                currency: cmd.currency.trim().to_uppercase(),
                paid_at: now,
                charge_refs,
                months,
            })
            .await?;

        let server = subscription
            .country
            .as_ref()
            .map(CountryCode::label)
            .unwrap_or_else(|| "VPN".to_string());
        self.notifications
            .notify(
                user.external_id,
                &renewal_confirmation_text(&server, extension.old_until, extension.new_until),
            )
            .await;

        Ok(MarkPaidResult {
            subscription: Subscription {
                active_until: extension.new_until,
                ..subscription
            },
            renewal: Some(extension),
        })
    }

    async fn purchase(
        &self,
        cmd: &MarkPaidCommand,
        user: &User,
        kind: SubscriptionKind,
        country: Option<CountryCode>,
        charge_refs: ChargeRefs,
        now: Timestamp,
    ) -> Result<MarkPaidResult, EntitlementError> {
        // Bind the new row to the user's live key for that country, if any.
        let access_key_id = match (kind, country.as_ref()) {
            (SubscriptionKind::Vpn, Some(country)) => self
                .keys
                .find_live(user.id, country)
                .await?
                .map(|key| key.id),
            _ => None,
        };

        let subscription = self
            .entitlements
            .mark_paid(
                PaidSubscriptionRequest {
                    user_id: user.id,
                    kind,
                    country,
                    provider: cmd.provider.clone(),
                    amount_minor: cmd.amount_minor,
                    currency: cmd.currency.clone(),
                    charge_refs: charge_refs.clone(),
                    months: cmd.months,
                    access_key_id,
                    paid_at: now,
                },
                now,
            )
            .await?;

        let payment = NewPayment {
            subscription_id: subscription.id,
            user_id: user.id,
            provider: subscription.provider.clone(),
            amount_minor: subscription.amount_minor,
            currency: subscription.currency.clone(),
            paid_at: now,
            charge_refs,
            months: cmd.months.unwrap_or(1),
        };
        if let Err(e) = self.payments.insert(&payment).await {
            warn!(subscription_id = %subscription.id, error = %e, "Failed to record payment");
        }

        info!(
            subscription_id = %subscription.id,
            external_id = %user.external_id,
            bound_key = ?access_key_id.map(|id| id.as_i64()),
            "Payment recorded"
        );
        Ok(MarkPaidResult {
            subscription,
            renewal: None,
        })
    }
}
