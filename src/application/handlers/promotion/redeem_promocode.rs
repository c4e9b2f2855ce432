//! RedeemPromocodeHandler - Command handler for promocode redemption.
//!
//! A granted redemption creates a country-less vpn subscription (the user
//! picks the country later) and, for referral codes, credits the owner.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::notifications::referral_bonus_text;
use crate::application::{EntitlementLedger, NotificationService, PromotionLedger};
use crate::config::PaymentsConfig;
use crate::domain::entitlement::{ChargeRefs, PaidSubscriptionRequest, Subscription, SubscriptionKind};
use crate::domain::foundation::{ExternalUserId, Timestamp, UserId};
use crate::domain::promotion::{PromotionError, Redemption, RedemptionOutcome};
use crate::domain::user::User;
use crate::ports::{Extension, UserRepository};

/// Provider recorded on promocode subscriptions.
const PROMOCODE_PROVIDER: &str = "promocode";

#[derive(Debug, Clone)]
pub struct RedeemPromocodeCommand {
    pub external_id: ExternalUserId,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct RedeemPromocodeResult {
    pub outcome: RedemptionOutcome,
    /// The subscription granted by the code.
    pub subscription: Option<Subscription>,
    /// Set when a referral owner was credited.
    pub referral_bonus: Option<Extension>,
}

pub struct RedeemPromocodeHandler {
    users: Arc<dyn UserRepository>,
    promotions: PromotionLedger,
    entitlements: EntitlementLedger,
    notifications: NotificationService,
    config: PaymentsConfig,
}

impl RedeemPromocodeHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        promotions: PromotionLedger,
        entitlements: EntitlementLedger,
        notifications: NotificationService,
        config: PaymentsConfig,
    ) -> Self {
        Self {
            users,
            promotions,
            entitlements,
            notifications,
            config,
        }
    }

    pub async fn handle(
        &self,
        cmd: RedeemPromocodeCommand,
    ) -> Result<RedeemPromocodeResult, PromotionError> {
        let now = Timestamp::now();

        // 1. Resolve user
        let user = self
            .users
            .find_by_external_id(cmd.external_id)
            .await?
            .ok_or_else(|| PromotionError::user_not_found(cmd.external_id))?;

        // 2. Validate and consume one use
        let outcome = self.promotions.redeem(&cmd.code, user.id, now).await?;
        let redemption = match &outcome {
            RedemptionOutcome::Granted(redemption) => redemption.clone(),
            RedemptionOutcome::Denied { .. } => {
                return Ok(RedeemPromocodeResult {
                    outcome,
                    subscription: None,
                    referral_bonus: None,
                })
            }
        };

        // 3. Grant the subscription; undo the usage if that fails
        let subscription = match self.grant(&user, &redemption, now).await {
            Ok(subscription) => subscription,
            Err(e) => {
                if let Err(undo) = self
                    .promotions
                    .rollback(user.id, Some(&redemption.promocode.name))
                    .await
                {
                    warn!(
                        user_id = %user.id,
                        promocode = %redemption.promocode.name,
                        error = %undo,
                        "Failed to roll back redemption"
                    );
                }
                return Err(e);
            }
        };

        // 4. Referral bonus, best-effort
        let referral_bonus = match redemption.promocode.referral_owner(user.id) {
            Some(owner) => self.credit_referrer(owner, &user, now).await,
            None => None,
        };

        info!(
            external_id = %user.external_id,
            promocode = %redemption.promocode.name,
            subscription_id = %subscription.id,
            referral = referral_bonus.is_some(),
            "Promocode subscription granted"
        );
        Ok(RedeemPromocodeResult {
            outcome,
            subscription: Some(subscription),
            referral_bonus,
        })
    }

    /// Creates the granted row and links it to the usage, so a rollback
    /// removes exactly this row. A row that cannot be linked is deleted.
    async fn grant(
        &self,
        user: &User,
        redemption: &Redemption,
        now: Timestamp,
    ) -> Result<Subscription, PromotionError> {
        let subscription = self
            .entitlements
            .mark_paid(
                PaidSubscriptionRequest {
                    user_id: user.id,
                    kind: SubscriptionKind::Vpn,
                    country: None,
                    provider: PROMOCODE_PROVIDER.to_string(),
                    amount_minor: 0,
                    currency: self.config.default_currency.clone(),
                    charge_refs: ChargeRefs::promocode(),
                    months: Some(redemption.months),
                    access_key_id: None,
                    paid_at: now,
                },
                now,
            )
            .await?;

        if let Err(e) = self
            .promotions
            .link_grant(redemption.promocode.id, user.id, subscription.id)
            .await
        {
            if let Err(undo) = self
                .entitlements
                .delete_promocode_subscription(user.id, subscription.id)
                .await
            {
                warn!(
                    subscription_id = %subscription.id,
                    error = %undo,
                    "Failed to delete unlinked promocode subscription"
                );
            }
            return Err(e);
        }
        Ok(subscription)
    }

    async fn credit_referrer(&self, owner: UserId, redeemer: &User, now: Timestamp) -> Option<Extension> {
        let extension = match self
            .entitlements
            .credit_referral_bonus(owner, SubscriptionKind::Vpn, now)
            .await
        {
            Ok(extension) => extension,
            Err(e) => {
                warn!(referrer = %owner, error = %e, "Referral bonus not credited");
                return None;
            }
        };

        match self.users.find_by_id(owner).await {
            Ok(Some(referrer)) => {
                let text = referral_bonus_text(
                    &redeemer.display_name(),
                    extension.old_until,
                    extension.new_until,
                );
                self.notifications.notify(referrer.external_id, &text).await;
            }
            Ok(None) => {}
            Err(e) => warn!(referrer = %owner, error = %e, "Failed to look up referrer"),
        }
        Some(extension)
    }
}
