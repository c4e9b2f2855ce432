//! GetReferralCodeHandler - Query handler for a user's referral code.
//!
//! Only users with an active vpn subscription may invite others.

use std::sync::Arc;

use serde::Serialize;

use crate::application::{EntitlementLedger, PromotionLedger};
use crate::domain::entitlement::SubscriptionKind;
use crate::domain::foundation::{ExternalUserId, Timestamp};
use crate::domain::promotion::{Promocode, PromotionError};
use crate::ports::UserRepository;

#[derive(Debug, Clone)]
pub struct GetReferralCodeQuery {
    pub external_id: ExternalUserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReferralCodeOutcome {
    Code { promocode: Promocode },
    NotEligible { message: String },
}

pub struct GetReferralCodeHandler {
    users: Arc<dyn UserRepository>,
    promotions: PromotionLedger,
    entitlements: EntitlementLedger,
}

impl GetReferralCodeHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        promotions: PromotionLedger,
        entitlements: EntitlementLedger,
    ) -> Self {
        Self {
            users,
            promotions,
            entitlements,
        }
    }

    pub async fn handle(
        &self,
        query: GetReferralCodeQuery,
    ) -> Result<ReferralCodeOutcome, PromotionError> {
        let user = self
            .users
            .find_by_external_id(query.external_id)
            .await?
            .ok_or_else(|| PromotionError::user_not_found(query.external_id))?;

        let active = self
            .entitlements
            .has_any_active(user.id, SubscriptionKind::Vpn, Timestamp::now())
            .await?;
        if !active {
            return Ok(ReferralCodeOutcome::NotEligible {
                message: "An active VPN subscription is required to get a referral code"
                    .to_string(),
            });
        }

        let promocode = self.promotions.get_or_create_referral_code(user.id).await?;
        Ok(ReferralCodeOutcome::Code { promocode })
    }
}
