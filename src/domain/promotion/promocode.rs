//! Promocode entity.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PromocodeId, SubscriptionId, Timestamp, UserId, ValidationError};

/// A promotional code.
///
/// `usage_limit == 0` means unlimited. `times_used` never drops below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promocode {
    pub id: PromocodeId,
    pub name: String,
    /// Owner of a referral code; `None` for admin-issued codes.
    pub promoted_by: Option<UserId>,
    pub times_used: u32,
    pub usage_limit: u32,
    /// Months granted per redemption.
    pub months: u32,
    /// Whether users who already had a subscription may redeem it.
    pub allow_for_old_users: bool,
    pub created_at: Timestamp,
    pub last_used_at: Option<Timestamp>,
}

impl Promocode {
    /// Returns true once a limited code has been used up.
    pub fn limit_reached(&self) -> bool {
        self.usage_limit > 0 && self.times_used >= self.usage_limit
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.promoted_by == Some(user_id)
    }

    /// Returns the owner to credit when `redeemer` uses this code.
    ///
    /// Only codes carrying the referral name prefix pay a bonus, and never
    /// to the redeemer themself.
    pub fn referral_owner(&self, redeemer: UserId) -> Option<UserId> {
        if !super::is_referral_name(&self.name) {
            return None;
        }
        self.promoted_by.filter(|owner| *owner != redeemer)
    }
}

/// One user's redemption of a code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromocodeUsage {
    pub promocode_id: PromocodeId,
    pub user_id: UserId,
    /// The subscription this redemption granted; set once the grant exists.
    pub subscription_id: Option<SubscriptionId>,
    pub used_at: Timestamp,
}

/// Insert arguments for a promocode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPromocode {
    pub name: String,
    pub promoted_by: Option<UserId>,
    pub usage_limit: u32,
    pub months: u32,
    pub allow_for_old_users: bool,
}

/// Normalizes user input for lookups. Matching is case-insensitive, and
/// stores compare on the lowercased trimmed name.
///
/// # Errors
///
/// Returns `ValidationError::EmptyField` for blank input.
pub fn normalize_code(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty_field("code"));
    }
    Ok(trimmed.to_lowercase())
}
