//! Referral code naming.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::foundation::{PromocodeId, Timestamp, UserId};

use super::NewPromocode;

/// Name prefix reserved for referral codes.
pub const REFERRAL_PREFIX: &str = "referral_";

/// Months a referral code grants to the redeemer.
pub const REFERRAL_MONTHS: u32 = 1;

/// Months credited to the referral code's owner per redemption.
pub const REFERRAL_BONUS_MONTHS: u32 = 1;

/// How many times a referral code can be redeemed.
pub const REFERRAL_USAGE_LIMIT: u32 = 50;

const REFERRAL_HASH_LEN: usize = 10;

/// Deterministic referral code for a user:
/// `referral_<id>_<first 10 hex chars of sha256("referral_<id>")>`.
pub fn referral_code_name(user_id: UserId) -> String {
    let seed = format!("{}{}", REFERRAL_PREFIX, user_id);
    let digest = hex::encode(Sha256::digest(seed.as_bytes()));
    format!("{}_{}", seed, &digest[..REFERRAL_HASH_LEN])
}

pub fn is_referral_name(name: &str) -> bool {
    name.trim().to_lowercase().starts_with(REFERRAL_PREFIX)
}

/// One redemption of someone's referral code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralUsage {
    pub promocode_id: PromocodeId,
    /// Owner of the code.
    pub referrer: UserId,
    /// User who redeemed it.
    pub receiver: UserId,
    pub used_at: Timestamp,
}

/// Promocode row for a user's referral code.
pub fn new_referral_promocode(user_id: UserId) -> NewPromocode {
    NewPromocode {
        name: referral_code_name(user_id),
        promoted_by: Some(user_id),
        usage_limit: REFERRAL_USAGE_LIMIT,
        months: REFERRAL_MONTHS,
        allow_for_old_users: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_name_is_deterministic() {
        assert_eq!(referral_code_name(UserId::new(42)), "referral_42_48e7e333cd");
        assert_eq!(referral_code_name(UserId::new(7)), "referral_7_acc6da85e3");
    }

    #[test]
    fn referral_prefix_detection_ignores_case() {
        assert!(is_referral_name("Referral_42_48e7e333cd"));
        assert!(!is_referral_name("SPRING"));
    }

    #[test]
    fn referral_promocode_has_fixed_terms() {
        let promo = new_referral_promocode(UserId::new(42));
        assert_eq!(promo.promoted_by, Some(UserId::new(42)));
        assert_eq!(promo.usage_limit, 50);
        assert_eq!(promo.months, 1);
        assert!(!promo.allow_for_old_users);
    }
}
