//! Promotion domain module.
//!
//! Promocodes grant months of VPN access. A code with an owner
//! (`promoted_by`) is a referral code: redeeming it also credits the
//! owner with a bonus month.
//!
//! # Module Structure
//!
//! - `promocode` - Promocode entity and name normalization
//! - `referral` - Deterministic referral code naming
//! - `redemption` - Eligibility policy, denials and outcomes
//! - `errors` - Promotion-specific errors

mod errors;
mod promocode;
mod redemption;
mod referral;

pub use errors::PromotionError;
pub use promocode::{normalize_code, NewPromocode, Promocode, PromocodeUsage};
pub use redemption::{
    EligibilityPolicy, Redemption, RedemptionDenial, RedemptionOutcome, RollbackOutcome,
};
pub use referral::{
    is_referral_name, new_referral_promocode, referral_code_name, ReferralUsage,
    REFERRAL_BONUS_MONTHS, REFERRAL_MONTHS, REFERRAL_PREFIX, REFERRAL_USAGE_LIMIT,
};
