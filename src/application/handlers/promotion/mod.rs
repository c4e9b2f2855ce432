//! Promotion handlers.
//!
//! ## Commands
//! - Redeeming a promocode (with referral bonus)
//! - Rolling a redemption back
//!
//! ## Queries
//! - Getting the user's referral code
//! - Promocode usage statistics (admin)

mod get_referral_code;
mod promocode_stats;
mod redeem_promocode;
mod rollback_promocode;

// Commands
pub use redeem_promocode::{RedeemPromocodeCommand, RedeemPromocodeHandler, RedeemPromocodeResult};
pub use rollback_promocode::{
    RollbackPromocodeCommand, RollbackPromocodeHandler, RollbackPromocodeResult,
};

// Queries
pub use get_referral_code::{GetReferralCodeHandler, GetReferralCodeQuery, ReferralCodeOutcome};
pub use promocode_stats::{GetPromocodeStatsHandler, GetPromocodeStatsQuery, GetPromocodeStatsResult};
