//! Admin handlers.
//!
//! ## Commands
//! - Broadcasting a message to a group of users
//! - Reporting daily stats to the admin chat (periodic)

mod broadcast;
mod daily_stats;

pub use broadcast::{BroadcastCommand, BroadcastHandler, BroadcastResult};
pub use daily_stats::{DailyStatsHandler, DailyStatsResult, PromocodeLine, ReferralLine};
