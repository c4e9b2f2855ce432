//! Application layer - services and command/query handlers.
//!
//! The four lifecycle services own one concern each:
//!
//! - `EntitlementLedger` - subscription rows and period arithmetic
//! - `AccessKeyBinder` - remote credentials bound to (user, country)
//! - `PromotionLedger` - promocode counters, eligibility and referrals
//! - `ExpirationSweep` - revocation of lapsed entitlements
//!
//! Handlers in [`handlers`] compose them for caller-facing operations;
//! [`scheduler`] runs the periodic ones.

mod access_key_binder;
mod engine;
mod entitlement_ledger;
mod expiration_sweep;
pub mod handlers;
pub mod notifications;
mod promotion_ledger;
pub mod scheduler;

pub use access_key_binder::{AccessKeyBinder, IssuedKey};
pub use engine::{Engine, Repositories};
pub use entitlement_ledger::EntitlementLedger;
pub use expiration_sweep::ExpirationSweep;
pub use notifications::NotificationService;
pub use promotion_ledger::PromotionLedger;
pub use scheduler::{PeriodicTask, Scheduler, SingleFlight, TaskError};
