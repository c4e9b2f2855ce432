//! Domain layer containing business rules and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `user` - Users keyed by their external platform id
//! - `entitlement` - Subscriptions, provenance and the extension rule
//! - `access` - Access keys bound to remote VPN credentials
//! - `promotion` - Promocodes, referral codes and redemption outcomes
//! - `sweep` - Expiration sweep reports

pub mod access;
pub mod entitlement;
pub mod foundation;
pub mod promotion;
pub mod sweep;
pub mod user;
