//! User module.
//!
//! Users are created on first contact through an upsert keyed by their
//! external platform id and are never deleted. Every subscription, access
//! key and promocode usage references the internal id.

mod account;
mod broadcast;

pub(crate) use account::validate_external_id;
pub use account::{User, UserProfile};
pub use broadcast::BroadcastTarget;
