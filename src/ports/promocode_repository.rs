//! Promocode repository port.
//!
//! Covers both promocodes and their per-user usage rows.

use crate::domain::foundation::{DomainError, PromocodeId, SubscriptionId, Timestamp, UserId};
use crate::domain::promotion::{NewPromocode, Promocode, PromocodeUsage, ReferralUsage};
use async_trait::async_trait;

/// Repository port for promocodes and promocode usages.
#[async_trait]
pub trait PromocodeRepository: Send + Sync {
    /// Case- and whitespace-insensitive lookup by name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Promocode>, DomainError>;

    /// Lookup by id.
    async fn find_by_id(&self, id: PromocodeId) -> Result<Option<Promocode>, DomainError>;

    /// Insert a promocode, or return the existing one with the same name.
    async fn insert_or_get(&self, promocode: &NewPromocode) -> Result<Promocode, DomainError>;

    /// Increment `times_used` and stamp `last_used_at`, but only while the
    /// usage limit is not reached. The limit is re-checked in the same
    /// atomic operation.
    ///
    /// Returns false when the limit was reached.
    async fn try_increment_usage(&self, id: PromocodeId, at: Timestamp)
        -> Result<bool, DomainError>;

    /// Decrement `times_used`, floored at zero.
    async fn decrement_usage(&self, id: PromocodeId) -> Result<(), DomainError>;

    /// Record that a user redeemed a promocode.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the user already has a usage row for the code
    /// - `DatabaseError` on persistence failure
    async fn insert_usage(
        &self,
        id: PromocodeId,
        user_id: UserId,
        at: Timestamp,
    ) -> Result<(), DomainError>;

    async fn has_used(&self, id: PromocodeId, user_id: UserId) -> Result<bool, DomainError>;

    /// Record which subscription a redemption granted.
    ///
    /// Returns false when the usage row does not exist.
    async fn link_usage_subscription(
        &self,
        id: PromocodeId,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<bool, DomainError>;

    /// Delete a usage row, returning it. `None` when there was none.
    async fn delete_usage(
        &self,
        id: PromocodeId,
        user_id: UserId,
    ) -> Result<Option<PromocodeUsage>, DomainError>;

    /// The promocode the user redeemed most recently.
    async fn last_used_by(&self, user_id: UserId) -> Result<Option<PromocodeId>, DomainError>;

    /// Promocodes with `times_used > 0`, most used first, then by name.
    async fn list_with_usage(&self) -> Result<Vec<Promocode>, DomainError>;

    /// Redemptions of referral codes with `from <= used_at < to`, oldest
    /// first. A referral code is one with an owner (`promoted_by`).
    async fn referral_usages_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<ReferralUsage>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promocode_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn PromocodeRepository) {}
    }
}
