//! Subscription repository port.
//!
//! The store is the single source of truth for entitlement. Every method
//! is one atomic operation: either a single statement or one transaction.
//!
//! # Buckets
//!
//! Entitlement queries work per (user, kind, country) bucket. A `None`
//! country is its own bucket and never matches a row with a country.

use crate::domain::entitlement::{
    ExpiredEntitlement, PaidSubscriptionRequest, Subscription, SubscriptionKind,
};
use crate::domain::foundation::{
    AccessKeyId, CountryCode, DomainError, SubscriptionId, Timestamp, UserId,
};
use async_trait::async_trait;

/// Previous and new `active_until` of an extended row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension {
    pub subscription_id: SubscriptionId,
    pub old_until: Timestamp,
    pub new_until: Timestamp,
}

/// Repository port for subscription rows.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Greatest `active_until` among paid rows of the bucket.
    ///
    /// Returns `None` when the bucket has no rows.
    async fn latest_active_until(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        country: Option<&CountryCode>,
    ) -> Result<Option<Timestamp>, DomainError>;

    /// True if any paid row of the kind, any country, ends after `now`.
    async fn has_any_active(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        now: Timestamp,
    ) -> Result<bool, DomainError>;

    /// True if the user ever held a paid row of the kind.
    async fn has_ever_had(&self, user_id: UserId, kind: SubscriptionKind)
        -> Result<bool, DomainError>;

    /// Insert a paid row, computing `active_until` with the extension rule
    /// from the bucket maximum read in the same atomic operation.
    ///
    /// Concurrent calls for one bucket must serialize so their months stack.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn insert_paid(
        &self,
        request: &PaidSubscriptionRequest,
        now: Timestamp,
    ) -> Result<Subscription, DomainError>;

    /// Find a row by id.
    async fn find_by_id(&self, id: SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// Extend a row's `active_until` by calendar months, in place.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if the row doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn extend(&self, id: SubscriptionId, months: u32) -> Result<Extension, DomainError>;

    /// Extend the user's paid row of the kind with the greatest
    /// `active_until`, provided it is still active at `now`.
    ///
    /// Returns `None` when no active row exists.
    async fn extend_most_active(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        months: u32,
        now: Timestamp,
    ) -> Result<Option<Extension>, DomainError>;

    /// Set the country of the most recent country-less promocode vpn row.
    ///
    /// Returns false when there is no such row.
    async fn assign_promocode_country(
        &self,
        user_id: UserId,
        country: &CountryCode,
    ) -> Result<bool, DomainError>;

    /// Delete one promocode-issued row of the user, returning it.
    ///
    /// Returns `None` when the row does not exist, belongs to someone else
    /// or was not issued by a promocode.
    async fn delete_promocode_subscription(
        &self,
        user_id: UserId,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Bind a key to the user's most recently paid row of the bucket.
    ///
    /// Returns false when the bucket is empty.
    async fn attach_access_key(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        country: Option<&CountryCode>,
        key_id: AccessKeyId,
    ) -> Result<bool, DomainError>;

    /// Paid vpn rows with `active_until < now` whose bound key is live,
    /// oldest first.
    ///
    /// Rows superseded by a newer active row of the same bucket are left
    /// out, and a key shared by several lapsed rows is reported once.
    async fn find_expired_with_live_keys(
        &self,
        now: Timestamp,
    ) -> Result<Vec<ExpiredEntitlement>, DomainError>;

    /// All rows of a user, newest first.
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Subscription>, DomainError>;

    /// Paid vpn rows with `from <= active_until < to`.
    async fn find_expiring_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Rows of every kind with `from <= created_at < to`, oldest first.
    async fn list_created_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError>;

    /// Number of paid rows of `kind` active at `now`.
    async fn count_active(&self, kind: SubscriptionKind, now: Timestamp)
        -> Result<u64, DomainError>;

    /// The user's most recently paid row of `kind`, any country.
    async fn latest_paid_of_kind(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
    ) -> Result<Option<Subscription>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn SubscriptionRepository) {}
    }
}
