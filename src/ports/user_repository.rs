//! User repository port.

use crate::domain::entitlement::SubscriptionKind;
use crate::domain::foundation::{DomainError, ExternalUserId, Timestamp, UserId};
use crate::domain::user::{User, UserProfile};
use async_trait::async_trait;

/// Repository port for users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create the user on first contact, refresh the profile and
    /// `last_activity_at` afterwards.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn upsert(
        &self,
        external_id: ExternalUserId,
        profile: &UserProfile,
        at: Timestamp,
    ) -> Result<User, DomainError>;

    /// Find a user by external platform id.
    async fn find_by_external_id(
        &self,
        external_id: ExternalUserId,
    ) -> Result<Option<User>, DomainError>;

    /// Find a user by internal id.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, DomainError>;

    async fn count_all(&self) -> Result<u64, DomainError>;

    /// Every user, oldest first.
    async fn list_all(&self) -> Result<Vec<User>, DomainError>;

    /// Users holding a paid row of `kind` that is active at `now`, in any
    /// country. Oldest first.
    async fn list_with_active_subscription(
        &self,
        kind: SubscriptionKind,
        now: Timestamp,
    ) -> Result<Vec<User>, DomainError>;

    /// Users who never had a paid row of `kind`. Oldest first.
    async fn list_without_subscription(
        &self,
        kind: SubscriptionKind,
    ) -> Result<Vec<User>, DomainError>;
}
