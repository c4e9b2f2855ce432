//! Access key repository port.

use crate::domain::access::{AccessKey, NewAccessKey};
use crate::domain::foundation::{AccessKeyId, CountryCode, DomainError, Timestamp, UserId};
use async_trait::async_trait;

/// Repository port for access keys.
///
/// Implementations must enforce at most one live key per (user, country).
#[async_trait]
pub trait AccessKeyRepository: Send + Sync {
    /// The live key for (user, country), if any.
    async fn find_live(
        &self,
        user_id: UserId,
        country: &CountryCode,
    ) -> Result<Option<AccessKey>, DomainError>;

    /// All live keys of a user.
    async fn list_live_by_user(&self, user_id: UserId) -> Result<Vec<AccessKey>, DomainError>;

    /// Find a key by id, revoked or not.
    async fn find_by_id(&self, id: AccessKeyId) -> Result<Option<AccessKey>, DomainError>;

    /// Insert a new live key.
    ///
    /// # Errors
    ///
    /// - `Conflict` if a live key already exists for (user, country)
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, key: &NewAccessKey) -> Result<AccessKey, DomainError>;

    /// Set `revoked_at` on a still-live key.
    ///
    /// Returns false when the key was already revoked or doesn't exist.
    async fn mark_revoked(&self, id: AccessKeyId, at: Timestamp) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_key_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn AccessKeyRepository) {}
    }
}
