//! Country request repository port.

use crate::domain::entitlement::{CountryRequest, NewCountryRequest};
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use async_trait::async_trait;

/// Repository port for new-location requests. Append-only.
#[async_trait]
pub trait CountryRequestRepository: Send + Sync {
    async fn insert(
        &self,
        request: &NewCountryRequest,
        at: Timestamp,
    ) -> Result<CountryRequest, DomainError>;

    /// Requests of a user, newest first.
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<CountryRequest>, DomainError>;
}
