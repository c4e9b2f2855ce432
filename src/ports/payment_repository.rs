//! Payment repository port.

use crate::domain::entitlement::{NewPayment, Payment};
use crate::domain::foundation::{DomainError, UserId};
use async_trait::async_trait;

/// Repository port for the append-only payment log.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Append a payment record.
    async fn insert(&self, payment: &NewPayment) -> Result<Payment, DomainError>;

    /// Payments of a user, newest first.
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Payment>, DomainError>;
}
