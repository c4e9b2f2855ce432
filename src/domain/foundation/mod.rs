//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers and error types that form the
//! vocabulary of the entitlement engine.

mod country;
mod errors;
mod ids;
mod timestamp;

pub use country::CountryCode;
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{
    AccessKeyId, CountryRequestId, ExternalUserId, PaymentId, PromocodeId, SubscriptionId, UserId,
};
pub use timestamp::Timestamp;
