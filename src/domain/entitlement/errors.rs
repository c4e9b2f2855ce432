//! Entitlement-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | SubscriptionNotFound | 404 |
//! | UserNotFound | 404 |
//! | NoActiveSubscription | 404 |
//! | NotOwner | 403 |
//! | ValidationFailed | 400 |
//! | Conflict | 409 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{
    DomainError, ErrorCode, SubscriptionId, UserId, ValidationError,
};

/// Errors raised by the entitlement ledger and the handlers built on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementError {
    /// Subscription does not exist.
    SubscriptionNotFound(SubscriptionId),

    /// User is unknown to the engine.
    UserNotFound(String),

    /// Subscription belongs to someone else.
    NotOwner {
        subscription_id: SubscriptionId,
        user_id: UserId,
    },

    /// User has no currently active row of the requested kind.
    NoActiveSubscription(UserId),

    /// Validation failed.
    ValidationFailed { field: String, message: String },

    /// Store rejected the write because of a concurrent change.
    Conflict(String),

    /// Infrastructure error.
    Infrastructure(String),
}

impl EntitlementError {
    pub fn subscription_not_found(id: SubscriptionId) -> Self {
        EntitlementError::SubscriptionNotFound(id)
    }

    pub fn user_not_found(user: impl ToString) -> Self {
        EntitlementError::UserNotFound(user.to_string())
    }

    pub fn not_owner(subscription_id: SubscriptionId, user_id: UserId) -> Self {
        EntitlementError::NotOwner {
            subscription_id,
            user_id,
        }
    }

    pub fn no_active_subscription(user_id: UserId) -> Self {
        EntitlementError::NoActiveSubscription(user_id)
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EntitlementError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        EntitlementError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            EntitlementError::SubscriptionNotFound(_)
            | EntitlementError::NoActiveSubscription(_) => ErrorCode::SubscriptionNotFound,
            EntitlementError::UserNotFound(_) => ErrorCode::UserNotFound,
            EntitlementError::NotOwner { .. } => ErrorCode::Forbidden,
            EntitlementError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            EntitlementError::Conflict(_) => ErrorCode::Conflict,
            EntitlementError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            EntitlementError::SubscriptionNotFound(id) => {
                format!("Subscription not found: {}", id)
            }
            EntitlementError::UserNotFound(user) => format!("User not found: {}", user),
            EntitlementError::NotOwner {
                subscription_id,
                user_id,
            } => format!(
                "Subscription {} does not belong to user {}",
                subscription_id, user_id
            ),
            EntitlementError::NoActiveSubscription(user_id) => {
                format!("No active subscription for user {}", user_id)
            }
            EntitlementError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            EntitlementError::Conflict(msg) => format!("Conflict: {}", msg),
            EntitlementError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EntitlementError::Infrastructure(_) | EntitlementError::Conflict(_)
        )
    }
}

impl std::fmt::Display for EntitlementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for EntitlementError {}

impl From<DomainError> for EntitlementError {
    fn from(err: DomainError) -> Self {
        match err.code {
            code if code.is_validation() => EntitlementError::ValidationFailed {
                field: err.field().unwrap_or("input").to_string(),
                message: err.message,
            },
            ErrorCode::UserNotFound => EntitlementError::UserNotFound(err.message),
            ErrorCode::Conflict => EntitlementError::Conflict(err.message),
            _ => EntitlementError::Infrastructure(err.message),
        }
    }
}

impl From<ValidationError> for EntitlementError {
    fn from(err: ValidationError) -> Self {
        EntitlementError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

/// Lifts the error into the shared shape, keeping its code.
impl From<EntitlementError> for DomainError {
    fn from(err: EntitlementError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
