//! Promotion error types.

use crate::domain::access::AccessKeyError;
use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors raised by the promotion ledger and its handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionError {
    /// Explicitly named promocode does not exist (rollback path).
    PromocodeNotFound(String),

    /// User is unknown to the engine.
    UserNotFound(String),

    /// Validation failed.
    ValidationFailed { field: String, message: String },

    /// Entitlement read or write failed.
    Entitlement(EntitlementError),

    /// Releasing the access key of a rolled back grant failed.
    AccessKey(AccessKeyError),

    /// Infrastructure error.
    Infrastructure(String),
}

impl PromotionError {
    pub fn promocode_not_found(code: impl Into<String>) -> Self {
        PromotionError::PromocodeNotFound(code.into())
    }

    pub fn user_not_found(user: impl ToString) -> Self {
        PromotionError::UserNotFound(user.to_string())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PromotionError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        PromotionError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            PromotionError::PromocodeNotFound(_) => ErrorCode::PromocodeNotFound,
            PromotionError::UserNotFound(_) => ErrorCode::UserNotFound,
            PromotionError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            PromotionError::Entitlement(inner) => inner.code(),
            PromotionError::AccessKey(inner) => inner.code(),
            PromotionError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            PromotionError::PromocodeNotFound(code) => format!("Promocode not found: {}", code),
            PromotionError::UserNotFound(user) => format!("User not found: {}", user),
            PromotionError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            PromotionError::Entitlement(inner) => inner.message(),
            PromotionError::AccessKey(inner) => inner.message(),
            PromotionError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            PromotionError::Infrastructure(_) => true,
            PromotionError::Entitlement(inner) => inner.is_retryable(),
            PromotionError::AccessKey(inner) => inner.is_retryable(),
            _ => false,
        }
    }
}

impl std::fmt::Display for PromotionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for PromotionError {}

impl From<DomainError> for PromotionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            code if code.is_validation() => PromotionError::ValidationFailed {
                field: err.field().unwrap_or("input").to_string(),
                message: err.message,
            },
            ErrorCode::UserNotFound => PromotionError::UserNotFound(err.message),
            _ => PromotionError::Infrastructure(err.message),
        }
    }
}

impl From<ValidationError> for PromotionError {
    fn from(err: ValidationError) -> Self {
        PromotionError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<EntitlementError> for PromotionError {
    fn from(err: EntitlementError) -> Self {
        PromotionError::Entitlement(err)
    }
}

impl From<AccessKeyError> for PromotionError {
    fn from(err: AccessKeyError) -> Self {
        PromotionError::AccessKey(err)
    }
}

/// Lifts the error into the shared shape, keeping its code.
impl From<PromotionError> for DomainError {
    fn from(err: PromotionError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
