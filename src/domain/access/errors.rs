//! Access-key error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | ProviderNotConfigured | 400 |
//! | ValidationFailed | 400 |
//! | UserNotFound | 404 |
//! | AlreadyLive | 409 |
//! | Upstream | 502 |
//! | Entitlement | (inner mapping) |
//! | Infrastructure | 500 |

use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{CountryCode, DomainError, ErrorCode, UserId, ValidationError};

/// Errors raised by the access-key binder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessKeyError {
    /// No provisioning server is configured for the country.
    ProviderNotConfigured(CountryCode),

    /// A live key already exists; the store refused a second one.
    AlreadyLive { user_id: UserId, country: CountryCode },

    /// User is unknown to the engine.
    UserNotFound(String),

    /// The remote provisioning API failed.
    Upstream(String),

    /// Validation failed.
    ValidationFailed { field: String, message: String },

    /// Entitlement lookup failed while deciding whether to issue.
    Entitlement(EntitlementError),

    /// Infrastructure error.
    Infrastructure(String),
}

impl AccessKeyError {
    pub fn provider_not_configured(country: CountryCode) -> Self {
        AccessKeyError::ProviderNotConfigured(country)
    }

    pub fn already_live(user_id: UserId, country: CountryCode) -> Self {
        AccessKeyError::AlreadyLive { user_id, country }
    }

    pub fn user_not_found(user: impl ToString) -> Self {
        AccessKeyError::UserNotFound(user.to_string())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        AccessKeyError::Upstream(message.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AccessKeyError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        AccessKeyError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            AccessKeyError::ProviderNotConfigured(_) | AccessKeyError::ValidationFailed { .. } => {
                ErrorCode::ValidationFailed
            }
            AccessKeyError::AlreadyLive { .. } => ErrorCode::Conflict,
            AccessKeyError::UserNotFound(_) => ErrorCode::UserNotFound,
            AccessKeyError::Upstream(_) => ErrorCode::UpstreamError,
            AccessKeyError::Entitlement(inner) => inner.code(),
            AccessKeyError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            AccessKeyError::ProviderNotConfigured(country) => {
                format!("No VPN server configured for country '{}'", country)
            }
            AccessKeyError::AlreadyLive { user_id, country } => format!(
                "User {} already has a live access key for '{}'",
                user_id, country
            ),
            AccessKeyError::UserNotFound(user) => format!("User not found: {}", user),
            AccessKeyError::Upstream(msg) => format!("VPN server error: {}", msg),
            AccessKeyError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            AccessKeyError::Entitlement(inner) => inner.message(),
            AccessKeyError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            AccessKeyError::Upstream(_) | AccessKeyError::Infrastructure(_) => true,
            AccessKeyError::Entitlement(inner) => inner.is_retryable(),
            _ => false,
        }
    }
}

impl std::fmt::Display for AccessKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AccessKeyError {}

impl From<DomainError> for AccessKeyError {
    fn from(err: DomainError) -> Self {
        match err.code {
            code if code.is_validation() => AccessKeyError::ValidationFailed {
                field: err.field().unwrap_or("input").to_string(),
                message: err.message,
            },
            ErrorCode::UserNotFound => AccessKeyError::UserNotFound(err.message),
            ErrorCode::UpstreamError => AccessKeyError::Upstream(err.message),
            _ => AccessKeyError::Infrastructure(err.message),
        }
    }
}

impl From<ValidationError> for AccessKeyError {
    fn from(err: ValidationError) -> Self {
        AccessKeyError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<EntitlementError> for AccessKeyError {
    fn from(err: EntitlementError) -> Self {
        AccessKeyError::Entitlement(err)
    }
}
