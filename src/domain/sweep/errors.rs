//! Sweep error types.

use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::ErrorCode;

/// Errors that abort a whole sweep run. Per-row problems are recorded in
/// the report instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepError {
    /// Another run is still in progress.
    AlreadyRunning,

    /// Listing expired entitlements failed.
    Entitlement(EntitlementError),
}

impl SweepError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SweepError::AlreadyRunning => ErrorCode::TaskAlreadyRunning,
            SweepError::Entitlement(inner) => inner.code(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            SweepError::AlreadyRunning => "Expiration sweep is already running".to_string(),
            SweepError::Entitlement(inner) => inner.message(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SweepError::AlreadyRunning => true,
            SweepError::Entitlement(inner) => inner.is_retryable(),
        }
    }
}

impl std::fmt::Display for SweepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SweepError {}

impl From<EntitlementError> for SweepError {
    fn from(err: EntitlementError) -> Self {
        SweepError::Entitlement(err)
    }
}
