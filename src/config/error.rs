//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Internal API token must be set in production")]
    InternalTokenRequired,

    #[error("Invalid provisioning servers: {0}")]
    InvalidServers(String),

    #[error("Invalid server API URL for '{0}'")]
    InvalidServerUrl(String),

    #[error("Invalid notification API URL")]
    InvalidNotificationUrl,

    #[error("Renewal payload prefix must be non-empty and must not contain ':'")]
    InvalidRenewalPrefix,

    #[error("Invalid currency code")]
    InvalidCurrency,

    #[error("Scheduler interval must be positive")]
    InvalidInterval,
}
