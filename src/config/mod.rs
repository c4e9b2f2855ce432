//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `VPN_ENGINE` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use vpn_entitlements::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr());
//! ```

mod database;
mod error;
mod notification;
mod payments;
mod promotion;
mod provisioning;
mod scheduler;
mod server;

pub use database::{DatabaseConfig, StorageBackend};
pub use error::{ConfigError, ValidationError};
pub use notification::NotificationConfig;
pub use payments::PaymentsConfig;
pub use promotion::PromotionConfig;
pub use provisioning::{ProvisioningConfig, ServerEntry};
pub use scheduler::SchedulerConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, internal token)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration; an empty URL selects in-memory storage
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Per-country VPN management servers
    #[serde(default)]
    pub provisioning: ProvisioningConfig,

    /// Chat notifications
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Promocode eligibility
    #[serde(default)]
    pub promotion: PromotionConfig,

    /// Payment payload conventions
    #[serde(default)]
    pub payments: PaymentsConfig,

    /// Periodic tasks
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `VPN_ENGINE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `VPN_ENGINE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `VPN_ENGINE__DATABASE__URL=...` -> `database.url = ...`
    /// - `VPN_ENGINE__PROVISIONING__SERVERS_JSON={...}` -> per-country servers
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("VPN_ENGINE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Production additionally requires a database and an internal token.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        if self.database.backend() == StorageBackend::InMemory && self.is_production() {
            return Err(ValidationError::MissingRequired("VPN_ENGINE__DATABASE__URL"));
        }
        self.provisioning.validate()?;
        self.notification.validate()?;
        self.payments.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::promotion::EligibilityPolicy;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "VPN_ENGINE__DATABASE__URL",
        "VPN_ENGINE__SERVER__PORT",
        "VPN_ENGINE__SERVER__ENVIRONMENT",
        "VPN_ENGINE__SERVER__INTERNAL_TOKEN",
        "VPN_ENGINE__PROVISIONING__SERVERS_JSON",
        "VPN_ENGINE__PROMOTION__ELIGIBILITY_POLICY",
        "VPN_ENGINE__NOTIFICATION__ADMIN_CHAT_ID",
    ];

    fn set_minimal_env() {
        env::set_var("VPN_ENGINE__DATABASE__URL", "postgresql://vpn@localhost/vpn");
        env::set_var(
            "VPN_ENGINE__PROVISIONING__SERVERS_JSON",
            r#"{"nl": {"name": "Netherlands", "api_url": "https://10.0.0.1:8443/secret"}}"#,
        );
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.database.url(), Some("postgresql://vpn@localhost/vpn"));
        assert_eq!(config.provisioning.servers().unwrap().len(), 1);
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_without_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.backend(), StorageBackend::InMemory);
        assert_eq!(
            config.promotion.eligibility_policy,
            EligibilityPolicy::EverHad
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_eligibility_policy_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("VPN_ENGINE__PROMOTION__ELIGIBILITY_POLICY", "currently_active");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(
            result.unwrap().promotion.eligibility_policy,
            EligibilityPolicy::CurrentlyActive
        );
    }

    #[test]
    fn test_production_requires_database_and_token() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("VPN_ENGINE__SERVER__ENVIRONMENT", "production");
        env::set_var("VPN_ENGINE__SERVER__INTERNAL_TOKEN", "token");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_custom_server_port_and_admin_chat() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("VPN_ENGINE__SERVER__PORT", "3000");
        env::set_var("VPN_ENGINE__NOTIFICATION__ADMIN_CHAT_ID", "4242");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.notification.admin_chat_id, Some(4242));
    }
}
