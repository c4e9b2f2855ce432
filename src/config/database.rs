//! Storage configuration
//!
//! An unset URL selects the in-memory store. The URL carries credentials,
//! so it is held as a secret and never shows up in `Debug` output.

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Where repositories keep their rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local store; state is lost on restart.
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default)]
    pub url: Option<Secret<String>>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Seconds to wait for a free pooled connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Server-side limit per statement in milliseconds. Bucket lock waits
    /// count against it, so a stuck writer surfaces as an error.
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_ms: u64,

    /// Apply bundled migrations before serving
    #[serde(default)]
    pub run_migrations: bool,
}

impl DatabaseConfig {
    /// The configured URL, ignoring blank values.
    pub fn url(&self) -> Option<&str> {
        self.url
            .as_ref()
            .map(|url| url.expose_secret().as_str())
            .filter(|url| !url.trim().is_empty())
    }

    pub fn backend(&self) -> StorageBackend {
        match self.url() {
            Some(_) => StorageBackend::Postgres,
            None => StorageBackend::InMemory,
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    /// Checks the Postgres settings. The in-memory backend has none.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let Some(url) = self.url() else {
            return Ok(());
        };
        if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
            return Err(ValidationError::InvalidDatabaseUrl);
        }
        if self.max_connections == 0 || self.min_connections > self.max_connections {
            return Err(ValidationError::InvalidPoolSize);
        }
        if self.acquire_timeout_secs == 0 || self.statement_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            statement_timeout_ms: default_statement_timeout(),
            run_migrations: false,
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    5
}

fn default_statement_timeout() -> u64 {
    15_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postgres(url: &str) -> DatabaseConfig {
        DatabaseConfig {
            url: Some(Secret::new(url.to_string())),
            ..Default::default()
        }
    }

    #[test]
    fn missing_or_blank_url_selects_memory() {
        assert_eq!(DatabaseConfig::default().backend(), StorageBackend::InMemory);
        assert_eq!(postgres("  ").backend(), StorageBackend::InMemory);
        assert!(postgres("  ").validate().is_ok());
    }

    #[test]
    fn postgres_url_selects_postgres() {
        let config = postgres("postgresql://vpn@localhost/vpn");
        assert_eq!(config.backend(), StorageBackend::Postgres);
        assert_eq!(config.url(), Some("postgresql://vpn@localhost/vpn"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_output_hides_credentials() {
        let config = postgres("postgres://vpn:hunter2@db/vpn");
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn timeouts_convert_to_durations() {
        let config = DatabaseConfig {
            acquire_timeout_secs: 3,
            statement_timeout_ms: 250,
            ..Default::default()
        };
        assert_eq!(config.acquire_timeout(), Duration::from_secs(3));
        assert_eq!(config.statement_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn rejects_foreign_scheme() {
        assert!(matches!(
            postgres("mysql://localhost/vpn").validate(),
            Err(ValidationError::InvalidDatabaseUrl)
        ));
    }

    #[test]
    fn rejects_inverted_pool_bounds() {
        let config = DatabaseConfig {
            min_connections: 4,
            max_connections: 2,
            ..postgres("postgres://localhost/vpn")
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidPoolSize)));
    }

    #[test]
    fn rejects_zero_statement_timeout() {
        let config = DatabaseConfig {
            statement_timeout_ms: 0,
            ..postgres("postgres://localhost/vpn")
        };
        assert!(matches!(config.validate(), Err(ValidationError::InvalidTimeout)));
    }
}
