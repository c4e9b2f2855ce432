//! VPN provisioner port.
//!
//! Abstracts the remote VPN-management API that creates and deletes
//! credentials. One provisioner serves one country; the
//! [`ProvisionerRegistry`] maps countries to their provisioner.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::CountryCode;

/// Port for a remote VPN-management server.
#[async_trait]
pub trait VpnProvisioner: Send + Sync {
    /// Create a credential with the given display name.
    async fn create_credential(&self, name: &str) -> Result<RemoteCredential, ProvisioningError>;

    /// Delete a credential.
    ///
    /// # Errors
    ///
    /// - `CredentialNotFound` if the server has no such credential
    async fn delete_credential(&self, remote_id: &str) -> Result<(), ProvisioningError>;

    /// Bytes transferred per credential id.
    async fn metrics_by_credential(&self) -> Result<HashMap<String, u64>, ProvisioningError>;
}

/// A credential as created on the remote server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCredential {
    pub id: String,
    pub access_url: String,
}

/// Errors from the provisioning API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisioningError {
    /// The credential does not exist on the server.
    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    /// The server answered with a non-success status.
    #[error("provisioning API returned {status}: {body}")]
    Http { status: u16, body: String },

    /// The request could not be sent or timed out.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProvisioningError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProvisioningError::CredentialNotFound(_))
    }
}

/// A configured server for one country.
#[derive(Clone)]
pub struct RegisteredServer {
    /// Human-readable location name shown to users.
    pub name: String,
    pub provisioner: Arc<dyn VpnProvisioner>,
}

/// Per-country provisioner lookup built from configuration.
#[derive(Clone, Default)]
pub struct ProvisionerRegistry {
    servers: HashMap<CountryCode, RegisteredServer>,
}

impl ProvisionerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(
        mut self,
        country: CountryCode,
        name: impl Into<String>,
        provisioner: Arc<dyn VpnProvisioner>,
    ) -> Self {
        self.register(country, name, provisioner);
        self
    }

    pub fn register(
        &mut self,
        country: CountryCode,
        name: impl Into<String>,
        provisioner: Arc<dyn VpnProvisioner>,
    ) {
        self.servers.insert(
            country,
            RegisteredServer {
                name: name.into(),
                provisioner,
            },
        );
    }

    pub fn get(&self, country: &CountryCode) -> Option<&RegisteredServer> {
        self.servers.get(country)
    }

    pub fn contains(&self, country: &CountryCode) -> bool {
        self.servers.contains_key(country)
    }

    /// Display name for a country: the configured server name, else the
    /// uppercase code.
    pub fn display_name(&self, country: &CountryCode) -> String {
        self.servers
            .get(country)
            .map(|server| server.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| country.label())
    }

    /// Configured countries, sorted.
    pub fn countries(&self) -> Vec<CountryCode> {
        let mut countries: Vec<_> = self.servers.keys().cloned().collect();
        countries.sort();
        countries
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

impl std::fmt::Debug for ProvisionerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionerRegistry")
            .field("countries", &self.countries())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopProvisioner;

    #[async_trait]
    impl VpnProvisioner for NoopProvisioner {
        async fn create_credential(&self, _name: &str) -> Result<RemoteCredential, ProvisioningError> {
            Err(ProvisioningError::Network("noop".to_string()))
        }

        async fn delete_credential(&self, remote_id: &str) -> Result<(), ProvisioningError> {
            Err(ProvisioningError::CredentialNotFound(remote_id.to_string()))
        }

        async fn metrics_by_credential(&self) -> Result<HashMap<String, u64>, ProvisioningError> {
            Ok(HashMap::new())
        }
    }

    #[test]
    fn vpn_provisioner_is_object_safe() {
        fn _accepts_dyn(_provisioner: &dyn VpnProvisioner) {}
    }

    #[test]
    fn registry_resolves_configured_countries() {
        let nl = CountryCode::new("nl").unwrap();
        let registry = ProvisionerRegistry::new().with_server(
            nl.clone(),
            "Netherlands",
            Arc::new(NoopProvisioner),
        );

        assert!(registry.contains(&nl));
        assert!(!registry.contains(&CountryCode::new("hk").unwrap()));
        assert_eq!(registry.display_name(&nl), "Netherlands");
        assert_eq!(registry.display_name(&CountryCode::new("hk").unwrap()), "HK");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn not_found_is_distinguished() {
        assert!(ProvisioningError::CredentialNotFound("1".to_string()).is_not_found());
        assert!(!ProvisioningError::Http {
            status: 500,
            body: String::new()
        }
        .is_not_found());
    }
}
