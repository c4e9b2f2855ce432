//! Builds the per-country provisioner registry from configuration.

use std::sync::Arc;

use tracing::info;

use super::{OutlineConfig, OutlineProvisioner};
use crate::config::{ProvisioningConfig, ValidationError};
use crate::ports::ProvisionerRegistry;

/// One [`OutlineProvisioner`] per configured country.
///
/// # Errors
///
/// `InvalidServers` when the server map does not parse or a client
/// cannot be built.
pub fn build_registry(config: &ProvisioningConfig) -> Result<ProvisionerRegistry, ValidationError> {
    let mut registry = ProvisionerRegistry::new();

    for (country, entry) in config.servers()? {
        let provisioner = OutlineProvisioner::new(
            OutlineConfig::new(entry.api_url.clone())
                .with_tls_insecure(entry.tls_insecure)
                .with_timeout(config.request_timeout()),
        )
        .map_err(|e| ValidationError::InvalidServers(format!("{}: {}", country, e)))?;

        info!(
            country = %country,
            name = %entry.name,
            tls_insecure = entry.tls_insecure,
            "Registered VPN server"
        );
        registry.register(country, entry.name, Arc::new(provisioner));
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::CountryCode;

    #[test]
    fn builds_one_provisioner_per_country() {
        let config = ProvisioningConfig {
            servers_json: Some(
                r#"{"nl": {"name": "Netherlands", "api_url": "https://a/secret"},
                    "DE": {"api_url": "https://b/secret", "tls_insecure": true}}"#
                    .to_string(),
            ),
            ..Default::default()
        };

        let registry = build_registry(&config).unwrap();
        assert_eq!(
            registry.countries(),
            vec![CountryCode::new("de").unwrap(), CountryCode::new("nl").unwrap()]
        );
        assert_eq!(registry.display_name(&CountryCode::new("de").unwrap()), "DE");
        assert_eq!(
            registry.display_name(&CountryCode::new("nl").unwrap()),
            "Netherlands"
        );
    }

    #[test]
    fn empty_config_builds_empty_registry() {
        let registry = build_registry(&ProvisioningConfig::default()).unwrap();
        assert!(registry.is_empty());
    }
}
