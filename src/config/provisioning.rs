//! VPN provisioning configuration
//!
//! Servers are supplied as one JSON object keyed by country code, e.g.
//! `{"nl": {"name": "Netherlands", "api_url": "https://host:port/secret"}}`.
//! The API URL embeds the management secret, so it is never logged.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::foundation::CountryCode;

/// Provisioning configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisioningConfig {
    /// JSON object mapping country code to server entry
    #[serde(default)]
    pub servers_json: Option<String>,

    /// Timeout for every call to a management API, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// One management server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerEntry {
    /// Location name shown to users
    #[serde(default)]
    pub name: String,

    /// Management API base URL, including its secret path
    pub api_url: String,

    /// Skip certificate verification (self-signed management certs)
    #[serde(default)]
    pub tls_insecure: bool,
}

impl ProvisioningConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parses the server map with normalized country keys.
    pub fn servers(&self) -> Result<BTreeMap<CountryCode, ServerEntry>, ValidationError> {
        let raw = match self.servers_json.as_deref().map(str::trim) {
            None | Some("") => return Ok(BTreeMap::new()),
            Some(raw) => raw,
        };

        let parsed: BTreeMap<String, ServerEntry> = serde_json::from_str(raw)
            .map_err(|e| ValidationError::InvalidServers(e.to_string()))?;

        let mut servers = BTreeMap::new();
        for (key, entry) in parsed {
            let country = CountryCode::new(&key)
                .map_err(|e| ValidationError::InvalidServers(e.to_string()))?;
            let api_url = entry.api_url.trim();
            if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                return Err(ValidationError::InvalidServerUrl(country.to_string()));
            }
            if servers.contains_key(&country) {
                return Err(ValidationError::InvalidServers(format!(
                    "duplicate country '{}'",
                    country
                )));
            }
            servers.insert(country, entry);
        }
        Ok(servers)
    }

    /// Validate provisioning configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }
        self.servers().map(|_| ())
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            servers_json: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_json(json: &str) -> ProvisioningConfig {
        ProvisioningConfig {
            servers_json: Some(json.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_servers_is_empty_map() {
        let config = ProvisioningConfig::default();
        assert!(config.servers().unwrap().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parses_and_normalizes_countries() {
        let config = with_json(
            r#"{"NL": {"name": "Netherlands", "api_url": "https://1.2.3.4:8443/abc", "tls_insecure": true},
                "hk": {"api_url": "https://5.6.7.8/xyz"}}"#,
        );
        let servers = config.servers().unwrap();
        let nl = servers.get(&CountryCode::new("nl").unwrap()).unwrap();
        assert_eq!(nl.name, "Netherlands");
        assert!(nl.tls_insecure);
        let hk = servers.get(&CountryCode::new("hk").unwrap()).unwrap();
        assert!(hk.name.is_empty());
        assert!(!hk.tls_insecure);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            with_json("not json").validate(),
            Err(ValidationError::InvalidServers(_))
        ));
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(matches!(
            with_json(r#"{"nl": {"api_url": "ftp://host"}}"#).validate(),
            Err(ValidationError::InvalidServerUrl(_))
        ));
    }

    #[test]
    fn test_rejects_keys_colliding_after_normalization() {
        let config = with_json(
            r#"{"nl": {"api_url": "https://a"}, "NL": {"api_url": "https://b"}}"#,
        );
        assert!(config.validate().is_err());
    }
}
