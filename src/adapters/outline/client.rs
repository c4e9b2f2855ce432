//! Outline-compatible VPN management API client.
//!
//! Implements [`VpnProvisioner`] against the server's REST API:
//!
//! - `POST   /access-keys`          create a credential (`{"name": ...}`)
//! - `DELETE /access-keys/{id}`     delete a credential (404 when absent;
//!   the id is sent as one percent-encoded path segment)
//! - `GET    /metrics/transfer`     bytes transferred per credential id
//!
//! The base URL carries the management secret, so it is kept in a
//! [`Secret`] and never appears in logs or errors.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::ports::{ProvisioningError, RemoteCredential, VpnProvisioner};

/// Maximum number of response body bytes kept in error messages.
const ERROR_BODY_LIMIT: usize = 512;

/// Configuration for one management server.
#[derive(Debug, Clone)]
pub struct OutlineConfig {
    api_url: Secret<String>,
    /// Accept self-signed certificates.
    pub tls_insecure: bool,
    pub timeout: Duration,
}

impl OutlineConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: Secret::new(api_url.into().trim().trim_end_matches('/').to_string()),
            tls_insecure: false,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_tls_insecure(mut self, tls_insecure: bool) -> Self {
        self.tls_insecure = tls_insecure;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Appends percent-encoded path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Result<Url, ProvisioningError> {
        let mut url = Url::parse(self.api_url.expose_secret())
            .map_err(|e| ProvisioningError::Network(format!("invalid management API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProvisioningError::Network("management API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// [`VpnProvisioner`] backed by an Outline management server.
pub struct OutlineProvisioner {
    config: OutlineConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct CreateAccessKeyRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessKeyResponse {
    id: String,
    #[serde(default)]
    access_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferMetricsResponse {
    #[serde(default)]
    bytes_transferred_by_user_id: HashMap<String, i64>,
}

impl OutlineProvisioner {
    /// Builds the HTTP client for one server.
    ///
    /// # Errors
    ///
    /// `Network` if the TLS backend cannot be initialized.
    pub fn new(config: OutlineConfig) -> Result<Self, ProvisioningError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.tls_insecure)
            .build()
            .map_err(|e| ProvisioningError::Network(format!("client setup failed: {}", e)))?;

        Ok(Self { config, client })
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ProvisioningError> {
        Ok(self.client.request(method, self.config.url(segments)?))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProvisioningError> {
        let response = request.send().await.map_err(|e| {
            // without_url: the URL embeds the management secret
            let e = e.without_url();
            if e.is_timeout() {
                ProvisioningError::Network(format!(
                    "timed out after {}s",
                    self.config.timeout.as_secs()
                ))
            } else {
                ProvisioningError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() >= 300 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisioningError::Http {
                status: status.as_u16(),
                body: truncate(body.trim()),
            });
        }
        Ok(response)
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Negative counters never come from a healthy server; clamp rather than fail.
fn to_byte_counts(raw: HashMap<String, i64>) -> HashMap<String, u64> {
    raw.into_iter()
        .map(|(id, bytes)| (id, u64::try_from(bytes).unwrap_or(0)))
        .collect()
}

#[async_trait]
impl VpnProvisioner for OutlineProvisioner {
    async fn create_credential(&self, name: &str) -> Result<RemoteCredential, ProvisioningError> {
        let response = self
            .send(
                self.request(Method::POST, &["access-keys"])?
                    .json(&CreateAccessKeyRequest { name }),
            )
            .await?;

        let key: AccessKeyResponse = response
            .json()
            .await
            .map_err(|e| ProvisioningError::InvalidResponse(e.without_url().to_string()))?;

        if key.id.is_empty() || key.access_url.is_empty() {
            return Err(ProvisioningError::InvalidResponse(
                "access key response is missing id or accessUrl".to_string(),
            ));
        }

        debug!(remote_id = %key.id, name, "Remote access key created");
        Ok(RemoteCredential {
            id: key.id,
            access_url: key.access_url,
        })
    }

    async fn delete_credential(&self, remote_id: &str) -> Result<(), ProvisioningError> {
        let request = self.request(Method::DELETE, &["access-keys", remote_id])?;
        match self.send(request).await {
            Ok(_) => {
                debug!(remote_id, "Remote access key deleted");
                Ok(())
            }
            Err(ProvisioningError::Http { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Err(ProvisioningError::CredentialNotFound(remote_id.to_string()))
            }
            Err(e) => {
                warn!(remote_id, error = %e, "Remote access key deletion failed");
                Err(e)
            }
        }
    }

    async fn metrics_by_credential(&self) -> Result<HashMap<String, u64>, ProvisioningError> {
        let response = self
            .send(self.request(Method::GET, &["metrics", "transfer"])?)
            .await?;

        let metrics: TransferMetricsResponse = response
            .json()
            .await
            .map_err(|e| ProvisioningError::InvalidResponse(e.without_url().to_string()))?;

        Ok(to_byte_counts(metrics.bytes_transferred_by_user_id))
    }
}
