//! Access-Key Binder - (user, country) to remote credential mapping.
//!
//! Remote calls resolve the provisioner through the per-country registry.
//! The live-key unique index backs the at-most-one invariant; `issue` is
//! always preceded by `get_active` in [`AccessKeyBinder::issue_or_reuse`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::access::{AccessKey, AccessKeyError, NewAccessKey};
use crate::domain::foundation::{CountryCode, ErrorCode, Timestamp, UserId};
use crate::ports::{AccessKeyRepository, ProvisionerRegistry, RegisteredServer};

/// Service binding users to remote VPN credentials.
#[derive(Clone)]
pub struct AccessKeyBinder {
    keys: Arc<dyn AccessKeyRepository>,
    registry: Arc<ProvisionerRegistry>,
}

/// Whether `issue_or_reuse` provisioned a new credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedKey {
    pub key: AccessKey,
    pub reused: bool,
}

impl AccessKeyBinder {
    pub fn new(keys: Arc<dyn AccessKeyRepository>, registry: Arc<ProvisionerRegistry>) -> Self {
        Self { keys, registry }
    }

    pub fn registry(&self) -> &ProvisionerRegistry {
        &self.registry
    }

    fn server(&self, country: &CountryCode) -> Result<&RegisteredServer, AccessKeyError> {
        self.registry
            .get(country)
            .ok_or_else(|| AccessKeyError::provider_not_configured(country.clone()))
    }

    /// The live key for (user, country), if any.
    pub async fn get_active(
        &self,
        user_id: UserId,
        country: &CountryCode,
    ) -> Result<Option<AccessKey>, AccessKeyError> {
        Ok(self.keys.find_live(user_id, country).await?)
    }

    /// All live keys of the user.
    pub async fn list_live(&self, user_id: UserId) -> Result<Vec<AccessKey>, AccessKeyError> {
        Ok(self.keys.list_live_by_user(user_id).await?)
    }

    /// Creates a remote credential and records it locally.
    ///
    /// When the local insert fails the remote credential is deleted again
    /// (best-effort) so no orphan is left behind.
    pub async fn issue(
        &self,
        user_id: UserId,
        country: &CountryCode,
        remote_name: &str,
        now: Timestamp,
    ) -> Result<AccessKey, AccessKeyError> {
        let server = self.server(country)?;

        // 1. Remote create
        let credential = server
            .provisioner
            .create_credential(remote_name)
            .await
            .map_err(|e| AccessKeyError::upstream(e.to_string()))?;

        // 2. Local insert
        let new_key = NewAccessKey {
            user_id,
            country: country.clone(),
            remote_id: credential.id.clone(),
            access_url: credential.access_url,
            created_at: now,
        };
        match self.keys.insert(&new_key).await {
            Ok(key) => {
                info!(
                    user_id = %user_id,
                    country = %country,
                    access_key_id = %key.id,
                    remote_id = %key.remote_id,
                    "Access key issued"
                );
                Ok(key)
            }
            Err(insert_err) => {
                // 3. Compensate: drop the credential we just created
                if let Err(e) = server.provisioner.delete_credential(&credential.id).await {
                    warn!(
                        remote_id = %credential.id,
                        country = %country,
                        error = %e,
                        "Failed to delete orphaned remote credential"
                    );
                }
                Err(match insert_err.code {
                    ErrorCode::Conflict => AccessKeyError::already_live(user_id, country.clone()),
                    _ => AccessKeyError::from(insert_err),
                })
            }
        }
    }

    /// Returns the live key when there is one, otherwise issues a new key.
    pub async fn issue_or_reuse(
        &self,
        user_id: UserId,
        country: &CountryCode,
        remote_name: &str,
        now: Timestamp,
    ) -> Result<IssuedKey, AccessKeyError> {
        if let Some(key) = self.get_active(user_id, country).await? {
            debug!(user_id = %user_id, country = %country, access_key_id = %key.id, "Reusing live key");
            return Ok(IssuedKey { key, reused: true });
        }
        let key = self.issue(user_id, country, remote_name, now).await?;
        Ok(IssuedKey { key, reused: false })
    }

    /// Deletes the remote credential, then marks the local row revoked.
    ///
    /// A credential that is already gone remotely counts as deleted. An
    /// already revoked key is left untouched.
    pub async fn revoke(&self, key: &AccessKey, at: Timestamp) -> Result<(), AccessKeyError> {
        if !key.is_live() {
            debug!(access_key_id = %key.id, "Access key already revoked");
            return Ok(());
        }
        let server = self.server(&key.country)?;

        match server.provisioner.delete_credential(&key.remote_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(remote_id = %key.remote_id, "Remote credential already absent");
            }
            Err(e) => return Err(AccessKeyError::upstream(e.to_string())),
        }

        let revoked = self.keys.mark_revoked(key.id, at).await?;
        info!(
            access_key_id = %key.id,
            user_id = %key.user_id,
            country = %key.country,
            revoked,
            "Access key revoked"
        );
        Ok(())
    }

    /// Bytes transferred per remote credential id on the country's server.
    pub async fn traffic_usage(
        &self,
        country: &CountryCode,
    ) -> Result<HashMap<String, u64>, AccessKeyError> {
        self.server(country)?
            .provisioner
            .metrics_by_credential()
            .await
            .map_err(|e| AccessKeyError::upstream(e.to_string()))
    }
}
