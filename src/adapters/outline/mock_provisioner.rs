//! Mock VPN provisioner for testing.
//!
//! Keeps credentials in memory, counts calls, and can be told to fail.
//!
//! # Example
//!
//! ```ignore
//! let provisioner = MockProvisioner::new();
//! let credential = provisioner.create_credential("tg:1:nl").await?;
//! assert_eq!(provisioner.create_calls(), 1);
//! assert!(provisioner.has_credential(&credential.id));
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::ports::{ProvisioningError, RemoteCredential, VpnProvisioner};

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    credentials: HashMap<String, String>,
    names: Vec<String>,
    deleted: Vec<String>,
    create_calls: usize,
    delete_calls: usize,
    fail_create: bool,
    fail_delete: bool,
    fail_metrics: bool,
    metrics: HashMap<String, u64>,
}

/// In-memory provisioner with failure injection and call tracking.
#[derive(Debug, Clone, Default)]
pub struct MockProvisioner {
    state: Arc<Mutex<MockState>>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every create call fail with an upstream error.
    pub fn fail_creates(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    /// Make every delete call fail with an upstream error.
    pub fn fail_deletes(&self, fail: bool) {
        self.lock().fail_delete = fail;
    }

    pub fn fail_metrics(&self, fail: bool) {
        self.lock().fail_metrics = fail;
    }

    /// Drop a credential as if it was removed out of band.
    pub fn forget(&self, remote_id: &str) {
        self.lock().credentials.remove(remote_id);
    }

    pub fn set_traffic(&self, remote_id: &str, bytes: u64) {
        self.lock().metrics.insert(remote_id.to_string(), bytes);
    }

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.lock().delete_calls
    }

    /// Names passed to successful create calls, in order.
    pub fn created_names(&self) -> Vec<String> {
        self.lock().names.clone()
    }

    /// Ids removed by successful delete calls, in order.
    pub fn deleted_ids(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    pub fn has_credential(&self, remote_id: &str) -> bool {
        self.lock().credentials.contains_key(remote_id)
    }

    pub fn credential_count(&self) -> usize {
        self.lock().credentials.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl VpnProvisioner for MockProvisioner {
    async fn create_credential(&self, name: &str) -> Result<RemoteCredential, ProvisioningError> {
        let mut state = self.lock();
        state.create_calls += 1;
        if state.fail_create {
            return Err(ProvisioningError::Http {
                status: 500,
                body: "mock create failure".to_string(),
            });
        }

        state.next_id += 1;
        let id = state.next_id.to_string();
        let access_url = format!("ss://mock-{}@vpn.test:443/?outline=1#{}", id, name);
        state.credentials.insert(id.clone(), access_url.clone());
        state.names.push(name.to_string());

        Ok(RemoteCredential { id, access_url })
    }

    async fn delete_credential(&self, remote_id: &str) -> Result<(), ProvisioningError> {
        let mut state = self.lock();
        state.delete_calls += 1;
        if state.fail_delete {
            return Err(ProvisioningError::Network("mock delete failure".to_string()));
        }
        if state.credentials.remove(remote_id).is_none() {
            return Err(ProvisioningError::CredentialNotFound(remote_id.to_string()));
        }
        state.deleted.push(remote_id.to_string());
        Ok(())
    }

    async fn metrics_by_credential(&self) -> Result<HashMap<String, u64>, ProvisioningError> {
        let state = self.lock();
        if state.fail_metrics {
            return Err(ProvisioningError::Network("mock metrics failure".to_string()));
        }
        Ok(state.metrics.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_delete() {
        let provisioner = MockProvisioner::new();
        let credential = provisioner.create_credential("tg:1:nl").await.unwrap();

        assert!(provisioner.has_credential(&credential.id));
        provisioner.delete_credential(&credential.id).await.unwrap();
        assert!(!provisioner.has_credential(&credential.id));
        assert_eq!(provisioner.deleted_ids(), vec![credential.id]);
    }

    #[tokio::test]
    async fn deleting_unknown_credential_is_not_found() {
        let provisioner = MockProvisioner::new();
        let err = provisioner.delete_credential("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn injected_create_failure_counts_call() {
        let provisioner = MockProvisioner::new();
        provisioner.fail_creates(true);

        assert!(provisioner.create_credential("tg:1:nl").await.is_err());
        assert_eq!(provisioner.create_calls(), 1);
        assert_eq!(provisioner.credential_count(), 0);
    }
}
