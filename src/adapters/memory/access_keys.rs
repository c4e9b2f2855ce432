//! In-memory access key repository.

use async_trait::async_trait;

use crate::domain::access::{AccessKey, NewAccessKey};
use crate::domain::foundation::{
    AccessKeyId, CountryCode, DomainError, ErrorCode, Timestamp, UserId,
};
use crate::ports::AccessKeyRepository;

use super::InMemoryStore;

#[async_trait]
impl AccessKeyRepository for InMemoryStore {
    async fn find_live(
        &self,
        user_id: UserId,
        country: &CountryCode,
    ) -> Result<Option<AccessKey>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .access_keys
            .iter()
            .find(|k| k.user_id == user_id && &k.country == country && k.is_live())
            .cloned())
    }

    async fn list_live_by_user(&self, user_id: UserId) -> Result<Vec<AccessKey>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .access_keys
            .iter()
            .filter(|k| k.user_id == user_id && k.is_live())
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: AccessKeyId) -> Result<Option<AccessKey>, DomainError> {
        let state = self.state.read().await;
        Ok(state.access_keys.iter().find(|k| k.id == id).cloned())
    }

    async fn insert(&self, key: &NewAccessKey) -> Result<AccessKey, DomainError> {
        let mut state = self.state.write().await;
        let duplicate = state
            .access_keys
            .iter()
            .any(|k| k.user_id == key.user_id && k.country == key.country && k.is_live());
        if duplicate {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                format!(
                    "User {} already has a live access key for '{}'",
                    key.user_id, key.country
                ),
            ));
        }

        let stored = AccessKey {
            id: AccessKeyId::new(state.next_id()),
            user_id: key.user_id,
            country: key.country.clone(),
            remote_id: key.remote_id.clone(),
            access_url: key.access_url.clone(),
            created_at: key.created_at,
            revoked_at: None,
        };
        state.access_keys.push(stored.clone());
        Ok(stored)
    }

    async fn mark_revoked(&self, id: AccessKeyId, at: Timestamp) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        match state
            .access_keys
            .iter_mut()
            .find(|k| k.id == id && k.is_live())
        {
            Some(key) => {
                key.revoked_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_key(user: i64, country: &str) -> NewAccessKey {
        NewAccessKey {
            user_id: UserId::new(user),
            country: CountryCode::new(country).unwrap(),
            remote_id: "7".to_string(),
            access_url: "ss://key".to_string(),
            created_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn second_live_key_is_a_conflict() {
        let store = InMemoryStore::new();
        store.insert(&new_key(1, "nl")).await.unwrap();

        let err = store.insert(&new_key(1, "nl")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);

        // Another country is fine.
        store.insert(&new_key(1, "hk")).await.unwrap();
    }

    #[tokio::test]
    async fn revoked_key_frees_the_slot() {
        let store = InMemoryStore::new();
        let key = store.insert(&new_key(1, "nl")).await.unwrap();

        assert!(store.mark_revoked(key.id, Timestamp::now()).await.unwrap());
        assert!(!store.mark_revoked(key.id, Timestamp::now()).await.unwrap());
        assert!(store
            .find_live(UserId::new(1), &CountryCode::new("nl").unwrap())
            .await
            .unwrap()
            .is_none());

        store.insert(&new_key(1, "nl")).await.unwrap();
    }
}
