//! Access key entity.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AccessKeyId, CountryCode, ExternalUserId, Timestamp, UserId};

/// Local record of a remote VPN credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKey {
    pub id: AccessKeyId,
    pub user_id: UserId,
    pub country: CountryCode,
    /// Credential id on the remote server.
    pub remote_id: String,
    /// Connection string handed to the VPN client.
    pub access_url: String,
    pub created_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

impl AccessKey {
    pub fn is_live(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// Insert arguments for a freshly provisioned credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccessKey {
    pub user_id: UserId,
    pub country: CountryCode,
    pub remote_id: String,
    pub access_url: String,
    pub created_at: Timestamp,
}

/// Name given to the credential on the remote server: `tg:<external_id>:<country>`.
pub fn remote_key_name(external_id: ExternalUserId, country: &CountryCode) -> String {
    format!("tg:{}:{}", external_id, country)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_name_embeds_external_id_and_country() {
        let country = CountryCode::new("NL").unwrap();
        assert_eq!(remote_key_name(ExternalUserId::new(12345), &country), "tg:12345:nl");
    }

    #[test]
    fn key_without_revocation_is_live() {
        let mut key = AccessKey {
            id: AccessKeyId::new(1),
            user_id: UserId::new(1),
            country: CountryCode::new("nl").unwrap(),
            remote_id: "17".to_string(),
            access_url: "ss://example".to_string(),
            created_at: Timestamp::now(),
            revoked_at: None,
        };
        assert!(key.is_live());

        key.revoked_at = Some(Timestamp::now());
        assert!(!key.is_live());
    }
}
