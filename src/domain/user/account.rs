//! User account entity and the profile snapshot used to upsert it.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ExternalUserId, Timestamp, UserId, ValidationError};

/// A user of the VPN service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Identifier on the chat platform; also the notification chat id.
    pub external_id: ExternalUserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub created_at: Timestamp,
    pub last_activity_at: Timestamp,
}

impl User {
    /// Name to show in admin messages: `@username`, else first/last name,
    /// else the external id.
    pub fn display_name(&self) -> String {
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return format!("@{}", username);
        }
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() {
            self.external_id.to_string()
        } else {
            full
        }
    }
}

/// Profile fields refreshed on every contact.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
}

impl UserProfile {
    /// Trims every field and drops the blank ones.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            username: clean(self.username).map(|u| u.trim_start_matches('@').to_string()),
            first_name: clean(self.first_name),
            last_name: clean(self.last_name),
            language_code: clean(self.language_code).map(|l| l.to_lowercase()),
        }
    }
}

/// Rejects non-positive external ids; chat platforms never assign them.
pub(crate) fn validate_external_id(id: ExternalUserId) -> Result<ExternalUserId, ValidationError> {
    if id.as_i64() <= 0 {
        return Err(ValidationError::invalid_format(
            "external_id",
            "must be a positive integer",
        ));
    }
    Ok(id)
}
