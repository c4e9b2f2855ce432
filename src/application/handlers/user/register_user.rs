//! RegisterUserHandler - Command handler for first contact and profile refresh.

use std::sync::Arc;

use tracing::debug;

use crate::domain::foundation::{DomainError, ExternalUserId, Timestamp};
use crate::domain::user::{validate_external_id, User, UserProfile};
use crate::ports::UserRepository;

/// Command to create or refresh a user.
#[derive(Debug, Clone)]
pub struct RegisterUserCommand {
    pub external_id: ExternalUserId,
    pub profile: UserProfile,
}

/// Result of a registration.
#[derive(Debug, Clone)]
pub struct RegisterUserResult {
    pub user: User,
}

/// Handler upserting users by their external id.
pub struct RegisterUserHandler {
    users: Arc<dyn UserRepository>,
}

impl RegisterUserHandler {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    pub async fn handle(&self, cmd: RegisterUserCommand) -> Result<RegisterUserResult, DomainError> {
        let external_id = validate_external_id(cmd.external_id)?;
        let user = self
            .users
            .upsert(external_id, &cmd.profile.normalized(), Timestamp::now())
            .await?;

        debug!(user_id = %user.id, external_id = %external_id, "User registered");
        Ok(RegisterUserResult { user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::foundation::ErrorCode;

    fn handler() -> RegisterUserHandler {
        RegisterUserHandler::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn creates_then_refreshes() {
        let handler = handler();
        let first = handler
            .handle(RegisterUserCommand {
                external_id: ExternalUserId::new(100),
                profile: UserProfile {
                    username: Some(" @neo ".to_string()),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        let second = handler
            .handle(RegisterUserCommand {
                external_id: ExternalUserId::new(100),
                profile: UserProfile::default(),
            })
            .await
            .unwrap();

        assert_eq!(first.user.username.as_deref(), Some("neo"));
        assert_eq!(second.user.username, None);
        assert_eq!(first.user.id, second.user.id);
    }

    #[tokio::test]
    async fn rejects_non_positive_external_id() {
        let err = handler()
            .handle(RegisterUserCommand {
                external_id: ExternalUserId::new(0),
                profile: UserProfile::default(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
