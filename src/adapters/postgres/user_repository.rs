//! PostgreSQL implementation of UserRepository.

use crate::domain::entitlement::SubscriptionKind;
use crate::domain::foundation::{DomainError, ErrorCode, ExternalUserId, Timestamp, UserId};
use crate::domain::user::{User, UserProfile};
use crate::ports::UserRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// PostgreSQL implementation of the UserRepository port.
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a new PostgresUserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a user.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    external_id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    language_code: Option<String>,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::new(row.id),
            external_id: ExternalUserId::new(row.external_id),
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            language_code: row.language_code,
            created_at: Timestamp::from_datetime(row.created_at),
            last_activity_at: Timestamp::from_datetime(row.last_activity_at),
        }
    }
}

const USER_COLUMNS: &str = "id, external_id, username, first_name, last_name, language_code, \
                            created_at, last_activity_at";

fn list_error(e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Failed to list users: {}", e))
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn upsert(
        &self,
        external_id: ExternalUserId,
        profile: &UserProfile,
        at: Timestamp,
    ) -> Result<User, DomainError> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (external_id, username, first_name, last_name, language_code,
                               created_at, last_activity_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (external_id) DO UPDATE SET
                username = EXCLUDED.username,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                language_code = EXCLUDED.language_code,
                last_activity_at = EXCLUDED.last_activity_at
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(external_id.as_i64())
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.language_code)
        .bind(at.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to upsert user: {}", e))
        })?;

        Ok(row.into())
    }

    async fn find_by_external_id(
        &self,
        external_id: ExternalUserId,
    ) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE external_id = $1",
            USER_COLUMNS
        ))
        .bind(external_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to fetch user: {}", e))
        })?;

        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::new(
                        ErrorCode::DatabaseError,
                        format!("Failed to fetch user: {}", e),
                    )
                })?;

        Ok(row.map(User::from))
    }

    async fn count_all(&self) -> Result<u64, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Failed to count users: {}", e))
            })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn list_all(&self) -> Result<Vec<User>, DomainError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users ORDER BY created_at ASC, id ASC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(list_error)?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn list_with_active_subscription(
        &self,
        kind: SubscriptionKind,
        now: Timestamp,
    ) -> Result<Vec<User>, DomainError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM users u
            WHERE EXISTS (
                SELECT 1 FROM subscriptions s
                WHERE s.user_id = u.id AND s.kind = $1 AND s.status = 'paid'
                  AND s.active_until > $2
            )
            ORDER BY u.created_at ASC, u.id ASC
            "#,
            USER_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(list_error)?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn list_without_subscription(
        &self,
        kind: SubscriptionKind,
    ) -> Result<Vec<User>, DomainError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM users u
            WHERE NOT EXISTS (
                SELECT 1 FROM subscriptions s
                WHERE s.user_id = u.id AND s.kind = $1 AND s.status = 'paid'
            )
            ORDER BY u.created_at ASC, u.id ASC
            "#,
            USER_COLUMNS
        ))
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(list_error)?;

        Ok(rows.into_iter().map(User::from).collect())
    }
}
