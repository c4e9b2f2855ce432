//! PostgreSQL implementation of AccessKeyRepository.

use crate::domain::access::{AccessKey, NewAccessKey};
use crate::domain::foundation::{
    AccessKeyId, CountryCode, DomainError, ErrorCode, Timestamp, UserId,
};
use crate::ports::AccessKeyRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Partial unique index allowing one live key per (user, country).
const ONE_LIVE_KEY_CONSTRAINT: &str = "access_keys_one_live_per_user_country";

const ACCESS_KEY_COLUMNS: &str =
    "id, user_id, country_code, remote_key_id, access_url, created_at, revoked_at";

/// PostgreSQL implementation of the AccessKeyRepository port.
pub struct PostgresAccessKeyRepository {
    pool: PgPool,
}

impl PostgresAccessKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccessKeyRow {
    id: i64,
    user_id: i64,
    country_code: String,
    remote_key_id: String,
    access_url: String,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl TryFrom<AccessKeyRow> for AccessKey {
    type Error = DomainError;

    fn try_from(row: AccessKeyRow) -> Result<Self, Self::Error> {
        let country = CountryCode::new(&row.country_code).map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid country value: {}", e),
            )
        })?;
        Ok(AccessKey {
            id: AccessKeyId::new(row.id),
            user_id: UserId::new(row.user_id),
            country,
            remote_id: row.remote_key_id,
            access_url: row.access_url,
            created_at: Timestamp::from_datetime(row.created_at),
            revoked_at: row.revoked_at.map(Timestamp::from_datetime),
        })
    }
}

#[async_trait]
impl AccessKeyRepository for PostgresAccessKeyRepository {
    async fn find_live(
        &self,
        user_id: UserId,
        country: &CountryCode,
    ) -> Result<Option<AccessKey>, DomainError> {
        let row: Option<AccessKeyRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM access_keys
            WHERE user_id = $1 AND country_code = $2 AND revoked_at IS NULL
            "#,
            ACCESS_KEY_COLUMNS
        ))
        .bind(user_id.as_i64())
        .bind(country.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch live access key: {}", e),
            )
        })?;

        row.map(AccessKey::try_from).transpose()
    }

    async fn list_live_by_user(&self, user_id: UserId) -> Result<Vec<AccessKey>, DomainError> {
        let rows: Vec<AccessKeyRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM access_keys
            WHERE user_id = $1 AND revoked_at IS NULL
            ORDER BY country_code ASC
            "#,
            ACCESS_KEY_COLUMNS
        ))
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list access keys: {}", e),
            )
        })?;

        rows.into_iter().map(AccessKey::try_from).collect()
    }

    async fn find_by_id(&self, id: AccessKeyId) -> Result<Option<AccessKey>, DomainError> {
        let row: Option<AccessKeyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM access_keys WHERE id = $1",
            ACCESS_KEY_COLUMNS
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch access key: {}", e),
            )
        })?;

        row.map(AccessKey::try_from).transpose()
    }

    async fn insert(&self, key: &NewAccessKey) -> Result<AccessKey, DomainError> {
        let row: AccessKeyRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO access_keys (user_id, country_code, remote_key_id, access_url, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            ACCESS_KEY_COLUMNS
        ))
        .bind(key.user_id.as_i64())
        .bind(key.country.as_str())
        .bind(&key.remote_id)
        .bind(&key.access_url)
        .bind(key.created_at.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some(ONE_LIVE_KEY_CONSTRAINT) {
                    return DomainError::new(
                        ErrorCode::Conflict,
                        format!(
                            "User {} already has a live key for {}",
                            key.user_id, key.country
                        ),
                    );
                }
            }
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert access key: {}", e),
            )
        })?;

        row.try_into()
    }

    async fn mark_revoked(&self, id: AccessKeyId, at: Timestamp) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE access_keys SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id.as_i64())
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to revoke access key: {}", e),
            )
        })?;

        Ok(result.rows_affected() > 0)
    }
}
