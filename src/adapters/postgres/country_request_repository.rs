//! PostgreSQL implementation of CountryRequestRepository.

use crate::domain::entitlement::{CountryRequest, NewCountryRequest};
use crate::domain::foundation::{
    CountryRequestId, DomainError, ErrorCode, SubscriptionId, Timestamp, UserId,
};
use crate::ports::CountryRequestRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub struct PostgresCountryRequestRepository {
    pool: PgPool,
}

impl PostgresCountryRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CountryRequestRow {
    id: i64,
    user_id: i64,
    subscription_id: Option<i64>,
    request_text: String,
    created_at: DateTime<Utc>,
}

impl From<CountryRequestRow> for CountryRequest {
    fn from(row: CountryRequestRow) -> Self {
        CountryRequest {
            id: CountryRequestId::new(row.id),
            user_id: UserId::new(row.user_id),
            subscription_id: row.subscription_id.map(SubscriptionId::new),
            text: row.request_text,
            created_at: Timestamp::from_datetime(row.created_at),
        }
    }
}

#[async_trait]
impl CountryRequestRepository for PostgresCountryRequestRepository {
    async fn insert(
        &self,
        request: &NewCountryRequest,
        at: Timestamp,
    ) -> Result<CountryRequest, DomainError> {
        let row: CountryRequestRow = sqlx::query_as(
            r#"
            INSERT INTO countries_to_add (user_id, subscription_id, request_text, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, subscription_id, request_text, created_at
            "#,
        )
        .bind(request.user_id.as_i64())
        .bind(request.subscription_id.map(|id| id.as_i64()))
        .bind(&request.text)
        .bind(at.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to record country request: {}", e),
            )
        })?;

        Ok(row.into())
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<CountryRequest>, DomainError> {
        let rows: Vec<CountryRequestRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, subscription_id, request_text, created_at
            FROM countries_to_add
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list country requests: {}", e),
            )
        })?;

        Ok(rows.into_iter().map(CountryRequest::from).collect())
    }
}
