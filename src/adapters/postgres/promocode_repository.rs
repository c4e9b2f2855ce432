//! PostgreSQL implementation of PromocodeRepository.
//!
//! Names are matched on `LOWER(TRIM(promocode_name))`, the same expression
//! the unique index is built on. Usage counting is a conditional update so
//! concurrent redemptions never push `times_used` past the limit.

use crate::domain::foundation::{
    DomainError, ErrorCode, PromocodeId, SubscriptionId, Timestamp, UserId,
};
use crate::domain::promotion::{NewPromocode, Promocode, PromocodeUsage, ReferralUsage};
use crate::ports::PromocodeRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const USAGE_UNIQUE_CONSTRAINT: &str = "promocode_usages_promocode_user_key";

const PROMOCODE_COLUMNS: &str = "id, promocode_name, promoted_by, times_used, \
    times_to_be_used, promocode_months, allow_for_old_users, created_at, last_used_at";

/// PostgreSQL implementation of the PromocodeRepository port.
pub struct PostgresPromocodeRepository {
    pool: PgPool,
}

impl PostgresPromocodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PromocodeRow {
    id: i64,
    promocode_name: String,
    promoted_by: Option<i64>,
    times_used: i32,
    times_to_be_used: i32,
    promocode_months: i32,
    allow_for_old_users: bool,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl From<PromocodeRow> for Promocode {
    fn from(row: PromocodeRow) -> Self {
        Promocode {
            id: PromocodeId::new(row.id),
            name: row.promocode_name,
            promoted_by: row.promoted_by.map(UserId::new),
            times_used: non_negative(row.times_used),
            usage_limit: non_negative(row.times_to_be_used),
            months: non_negative(row.promocode_months),
            allow_for_old_users: row.allow_for_old_users,
            created_at: Timestamp::from_datetime(row.created_at),
            last_used_at: row.last_used_at.map(Timestamp::from_datetime),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    promocode_id: i64,
    used_by: i64,
    subscription_id: Option<i64>,
    used_at: DateTime<Utc>,
}

impl From<UsageRow> for PromocodeUsage {
    fn from(row: UsageRow) -> Self {
        PromocodeUsage {
            promocode_id: PromocodeId::new(row.promocode_id),
            user_id: UserId::new(row.used_by),
            subscription_id: row.subscription_id.map(SubscriptionId::new),
            used_at: Timestamp::from_datetime(row.used_at),
        }
    }
}

fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn to_column(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Failed to {}: {}", action, e),
    )
}

#[async_trait]
impl PromocodeRepository for PostgresPromocodeRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<Promocode>, DomainError> {
        let row: Option<PromocodeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM promocodes WHERE LOWER(TRIM(promocode_name)) = LOWER(TRIM($1))",
            PROMOCODE_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("fetch promocode", e))?;

        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: PromocodeId) -> Result<Option<Promocode>, DomainError> {
        let row: Option<PromocodeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM promocodes WHERE id = $1",
            PROMOCODE_COLUMNS
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("fetch promocode", e))?;

        Ok(row.map(Into::into))
    }

    async fn insert_or_get(&self, promocode: &NewPromocode) -> Result<Promocode, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO promocodes (
                promocode_name, promoted_by, times_to_be_used, promocode_months, allow_for_old_users
            ) VALUES (TRIM($1), $2, $3, $4, $5)
            ON CONFLICT ((LOWER(TRIM(promocode_name)))) DO NOTHING
            "#,
        )
        .bind(&promocode.name)
        .bind(promocode.promoted_by.map(|id| id.as_i64()))
        .bind(to_column(promocode.usage_limit))
        .bind(to_column(promocode.months))
        .bind(promocode.allow_for_old_users)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert promocode", e))?;

        self.find_by_name(&promocode.name).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::PromocodeNotFound,
                format!("Promocode vanished after insert: {}", promocode.name),
            )
        })
    }

    async fn try_increment_usage(
        &self,
        id: PromocodeId,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE promocodes
            SET times_used = times_used + 1, last_used_at = $2
            WHERE id = $1 AND (times_to_be_used = 0 OR times_used < times_to_be_used)
            "#,
        )
        .bind(id.as_i64())
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("increment promocode usage", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn decrement_usage(&self, id: PromocodeId) -> Result<(), DomainError> {
        sqlx::query("UPDATE promocodes SET times_used = GREATEST(0, times_used - 1) WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("decrement promocode usage", e))?;

        Ok(())
    }

    async fn insert_usage(
        &self,
        id: PromocodeId,
        user_id: UserId,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        sqlx::query("INSERT INTO promocode_usages (promocode_id, used_by, used_at) VALUES ($1, $2, $3)")
            .bind(id.as_i64())
            .bind(user_id.as_i64())
            .bind(at.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.constraint() == Some(USAGE_UNIQUE_CONSTRAINT) {
                        return DomainError::new(
                            ErrorCode::Conflict,
                            format!("User {} already used promocode {}", user_id, id),
                        );
                    }
                }
                db_error("record promocode usage", e)
            })?;

        Ok(())
    }

    async fn has_used(&self, id: PromocodeId, user_id: UserId) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM promocode_usages WHERE promocode_id = $1 AND used_by = $2)",
        )
        .bind(id.as_i64())
        .bind(user_id.as_i64())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("check promocode usage", e))
    }

    async fn link_usage_subscription(
        &self,
        id: PromocodeId,
        user_id: UserId,
        subscription_id: SubscriptionId,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE promocode_usages SET subscription_id = $3 WHERE promocode_id = $1 AND used_by = $2",
        )
        .bind(id.as_i64())
        .bind(user_id.as_i64())
        .bind(subscription_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("link promocode usage", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_usage(
        &self,
        id: PromocodeId,
        user_id: UserId,
    ) -> Result<Option<PromocodeUsage>, DomainError> {
        let row: Option<UsageRow> = sqlx::query_as(
            r#"
            DELETE FROM promocode_usages
            WHERE promocode_id = $1 AND used_by = $2
            RETURNING promocode_id, used_by, subscription_id, used_at
            "#,
        )
        .bind(id.as_i64())
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("delete promocode usage", e))?;

        Ok(row.map(Into::into))
    }

    async fn last_used_by(&self, user_id: UserId) -> Result<Option<PromocodeId>, DomainError> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT promocode_id FROM promocode_usages
            WHERE used_by = $1
            ORDER BY used_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("fetch last promocode usage", e))?;

        Ok(id.map(PromocodeId::new))
    }

    async fn list_with_usage(&self) -> Result<Vec<Promocode>, DomainError> {
        let rows: Vec<PromocodeRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM promocodes
            WHERE times_used > 0
            ORDER BY times_used DESC, promocode_name ASC
            "#,
            PROMOCODE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list promocodes", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn referral_usages_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<ReferralUsage>, DomainError> {
        let rows: Vec<ReferralUsageRow> = sqlx::query_as(
            r#"
            SELECT u.promocode_id, p.promoted_by AS referrer, u.used_by AS receiver, u.used_at
            FROM promocode_usages u
            JOIN promocodes p ON p.id = u.promocode_id
            WHERE p.promoted_by IS NOT NULL AND u.used_at >= $1 AND u.used_at < $2
            ORDER BY u.used_at ASC, u.id ASC
            "#,
        )
        .bind(from.as_datetime())
        .bind(to.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list referral usages", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReferralUsageRow {
    promocode_id: i64,
    referrer: i64,
    receiver: i64,
    used_at: DateTime<Utc>,
}

impl From<ReferralUsageRow> for ReferralUsage {
    fn from(row: ReferralUsageRow) -> Self {
        ReferralUsage {
            promocode_id: PromocodeId::new(row.promocode_id),
            referrer: UserId::new(row.referrer),
            receiver: UserId::new(row.receiver),
            used_at: Timestamp::from_datetime(row.used_at),
        }
    }
}
