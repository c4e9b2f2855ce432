//! PostgreSQL implementation of SubscriptionRepository.
//!
//! `insert_paid` and the extension methods run inside a transaction and
//! take a transaction-scoped advisory lock keyed by the (user, kind,
//! country) bucket before reading the bucket maximum. Payments and
//! renewals of one bucket therefore read the maximum one after the other
//! and their months stack.

use crate::domain::access::AccessKey;
use crate::domain::entitlement::{
    bucket_key, compute_active_until, extended_until, ChargeRefs, ExpiredEntitlement, PaidSubscriptionRequest, Subscription,
    SubscriptionKind, SubscriptionStatus, PROMOCODE_CHARGE_ID,
};
use crate::domain::foundation::{
    AccessKeyId, CountryCode, DomainError, ErrorCode, SubscriptionId, Timestamp, UserId,
};
use crate::ports::{Extension, SubscriptionRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    /// Creates a new PostgresSubscriptionRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, DomainError> {
        self.pool.begin().await.map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to begin transaction: {}", e),
            )
        })
    }
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, kind, country_code, access_key_id, status, \
    provider, amount_minor, currency, paid_at, active_until, telegram_payment_charge_id, \
    provider_payment_charge_id, created_at";

/// Matches rows created by promocode redemption.
const PROMOCODE_PROVENANCE: &str =
    "(provider_payment_charge_id = $2 OR telegram_payment_charge_id = $2)";

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    user_id: i64,
    kind: String,
    country_code: Option<String>,
    access_key_id: Option<i64>,
    status: String,
    provider: String,
    amount_minor: i64,
    currency: String,
    paid_at: DateTime<Utc>,
    active_until: DateTime<Utc>,
    telegram_payment_charge_id: Option<String>,
    provider_payment_charge_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: SubscriptionId::new(row.id),
            user_id: UserId::new(row.user_id),
            kind: parse_kind(&row.kind)?,
            country: parse_country(row.country_code.as_deref())?,
            status: parse_status(&row.status)?,
            provider: row.provider,
            amount_minor: row.amount_minor,
            currency: row.currency,
            paid_at: Timestamp::from_datetime(row.paid_at),
            active_until: Timestamp::from_datetime(row.active_until),
            access_key_id: row.access_key_id.map(AccessKeyId::new),
            charge_refs: ChargeRefs {
                telegram_charge_id: row.telegram_payment_charge_id,
                provider_charge_id: row.provider_payment_charge_id,
            },
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

/// Row of the expired-entitlement join.
#[derive(Debug, sqlx::FromRow)]
struct ExpiredRow {
    subscription_id: i64,
    user_id: i64,
    country_code: Option<String>,
    active_until: DateTime<Utc>,
    key_id: i64,
    key_user_id: i64,
    key_country_code: String,
    remote_key_id: String,
    access_url: String,
    key_created_at: DateTime<Utc>,
    key_revoked_at: Option<DateTime<Utc>>,
}

impl TryFrom<ExpiredRow> for ExpiredEntitlement {
    type Error = DomainError;

    fn try_from(row: ExpiredRow) -> Result<Self, Self::Error> {
        let key_country = CountryCode::new(&row.key_country_code).map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid access key country: {}", e),
            )
        })?;
        Ok(ExpiredEntitlement {
            subscription_id: SubscriptionId::new(row.subscription_id),
            user_id: UserId::new(row.user_id),
            country: parse_country(row.country_code.as_deref())?,
            active_until: Timestamp::from_datetime(row.active_until),
            access_key: AccessKey {
                id: AccessKeyId::new(row.key_id),
                user_id: UserId::new(row.key_user_id),
                country: key_country,
                remote_id: row.remote_key_id,
                access_url: row.access_url,
                created_at: Timestamp::from_datetime(row.key_created_at),
                revoked_at: row.key_revoked_at.map(Timestamp::from_datetime),
            },
        })
    }
}

fn parse_kind(s: &str) -> Result<SubscriptionKind, DomainError> {
    s.parse().map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid kind value: {}", e),
        )
    })
}

fn parse_status(s: &str) -> Result<SubscriptionStatus, DomainError> {
    s.parse().map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid status value: {}", e),
        )
    })
}

fn parse_country(s: Option<&str>) -> Result<Option<CountryCode>, DomainError> {
    CountryCode::parse_optional(s).map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid country value: {}", e),
        )
    })
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Failed to {}: {}", action, e),
    )
}

type Tx = Transaction<'static, Postgres>;

async fn lock_bucket(tx: &mut Tx, key: &str) -> Result<(), DomainError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(key)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("lock subscription bucket", e))?;
    Ok(())
}

async fn bucket_max(
    tx: &mut Tx,
    user_id: UserId,
    kind: SubscriptionKind,
    country: Option<&CountryCode>,
) -> Result<Option<Timestamp>, DomainError> {
    let max: Option<DateTime<Utc>> = sqlx::query_scalar(
        r#"
        SELECT MAX(active_until)
        FROM subscriptions
        WHERE user_id = $1
          AND kind = $2
          AND status = 'paid'
          AND (($3::text IS NULL AND country_code IS NULL) OR country_code = $3::text)
        "#,
    )
    .bind(user_id.as_i64())
    .bind(kind.as_str())
    .bind(country.map(CountryCode::as_str))
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| db_error("read active_until", e))?;

    Ok(max.map(Timestamp::from_datetime))
}

/// Row fields that decide which bucket lock an in-place extension needs.
#[derive(Debug, sqlx::FromRow)]
struct LockedRow {
    id: i64,
    user_id: i64,
    kind: String,
    country_code: Option<String>,
    active_until: DateTime<Utc>,
}

struct LockedBucket {
    id: i64,
    user_id: UserId,
    kind: SubscriptionKind,
    country: Option<CountryCode>,
    active_until: Timestamp,
}

/// Locks the row, then its bucket.
///
/// The row lock comes first: once held, the country cannot change under
/// us, and `insert_paid` never waits on row locks, so the order cannot
/// deadlock against it.
async fn lock_row_and_bucket(tx: &mut Tx, id: i64) -> Result<Option<LockedBucket>, DomainError> {
    let row: Option<LockedRow> = sqlx::query_as(
        "SELECT id, user_id, kind, country_code, active_until FROM subscriptions \
         WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| db_error("lock subscription", e))?;

    let Some(row) = row else {
        return Ok(None);
    };
    let locked = LockedBucket {
        id: row.id,
        user_id: UserId::new(row.user_id),
        kind: parse_kind(&row.kind)?,
        country: parse_country(row.country_code.as_deref())?,
        active_until: Timestamp::from_datetime(row.active_until),
    };
    lock_bucket(
        tx,
        &bucket_key(locked.user_id, locked.kind, locked.country.as_ref()),
    )
    .await?;
    Ok(Some(locked))
}

/// Extends a locked row from the bucket maximum, so a window inserted by
/// a concurrent payment is stacked on rather than overlapped.
async fn extend_locked(tx: &mut Tx, row: &LockedBucket, months: u32) -> Result<Extension, DomainError> {
    let max = bucket_max(tx, row.user_id, row.kind, row.country.as_ref()).await?;
    let old_until = row.active_until;
    let new_until = extended_until(old_until, max, months);

    sqlx::query("UPDATE subscriptions SET active_until = $2 WHERE id = $1")
        .bind(row.id)
        .bind(new_until.as_datetime())
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("extend subscription", e))?;

    Ok(Extension {
        subscription_id: SubscriptionId::new(row.id),
        old_until,
        new_until,
    })
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn latest_active_until(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        country: Option<&CountryCode>,
    ) -> Result<Option<Timestamp>, DomainError> {
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT MAX(active_until)
            FROM subscriptions
            WHERE user_id = $1
              AND kind = $2
              AND status = 'paid'
              AND (($3::text IS NULL AND country_code IS NULL) OR country_code = $3::text)
            "#,
        )
        .bind(user_id.as_i64())
        .bind(kind.as_str())
        .bind(country.map(CountryCode::as_str))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("read active_until", e))?;

        Ok(latest.map(Timestamp::from_datetime))
    }

    async fn has_any_active(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM subscriptions
                WHERE user_id = $1 AND kind = $2 AND status = 'paid' AND active_until > $3
            )
            "#,
        )
        .bind(user_id.as_i64())
        .bind(kind.as_str())
        .bind(now.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("check active subscriptions", e))
    }

    async fn has_ever_had(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
    ) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM subscriptions
                WHERE user_id = $1 AND kind = $2 AND status = 'paid'
            )
            "#,
        )
        .bind(user_id.as_i64())
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("check subscription history", e))
    }

    async fn insert_paid(
        &self,
        request: &PaidSubscriptionRequest,
        now: Timestamp,
    ) -> Result<Subscription, DomainError> {
        let mut tx = self.begin().await?;

        lock_bucket(&mut tx, &request.bucket_key()).await?;
        let current =
            bucket_max(&mut tx, request.user_id, request.kind, request.country.as_ref()).await?;
        let active_until = compute_active_until(request.kind, now, current, request.months);

        let row: SubscriptionRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO subscriptions (
                user_id, kind, country_code, access_key_id, status, provider, amount_minor,
                currency, paid_at, active_until, telegram_payment_charge_id,
                provider_payment_charge_id, created_at
            ) VALUES ($1, $2, $3, $4, 'paid', $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(request.user_id.as_i64())
        .bind(request.kind.as_str())
        .bind(request.country.as_ref().map(CountryCode::as_str))
        .bind(request.access_key_id.map(|id| id.as_i64()))
        .bind(&request.provider)
        .bind(request.amount_minor)
        .bind(&request.currency)
        .bind(request.paid_at.as_datetime())
        .bind(active_until.as_datetime())
        .bind(&request.charge_refs.telegram_charge_id)
        .bind(&request.charge_refs.provider_charge_id)
        .bind(now.as_datetime())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("insert subscription", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit subscription", e))?;

        row.try_into()
    }

    async fn find_by_id(&self, id: SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("fetch subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn extend(&self, id: SubscriptionId, months: u32) -> Result<Extension, DomainError> {
        let mut tx = self.begin().await?;

        let row = lock_row_and_bucket(&mut tx, id.as_i64())
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    format!("Subscription not found: {}", id),
                )
            })?;
        let extension = extend_locked(&mut tx, &row, months).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit extension", e))?;
        Ok(extension)
    }

    async fn extend_most_active(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        months: u32,
        now: Timestamp,
    ) -> Result<Option<Extension>, DomainError> {
        let mut tx = self.begin().await?;

        let target: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM subscriptions
            WHERE user_id = $1 AND kind = $2 AND status = 'paid' AND active_until > $3
            ORDER BY active_until DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.as_i64())
        .bind(kind.as_str())
        .bind(now.as_datetime())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("find active subscription", e))?;

        let Some(id) = target else {
            return Ok(None);
        };
        let Some(row) = lock_row_and_bucket(&mut tx, id).await? else {
            return Ok(None);
        };
        let extension = extend_locked(&mut tx, &row, months).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit extension", e))?;
        Ok(Some(extension))
    }

    async fn assign_promocode_country(
        &self,
        user_id: UserId,
        country: &CountryCode,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE subscriptions SET country_code = $3
            WHERE id = (
                SELECT id FROM subscriptions
                WHERE user_id = $1
                  AND kind = 'vpn'
                  AND status = 'paid'
                  AND country_code IS NULL
                  AND {}
                ORDER BY paid_at DESC, id DESC
                LIMIT 1
                FOR UPDATE
            )
            "#,
            PROMOCODE_PROVENANCE
        ))
        .bind(user_id.as_i64())
        .bind(PROMOCODE_CHARGE_ID)
        .bind(country.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("assign promocode country", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_promocode_subscription(
        &self,
        user_id: UserId,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            r#"
            DELETE FROM subscriptions
            WHERE user_id = $1 AND id = $3 AND {}
            RETURNING {}
            "#,
            PROMOCODE_PROVENANCE, SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id.as_i64())
        .bind(PROMOCODE_CHARGE_ID)
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("delete promocode subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn attach_access_key(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
        country: Option<&CountryCode>,
        key_id: AccessKeyId,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET access_key_id = $4
            WHERE id = (
                SELECT id FROM subscriptions
                WHERE user_id = $1
                  AND kind = $2
                  AND status = 'paid'
                  AND (($3::text IS NULL AND country_code IS NULL) OR country_code = $3::text)
                ORDER BY paid_at DESC, id DESC
                LIMIT 1
            )
            "#,
        )
        .bind(user_id.as_i64())
        .bind(kind.as_str())
        .bind(country.map(CountryCode::as_str))
        .bind(key_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("attach access key", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_expired_with_live_keys(
        &self,
        now: Timestamp,
    ) -> Result<Vec<ExpiredEntitlement>, DomainError> {
        let rows: Vec<ExpiredRow> = sqlx::query_as(
            r#"
            SELECT * FROM (
                SELECT DISTINCT ON (s.access_key_id)
                    s.id            AS subscription_id,
                    s.user_id       AS user_id,
                    s.country_code  AS country_code,
                    s.active_until  AS active_until,
                    ak.id           AS key_id,
                    ak.user_id      AS key_user_id,
                    ak.country_code AS key_country_code,
                    ak.remote_key_id,
                    ak.access_url,
                    ak.created_at   AS key_created_at,
                    ak.revoked_at   AS key_revoked_at
                FROM subscriptions s
                JOIN access_keys ak ON ak.id = s.access_key_id
                WHERE s.kind = 'vpn'
                  AND s.status = 'paid'
                  AND s.active_until < $1
                  AND ak.revoked_at IS NULL
                  AND NOT EXISTS (
                      SELECT 1 FROM subscriptions newer
                      WHERE newer.user_id = s.user_id
                        AND newer.kind = 'vpn'
                        AND newer.status = 'paid'
                        AND newer.country_code IS NOT DISTINCT FROM s.country_code
                        AND newer.active_until > $1
                  )
                ORDER BY s.access_key_id, s.active_until DESC, s.id DESC
            ) expired
            ORDER BY active_until ASC, subscription_id ASC
            "#,
        )
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list expired subscriptions", e))?;

        rows.into_iter().map(ExpiredEntitlement::try_from).collect()
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Subscription>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 ORDER BY paid_at DESC, id DESC",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list subscriptions", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn find_expiring_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE kind = 'vpn' AND status = 'paid'
              AND active_until >= $1 AND active_until < $2
            ORDER BY active_until ASC, id ASC
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(from.as_datetime())
        .bind(to.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list expiring subscriptions", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn list_created_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Subscription>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE created_at >= $1 AND created_at < $2
            ORDER BY created_at ASC, id ASC
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(from.as_datetime())
        .bind(to.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list new subscriptions", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn count_active(&self, kind: SubscriptionKind, now: Timestamp) -> Result<u64, DomainError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM subscriptions
            WHERE kind = $1 AND status = 'paid' AND active_until > $2
            "#,
        )
        .bind(kind.as_str())
        .bind(now.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("count active subscriptions", e))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn latest_paid_of_kind(
        &self,
        user_id: UserId,
        kind: SubscriptionKind,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE user_id = $1 AND kind = $2 AND status = 'paid'
            ORDER BY paid_at DESC, id DESC
            LIMIT 1
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id.as_i64())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("fetch latest subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }
}
