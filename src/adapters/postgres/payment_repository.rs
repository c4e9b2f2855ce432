//! PostgreSQL implementation of PaymentRepository.

use crate::domain::entitlement::{ChargeRefs, NewPayment, Payment};
use crate::domain::foundation::{
    DomainError, ErrorCode, PaymentId, SubscriptionId, Timestamp, UserId,
};
use crate::ports::PaymentRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// PostgreSQL implementation of the PaymentRepository port.
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    /// Creates a new PostgresPaymentRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    subscription_id: i64,
    user_id: i64,
    provider: String,
    amount_minor: i64,
    currency: String,
    paid_at: DateTime<Utc>,
    telegram_payment_charge_id: Option<String>,
    provider_payment_charge_id: Option<String>,
    months: i32,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: PaymentId::new(row.id),
            subscription_id: SubscriptionId::new(row.subscription_id),
            user_id: UserId::new(row.user_id),
            provider: row.provider,
            amount_minor: row.amount_minor,
            currency: row.currency,
            paid_at: Timestamp::from_datetime(row.paid_at),
            charge_refs: ChargeRefs {
                telegram_charge_id: row.telegram_payment_charge_id,
                provider_charge_id: row.provider_payment_charge_id,
            },
            months: u32::try_from(row.months).unwrap_or(0),
        }
    }
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn insert(&self, payment: &NewPayment) -> Result<Payment, DomainError> {
        let row: PaymentRow = sqlx::query_as(
            r#"
            INSERT INTO payments (
                subscription_id, user_id, provider, amount_minor, currency, paid_at,
                telegram_payment_charge_id, provider_payment_charge_id, months
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, subscription_id, user_id, provider, amount_minor, currency, paid_at,
                      telegram_payment_charge_id, provider_payment_charge_id, months
            "#,
        )
        .bind(payment.subscription_id.as_i64())
        .bind(payment.user_id.as_i64())
        .bind(&payment.provider)
        .bind(payment.amount_minor)
        .bind(&payment.currency)
        .bind(payment.paid_at.as_datetime())
        .bind(&payment.charge_refs.telegram_charge_id)
        .bind(&payment.charge_refs.provider_charge_id)
        .bind(i32::try_from(payment.months).unwrap_or(i32::MAX))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to record payment: {}", e),
            )
        })?;

        Ok(row.into())
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Payment>, DomainError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT id, subscription_id, user_id, provider, amount_minor, currency, paid_at,
                   telegram_payment_charge_id, provider_payment_charge_id, months
            FROM payments
            WHERE user_id = $1
            ORDER BY paid_at DESC, id DESC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list payments: {}", e),
            )
        })?;

        Ok(rows.into_iter().map(Payment::from).collect())
    }
}
