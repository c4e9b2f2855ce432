//! Subscription entity.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::{
    AccessKeyId, CountryCode, SubscriptionId, Timestamp, UserId, ValidationError,
};

use super::{ChargeRefs, SubscriptionKind};

/// Stored status of a subscription row.
///
/// Rows are only ever created as `Paid`; expiry is derived from
/// `active_until`, never written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Paid,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Paid => "paid",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(SubscriptionStatus::Paid),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

/// One entitlement window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub kind: SubscriptionKind,
    /// `None` means "not region-scoped", its own bucket for entitlement
    /// queries. Promocode rows start without a country.
    pub country: Option<CountryCode>,
    pub status: SubscriptionStatus,
    pub provider: String,
    pub amount_minor: i64,
    pub currency: String,
    pub paid_at: Timestamp,
    pub active_until: Timestamp,
    pub access_key_id: Option<AccessKeyId>,
    pub charge_refs: ChargeRefs,
    pub created_at: Timestamp,
}

impl Subscription {
    /// A row is active while `active_until` is strictly after `now`.
    pub fn is_active_at(&self, now: &Timestamp) -> bool {
        self.active_until.is_after(now)
    }

    /// A row is expired once `active_until` is strictly before `now`.
    pub fn is_expired_at(&self, now: &Timestamp) -> bool {
        self.active_until.is_before(now)
    }

    pub fn is_promocode_issued(&self) -> bool {
        self.charge_refs.is_promocode()
    }

    /// Checks whether this row falls in the (kind, country) bucket.
    pub fn in_bucket(&self, kind: SubscriptionKind, country: Option<&CountryCode>) -> bool {
        self.kind == kind && self.country.as_ref() == country
    }

    pub fn bucket_key(&self) -> String {
        bucket_key(self.user_id, self.kind, self.country.as_ref())
    }
}

/// Advisory lock key serializing writers of one (user, kind, country)
/// bucket. Every write that can move the bucket maximum takes it.
pub fn bucket_key(user_id: UserId, kind: SubscriptionKind, country: Option<&CountryCode>) -> String {
    format!(
        "subscription:{}:{}:{}",
        user_id,
        kind,
        country.map(CountryCode::as_str).unwrap_or("-")
    )
}

/// Latest entitlement instant for a bucket, with its activity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUntil {
    pub until: Timestamp,
    pub is_active: bool,
}

impl ActiveUntil {
    pub fn at(until: Timestamp, now: &Timestamp) -> Self {
        Self {
            until,
            is_active: until.is_after(now),
        }
    }
}

/// Everything needed to insert a new paid row.
///
/// `active_until` is not part of the request: the repository computes it
/// from the current bucket maximum inside the same atomic operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaidSubscriptionRequest {
    pub user_id: UserId,
    pub kind: SubscriptionKind,
    pub country: Option<CountryCode>,
    pub provider: String,
    pub amount_minor: i64,
    pub currency: String,
    pub charge_refs: ChargeRefs,
    pub months: Option<u32>,
    pub access_key_id: Option<AccessKeyId>,
    pub paid_at: Timestamp,
}

impl PaidSubscriptionRequest {
    /// Validates amount and currency, normalizing currency to uppercase.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for a negative amount or an empty currency.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        if self.amount_minor < 0 {
            return Err(ValidationError::out_of_range(
                "amount_minor",
                0,
                i64::MAX,
                self.amount_minor,
            ));
        }
        let currency = self.currency.trim().to_uppercase();
        if currency.is_empty() {
            return Err(ValidationError::empty_field("currency"));
        }
        self.currency = currency;
        let provider = self.provider.trim().to_lowercase();
        if provider.is_empty() {
            return Err(ValidationError::empty_field("provider"));
        }
        self.provider = provider;
        Ok(self)
    }

    pub fn bucket_key(&self) -> String {
        bucket_key(self.user_id, self.kind, self.country.as_ref())
    }
}
