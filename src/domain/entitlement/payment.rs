//! Payment audit records.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PaymentId, SubscriptionId, Timestamp, UserId};

use super::ChargeRefs;

/// One accepted payment. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub provider: String,
    pub amount_minor: i64,
    pub currency: String,
    pub paid_at: Timestamp,
    pub charge_refs: ChargeRefs,
    pub months: u32,
}

/// Insert arguments for a payment record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub provider: String,
    pub amount_minor: i64,
    pub currency: String,
    pub paid_at: Timestamp,
    pub charge_refs: ChargeRefs,
    pub months: u32,
}
