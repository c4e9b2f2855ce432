//! Lapsed entitlements that still hold a live access key.

use serde::{Deserialize, Serialize};

use crate::domain::access::AccessKey;
use crate::domain::foundation::{CountryCode, SubscriptionId, Timestamp, UserId};

/// A paid vpn row whose window has closed while its bound key is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiredEntitlement {
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub country: Option<CountryCode>,
    pub active_until: Timestamp,
    pub access_key: AccessKey,
}
