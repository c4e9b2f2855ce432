//! Requests for a server location that is not offered yet.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CountryRequestId, SubscriptionId, Timestamp, UserId, ValidationError,
};

/// Longest accepted request text, in characters.
pub const MAX_COUNTRY_REQUEST_LEN: usize = 1000;

/// A stored request. `subscription_id` points at the paid
/// `country_request` row it follows up, when there was one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRequest {
    pub id: CountryRequestId,
    pub user_id: UserId,
    pub subscription_id: Option<SubscriptionId>,
    pub text: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCountryRequest {
    pub user_id: UserId,
    pub subscription_id: Option<SubscriptionId>,
    pub text: String,
}

impl NewCountryRequest {
    /// Trims the text and rejects blank or oversized requests.
    pub fn new(
        user_id: UserId,
        subscription_id: Option<SubscriptionId>,
        text: &str,
    ) -> Result<Self, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::empty_field("text"));
        }
        let len = text.chars().count();
        if len > MAX_COUNTRY_REQUEST_LEN {
            return Err(ValidationError::out_of_range(
                "text",
                1,
                MAX_COUNTRY_REQUEST_LEN as i64,
                len as i64,
            ));
        }
        Ok(Self {
            user_id,
            subscription_id,
            text: text.to_string(),
        })
    }
}
