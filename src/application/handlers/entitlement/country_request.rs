//! SubmitCountryRequestHandler - Command storing the text of a paid
//! new-location request.
//!
//! The request is linked to the user's latest paid `country_request` row.
//! Users may also write without having paid; the link is then empty.

use std::sync::Arc;

use tracing::info;

use crate::application::EntitlementLedger;
use crate::domain::entitlement::{
    CountryRequest, EntitlementError, NewCountryRequest, SubscriptionKind,
};
use crate::domain::foundation::{ExternalUserId, Timestamp};
use crate::ports::{CountryRequestRepository, UserRepository};

#[derive(Debug, Clone)]
pub struct SubmitCountryRequestCommand {
    pub external_id: ExternalUserId,
    pub text: String,
}

pub struct SubmitCountryRequestHandler {
    users: Arc<dyn UserRepository>,
    requests: Arc<dyn CountryRequestRepository>,
    entitlements: EntitlementLedger,
}

impl SubmitCountryRequestHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        requests: Arc<dyn CountryRequestRepository>,
        entitlements: EntitlementLedger,
    ) -> Self {
        Self {
            users,
            requests,
            entitlements,
        }
    }

    pub async fn handle(
        &self,
        cmd: SubmitCountryRequestCommand,
    ) -> Result<CountryRequest, EntitlementError> {
        if cmd.text.trim().is_empty() {
            return Err(EntitlementError::validation("text", "request text is required"));
        }
        let user = self
            .users
            .find_by_external_id(cmd.external_id)
            .await?
            .ok_or_else(|| EntitlementError::user_not_found(cmd.external_id))?;

        let paid = self
            .entitlements
            .latest_paid_of_kind(user.id, SubscriptionKind::CountryRequest)
            .await?;
        let request = NewCountryRequest::new(user.id, paid.map(|s| s.id), &cmd.text)?;
        let stored = self.requests.insert(&request, Timestamp::now()).await?;

        info!(
            external_id = %user.external_id,
            request_id = %stored.id,
            subscription_id = ?stored.subscription_id,
            "Country request recorded"
        );
        Ok(stored)
    }
}
