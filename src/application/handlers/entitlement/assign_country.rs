//! AssignPromocodeCountryHandler - Command handler choosing the server
//! country of a promocode-granted subscription.

use std::sync::Arc;

use crate::application::EntitlementLedger;
use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{CountryCode, ExternalUserId};
use crate::ports::UserRepository;

/// Command to set the country of the newest promocode subscription.
#[derive(Debug, Clone)]
pub struct AssignPromocodeCountryCommand {
    pub external_id: ExternalUserId,
    pub country: String,
}

#[derive(Debug, Clone)]
pub struct AssignPromocodeCountryResult {
    pub country: CountryCode,
    /// False when there was no country-less promocode subscription.
    pub assigned: bool,
}

pub struct AssignPromocodeCountryHandler {
    users: Arc<dyn UserRepository>,
    entitlements: EntitlementLedger,
}

impl AssignPromocodeCountryHandler {
    pub fn new(users: Arc<dyn UserRepository>, entitlements: EntitlementLedger) -> Self {
        Self {
            users,
            entitlements,
        }
    }

    pub async fn handle(
        &self,
        cmd: AssignPromocodeCountryCommand,
    ) -> Result<AssignPromocodeCountryResult, EntitlementError> {
        let country = CountryCode::new(&cmd.country)?;
        let user = self
            .users
            .find_by_external_id(cmd.external_id)
            .await?
            .ok_or_else(|| EntitlementError::user_not_found(cmd.external_id))?;

        let assigned = self.entitlements.assign_country(user.id, &country).await?;
        Ok(AssignPromocodeCountryResult { country, assigned })
    }
}
