//! IssueKeyHandler - Command handler handing out the access key for a
//! country.
//!
//! Issue is idempotent per (user, country): a live key is returned as is.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::application::{AccessKeyBinder, EntitlementLedger};
use crate::domain::access::{remote_key_name, AccessKey, AccessKeyError};
use crate::domain::entitlement::SubscriptionKind;
use crate::domain::foundation::{CountryCode, ExternalUserId, Timestamp};
use crate::ports::UserRepository;

/// Command to get (or create) the user's key for a country.
#[derive(Debug, Clone)]
pub struct IssueKeyCommand {
    pub external_id: ExternalUserId,
    pub country: String,
}

/// Outcome of a key request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IssueKeyOutcome {
    Issued {
        key: AccessKey,
        server_name: String,
        reused: bool,
    },
    /// No active vpn subscription for the country; pay first.
    PaymentRequired {
        kind: SubscriptionKind,
        country: CountryCode,
    },
}

pub struct IssueKeyHandler {
    users: Arc<dyn UserRepository>,
    entitlements: EntitlementLedger,
    binder: AccessKeyBinder,
}

impl IssueKeyHandler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        entitlements: EntitlementLedger,
        binder: AccessKeyBinder,
    ) -> Self {
        Self {
            users,
            entitlements,
            binder,
        }
    }

    pub async fn handle(&self, cmd: IssueKeyCommand) -> Result<IssueKeyOutcome, AccessKeyError> {
        let now = Timestamp::now();

        // 1. Country must be served
        let country = CountryCode::new(&cmd.country)?;
        if !self.binder.registry().contains(&country) {
            return Err(AccessKeyError::provider_not_configured(country));
        }

        // 2. Resolve user
        let user = self
            .users
            .find_by_external_id(cmd.external_id)
            .await?
            .ok_or_else(|| AccessKeyError::user_not_found(cmd.external_id))?;

        // 3. Entitlement gate
        let active = self
            .entitlements
            .active_until(user.id, SubscriptionKind::Vpn, Some(&country), now)
            .await?
            .map(|a| a.is_active)
            .unwrap_or(false);
        if !active {
            return Ok(IssueKeyOutcome::PaymentRequired {
                kind: SubscriptionKind::Vpn,
                country,
            });
        }

        // 4. Issue or reuse
        let issued = self
            .binder
            .issue_or_reuse(user.id, &country, &remote_key_name(user.external_id, &country), now)
            .await?;

        // 5. Bind the key to the latest paid row of the bucket
        self.entitlements
            .attach_access_key(user.id, SubscriptionKind::Vpn, Some(&country), issued.key.id)
            .await?;

        info!(
            external_id = %user.external_id,
            country = %country,
            access_key_id = %issued.key.id,
            reused = issued.reused,
            "Access key handed out"
        );
        Ok(IssueKeyOutcome::Issued {
            server_name: self.binder.registry().display_name(&country),
            key: issued.key,
            reused: issued.reused,
        })
    }
}
