//! ListSubscriptionsHandler - Query handler for a user's subscriptions with
//! traffic usage.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::application::{AccessKeyBinder, EntitlementLedger};
use crate::domain::access::AccessKeyError;
use crate::domain::entitlement::{Subscription, SubscriptionKind};
use crate::domain::foundation::{CountryCode, ExternalUserId, Timestamp};
use crate::ports::UserRepository;

/// Query for a user's subscriptions.
#[derive(Debug, Clone)]
pub struct ListSubscriptionsQuery {
    pub external_id: ExternalUserId,
}

/// One subscription as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub is_active: bool,
    pub server_name: Option<String>,
    /// Bytes transferred by the live key of the row's country; omitted when
    /// the row is inactive, has no live key, or metrics are unavailable.
    pub traffic_bytes: Option<u64>,
}

/// Result of listing subscriptions.
#[derive(Debug, Clone)]
pub struct ListSubscriptionsResult {
    pub subscriptions: Vec<SubscriptionView>,
}

/// Handler for listing subscriptions.
pub struct ListSubscriptionsHandler {
    users: Arc<dyn UserRepository>,
    entitlements: EntitlementLedger,
    binder: AccessKeyBinder,
}

impl ListSubscriptionsHandler {
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

    pub async fn handle(
        &self,
        query: ListSubscriptionsQuery,
    ) -> Result<ListSubscriptionsResult, AccessKeyError> {
        let now = Timestamp::now();

        // Unknown users simply have nothing yet.
        let user = match self.users.find_by_external_id(query.external_id).await? {
            Some(user) => user,
            None => {
                return Ok(ListSubscriptionsResult {
                    subscriptions: Vec::new(),
                })
            }
        };

        let rows = self.entitlements.list_for_user(user.id).await?;
        let live_keys: HashMap<CountryCode, String> = self
            .binder
            .list_live(user.id)
            .await?
            .into_iter()
            .map(|key| (key.country, key.remote_id))
            .collect();

        // One metrics call per country, shared by all rows of that country.
        let mut metrics: HashMap<CountryCode, Option<HashMap<String, u64>>> = HashMap::new();
        let mut subscriptions = Vec::with_capacity(rows.len());

        for subscription in rows {
            let is_active =
                subscription.kind == SubscriptionKind::Vpn && subscription.is_active_at(&now);
            let server_name = subscription
                .country
                .as_ref()
                .map(|country| self.binder.registry().display_name(country));

            let mut traffic_bytes = None;
            if let (true, Some(country)) = (is_active, subscription.country.as_ref()) {
                if let Some(remote_id) = live_keys.get(country) {
                    if !metrics.contains_key(country) {
                        let usage = match self.binder.traffic_usage(country).await {
                            Ok(usage) => Some(usage),
                            Err(e) => {
                                warn!(country = %country, error = %e, "Failed to fetch traffic metrics");
                                None
                            }
                        };
                        metrics.insert(country.clone(), usage);
                    }
                    traffic_bytes = metrics
                        .get(country)
                        .and_then(Option::as_ref)
                        .map(|usage| usage.get(remote_id).copied().unwrap_or(0));
                }
            }

            subscriptions.push(SubscriptionView {
                subscription,
                is_active,
                server_name,
                traffic_bytes,
            });
        }

        Ok(ListSubscriptionsResult { subscriptions })
    }
}
