//! GetCountryStatusHandler - Query for a user's vpn window in one country.

use std::sync::Arc;

use serde::Serialize;

use crate::application::EntitlementLedger;
use crate::domain::entitlement::{EntitlementError, SubscriptionKind};
use crate::domain::foundation::{CountryCode, ExternalUserId, Timestamp};
use crate::ports::UserRepository;

#[derive(Debug, Clone)]
pub struct GetCountryStatusQuery {
    pub external_id: ExternalUserId,
    pub country: String,
}

/// `active_until` is the bucket's latest instant, also once it has passed.
/// Unknown users and empty buckets read as inactive with no date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryStatus {
    pub active: bool,
    pub active_until: Option<Timestamp>,
}

pub struct GetCountryStatusHandler {
    users: Arc<dyn UserRepository>,
    entitlements: EntitlementLedger,
}

impl GetCountryStatusHandler {
    pub fn new(users: Arc<dyn UserRepository>, entitlements: EntitlementLedger) -> Self {
        Self {
            users,
            entitlements,
        }
    }

    pub async fn handle(&self, query: GetCountryStatusQuery) -> Result<CountryStatus, EntitlementError> {
        let country = CountryCode::new(&query.country)?;
        let Some(user) = self.users.find_by_external_id(query.external_id).await? else {
            return Ok(CountryStatus {
                active: false,
                active_until: None,
            });
        };

        let latest = self
            .entitlements
            .active_until(user.id, SubscriptionKind::Vpn, Some(&country), Timestamp::now())
            .await?;
        Ok(CountryStatus {
            active: latest.map_or(false, |l| l.is_active),
            active_until: latest.map(|l| l.until),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::{de, nl, ts, TestContext};

    fn handler(ctx: &TestContext) -> GetCountryStatusHandler {
        GetCountryStatusHandler::new(Arc::new(ctx.store.clone()), ctx.entitlements.clone())
    }

    fn query(external_id: ExternalUserId, country: &str) -> GetCountryStatusQuery {
        GetCountryStatusQuery {
            external_id,
            country: country.to_string(),
        }
    }

    #[tokio::test]
    async fn active_country_reports_its_end() {
        let ctx = TestContext::new();
        let user = ctx.user(1).await;
        let row = ctx.paid_vpn(&user, Some(nl()), Timestamp::now()).await;

        let status = handler(&ctx).handle(query(user.external_id, "NL")).await.unwrap();

        assert_eq!(
            status,
            CountryStatus {
                active: true,
                active_until: Some(row.active_until),
            }
        );
    }

    #[tokio::test]
    async fn other_country_is_inactive() {
        let ctx = TestContext::new();
        let user = ctx.user(1).await;
        ctx.paid_vpn(&user, Some(de()), Timestamp::now()).await;

        let status = handler(&ctx).handle(query(user.external_id, "nl")).await.unwrap();

        assert!(!status.active);
        assert_eq!(status.active_until, None);
    }

    #[tokio::test]
    async fn lapsed_country_keeps_its_date() {
        let ctx = TestContext::new();
        let user = ctx.user(1).await;
        let row = ctx.paid_vpn(&user, Some(nl()), Timestamp::now()).await;
        let lapsed = ts("2020-01-01T00:00:00Z");
        ctx.store.set_active_until(row.id, lapsed).await;

        let status = handler(&ctx).handle(query(user.external_id, "nl")).await.unwrap();

        assert!(!status.active);
        assert_eq!(status.active_until, Some(lapsed));
    }

    #[tokio::test]
    async fn unknown_user_is_inactive_not_an_error() {
        let ctx = TestContext::new();
        let status = handler(&ctx)
            .handle(query(ExternalUserId::new(404), "nl"))
            .await
            .unwrap();
        assert_eq!(
            status,
            CountryStatus {
                active: false,
                active_until: None,
            }
        );
    }

    #[tokio::test]
    async fn blank_country_is_rejected() {
        let ctx = TestContext::new();
        let user = ctx.user(1).await;
        let err = handler(&ctx).handle(query(user.external_id, " ")).await.unwrap_err();
        assert!(err.code().is_validation());
    }
}
