//! Entitlement domain module.
//!
//! A subscription row is one entitlement window for a (user, kind, country)
//! tuple. Among the paid rows of a tuple, the one with the greatest
//! `active_until` decides whether the user is currently entitled. Expiry is
//! never stored; it is derived by comparing `active_until` with "now".
//!
//! # Module Structure
//!
//! - `kind` - Subscription kinds (`vpn`, `country_request`)
//! - `subscription` - Subscription entity and insert request
//! - `provenance` - Charge references and what they say about a row's origin
//! - `extension` - The extension rule applied by `mark_paid`
//! - `expired` - Lapsed entitlements still bound to a live key
//! - `payment` - Append-only payment audit records
//! - `country_request` - Follow-up text for paid new-location requests
//! - `errors` - Entitlement-specific errors

mod country_request;
mod errors;
mod expired;
mod extension;
mod kind;
mod payment;
mod provenance;
mod subscription;

pub use country_request::{CountryRequest, NewCountryRequest, MAX_COUNTRY_REQUEST_LEN};
pub use errors::EntitlementError;
pub use expired::ExpiredEntitlement;
pub use extension::{
    compute_active_until, effective_months, extended_until, DEFAULT_VPN_MONTHS,
};
pub use kind::SubscriptionKind;
pub use payment::{NewPayment, Payment};
pub use provenance::{renewal_payload, ChargeRefs, Provenance, PROMOCODE_CHARGE_ID};
pub use subscription::{
    bucket_key, ActiveUntil, PaidSubscriptionRequest, Subscription, SubscriptionStatus,
};
