//! Entitlement handlers.
//!
//! ## Commands
//! - Recording payments (new purchases and in-place renewals)
//! - Assigning a country to a promocode subscription
//! - Storing the text of a new-location request
//! - Sending renewal reminders (periodic)
//!
//! ## Queries
//! - Listing a user's subscriptions with traffic
//! - Checking whether a subscription can be renewed
//! - Reading the vpn window of one country

mod assign_country;
mod country_request;
mod country_status;
mod list_subscriptions;
mod mark_paid;
mod renewal_reminder;
mod validate_renewal;

// Commands
pub use assign_country::{
    AssignPromocodeCountryCommand, AssignPromocodeCountryHandler, AssignPromocodeCountryResult,
};
pub use country_request::{SubmitCountryRequestCommand, SubmitCountryRequestHandler};
pub use mark_paid::{MarkPaidCommand, MarkPaidHandler, MarkPaidResult};
pub use renewal_reminder::{Reminder, RenewalReminderHandler, RenewalReminderResult};

// Queries
pub use country_status::{CountryStatus, GetCountryStatusHandler, GetCountryStatusQuery};
pub use list_subscriptions::{
    ListSubscriptionsHandler, ListSubscriptionsQuery, ListSubscriptionsResult, SubscriptionView,
};
pub use validate_renewal::{
    RenewalInvalidReason, RenewalValidity, ValidateRenewalHandler, ValidateRenewalQuery,
};
