//! Command and query handlers.
//!
//! Each handler composes the application services for one caller-facing
//! operation. Policy rejections are returned as outcome values; errors are
//! reserved for invalid input, missing records and infrastructure failures.

pub mod access;
pub mod admin;
pub mod entitlement;
pub mod promotion;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;

pub use access::{IssueKeyCommand, IssueKeyHandler, IssueKeyOutcome};
pub use admin::{
    BroadcastCommand, BroadcastHandler, BroadcastResult, DailyStatsHandler, DailyStatsResult,
    PromocodeLine, ReferralLine,
};
pub use entitlement::{
    AssignPromocodeCountryCommand, AssignPromocodeCountryHandler, AssignPromocodeCountryResult,
    CountryStatus, GetCountryStatusHandler, GetCountryStatusQuery, ListSubscriptionsHandler,
    ListSubscriptionsQuery, ListSubscriptionsResult, MarkPaidCommand, MarkPaidHandler,
    MarkPaidResult, Reminder, RenewalInvalidReason, RenewalReminderHandler,
    RenewalReminderResult, RenewalValidity, SubmitCountryRequestCommand,
    SubmitCountryRequestHandler, SubscriptionView, ValidateRenewalHandler, ValidateRenewalQuery,
};
pub use promotion::{
    GetPromocodeStatsHandler, GetPromocodeStatsQuery, GetPromocodeStatsResult,
    GetReferralCodeHandler, GetReferralCodeQuery, RedeemPromocodeCommand, RedeemPromocodeHandler,
    RedeemPromocodeResult, ReferralCodeOutcome, RollbackPromocodeCommand,
    RollbackPromocodeHandler, RollbackPromocodeResult,
};
pub use user::{RegisterUserCommand, RegisterUserHandler, RegisterUserResult};
