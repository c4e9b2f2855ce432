//! Redemption policy and outcomes.
//!
//! Denials are ordinary values: a user typing a wrong code is not an
//! error condition.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{PromocodeId, SubscriptionId};

use super::Promocode;

/// Which users count as "old" for codes restricted to new users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityPolicy {
    /// Anyone who ever held a paid vpn subscription.
    #[default]
    EverHad,

    /// Only users with a currently active vpn subscription.
    CurrentlyActive,
}

/// Why a redemption was refused. Checked in declaration order; the first
/// failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionDenial {
    EmptyCode,
    NotFound,
    OwnCode,
    AlreadyUsed,
    LimitReached,
    NewUsersOnly,
}

impl RedemptionDenial {
    /// Message shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            RedemptionDenial::EmptyCode => "Promocode cannot be empty",
            RedemptionDenial::NotFound => "Promocode not found",
            RedemptionDenial::OwnCode => "You cannot use a promocode you created",
            RedemptionDenial::AlreadyUsed => "You have already used this promocode",
            RedemptionDenial::LimitReached => "This promocode has reached its usage limit",
            RedemptionDenial::NewUsersOnly => "This promocode is only available to new users",
        }
    }
}

impl fmt::Display for RedemptionDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

/// A granted redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    /// The code as it was before this redemption was counted.
    pub promocode: Promocode,
    pub months: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RedemptionOutcome {
    Granted(Redemption),
    Denied { reason: RedemptionDenial },
}

impl RedemptionOutcome {
    pub fn denied(reason: RedemptionDenial) -> Self {
        RedemptionOutcome::Denied { reason }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, RedemptionOutcome::Granted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RollbackOutcome {
    RolledBack {
        promocode_id: PromocodeId,
        /// The subscription the undone redemption granted.
        #[serde(skip_serializing_if = "Option::is_none")]
        subscription_id: Option<SubscriptionId>,
    },
    NothingToRollback,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_ever_had() {
        assert_eq!(EligibilityPolicy::default(), EligibilityPolicy::EverHad);
    }

    #[test]
    fn policy_deserializes_snake_case() {
        let policy: EligibilityPolicy = serde_json::from_str("\"currently_active\"").unwrap();
        assert_eq!(policy, EligibilityPolicy::CurrentlyActive);
    }

    #[test]
    fn denial_has_user_message() {
        assert_eq!(
            RedemptionDenial::AlreadyUsed.to_string(),
            "You have already used this promocode"
        );
    }

    #[test]
    fn denied_outcome_serializes_reason() {
        let json = serde_json::to_value(RedemptionOutcome::denied(RedemptionDenial::OwnCode)).unwrap();
        assert_eq!(json["result"], "denied");
        assert_eq!(json["reason"], "own_code");
    }
}
