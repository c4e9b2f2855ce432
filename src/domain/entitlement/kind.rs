//! Subscription kind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// What a subscription row pays for.
///
/// Only `Vpn` rows are renewable windows. Every other kind is a one-shot
/// record whose `active_until` equals the moment it was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    /// Time-boxed VPN access for one country.
    Vpn,

    /// Paid request for a new server location.
    CountryRequest,
}

impl SubscriptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionKind::Vpn => "vpn",
            SubscriptionKind::CountryRequest => "country_request",
        }
    }

    /// Returns true if paying for this kind extends an entitlement window.
    pub fn is_renewable(&self) -> bool {
        matches!(self, SubscriptionKind::Vpn)
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" => Err(ValidationError::empty_field("kind")),
            "vpn" => Ok(SubscriptionKind::Vpn),
            "country_request" => Ok(SubscriptionKind::CountryRequest),
            other => Err(ValidationError::invalid_format(
                "kind",
                format!("unknown subscription kind '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(" VPN ".parse::<SubscriptionKind>().unwrap(), SubscriptionKind::Vpn);
        assert_eq!(
            "country_request".parse::<SubscriptionKind>().unwrap(),
            SubscriptionKind::CountryRequest
        );
    }

    #[test]
    fn empty_kind_is_required() {
        assert_eq!(
            "  ".parse::<SubscriptionKind>().unwrap_err(),
            ValidationError::empty_field("kind")
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!("lifetime".parse::<SubscriptionKind>().is_err());
    }

    #[test]
    fn only_vpn_is_renewable() {
        assert!(SubscriptionKind::Vpn.is_renewable());
        assert!(!SubscriptionKind::CountryRequest.is_renewable());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&SubscriptionKind::CountryRequest).unwrap();
        assert_eq!(json, "\"country_request\"");
    }
}
