//! Strongly-typed identifier value objects.
//!
//! Every persisted row is keyed by a database-assigned `BIGSERIAL`, so the
//! identifiers wrap `i64` rather than generating values themselves.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw identifier.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw identifier.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::empty_field($field));
                }
                trimmed
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|e| ValidationError::invalid_format($field, e.to_string()))
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Internal identifier of a user row.
    UserId,
    "user_id"
);

numeric_id!(
    /// Identifier of the user on the external chat platform.
    ///
    /// Doubles as the chat id for notifications.
    ExternalUserId,
    "external_id"
);

numeric_id!(
    /// Identifier of a subscription row.
    SubscriptionId,
    "subscription_id"
);

numeric_id!(
    /// Identifier of a local access-key row (not the remote credential id).
    AccessKeyId,
    "access_key_id"
);

numeric_id!(
    /// Identifier of a promocode.
    PromocodeId,
    "promocode_id"
);

numeric_id!(
    /// Identifier of a payment audit record.
    PaymentId,
    "payment_id"
);

numeric_id!(
    /// Identifier of a new-location request.
    CountryRequestId,
    "country_request_id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_numbers() {
        let id: SubscriptionId = " 42 ".parse().unwrap();
        assert_eq!(id.as_i64(), 42);
    }

    #[test]
    fn rejects_empty_input() {
        let err = "".parse::<UserId>().unwrap_err();
        assert_eq!(err, ValidationError::empty_field("user_id"));
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert!(matches!(
            "abc".parse::<PromocodeId>(),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&ExternalUserId::new(777)).unwrap();
        assert_eq!(json, "777");
    }
}
