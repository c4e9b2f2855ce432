//! Audience selection for admin broadcasts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Which users an admin broadcast reaches. Subscription status is judged
/// on vpn rows only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastTarget {
    All,
    /// Users holding a vpn row that is active now.
    WithSubscription,
    /// Users who never had a vpn row.
    WithoutSubscription,
}

impl BroadcastTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastTarget::All => "all",
            BroadcastTarget::WithSubscription => "with_subscription",
            BroadcastTarget::WithoutSubscription => "without_subscription",
        }
    }
}

impl fmt::Display for BroadcastTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BroadcastTarget {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" => Err(ValidationError::empty_field("target")),
            "all" => Ok(BroadcastTarget::All),
            "with_subscription" => Ok(BroadcastTarget::WithSubscription),
            "without_subscription" => Ok(BroadcastTarget::WithoutSubscription),
            other => Err(ValidationError::invalid_format(
                "target",
                format!(
                    "unknown target '{}', expected all, with_subscription or without_subscription",
                    other
                ),
            )),
        }
    }
}
