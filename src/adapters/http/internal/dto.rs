//! Data Transfer Objects for the internal API.
//!
//! Requests carry raw strings and the handlers validate them; responses
//! wrap domain types, which already serialize.

use serde::{Deserialize, Serialize};

use crate::application::handlers::SubscriptionView;
use crate::domain::entitlement::{CountryRequest, Subscription};
use crate::domain::foundation::{CountryCode, ExternalUserId, SubscriptionId, Timestamp};
use crate::domain::promotion::{Promocode, RedemptionOutcome, RollbackOutcome};
use crate::domain::user::{BroadcastTarget, User, UserProfile};
use crate::ports::Extension;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to register (or refresh) a user.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
    pub external_id: ExternalUserId,
    #[serde(flatten)]
    pub profile: UserProfile,
}

/// A successful payment reported by the chat front end.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkPaidRequest {
    pub external_id: ExternalUserId,
    pub kind: String,
    #[serde(default)]
    pub country: Option<String>,
    pub provider: String,
    pub amount_minor: i64,
    pub currency: String,
    #[serde(default)]
    pub telegram_charge_id: Option<String>,
    #[serde(default)]
    pub provider_charge_id: Option<String>,
    #[serde(default)]
    pub months: Option<u32>,
}

/// Request for the user's key in a country.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueKeyRequest {
    pub external_id: ExternalUserId,
    pub country: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedeemPromocodeRequest {
    pub external_id: ExternalUserId,
    pub code: String,
}

/// Omitting `code` rolls back the user's most recent usage.
#[derive(Debug, Clone, Deserialize)]
pub struct RollbackPromocodeRequest {
    pub external_id: ExternalUserId,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignCountryRequest {
    pub external_id: ExternalUserId,
    pub country: String,
}

/// Free-text description of a location the user wants added.
#[derive(Debug, Clone, Deserialize)]
pub struct CountryRequestRequest {
    pub external_id: ExternalUserId,
    pub text: String,
}

/// `target` is one of `all`, `with_subscription`, `without_subscription`.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastRequest {
    pub admin_external_id: ExternalUserId,
    pub message: String,
    pub target: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user: User,
}

/// Before/after of an extended subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtensionResponse {
    pub subscription_id: SubscriptionId,
    pub old_until: Timestamp,
    pub new_until: Timestamp,
}

impl From<Extension> for ExtensionResponse {
    fn from(ext: Extension) -> Self {
        Self {
            subscription_id: ext.subscription_id,
            old_until: ext.old_until,
            new_until: ext.new_until,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkPaidResponse {
    pub subscription: Subscription,
    /// Present when the payment renewed an existing subscription.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewal: Option<ExtensionResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionsResponse {
    pub subscriptions: Vec<SubscriptionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedeemPromocodeResponse {
    pub outcome: RedemptionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<Subscription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_bonus: Option<ExtensionResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RollbackPromocodeResponse {
    pub outcome: RollbackOutcome,
    pub subscription_deleted: bool,
    pub key_revoked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromocodeStatsResponse {
    pub promocodes: Vec<Promocode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignCountryResponse {
    pub country: CountryCode,
    pub assigned: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryRequestResponse {
    pub request: CountryRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastResponse {
    pub target: BroadcastTarget,
    pub total: usize,
    pub sent_count: usize,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRunResponse {
    pub task: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Standard error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}
