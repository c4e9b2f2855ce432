//! HTTP handlers for the internal API.
//!
//! These handlers connect Axum routes to the application command/query
//! handlers. Policy rejections (a denied promocode, a missing payment) are
//! part of the 200 response body; only errors map to error statuses.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::{
    AssignPromocodeCountryCommand, AssignPromocodeCountryHandler, BroadcastCommand,
    BroadcastHandler, GetCountryStatusHandler, GetCountryStatusQuery, GetPromocodeStatsHandler,
    GetPromocodeStatsQuery, GetReferralCodeHandler, GetReferralCodeQuery, IssueKeyCommand,
    IssueKeyHandler, ListSubscriptionsHandler, ListSubscriptionsQuery, MarkPaidCommand,
    MarkPaidHandler, RedeemPromocodeCommand, RedeemPromocodeHandler, RegisterUserCommand,
    RegisterUserHandler, RollbackPromocodeCommand, RollbackPromocodeHandler,
    SubmitCountryRequestCommand, SubmitCountryRequestHandler, ValidateRenewalHandler,
    ValidateRenewalQuery,
};
use crate::application::{Engine, Scheduler, TaskError};
use crate::domain::access::AccessKeyError;
use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::{
    DomainError, ErrorCode, ExternalUserId, SubscriptionId, Timestamp,
};
use crate::domain::promotion::PromotionError;
use crate::domain::sweep::SweepError;
use crate::domain::user::BroadcastTarget;

use super::dto::{
    AssignCountryRequest, AssignCountryResponse, BroadcastRequest, BroadcastResponse,
    CountryRequestRequest, CountryRequestResponse, ErrorResponse, HealthResponse,
    IssueKeyRequest, MarkPaidRequest, MarkPaidResponse, PromocodeStatsResponse,
    RedeemPromocodeRequest, RedeemPromocodeResponse, RegisterUserRequest,
    RollbackPromocodeRequest, RollbackPromocodeResponse, SubscriptionsResponse,
    TaskRunResponse, UserResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the internal API.
///
/// Cloned per request; the engine holds Arc-wrapped ports.
#[derive(Clone)]
pub struct EngineAppState {
    pub engine: Engine,
    pub scheduler: Scheduler,
}

impl EngineAppState {
    pub fn new(engine: Engine, scheduler: Scheduler) -> Self {
        Self { engine, scheduler }
    }

    /// Create handlers on demand from the shared state.
    pub fn register_user_handler(&self) -> RegisterUserHandler {
        RegisterUserHandler::new(self.engine.repositories.users.clone())
    }

    pub fn mark_paid_handler(&self) -> MarkPaidHandler {
        MarkPaidHandler::new(
            self.engine.repositories.users.clone(),
            self.engine.repositories.access_keys.clone(),
            self.engine.repositories.payments.clone(),
            self.engine.entitlements.clone(),
            self.engine.notifications.clone(),
            self.engine.payments_config.clone(),
        )
    }

    pub fn issue_key_handler(&self) -> IssueKeyHandler {
        IssueKeyHandler::new(
            self.engine.repositories.users.clone(),
            self.engine.entitlements.clone(),
            self.engine.binder.clone(),
        )
    }

    pub fn list_subscriptions_handler(&self) -> ListSubscriptionsHandler {
        ListSubscriptionsHandler::new(
            self.engine.repositories.users.clone(),
            self.engine.entitlements.clone(),
            self.engine.binder.clone(),
        )
    }

    pub fn validate_renewal_handler(&self) -> ValidateRenewalHandler {
        ValidateRenewalHandler::new(
            self.engine.entitlements.clone(),
            self.engine.repositories.access_keys.clone(),
        )
    }

    pub fn assign_country_handler(&self) -> AssignPromocodeCountryHandler {
        AssignPromocodeCountryHandler::new(
            self.engine.repositories.users.clone(),
            self.engine.entitlements.clone(),
        )
    }

    pub fn redeem_promocode_handler(&self) -> RedeemPromocodeHandler {
        RedeemPromocodeHandler::new(
            self.engine.repositories.users.clone(),
            self.engine.promotions.clone(),
            self.engine.entitlements.clone(),
            self.engine.notifications.clone(),
            self.engine.payments_config.clone(),
        )
    }

    pub fn rollback_promocode_handler(&self) -> RollbackPromocodeHandler {
        RollbackPromocodeHandler::new(
            self.engine.repositories.users.clone(),
            self.engine.promotions.clone(),
            self.engine.entitlements.clone(),
            self.engine.binder.clone(),
        )
    }

    pub fn referral_code_handler(&self) -> GetReferralCodeHandler {
        GetReferralCodeHandler::new(
            self.engine.repositories.users.clone(),
            self.engine.promotions.clone(),
            self.engine.entitlements.clone(),
        )
    }

    pub fn promocode_stats_handler(&self) -> GetPromocodeStatsHandler {
        GetPromocodeStatsHandler::new(self.engine.promotions.clone())
    }

    pub fn country_status_handler(&self) -> GetCountryStatusHandler {
        GetCountryStatusHandler::new(
            self.engine.repositories.users.clone(),
            self.engine.entitlements.clone(),
        )
    }

    pub fn country_request_handler(&self) -> SubmitCountryRequestHandler {
        SubmitCountryRequestHandler::new(
            self.engine.repositories.users.clone(),
            self.engine.repositories.country_requests.clone(),
            self.engine.entitlements.clone(),
        )
    }

    pub fn broadcast_handler(&self) -> BroadcastHandler {
        BroadcastHandler::new(
            self.engine.repositories.users.clone(),
            self.engine.notifications.clone(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Users
// ════════════════════════════════════════════════════════════════════════════════

/// POST /internal/users - Register or refresh a user
pub async fn register_user(
    State(state): State<EngineAppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .register_user_handler()
        .handle(RegisterUserCommand {
            external_id: request.external_id,
            profile: request.profile,
        })
        .await?;

    Ok(Json(UserResponse { user: result.user }))
}

/// GET /internal/users/:external_id/subscriptions - List with activity
/// flags, server names and traffic
pub async fn list_subscriptions(
    State(state): State<EngineAppState>,
    Path(external_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .list_subscriptions_handler()
        .handle(ListSubscriptionsQuery {
            external_id: ExternalUserId::new(external_id),
        })
        .await?;

    Ok(Json(SubscriptionsResponse {
        subscriptions: result.subscriptions,
    }))
}

/// GET /internal/users/:external_id/referral-code - Get or create the
/// user's referral code
pub async fn get_referral_code(
    State(state): State<EngineAppState>,
    Path(external_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .referral_code_handler()
        .handle(GetReferralCodeQuery {
            external_id: ExternalUserId::new(external_id),
        })
        .await?;

    Ok(Json(outcome))
}

/// GET /internal/users/:external_id/countries/:country/status - Whether
/// the user's vpn window for a country is open
pub async fn country_status(
    State(state): State<EngineAppState>,
    Path((external_id, country)): Path<(i64, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state
        .country_status_handler()
        .handle(GetCountryStatusQuery {
            external_id: ExternalUserId::new(external_id),
            country,
        })
        .await?;

    Ok(Json(status))
}

// ════════════════════════════════════════════════════════════════════════════════
// Payments & Keys
// ════════════════════════════════════════════════════════════════════════════════

/// POST /internal/payments - Record a successful payment
pub async fn mark_paid(
    State(state): State<EngineAppState>,
    Json(request): Json<MarkPaidRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .mark_paid_handler()
        .handle(MarkPaidCommand {
            external_id: request.external_id,
            kind: request.kind,
            country: request.country,
            provider: request.provider,
            amount_minor: request.amount_minor,
            currency: request.currency,
            telegram_charge_id: request.telegram_charge_id,
            provider_charge_id: request.provider_charge_id,
            months: request.months,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MarkPaidResponse {
            subscription: result.subscription,
            renewal: result.renewal.map(Into::into),
        }),
    ))
}

/// POST /internal/keys - Get or create the key for a country
pub async fn issue_key(
    State(state): State<EngineAppState>,
    Json(request): Json<IssueKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .issue_key_handler()
        .handle(IssueKeyCommand {
            external_id: request.external_id,
            country: request.country,
        })
        .await?;

    Ok(Json(outcome))
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscriptions
// ════════════════════════════════════════════════════════════════════════════════

/// GET /internal/subscriptions/:id/renewal-validity
pub async fn validate_renewal(
    State(state): State<EngineAppState>,
    Path(subscription_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let validity = state
        .validate_renewal_handler()
        .handle(ValidateRenewalQuery {
            subscription_id: SubscriptionId::new(subscription_id),
        })
        .await?;

    Ok(Json(validity))
}

/// POST /internal/subscriptions/assign-country - Bind a promocode
/// subscription to a country
pub async fn assign_country(
    State(state): State<EngineAppState>,
    Json(request): Json<AssignCountryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .assign_country_handler()
        .handle(AssignPromocodeCountryCommand {
            external_id: request.external_id,
            country: request.country,
        })
        .await?;

    Ok(Json(AssignCountryResponse {
        country: result.country,
        assigned: result.assigned,
    }))
}

/// POST /internal/country-requests - Store the text of a location request
pub async fn submit_country_request(
    State(state): State<EngineAppState>,
    Json(request): Json<CountryRequestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let stored = state
        .country_request_handler()
        .handle(SubmitCountryRequestCommand {
            external_id: request.external_id,
            text: request.text,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CountryRequestResponse { request: stored }),
    ))
}

// ════════════════════════════════════════════════════════════════════════════════
// Promocodes
// ════════════════════════════════════════════════════════════════════════════════

/// POST /internal/promocodes/redeem
pub async fn redeem_promocode(
    State(state): State<EngineAppState>,
    Json(request): Json<RedeemPromocodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .redeem_promocode_handler()
        .handle(RedeemPromocodeCommand {
            external_id: request.external_id,
            code: request.code,
        })
        .await?;

    Ok(Json(RedeemPromocodeResponse {
        outcome: result.outcome,
        subscription: result.subscription,
        referral_bonus: result.referral_bonus.map(Into::into),
    }))
}

/// POST /internal/promocodes/rollback
pub async fn rollback_promocode(
    State(state): State<EngineAppState>,
    Json(request): Json<RollbackPromocodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .rollback_promocode_handler()
        .handle(RollbackPromocodeCommand {
            external_id: request.external_id,
            code: request.code,
        })
        .await?;

    Ok(Json(RollbackPromocodeResponse {
        outcome: result.outcome,
        subscription_deleted: result.subscription_deleted,
        key_revoked: result.key_revoked,
    }))
}

/// GET /internal/promocodes/stats
pub async fn promocode_stats(
    State(state): State<EngineAppState>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .promocode_stats_handler()
        .handle(GetPromocodeStatsQuery)
        .await?;

    Ok(Json(PromocodeStatsResponse {
        promocodes: result.promocodes,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Admin
// ════════════════════════════════════════════════════════════════════════════════

/// POST /internal/broadcast - Message a group of users (admin only)
pub async fn broadcast(
    State(state): State<EngineAppState>,
    Json(request): Json<BroadcastRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target: BroadcastTarget = request.target.parse().map_err(DomainError::from)?;
    let result = state
        .broadcast_handler()
        .handle(BroadcastCommand {
            admin_external_id: request.admin_external_id,
            message: request.message,
            target,
        })
        .await?;

    Ok(Json(BroadcastResponse {
        target: result.target,
        total: result.total,
        sent_count: result.sent_count,
        recipients: result.recipients,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Tasks
// ════════════════════════════════════════════════════════════════════════════════

/// POST /internal/sweep - Run the expiration sweep now and return its report
pub async fn run_sweep(State(state): State<EngineAppState>) -> Result<impl IntoResponse, ApiError> {
    let report = state.engine.sweep.run(Timestamp::now()).await?;
    Ok(Json(report))
}

/// POST /internal/tasks/:name/run - Trigger a scheduled task by name
pub async fn run_task(
    State(state): State<EngineAppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.scheduler.trigger(&name).await?;
    Ok(Json(TaskRunResponse {
        task: name,
        summary,
    }))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error wrapper carrying the domain error code.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code {
            code if code.is_validation() => StatusCode::BAD_REQUEST,
            code if code.is_not_found() => StatusCode::NOT_FOUND,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::Conflict | ErrorCode::TaskAlreadyRunning => StatusCode::CONFLICT,
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::new(err.code, err.message)
    }
}

impl From<EntitlementError> for ApiError {
    fn from(err: EntitlementError) -> Self {
        Self::new(err.code(), err.message())
    }
}

impl From<AccessKeyError> for ApiError {
    fn from(err: AccessKeyError) -> Self {
        Self::new(err.code(), err.message())
    }
}

impl From<PromotionError> for ApiError {
    fn from(err: PromotionError) -> Self {
        Self::new(err.code(), err.message())
    }
}

impl From<SweepError> for ApiError {
    fn from(err: SweepError) -> Self {
        Self::new(err.code(), err.message())
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        let code = match &err {
            TaskError::AlreadyRunning(_) => ErrorCode::TaskAlreadyRunning,
            TaskError::UnknownTask(_) => ErrorCode::ValidationFailed,
            TaskError::Failed(_) => ErrorCode::InternalError,
        };
        Self::new(code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "Request failed");
        }
        let body = ErrorResponse::new(self.code.to_string(), self.message);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::CountryCode;

    #[test]
    fn validation_codes_map_to_bad_request() {
        let err: ApiError = EntitlementError::validation("kind", "unknown").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_codes_map_to_404() {
        let err: ApiError = PromotionError::PromocodeNotFound("X".to_string()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn upstream_failure_maps_to_bad_gateway() {
        let err: ApiError = AccessKeyError::Upstream("timeout".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn unconfigured_country_is_a_client_error() {
        let err: ApiError =
            AccessKeyError::ProviderNotConfigured(CountryCode::new("zz").unwrap()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn running_task_maps_to_conflict() {
        let err: ApiError = SweepError::AlreadyRunning.into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let err: ApiError = TaskError::AlreadyRunning("renewal_reminder".to_string()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unknown_task_is_a_client_error() {
        let err: ApiError = TaskError::UnknownTask("nope".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn infrastructure_failure_maps_to_500() {
        let err: ApiError = DomainError::database("connection reset").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
