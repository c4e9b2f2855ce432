//! Axum router configuration for the internal API.

use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::adapters::http::middleware::{internal_auth_middleware, InternalToken};

use super::handlers::{
    assign_country, broadcast, country_status, get_referral_code, health, issue_key,
    list_subscriptions, mark_paid, promocode_stats, redeem_promocode, register_user,
    rollback_promocode, run_sweep, run_task, submit_country_request, validate_renewal,
    EngineAppState,
};

/// Create the internal API routes.
///
/// # Routes
///
/// ## Users
/// - `POST /users` - Register or refresh a user
/// - `GET /users/:external_id/subscriptions` - Subscriptions with activity and traffic
/// - `GET /users/:external_id/referral-code` - Get or create the referral code
/// - `GET /users/:external_id/countries/:country/status` - Vpn window for a country
///
/// ## Payments & Keys
/// - `POST /payments` - Record a successful payment
/// - `POST /keys` - Get or create the access key for a country
///
/// ## Subscriptions
/// - `POST /subscriptions/assign-country` - Bind a promocode subscription to a country
/// - `GET /subscriptions/:id/renewal-validity` - Check a renewal invoice is still valid
/// - `POST /country-requests` - Store the text of a new-location request
///
/// ## Promocodes
/// - `POST /promocodes/redeem` - Redeem a code
/// - `POST /promocodes/rollback` - Undo a redemption
/// - `GET /promocodes/stats` - Usage report
///
/// ## Admin
/// - `POST /broadcast` - Message all users, subscribers, or non-subscribers
///
/// ## Tasks
/// - `POST /sweep` - Run the expiration sweep now
/// - `POST /tasks/:name/run` - Trigger a scheduled task
pub fn internal_routes() -> Router<EngineAppState> {
    Router::new()
        // Users
        .route("/users", post(register_user))
        .route("/users/:external_id/subscriptions", get(list_subscriptions))
        .route("/users/:external_id/referral-code", get(get_referral_code))
        .route(
            "/users/:external_id/countries/:country/status",
            get(country_status),
        )
        // Payments & keys
        .route("/payments", post(mark_paid))
        .route("/keys", post(issue_key))
        // Subscriptions
        .route("/subscriptions/assign-country", post(assign_country))
        .route(
            "/subscriptions/:id/renewal-validity",
            get(validate_renewal),
        )
        .route("/country-requests", post(submit_country_request))
        // Promocodes
        .route("/promocodes/redeem", post(redeem_promocode))
        .route("/promocodes/rollback", post(rollback_promocode))
        .route("/promocodes/stats", get(promocode_stats))
        // Admin
        .route("/broadcast", post(broadcast))
        // Tasks
        .route("/sweep", post(run_sweep))
        .route("/tasks/:name/run", post(run_task))
}

/// Create the complete application router.
///
/// `/internal/*` requires the bearer token; `/health` does not.
pub fn app_router(
    state: EngineAppState,
    token: InternalToken,
    request_timeout: Duration,
) -> Router {
    let internal = internal_routes()
        .layer(middleware::from_fn_with_state(token, internal_auth_middleware));

    Router::new()
        .route("/health", get(health))
        .nest("/internal", internal)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}
