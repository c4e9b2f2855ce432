//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::adapters::http::{app_router, EngineAppState, InternalToken};
use crate::adapters::memory::InMemoryStore;
use crate::adapters::outline::MockProvisioner;
use crate::adapters::telegram::RecordingNotifier;
use crate::application::{Engine, Repositories};
use crate::config::{AppConfig, SchedulerConfig};
use crate::domain::foundation::{CountryCode, ExternalUserId};
use crate::ports::ProvisionerRegistry;

const TOKEN: &str = "internal-secret";
const ADMIN: i64 = 999;

struct TestApp {
    router: Router,
    provisioner: MockProvisioner,
    recorder: RecordingNotifier,
}

fn app() -> TestApp {
    let provisioner = MockProvisioner::new();
    let registry = ProvisionerRegistry::new().with_server(
        CountryCode::new("nl").unwrap(),
        "Netherlands",
        Arc::new(provisioner.clone()),
    );
    let recorder = RecordingNotifier::new();
    let mut config = AppConfig::default();
    config.notification.admin_chat_id = Some(ADMIN);
    let engine = Engine::new(
        Repositories::shared(InMemoryStore::new()),
        Arc::new(registry),
        Arc::new(recorder.clone()),
        &config,
    );
    let scheduler = engine.scheduler(&SchedulerConfig::default());
    let router = app_router(
        EngineAppState::new(engine, scheduler),
        InternalToken::new(Some(TOKEN)),
        Duration::from_secs(5),
    );
    TestApp {
        router,
        provisioner,
        recorder,
    }
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", TOKEN));
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register(router: &Router, external_id: i64) {
    let (status, _) = call(
        router,
        "POST",
        "/internal/users",
        Some(json!({"external_id": external_id, "username": "alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

async fn pay(router: &Router, external_id: i64) -> Value {
    let (status, body) = call(
        router,
        "POST",
        "/internal/payments",
        Some(json!({
            "external_id": external_id,
            "kind": "vpn",
            "country": "nl",
            "provider": "telegram",
            "amount_minor": 15000,
            "currency": "RUB",
            "telegram_charge_id": "tg_1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn health_needs_no_token() {
    let app = app();
    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn internal_routes_reject_missing_token() {
    let app = app();
    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/internal/promocodes/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_returns_user() {
    let app = app();
    let (status, body) = call(
        &app.router,
        "POST",
        "/internal/users",
        Some(json!({"external_id": 42, "username": "alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["external_id"], 42);
    assert_eq!(body["user"]["username"], "alice");
}

#[tokio::test]
async fn key_requires_payment_then_issues() {
    let app = app();
    register(&app.router, 7).await;

    let (status, body) = call(
        &app.router,
        "POST",
        "/internal/keys",
        Some(json!({"external_id": 7, "country": "nl"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "payment_required");

    let paid = pay(&app.router, 7).await;
    assert_eq!(paid["subscription"]["country"], "nl");
    assert!(paid.get("renewal").is_none());

    let (status, body) = call(
        &app.router,
        "POST",
        "/internal/keys",
        Some(json!({"external_id": 7, "country": "NL"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "issued");
    assert_eq!(body["server_name"], "Netherlands");
    assert_eq!(body["reused"], false);
    assert_eq!(app.provisioner.create_calls(), 1);
}

#[tokio::test]
async fn unknown_user_is_404() {
    let app = app();
    let (status, body) = call(
        &app.router,
        "POST",
        "/internal/keys",
        Some(json!({"external_id": 404, "country": "nl"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "USER_NOT_FOUND");
}

#[tokio::test]
async fn unserved_country_is_400() {
    let app = app();
    register(&app.router, 7).await;
    let (status, _) = call(
        &app.router,
        "POST",
        "/internal/keys",
        Some(json!({"external_id": 7, "country": "zz"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_promocode_is_a_denial_not_an_error() {
    let app = app();
    register(&app.router, 7).await;
    let (status, body) = call(
        &app.router,
        "POST",
        "/internal/promocodes/redeem",
        Some(json!({"external_id": 7, "code": "NOPE"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["result"], "denied");
    assert_eq!(body["outcome"]["reason"], "not_found");
}

#[tokio::test]
async fn subscriptions_list_marks_activity() {
    let app = app();
    register(&app.router, 7).await;
    pay(&app.router, 7).await;

    let (status, body) = call(&app.router, "GET", "/internal/users/7/subscriptions", None).await;
    assert_eq!(status, StatusCode::OK);
    let subscriptions = body["subscriptions"].as_array().unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0]["is_active"], true);
}

#[tokio::test]
async fn renewal_validity_of_missing_subscription_is_invalid() {
    let app = app();
    let (status, body) = call(
        &app.router,
        "GET",
        "/internal/subscriptions/12345/renewal-validity",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "invalid");
    assert_eq!(body["reason"], "subscription_not_found");
}

#[tokio::test]
async fn manual_sweep_returns_report() {
    let app = app();
    let (status, body) = call(&app.router, "POST", "/internal/sweep", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revoked"], json!([]));
    assert_eq!(body["failures"], json!([]));
}

#[tokio::test]
async fn tasks_trigger_by_name() {
    let app = app();
    let (status, body) = call(
        &app.router,
        "POST",
        "/internal/tasks/renewal_reminder/run",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task"], "renewal_reminder");

    let (status, body) = call(&app.router, "POST", "/internal/tasks/unknown/run", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn country_status_follows_payment() {
    let app = app();
    register(&app.router, 42).await;
    let uri = "/internal/users/42/countries/nl/status";

    let (status, body) = call(&app.router, "GET", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);
    assert_eq!(body["active_until"], Value::Null);

    pay(&app.router, 42).await;
    let (_, body) = call(&app.router, "GET", uri, None).await;
    assert_eq!(body["active"], true);
    assert!(body["active_until"].is_string());
}

#[tokio::test]
async fn country_request_text_is_stored() {
    let app = app();
    register(&app.router, 42).await;

    let (status, body) = call(
        &app.router,
        "POST",
        "/internal/country-requests",
        Some(json!({"external_id": 42, "text": "  Finland please  "})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["request"]["text"], "Finland please");

    let (status, body) = call(
        &app.router,
        "POST",
        "/internal/country-requests",
        Some(json!({"external_id": 42, "text": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn broadcast_reaches_subscribers_only_for_admin() {
    let app = app();
    register(&app.router, 42).await;
    register(&app.router, 43).await;
    pay(&app.router, 42).await;

    let (status, body) = call(
        &app.router,
        "POST",
        "/internal/broadcast",
        Some(json!({
            "admin_external_id": ADMIN,
            "message": "New server in Germany",
            "target": "with_subscription"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["target"], "with_subscription");
    assert_eq!(body["total"], 1);
    assert_eq!(body["sent_count"], 1);
    assert_eq!(
        app.recorder.texts_to(ExternalUserId::new(42)).last().map(String::as_str),
        Some("New server in Germany")
    );
    assert!(app.recorder.texts_to(ExternalUserId::new(43)).is_empty());

    let (status, body) = call(
        &app.router,
        "POST",
        "/internal/broadcast",
        Some(json!({"admin_external_id": 42, "message": "hi", "target": "all"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error_code"], "FORBIDDEN");
}

#[tokio::test]
async fn broadcast_rejects_unknown_target() {
    let app = app();
    let (status, _) = call(
        &app.router,
        "POST",
        "/internal/broadcast",
        Some(json!({"admin_external_id": ADMIN, "message": "hi", "target": "everyone"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn daily_stats_runs_as_a_task() {
    let app = app();
    let (status, body) = call(&app.router, "POST", "/internal/tasks/daily_stats/run", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "paid 0, free 0");
    assert_eq!(app.recorder.texts_to(ExternalUserId::new(ADMIN)).len(), 1);
}
