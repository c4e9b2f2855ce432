//! Engine binary: internal HTTP API plus the periodic tasks.
//!
//! Configuration comes from `VPN_ENGINE__*` environment variables (see
//! [`AppConfig::load`]). Without a database URL the engine runs on the
//! in-memory store, which is only meant for local development.

use std::error::Error;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vpn_entitlements::adapters::http::{app_router, EngineAppState, InternalToken};
use vpn_entitlements::adapters::memory::InMemoryStore;
use vpn_entitlements::adapters::outline::build_registry;
use vpn_entitlements::adapters::postgres::{
    connect, PostgresAccessKeyRepository, PostgresCountryRequestRepository,
    PostgresPaymentRepository, PostgresPromocodeRepository, PostgresSubscriptionRepository,
    PostgresUserRepository,
};
use vpn_entitlements::adapters::telegram::{TelegramConfig, TelegramNotifier};
use vpn_entitlements::application::{Engine, Repositories};
use vpn_entitlements::config::{AppConfig, StorageBackend};

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.server.socket_addr(),
        environment = ?config.server.environment,
        "Starting vpn-entitlements"
    );

    let repositories = repositories(&config).await?;
    let registry = Arc::new(build_registry(&config.provisioning)?);
    if registry.is_empty() {
        warn!("No VPN servers configured; key requests will be rejected");
    }

    let telegram = TelegramConfig::new(config.notification.bot_token().map(str::to_string))
        .with_base_url(config.notification.api_base_url.clone())
        .with_timeout(config.notification.timeout());
    if !telegram.is_configured() {
        warn!("No bot token configured; notifications will be dropped");
    }
    let notifier = Arc::new(TelegramNotifier::new(telegram)?);

    let engine = Engine::new(repositories, registry, notifier, &config);
    let scheduler = engine.scheduler(&config.scheduler);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = if config.scheduler.enabled {
        let scheduler = scheduler.clone();
        Some(tokio::spawn(async move { scheduler.run(shutdown_rx).await }))
    } else {
        info!("Scheduler disabled");
        None
    };

    let router = app_router(
        EngineAppState::new(engine, scheduler),
        InternalToken::from_config(&config.server),
        config.server.request_timeout(),
    );

    let listener = tokio::net::TcpListener::bind(config.server.socket_addr()).await?;
    info!(addr = %listener.local_addr()?, "Internal API listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "Scheduler did not stop cleanly");
        }
    }
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.server.log_level.clone()),
    );
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn repositories(config: &AppConfig) -> Result<Repositories, BoxError> {
    if config.database.backend() == StorageBackend::InMemory {
        warn!("No database configured; using the in-memory store");
        return Ok(Repositories::shared(InMemoryStore::new()));
    }

    let pool = connect(&config.database).await?;
    Ok(Repositories {
        users: Arc::new(PostgresUserRepository::new(pool.clone())),
        subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
        access_keys: Arc::new(PostgresAccessKeyRepository::new(pool.clone())),
        promocodes: Arc::new(PostgresPromocodeRepository::new(pool.clone())),
        payments: Arc::new(PostgresPaymentRepository::new(pool.clone())),
        country_requests: Arc::new(PostgresCountryRequestRepository::new(pool)),
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
