// API binary: trigger endpoints, delivery webhook, health.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

mod handlers;
mod middleware;
mod routes;
mod state;

use common::cadence::delivery::DeliveryProcessor;
use common::cadence::{CadenceEngine, EngineConfig};
use common::channel::{ChannelAdapter, EmailAdapter, WhatsAppAdapter};
use common::config::Settings;
use common::db::{DbPool, PgCadenceStore, RedisPool};
use common::lock::{DistributedLock, RedisLock};
use common::telemetry;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(&settings.observability.log_level)?;
    telemetry::init_metrics(settings.observability.metrics_port)?;

    info!("Starting LeadFlow cadence API");

    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;
    db_pool
        .run_migrations()
        .await
        .context("Failed to run migrations")?;

    let redis_pool = RedisPool::new(&settings.redis)
        .await
        .context("Failed to initialize Redis")?;

    let store = Arc::new(PgCadenceStore::new(db_pool.clone()));
    let lock = Arc::new(RedisLock::new(redis_pool.clone())) as Arc<dyn DistributedLock>;
    let engine_config = EngineConfig::from_settings(&settings.cadence);

    let email_adapter = Arc::new(
        EmailAdapter::new(&settings.email)
            .map_err(|e| anyhow::anyhow!("Email transport: {}", e))?,
    ) as Arc<dyn ChannelAdapter>;
    let whatsapp_adapter =
        Arc::new(WhatsAppAdapter::new(settings.whatsapp.clone())) as Arc<dyn ChannelAdapter>;

    let email_engine = Arc::new(CadenceEngine::new(
        engine_config.clone(),
        store.clone(),
        lock.clone(),
        email_adapter,
    ));
    let whatsapp_engine = Arc::new(CadenceEngine::new(
        engine_config,
        store,
        lock,
        whatsapp_adapter,
    ));

    let delivery = Arc::new(DeliveryProcessor::new(db_pool.clone()));

    let app_state = AppState {
        db_pool: db_pool.clone(),
        redis_pool,
        config: Arc::new(settings.clone()),
        email_engine,
        whatsapp_engine,
        delivery,
    };

    let app = routes::create_router(app_state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;
    info!(addr = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind server address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            anyhow::anyhow!(e)
        })?;

    db_pool.close().await;
    info!("API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
