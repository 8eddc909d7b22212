// One-shot cadence tick runner.
//
// Runs a single tick for one channel (or both) and exits, so any external
// periodic mechanism (cron, a cloud scheduler, systemd timers) can drive
// the cadence without an in-process scheduler. All scheduling intent
// lives in the persisted records; this process holds no state.
//
// Usage: cadence-tick [email|whatsapp|all]

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use common::cadence::{CadenceEngine, EngineConfig};
use common::channel::{ChannelAdapter, EmailAdapter, WhatsAppAdapter};
use common::config::Settings;
use common::db::{DbPool, PgCadenceStore, RedisPool};
use common::lock::{DistributedLock, RedisLock};
use common::models::Channel;
use common::telemetry;

fn parse_channels(arg: Option<&str>) -> Result<Vec<Channel>> {
    match arg {
        None | Some("all") => Ok(vec![Channel::Email, Channel::Whatsapp]),
        Some("email") => Ok(vec![Channel::Email]),
        Some("whatsapp") => Ok(vec![Channel::Whatsapp]),
        Some(other) => anyhow::bail!("Unknown channel '{}', expected email|whatsapp|all", other),
    }
}

fn requested_channels() -> Result<Vec<Channel>> {
    let arg = std::env::args().nth(1);
    parse_channels(arg.as_deref())
}

#[tokio::main]
async fn main() -> Result<()> {
    let channels = requested_channels()?;

    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(&settings.observability.log_level)?;

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
    let lock = Arc::new(RedisLock::new(redis_pool)) as Arc<dyn DistributedLock>;
    let engine_config = EngineConfig::from_settings(&settings.cadence);
    let budget = Duration::from_secs(settings.cadence.tick_budget_seconds);

    let mut fatal = false;
    for channel in channels {
        let adapter: Arc<dyn ChannelAdapter> = match channel {
            Channel::Email => Arc::new(
                EmailAdapter::new(&settings.email)
                    .map_err(|e| anyhow::anyhow!("Email transport: {}", e))?,
            ),
            Channel::Whatsapp => Arc::new(WhatsAppAdapter::new(settings.whatsapp.clone())),
        };

        let engine = CadenceEngine::new(
            engine_config.clone(),
            store.clone(),
            lock.clone(),
            adapter,
        );

        match tokio::time::timeout(budget, engine.run_tick()).await {
            Ok(Ok(outcome)) => {
                info!(channel = %channel, outcome = outcome.label(), "Tick finished");
                println!("{}", serde_json::json!({ "channel": channel, "tick": outcome }));
            }
            Ok(Err(e)) => {
                error!(channel = %channel, error = %e, "Tick failed");
                fatal = true;
            }
            Err(_) => {
                error!(channel = %channel, "Tick abandoned after exceeding budget");
                fatal = true;
            }
        }
    }

    db_pool.close().await;

    if fatal {
        anyhow::bail!("One or more ticks failed");
    }
    Ok(())
}
