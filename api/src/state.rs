use std::sync::Arc;

use common::cadence::delivery::DeliveryProcessor;
use common::cadence::CadenceEngine;
use common::config::Settings;
use common::db::{DbPool, RedisPool};
use common::models::Channel;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub redis_pool: RedisPool,
    pub config: Arc<Settings>,
    pub email_engine: Arc<CadenceEngine>,
    pub whatsapp_engine: Arc<CadenceEngine>,
    pub delivery: Arc<DeliveryProcessor>,
}

impl AppState {
    /// The engine serving a channel's trigger endpoint.
    pub fn engine_for(&self, channel: Channel) -> Arc<CadenceEngine> {
        match channel {
            Channel::Email => self.email_engine.clone(),
            Channel::Whatsapp => self.whatsapp_engine.clone(),
        }
    }
}
