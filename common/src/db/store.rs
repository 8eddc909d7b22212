// PostgreSQL implementation of the cadence store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cadence::store::{CadenceStore, PendingCandidate};
use crate::db::repositories::{
    LeadRepository, MessageRepository, SendLogRepository, SettingsRepository,
};
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{CadenceSettings, Channel, ChannelSendLog, LeadStatus, StepCounts};

/// Production store backed by the repositories.
pub struct PgCadenceStore {
    leads: LeadRepository,
    messages: MessageRepository,
    send_logs: SendLogRepository,
    settings: SettingsRepository,
}

impl PgCadenceStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            leads: LeadRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            send_logs: SendLogRepository::new(pool.clone()),
            settings: SettingsRepository::new(pool),
        }
    }
}

#[async_trait]
impl CadenceStore for PgCadenceStore {
    async fn load_settings(&self) -> Result<Option<CadenceSettings>, DatabaseError> {
        self.settings.load().await
    }

    async fn sent_counts(
        &self,
        channel: Channel,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<StepCounts, DatabaseError> {
        self.messages.sent_counts(channel, from, to).await
    }

    async fn load_send_log(
        &self,
        channel: Channel,
    ) -> Result<Option<ChannelSendLog>, DatabaseError> {
        self.send_logs.load(channel).await
    }

    async fn next_pending(
        &self,
        channel: Channel,
        sequence: i16,
    ) -> Result<Option<PendingCandidate>, DatabaseError> {
        self.messages.next_pending(channel, sequence).await
    }

    async fn previous_step_sent_at(
        &self,
        lead_id: Uuid,
        channel: Channel,
        sequence: i16,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        self.messages
            .previous_step_sent_at(lead_id, channel, sequence)
            .await
    }

    async fn mark_sent(
        &self,
        message_id: Uuid,
        provider_message_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.messages
            .mark_sent(message_id, provider_message_id, at)
            .await
    }

    async fn mark_failed(&self, message_id: Uuid, error: &str) -> Result<(), DatabaseError> {
        self.messages.mark_failed(message_id, error).await
    }

    async fn advance_lead_status(
        &self,
        lead_id: Uuid,
        status: LeadStatus,
    ) -> Result<(), DatabaseError> {
        self.leads.advance_status(lead_id, status).await
    }

    async fn upsert_send_log(
        &self,
        user_id: Uuid,
        channel: Channel,
        last_sent_at: DateTime<Utc>,
        next_allowed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.send_logs
            .upsert(user_id, channel, last_sent_at, next_allowed_at)
            .await
    }
}
