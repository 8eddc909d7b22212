// Persistence seam for the cadence engine.
//
// Production uses the PostgreSQL implementation in `db::store`; engine
// tests substitute in-memory mocks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::DatabaseError;
use crate::models::{
    CadenceSettings, Channel, ChannelSendLog, Lead, LeadStatus, OutboundMessage, StepCounts,
};

/// A pending message together with its lead, as returned by the candidate
/// query.
#[derive(Debug, Clone)]
pub struct PendingCandidate {
    pub message: OutboundMessage,
    pub lead: Lead,
}

/// Everything the cadence engine reads and writes. One tick performs at
/// most one message write, one lead write, and one send-log upsert.
#[async_trait]
pub trait CadenceStore: Send + Sync {
    /// The single tenant's cadence settings, if configured.
    async fn load_settings(&self) -> Result<Option<CadenceSettings>, DatabaseError>;

    /// Per-step counts of messages sent on `channel` within [from, to).
    async fn sent_counts(
        &self,
        channel: Channel,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<StepCounts, DatabaseError>;

    /// The channel's throttle record, if any send has happened yet.
    async fn load_send_log(&self, channel: Channel)
        -> Result<Option<ChannelSendLog>, DatabaseError>;

    /// The oldest pending message of the given step, scoped to leads whose
    /// cadence kind admits the channel and whose status is non-terminal.
    async fn next_pending(
        &self,
        channel: Channel,
        sequence: i16,
    ) -> Result<Option<PendingCandidate>, DatabaseError>;

    /// When the lead's previous step on this channel was sent, if it was.
    async fn previous_step_sent_at(
        &self,
        lead_id: Uuid,
        channel: Channel,
        sequence: i16,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError>;

    /// Transition a pending message to SENT.
    async fn mark_sent(
        &self,
        message_id: Uuid,
        provider_message_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Transition a pending message to FAILED with error detail.
    async fn mark_failed(&self, message_id: Uuid, error: &str) -> Result<(), DatabaseError>;

    /// Advance a lead to a per-step marker status. Must be a no-op when the
    /// lead is already terminal.
    async fn advance_lead_status(
        &self,
        lead_id: Uuid,
        status: LeadStatus,
    ) -> Result<(), DatabaseError>;

    /// Create or update the channel's throttle record.
    async fn upsert_send_log(
        &self,
        user_id: Uuid,
        channel: Channel,
        last_sent_at: DateTime<Utc>,
        next_allowed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
}
