// Outbound message repository

use crate::cadence::store::PendingCandidate;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{
    CadenceKind, Channel, Lead, LeadStatus, MessageStatus, OutboundMessage, StepCounts,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

use super::lead::terminal_statuses;

/// Cadence kinds whose leads receive messages on the given channel.
fn eligible_kinds(channel: Channel) -> Vec<String> {
    match channel {
        Channel::Email => vec!["email_only".to_string(), "hybrid".to_string()],
        Channel::Whatsapp => vec!["whatsapp_only".to_string(), "hybrid".to_string()],
    }
}

/// Repository for outbound message records.
pub struct MessageRepository {
    pool: DbPool,
}

impl MessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, message), fields(message_id = %message.id))]
    pub async fn create(&self, message: &OutboundMessage) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO outbound_messages (
                id, lead_id, channel, sequence_number, status, subject, body,
                destination, provider_message_id, error,
                sent_at, delivered_at, read_at, replied_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(message.id)
        .bind(message.lead_id)
        .bind(message.channel.to_string())
        .bind(message.sequence_number)
        .bind(message.status.to_string())
        .bind(&message.subject)
        .bind(&message.body)
        .bind(&message.destination)
        .bind(&message.provider_message_id)
        .bind(&message.error)
        .bind(message.sent_at)
        .bind(message.delivered_at)
        .bind(message.read_at)
        .bind(message.replied_at)
        .bind(message.created_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    /// The oldest pending message of one step, joined with its lead. FIFO
    /// within a step; scoped to cadence-kind-eligible, non-terminal leads.
    #[instrument(skip(self))]
    pub async fn next_pending(
        &self,
        channel: Channel,
        sequence: i16,
    ) -> Result<Option<PendingCandidate>, DatabaseError> {
        let row = sqlx::query(
            r#"
            SELECT
                m.id, m.lead_id, m.channel, m.sequence_number, m.status,
                m.subject, m.body, m.destination, m.provider_message_id,
                m.error, m.sent_at, m.delivered_at, m.read_at, m.replied_at,
                m.created_at,
                l.campaign_id AS l_campaign_id, l.full_name AS l_full_name,
                l.company AS l_company, l.email AS l_email, l.phone AS l_phone,
                l.status AS l_status, l.cadence_kind AS l_cadence_kind,
                l.replied_at AS l_replied_at, l.opted_out_at AS l_opted_out_at,
                l.created_at AS l_created_at, l.updated_at AS l_updated_at
            FROM outbound_messages m
            JOIN leads l ON l.id = m.lead_id
            WHERE m.channel = $1
              AND m.sequence_number = $2
              AND m.status = 'pending'
              AND NOT (l.status = ANY($3))
              AND l.cadence_kind = ANY($4)
            ORDER BY m.created_at ASC
            LIMIT 1
            "#,
        )
        .bind(channel.to_string())
        .bind(sequence)
        .bind(terminal_statuses())
        .bind(eligible_kinds(channel))
        .fetch_optional(self.pool.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let parse = |field: &str, value: String| {
            DatabaseError::QueryFailed(format!("Failed to parse {}: {}", field, value))
        };

        let message_status: MessageStatus = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(|v| parse("message status", v))?;
        let message_channel: Channel = row
            .try_get::<String, _>("channel")?
            .parse()
            .map_err(|v| parse("channel", v))?;
        let lead_status: LeadStatus = row
            .try_get::<String, _>("l_status")?
            .parse()
            .map_err(|v| parse("lead status", v))?;
        let cadence_kind: CadenceKind = row
            .try_get::<String, _>("l_cadence_kind")?
            .parse()
            .map_err(|v| parse("cadence kind", v))?;

        let lead_id: Uuid = row.try_get("lead_id")?;

        let message = OutboundMessage {
            id: row.try_get("id")?,
            lead_id,
            channel: message_channel,
            sequence_number: row.try_get("sequence_number")?,
            status: message_status,
            subject: row.try_get("subject")?,
            body: row.try_get("body")?,
            destination: row.try_get("destination")?,
            provider_message_id: row.try_get("provider_message_id")?,
            error: row.try_get("error")?,
            sent_at: row.try_get("sent_at")?,
            delivered_at: row.try_get("delivered_at")?,
            read_at: row.try_get("read_at")?,
            replied_at: row.try_get("replied_at")?,
            created_at: row.try_get("created_at")?,
        };

        let lead = Lead {
            id: lead_id,
            campaign_id: row.try_get("l_campaign_id")?,
            full_name: row.try_get("l_full_name")?,
            company: row.try_get("l_company")?,
            email: row.try_get("l_email")?,
            phone: row.try_get("l_phone")?,
            status: lead_status,
            cadence_kind,
            replied_at: row.try_get("l_replied_at")?,
            opted_out_at: row.try_get("l_opted_out_at")?,
            created_at: row.try_get("l_created_at")?,
            updated_at: row.try_get("l_updated_at")?,
        };

        Ok(Some(PendingCandidate { message, lead }))
    }

    /// Per-step counts of messages that left the system within [from, to).
    /// Counted on `sent_at`, so later delivery transitions never shrink
    /// the number charged against the daily cap.
    #[instrument(skip(self))]
    pub async fn sent_counts(
        &self,
        channel: Channel,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<StepCounts, DatabaseError> {
        let rows = sqlx::query(
            r#"
            SELECT sequence_number, COUNT(*) AS sent
            FROM outbound_messages
            WHERE channel = $1 AND sent_at >= $2 AND sent_at < $3
            GROUP BY sequence_number
            "#,
        )
        .bind(channel.to_string())
        .bind(from)
        .bind(to)
        .fetch_all(self.pool.pool())
        .await?;

        let mut counts = StepCounts::default();
        for row in rows {
            let sequence: i16 = row.try_get("sequence_number")?;
            let sent: i64 = row.try_get("sent")?;
            match sequence {
                1 => counts.seq1 = sent,
                2 => counts.seq2 = sent,
                3 => counts.seq3 = sent,
                _ => {}
            }
        }

        Ok(counts)
    }

    /// When the lead's previous step on this channel was sent.
    #[instrument(skip(self))]
    pub async fn previous_step_sent_at(
        &self,
        lead_id: Uuid,
        channel: Channel,
        sequence: i16,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let row = sqlx::query(
            r#"
            SELECT sent_at
            FROM outbound_messages
            WHERE lead_id = $1 AND channel = $2 AND sequence_number = $3
            "#,
        )
        .bind(lead_id)
        .bind(channel.to_string())
        .bind(sequence - 1)
        .fetch_optional(self.pool.pool())
        .await?;

        match row {
            Some(row) => Ok(row.try_get("sent_at")?),
            None => Ok(None),
        }
    }

    /// Transition a pending message to SENT. Fails loudly if the message
    /// is no longer pending: silently leaving it pending after a transport
    /// send would re-send it on a later tick.
    #[instrument(skip(self))]
    pub async fn mark_sent(
        &self,
        message_id: Uuid,
        provider_message_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE outbound_messages
            SET status = 'sent', sent_at = $2, provider_message_id = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(message_id)
        .bind(at)
        .bind(provider_message_id)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "pending message {} not found for sent transition",
                message_id
            )));
        }
        Ok(())
    }

    /// Transition a pending message to FAILED with error detail.
    #[instrument(skip(self))]
    pub async fn mark_failed(&self, message_id: Uuid, error: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE outbound_messages
            SET status = 'failed', error = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(message_id)
        .bind(error)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "pending message {} not found for failed transition",
                message_id
            )));
        }
        Ok(())
    }

    /// Look up a message by the provider's id, scoped to a channel.
    #[instrument(skip(self))]
    pub async fn find_by_provider_id(
        &self,
        channel: Channel,
        provider_message_id: &str,
    ) -> Result<Option<OutboundMessage>, DatabaseError> {
        let message = sqlx::query_as::<_, OutboundMessage>(
            r#"
            SELECT id, lead_id, channel, sequence_number, status, subject,
                   body, destination, provider_message_id, error,
                   sent_at, delivered_at, read_at, replied_at, created_at
            FROM outbound_messages
            WHERE channel = $1 AND provider_message_id = $2
            "#,
        )
        .bind(channel.to_string())
        .bind(provider_message_id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(message)
    }

    /// Apply a delivery-webhook status with its timestamp stamp. Callers
    /// must have checked the forward-transition guard first.
    #[instrument(skip(self))]
    pub async fn apply_delivery_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        match status {
            MessageStatus::Delivered => {
                sqlx::query(
                    r#"
                    UPDATE outbound_messages
                    SET status = $2, delivered_at = COALESCE(delivered_at, $3)
                    WHERE id = $1
                    "#,
                )
                .bind(message_id)
                .bind(status.to_string())
                .bind(at)
                .execute(self.pool.pool())
                .await?
            }
            MessageStatus::Read => {
                sqlx::query(
                    r#"
                    UPDATE outbound_messages
                    SET status = $2, read_at = COALESCE(read_at, $3)
                    WHERE id = $1
                    "#,
                )
                .bind(message_id)
                .bind(status.to_string())
                .bind(at)
                .execute(self.pool.pool())
                .await?
            }
            MessageStatus::Replied => {
                sqlx::query(
                    r#"
                    UPDATE outbound_messages
                    SET status = $2, replied_at = COALESCE(replied_at, $3)
                    WHERE id = $1
                    "#,
                )
                .bind(message_id)
                .bind(status.to_string())
                .bind(at)
                .execute(self.pool.pool())
                .await?
            }
            _ => {
                sqlx::query(
                    r#"
                    UPDATE outbound_messages
                    SET status = $2
                    WHERE id = $1
                    "#,
                )
                .bind(message_id)
                .bind(status.to_string())
                .execute(self.pool.pool())
                .await?
            }
        };

        Ok(())
    }
}
