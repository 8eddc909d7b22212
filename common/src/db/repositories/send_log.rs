// Channel send log repository

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Channel, ChannelSendLog};
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

/// Repository for the per-channel throttle record.
pub struct SendLogRepository {
    pool: DbPool,
}

impl SendLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The channel's send log. Single implicit tenant, so the channel
    /// alone identifies the row.
    #[instrument(skip(self))]
    pub async fn load(&self, channel: Channel) -> Result<Option<ChannelSendLog>, DatabaseError> {
        let log = sqlx::query_as::<_, ChannelSendLog>(
            r#"
            SELECT user_id, channel, last_sent_at, next_allowed_at, updated_at
            FROM channel_send_logs
            WHERE channel = $1
            LIMIT 1
            "#,
        )
        .bind(channel.to_string())
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(log)
    }

    /// Create the record on the first send, update it on every send after.
    #[instrument(skip(self))]
    pub async fn upsert(
        &self,
        user_id: Uuid,
        channel: Channel,
        last_sent_at: DateTime<Utc>,
        next_allowed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO channel_send_logs (user_id, channel, last_sent_at, next_allowed_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id, channel) DO UPDATE
            SET last_sent_at = EXCLUDED.last_sent_at,
                next_allowed_at = EXCLUDED.next_allowed_at,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(channel.to_string())
        .bind(last_sent_at)
        .bind(next_allowed_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }
}
