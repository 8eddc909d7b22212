// Lead repository

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Lead, LeadStatus};
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

/// Absorbing statuses, as stored in the database.
pub(crate) fn terminal_statuses() -> Vec<String> {
    vec![
        "replied".to_string(),
        "opted_out".to_string(),
        "bounced".to_string(),
    ]
}

/// Repository for lead records. The scheduler mutates lead status only;
/// creation belongs to the extraction pipeline (and tests).
pub struct LeadRepository {
    pool: DbPool,
}

impl LeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, lead), fields(lead_id = %lead.id))]
    pub async fn create(&self, lead: &Lead) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO leads (
                id, campaign_id, full_name, company, email, phone,
                status, cadence_kind, replied_at, opted_out_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(lead.id)
        .bind(lead.campaign_id)
        .bind(&lead.full_name)
        .bind(&lead.company)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(lead.status.to_string())
        .bind(lead.cadence_kind.to_string())
        .bind(lead.replied_at)
        .bind(lead.opted_out_at)
        .bind(lead.created_at)
        .bind(lead.updated_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Lead>, DatabaseError> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            SELECT id, campaign_id, full_name, company, email, phone,
                   status, cadence_kind, replied_at, opted_out_at,
                   created_at, updated_at
            FROM leads
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(lead)
    }

    /// Advance a lead to a per-step marker. Guarded so an already-terminal
    /// lead is never moved out of its absorbing state.
    #[instrument(skip(self))]
    pub async fn advance_status(
        &self,
        lead_id: Uuid,
        status: LeadStatus,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE leads
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND NOT (status = ANY($3))
            "#,
        )
        .bind(lead_id)
        .bind(status.to_string())
        .bind(terminal_statuses())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(lead_id = %lead_id, "Lead already terminal, status not advanced");
        }
        Ok(())
    }

    /// Move a lead into an absorbing stop state (replied, opted out,
    /// bounced) and stamp the matching timestamp. No-op when the lead is
    /// already terminal.
    #[instrument(skip(self))]
    pub async fn stop(
        &self,
        lead_id: Uuid,
        status: LeadStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        match status {
            LeadStatus::Replied => {
                sqlx::query(
                    r#"
                    UPDATE leads
                    SET status = $2, replied_at = COALESCE(replied_at, $3), updated_at = NOW()
                    WHERE id = $1 AND NOT (status = ANY($4))
                    "#,
                )
                .bind(lead_id)
                .bind(status.to_string())
                .bind(at)
                .bind(terminal_statuses())
                .execute(self.pool.pool())
                .await?
            }
            LeadStatus::OptedOut => {
                sqlx::query(
                    r#"
                    UPDATE leads
                    SET status = $2, opted_out_at = COALESCE(opted_out_at, $3), updated_at = NOW()
                    WHERE id = $1 AND NOT (status = ANY($4))
                    "#,
                )
                .bind(lead_id)
                .bind(status.to_string())
                .bind(at)
                .bind(terminal_statuses())
                .execute(self.pool.pool())
                .await?
            }
            _ => {
                sqlx::query(
                    r#"
                    UPDATE leads
                    SET status = $2, updated_at = NOW()
                    WHERE id = $1 AND NOT (status = ANY($3))
                    "#,
                )
                .bind(lead_id)
                .bind(status.to_string())
                .bind(terminal_statuses())
                .execute(self.pool.pool())
                .await?
            }
        };

        tracing::info!(lead_id = %lead_id, status = %status, "Lead stopped");
        Ok(())
    }
}
