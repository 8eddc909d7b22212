// Cadence settings repository

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::CadenceSettings;
use tracing::instrument;

/// Repository for the per-user cadence configuration. Read-only to the
/// scheduler; the upsert exists for provisioning and tests.
pub struct SettingsRepository {
    pool: DbPool,
}

impl SettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// The single tenant's settings row, if present.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Option<CadenceSettings>, DatabaseError> {
        let settings = sqlx::query_as::<_, CadenceSettings>(
            r#"
            SELECT user_id, email_daily_limit, whatsapp_daily_limit,
                   email_hour_start, email_hour_end,
                   whatsapp_hour_start, whatsapp_hour_end,
                   created_at, updated_at
            FROM cadence_settings
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(settings)
    }

    #[instrument(skip(self, settings), fields(user_id = %settings.user_id))]
    pub async fn upsert(&self, settings: &CadenceSettings) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO cadence_settings (
                user_id, email_daily_limit, whatsapp_daily_limit,
                email_hour_start, email_hour_end,
                whatsapp_hour_start, whatsapp_hour_end,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id) DO UPDATE
            SET email_daily_limit = EXCLUDED.email_daily_limit,
                whatsapp_daily_limit = EXCLUDED.whatsapp_daily_limit,
                email_hour_start = EXCLUDED.email_hour_start,
                email_hour_end = EXCLUDED.email_hour_end,
                whatsapp_hour_start = EXCLUDED.whatsapp_hour_start,
                whatsapp_hour_end = EXCLUDED.whatsapp_hour_end,
                updated_at = NOW()
            "#,
        )
        .bind(settings.user_id)
        .bind(settings.email_daily_limit)
        .bind(settings.whatsapp_daily_limit)
        .bind(settings.email_hour_start)
        .bind(settings.email_hour_end)
        .bind(settings.whatsapp_hour_start)
        .bind(settings.whatsapp_hour_end)
        .bind(settings.created_at)
        .bind(settings.updated_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }
}
