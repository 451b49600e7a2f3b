use async_trait::async_trait;
use sqlx::PgPool;
use voyage_core::repository::{WebhookEventRecord, WebhookEventRepository};
use voyage_core::CoreResult;

use crate::error::db;

pub struct PgWebhookEventRepository {
    pool: PgPool,
}

impl PgWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookEventRepository for PgWebhookEventRepository {
    async fn is_processed(&self, event_id: &str) -> CoreResult<bool> {
        let found: Option<(String,)> = sqlx::query_as("SELECT event_id FROM webhook_events WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        Ok(found.is_some())
    }

    async fn mark_processed(&self, record: &WebhookEventRecord) -> CoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO webhook_events (event_id, name, payment_intent_id, received_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(&record.event_id)
        .bind(&record.name)
        .bind(&record.payment_intent_id)
        .bind(record.received_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(result.rows_affected() == 1)
    }
}
