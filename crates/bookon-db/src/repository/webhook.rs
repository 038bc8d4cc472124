//! # Webhook Inbox Repository
//!
//! Every inbound webhook is stored before it is processed.
//!
//! ```text
//! receive ──► received ──process──► processed
//!                │  ▲
//!                ▼  │ retry (admin)
//!              failed  (attempts += 1, last_error)
//! ```
//!
//! Delivery is idempotent on `(provider, external_id)`: a redelivered event
//! returns the stored row, and a `processed` row is never processed twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::page_of;
use bookon_core::{Page, PageRequest};

/// Webhook sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WebhookProvider {
    Stripe,
    Generic,
}

/// Processing state of a stored webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Received,
    Processed,
    Failed,
}

/// One stored webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: String,
    pub provider: WebhookProvider,
    /// Provider's event id.
    pub external_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: WebhookStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WebhookEvent {
    /// Whether the event still needs processing.
    pub fn is_pending(&self) -> bool {
        self.status != WebhookStatus::Processed
    }
}

const SELECT_WEBHOOK: &str = r#"
    SELECT id, provider, external_id, event_type, payload, status, attempts,
           last_error, created_at, processed_at
    FROM webhook_events
"#;

/// Repository for the webhook inbox.
#[derive(Debug, Clone)]
pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        WebhookRepository { pool }
    }

    /// Stores a delivery, or returns the stored row for a redelivery.
    pub async fn receive(
        &self,
        provider: WebhookProvider,
        external_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> DbResult<WebhookEvent> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO webhook_events (id, provider, external_id, event_type, payload, status, attempts, created_at)
            VALUES ($1, $2, $3, $4, $5, 'received', 0, NOW())
            ON CONFLICT (provider, external_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(provider)
        .bind(external_id)
        .bind(event_type)
        .bind(payload)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            debug!(provider = ?provider, external_id = %external_id, "Duplicate webhook delivery");
        }

        let sql = format!("{} WHERE provider = $1 AND external_id = $2", SELECT_WEBHOOK);
        let event = sqlx::query_as::<_, WebhookEvent>(&sql)
            .bind(provider)
            .bind(external_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(event)
    }

    pub async fn get(&self, id: &str) -> DbResult<WebhookEvent> {
        let sql = format!("{} WHERE id = $1", SELECT_WEBHOOK);
        sqlx::query_as::<_, WebhookEvent>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Webhook event", id))
    }

    pub async fn mark_processed(&self, id: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'processed', attempts = attempts + 1, last_error = NULL, processed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        info!(webhook_id = %id, "Webhook processed");
        Ok(())
    }

    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'failed', attempts = attempts + 1, last_error = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        warn!(webhook_id = %id, error = %error, "Webhook processing failed");
        Ok(())
    }

    /// Inbox page, newest first.
    pub async fn list(
        &self,
        status: Option<WebhookStatus>,
        page: PageRequest,
    ) -> DbResult<Page<WebhookEvent>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM webhook_events");
        if let Some(status) = status {
            count.push(" WHERE status = ").push_bind(status);
        }
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(SELECT_WEBHOOK);
        if let Some(status) = status {
            select.push(" WHERE status = ").push_bind(status);
        }
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = select
            .build_query_as::<WebhookEvent>()
            .fetch_all(&self.pool)
            .await?;

        Ok(page_of(items, total, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&WebhookStatus::Processed).unwrap(),
            "\"processed\""
        );
        assert_eq!(
            serde_json::to_string(&WebhookProvider::Stripe).unwrap(),
            "\"stripe\""
        );
    }
}
