//! # Audit Log Repository
//!
//! Append-only record of admin and system state changes. Rows are written
//! inside the transaction of the change they describe, so an audit row
//! exists exactly when the change committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::page_of;
use bookon_core::{Page, PageRequest};

/// One audit log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub business_account_id: Option<String>,
    pub actor_id: String,
    /// Dotted action name, e.g. `tfc.mark_paid`.
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_id: impl Into<String>,
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        AuditEntry {
            id: Uuid::new_v4().to_string(),
            business_account_id: None,
            actor_id: actor_id.into(),
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            details: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn business(mut self, business_account_id: impl Into<String>) -> Self {
        self.business_account_id = Some(business_account_id.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Audit log filter. `None` fields are not filtered.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFilter {
    pub business_account_id: Option<String>,
    pub actor_id: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<String>,
}

/// Writes an audit row on an open connection or transaction.
pub(crate) async fn record(conn: &mut PgConnection, entry: &AuditEntry) -> DbResult<()> {
    debug!(action = %entry.action, entity_id = %entry.entity_id, "Recording audit entry");

    sqlx::query(
        r#"
        INSERT INTO audit_logs (
            id, business_account_id, actor_id, action,
            entity_type, entity_id, details, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.business_account_id)
    .bind(&entry.actor_id)
    .bind(&entry.action)
    .bind(&entry.entity_type)
    .bind(&entry.entity_id)
    .bind(&entry.details)
    .bind(entry.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &AuditFilter) {
    qb.push(" WHERE TRUE");
    if let Some(business) = &filter.business_account_id {
        qb.push(" AND business_account_id = ").push_bind(business.clone());
    }
    if let Some(actor) = &filter.actor_id {
        qb.push(" AND actor_id = ").push_bind(actor.clone());
    }
    if let Some(entity_type) = &filter.entity_type {
        qb.push(" AND entity_type = ").push_bind(entity_type.clone());
    }
    if let Some(entity_id) = &filter.entity_id {
        qb.push(" AND entity_id = ").push_bind(entity_id.clone());
    }
    if let Some(action) = &filter.action {
        qb.push(" AND action = ").push_bind(action.clone());
    }
}

/// Repository for the audit log.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        AuditRepository { pool }
    }

    /// Appends an entry outside any other transaction.
    pub async fn record(&self, entry: &AuditEntry) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        record(&mut conn, entry).await
    }

    /// Lists entries newest first.
    pub async fn list(&self, filter: &AuditFilter, page: PageRequest) -> DbResult<Page<AuditEntry>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_logs");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(
            "SELECT id, business_account_id, actor_id, action, entity_type, entity_id, \
             details, created_at FROM audit_logs",
        );
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = select
            .build_query_as::<AuditEntry>()
            .fetch_all(&self.pool)
            .await?;

        Ok(page_of(items, total, page))
    }
}
