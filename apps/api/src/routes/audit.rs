//! Audit log browser.

use std::sync::Arc;

use axum::extract::State;
use serde::Deserialize;

use bookon_core::PageRequest;
use bookon_db::{AuditEntry, AuditFilter};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    /// Super admins only; tenant admins are pinned to their business.
    pub business_account_id: Option<String>,
    pub actor_id: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub action: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// `GET /api/v1/admin/audit-logs`
pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<AuditQuery>,
) -> ApiResult<Envelope<Vec<AuditEntry>>> {
    user.require_admin()?;

    let business_account_id = match user.scope()? {
        Some(business) => Some(business.to_string()),
        None => query.business_account_id,
    };

    let filter = AuditFilter {
        business_account_id,
        actor_id: query.actor_id,
        entity_type: query.entity_type,
        entity_id: query.entity_id,
        action: query.action,
    };
    let page = PageRequest::new(query.page, query.per_page);
    let entries = state.db.audit().list(&filter, page).await?;

    Ok(Envelope::page(entries))
}
