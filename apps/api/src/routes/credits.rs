//! Parent credit wallet.

use std::sync::Arc;

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookon_core::credit::Credit;
use bookon_core::Money;

use crate::auth::{AuthUser, Role};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletQuery {
    /// Admins only; parents always get their own wallet.
    pub parent_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletView {
    pub parent_id: String,
    /// Spendable now: active, unexpired, unused remainder.
    pub balance: Money,
    pub credits: Vec<Credit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    pub parent_id: String,
    pub amount: Money,
    pub expires_at: Option<DateTime<Utc>>,
}

/// `GET /api/v1/credits`
pub async fn wallet(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<WalletQuery>,
) -> ApiResult<Envelope<WalletView>> {
    let parent_id = match (user.role, query.parent_id) {
        (Role::Parent, _) => user.user_id.clone(),
        (_, Some(parent_id)) => {
            user.require_admin()?;
            parent_id
        }
        (_, None) => return Err(ApiError::validation("parentId is required")),
    };

    let repo = state.db.credits();
    let credits = repo.list_for_parent(&parent_id).await?;
    let balance = repo.balance(&parent_id).await?;

    Ok(Envelope::ok(WalletView {
        parent_id,
        balance,
        credits,
    }))
}

/// `POST /api/v1/admin/credits`
pub async fn grant(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<GrantRequest>,
) -> ApiResult<Envelope<Credit>> {
    user.require_admin()?;

    if req.expires_at.is_some_and(|at| at <= Utc::now()) {
        return Err(ApiError::validation("expiresAt must be in the future"));
    }

    let credit = state
        .db
        .credits()
        .grant(&req.parent_id, req.amount, req.expires_at, &user.user_id)
        .await?;

    Ok(Envelope::created(credit))
}
