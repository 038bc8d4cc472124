//! Tax-Free Childcare reconciliation inbox.
//!
//! ```text
//! GET  /admin/tfc?status&overdue&search&page&perPage
//! GET  /admin/tfc/{id}
//! POST /admin/tfc/{id}/mark-paid
//! POST /admin/tfc/{id}/part-paid          { "amount": 500 }
//! POST /admin/tfc/{id}/cancel
//! POST /admin/tfc/{id}/convert-to-credit  { "amount": 500 }?
//! POST /admin/tfc/bulk                    { "action": "mark_paid", "ids": [...] }
//! ```
//!
//! Every action runs in one transaction together with its booking, ledger
//! and credit writes. Records of other tenants answer 404.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use bookon_core::booking::Booking;
use bookon_core::bulk::{BulkReport, BulkTfcAction};
use bookon_core::credit::Credit;
use bookon_core::tfc::{TfcAction, TfcBooking, TfcFilter, TfcStatus};
use bookon_core::validation::validate_bulk_ids;
use bookon_core::PageRequest;
use bookon_db::TfcApplied;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::notify;
use crate::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTfcQuery {
    pub status: Option<TfcStatus>,
    pub overdue: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PartPaidRequest {
    /// Pence received so far.
    pub amount: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertRequest {
    /// Pence to convert; defaults to the amount received.
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub action: BulkTfcAction,
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TfcActionView {
    pub tfc: TfcBooking,
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<Credit>,
}

impl From<TfcApplied> for TfcActionView {
    fn from(applied: TfcApplied) -> Self {
        TfcActionView {
            tfc: applied.tfc,
            booking: applied.booking,
            credit: applied.credit,
        }
    }
}

/// `GET /api/v1/admin/tfc`
pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ListTfcQuery>,
) -> ApiResult<Envelope<Vec<TfcBooking>>> {
    user.require_admin()?;

    let filter = TfcFilter {
        status: query.status,
        overdue: query.overdue,
        search: query.search,
    };
    let page = PageRequest::new(query.page, query.per_page);
    let records = state.db.tfc().list(user.scope()?, &filter, page).await?;

    Ok(Envelope::page(records))
}

/// `GET /api/v1/admin/tfc/{id}`
pub async fn get(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Envelope<TfcBooking>> {
    user.require_admin()?;

    let tfc = state
        .db
        .tfc()
        .get_by_id(&id)
        .await?
        .filter(|t| user.manages(&t.business_account_id))
        .ok_or_else(|| ApiError::not_found(format!("TFC booking not found: {}", id)))?;

    Ok(Envelope::ok(tfc))
}

/// `POST /api/v1/admin/tfc/{id}/mark-paid`
pub async fn mark_paid(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Envelope<TfcActionView>> {
    apply(&state, &user, &id, TfcAction::MarkPaid).await
}

/// `POST /api/v1/admin/tfc/{id}/part-paid`
pub async fn part_paid(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<PartPaidRequest>,
) -> ApiResult<Envelope<TfcActionView>> {
    apply(&state, &user, &id, TfcAction::MarkPartPaid { amount: req.amount }).await
}

/// `POST /api/v1/admin/tfc/{id}/cancel`
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Envelope<TfcActionView>> {
    apply(&state, &user, &id, TfcAction::Cancel).await
}

/// `POST /api/v1/admin/tfc/{id}/convert-to-credit`
pub async fn convert_to_credit(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Envelope<TfcActionView>> {
    let req: ConvertRequest = if body.is_empty() {
        ConvertRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation(format!("Invalid convert body: {}", e)))?
    };

    apply(
        &state,
        &user,
        &id,
        TfcAction::ConvertToCredit { amount: req.amount },
    )
    .await
}

/// `POST /api/v1/admin/tfc/bulk`
///
/// Always 200 when the request itself is valid; per-id failures are in the
/// report.
pub async fn bulk(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<BulkRequest>,
) -> ApiResult<Envelope<BulkReport>> {
    user.require_admin()?;
    let scope = user.scope()?;

    let ids = validate_bulk_ids(&req.ids)?;
    let bulk = state
        .db
        .tfc()
        .bulk_apply(&ids, req.action, &user.user_id, scope)
        .await;

    for applied in &bulk.applied {
        notify::dispatch(&state, notify::tfc_applied(applied));
    }
    Ok(Envelope::ok(bulk.report))
}

async fn apply(
    state: &Arc<AppState>,
    user: &AuthUser,
    id: &str,
    action: TfcAction,
) -> ApiResult<Envelope<TfcActionView>> {
    user.require_admin()?;

    let applied = state
        .db
        .tfc()
        .apply(id, &action, &user.user_id, user.scope()?)
        .await?;

    notify::dispatch(state, notify::tfc_applied(&applied));
    Ok(Envelope::ok(applied.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_request_parses_action() {
        let req: BulkRequest = serde_json::from_value(serde_json::json!({
            "action": "convert_to_credit",
            "ids": ["a", "b"]
        }))
        .unwrap();
        assert_eq!(req.action, BulkTfcAction::ConvertToCredit);
        assert_eq!(req.ids.len(), 2);
    }

    #[test]
    fn test_bulk_request_rejects_part_paid() {
        let result: Result<BulkRequest, _> = serde_json::from_value(serde_json::json!({
            "action": "mark_part_paid",
            "ids": ["a"]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_convert_amount_optional() {
        let req: ConvertRequest = serde_json::from_str("{}").unwrap();
        assert!(req.amount.is_none());
    }
}
