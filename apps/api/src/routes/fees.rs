//! Fee configuration, fee previews and ledger totals.
//!
//! ```text
//! PUT fee-config ──► new FeeConfig version (effective_from, default now)
//!                         │
//! settlement ─────────────┴──► version in effect at settlement ──► ledger row
//! ```
//!
//! Versions are never edited; a change is a new row with a later
//! `effectiveFrom`.

use std::sync::Arc;

use axum::extract::{Path, State};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use bookon_core::fees::{FeeBreakdown, FeeConfig, FranchiseFee};
use bookon_core::{Money, Rate, VatMode};
use bookon_db::LedgerSummary;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::response::Envelope;
use crate::state::AppState;

/// Default ledger summary window.
const DEFAULT_SUMMARY_DAYS: i64 = 30;

/// Fee terms as sent by the admin dashboard.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTerms {
    /// `{ "type": "percent", "value": 750 }` or `{ "type": "fixed", "value": 150 }`.
    pub franchise_fee: FranchiseFee,
    pub vat_mode: VatMode,
    /// Defaults to the configured VAT rate.
    pub vat_rate_bps: Option<u32>,
    #[serde(default = "Money::zero")]
    pub admin_fee: Money,
}

impl FeeTerms {
    fn into_config(self, business_account_id: &str, default_vat_bps: u32) -> FeeConfig {
        let vat_rate = Rate::from_bps(self.vat_rate_bps.unwrap_or(default_vat_bps));
        FeeConfig::new(
            business_account_id,
            self.franchise_fee,
            self.vat_mode,
            self.admin_fee,
        )
        .with_vat_rate(vat_rate)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    /// Gross amount in pence.
    pub amount: Money,
    /// Preview against this business's current config...
    pub business_account_id: Option<String>,
    /// ...or against ad-hoc terms.
    pub terms: Option<FeeTerms>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutFeeConfigRequest {
    #[serde(flatten)]
    pub terms: FeeTerms,
    pub effective_from: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeConfigView {
    pub current: Option<FeeConfig>,
    pub history: Vec<FeeConfig>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub business_account_id: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    #[serde(flatten)]
    pub totals: LedgerSummary,
}

/// `POST /api/v1/fees/preview`
pub async fn preview(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<PreviewRequest>,
) -> ApiResult<Envelope<FeeBreakdown>> {
    user.require_admin()?;

    let config = match (req.terms, req.business_account_id) {
        (Some(terms), business) => terms.into_config(
            business.as_deref().unwrap_or_default(),
            state.config.fees.default_vat_rate_bps,
        ),
        (None, Some(business)) => {
            user.require_manages(&business)?;
            state
                .db
                .fee_configs()
                .current(&business)
                .await?
                .ok_or_else(|| {
                    ApiError::not_found(format!("No fee config for business {}", business))
                })?
        }
        (None, None) => {
            return Err(ApiError::validation(
                "Either terms or businessAccountId is required",
            ))
        }
    };

    let breakdown = config.split(req.amount)?;
    Ok(Envelope::ok(breakdown))
}

/// `GET /api/v1/admin/businesses/{id}/fee-config`
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(business_account_id): Path<String>,
) -> ApiResult<Envelope<FeeConfigView>> {
    user.require_manages(&business_account_id)?;

    let repo = state.db.fee_configs();
    let current = repo.current(&business_account_id).await?;
    let history = repo.history(&business_account_id).await?;

    Ok(Envelope::ok(FeeConfigView { current, history }))
}

/// `PUT /api/v1/admin/businesses/{id}/fee-config`
pub async fn put_config(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(business_account_id): Path<String>,
    ApiJson(req): ApiJson<PutFeeConfigRequest>,
) -> ApiResult<Envelope<FeeConfig>> {
    user.require_manages(&business_account_id)?;

    let mut config = req
        .terms
        .into_config(&business_account_id, state.config.fees.default_vat_rate_bps);
    if let Some(at) = req.effective_from {
        config = config.effective_from(at);
    }

    state.db.fee_configs().insert(&config, &user.user_id).await?;
    Ok(Envelope::created(config))
}

/// `GET /api/v1/admin/businesses/{id}/ledger/summary?from&to`
pub async fn ledger_summary(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(business_account_id): Path<String>,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> ApiResult<Envelope<SummaryView>> {
    user.require_manages(&business_account_id)?;

    let (from, to) = summary_window(query.from, query.to, Utc::now())?;
    let totals = state
        .db
        .ledger()
        .summary(&business_account_id, from, to)
        .await?;

    Ok(Envelope::ok(SummaryView {
        business_account_id,
        from,
        to,
        totals,
    }))
}

/// Resolves `[from, to)`, defaulting to the last 30 days.
fn summary_window(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ApiResult<(DateTime<Utc>, DateTime<Utc>)> {
    let to = to.unwrap_or(now);
    let from = from.unwrap_or(to - Duration::days(DEFAULT_SUMMARY_DAYS));
    if from >= to {
        return Err(ApiError::validation("from must be before to"));
    }
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_terms_use_default_vat() {
        let terms: FeeTerms = serde_json::from_value(serde_json::json!({
            "franchiseFee": { "type": "percent", "value": 1000 },
            "vatMode": "inclusive"
        }))
        .unwrap();
        assert_eq!(terms.admin_fee, Money::zero());

        let config = terms.into_config("biz-1", 2000);
        assert_eq!(config.vat_rate, Rate::from_bps(2000));
        assert_eq!(config.franchise_fee, FranchiseFee::Percent(Rate::from_bps(1000)));
    }

    #[test]
    fn test_put_request_flattens_terms() {
        let req: PutFeeConfigRequest = serde_json::from_value(serde_json::json!({
            "franchiseFee": { "type": "fixed", "value": 150 },
            "vatMode": "exclusive",
            "vatRateBps": 500,
            "adminFee": 50,
            "effectiveFrom": "2026-11-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(req.terms.vat_rate_bps, Some(500));
        assert_eq!(req.terms.admin_fee, Money::from_pence(50));
        assert!(req.effective_from.is_some());
    }

    #[test]
    fn test_summary_window_defaults_to_thirty_days() {
        let now = Utc::now();
        let (from, to) = summary_window(None, None, now).unwrap();
        assert_eq!(to, now);
        assert_eq!(to - from, Duration::days(30));
    }

    #[test]
    fn test_summary_window_rejects_inverted_range() {
        let now = Utc::now();
        assert!(summary_window(Some(now), Some(now - Duration::hours(1)), now).is_err());
    }
}
