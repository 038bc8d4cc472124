//! # TFC Repository
//!
//! Storage and reconciliation of Tax-Free Childcare payments.
//!
//! ## One Action, One Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply(id, ConvertToCredit)                                            │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │  ├── SELECT bookings … FOR UPDATE        (same order as cancel)        │
//! │  ├── SELECT tfc_bookings … FOR UPDATE    (serialises admins)           │
//! │  ├── TfcBooking::apply → ConvertedToCredit { credit }                  │
//! │  ├── INSERT credits (tfc_conversion)                                   │
//! │  ├── UPDATE tfc_bookings (cancelled, credit_id)                        │
//! │  ├── UPDATE bookings (cancelled)                                       │
//! │  └── INSERT audit_logs                                                 │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  Any error → ROLLBACK: no credit without a cancelled TFC record and    │
//! │  no cancelled record without its credit.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, AuditEntry};
use crate::repository::booking::{lock_booking, save_booking};
use crate::repository::{credit, ledger, page_of};
use bookon_core::booking::Booking;
use bookon_core::bulk::{BulkItemResult, BulkReport, BulkTfcAction};
use bookon_core::credit::{Credit, CreditSource};
use bookon_core::tfc::{generate_reference, TfcAction, TfcBooking, TfcFilter, TfcOutcome};
use bookon_core::{Page, PageRequest, DEFAULT_TFC_HOLD_PERIOD_HOURS, DEFAULT_TFC_REFERENCE_PREFIX};

/// Attempts at a fresh payment reference before giving up.
const REFERENCE_ATTEMPTS: usize = 5;

const SELECT_TFC: &str = r#"
    SELECT id, booking_id, business_account_id, payment_reference, deadline,
           amount_pence, amount_received_pence, status, credit_id,
           created_at, updated_at
    FROM tfc_bookings
"#;

// =============================================================================
// Settings
// =============================================================================

/// Reference prefix and hold period for new TFC records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TfcSettings {
    pub reference_prefix: String,
    pub hold_period_hours: i64,
}

impl Default for TfcSettings {
    fn default() -> Self {
        TfcSettings {
            reference_prefix: DEFAULT_TFC_REFERENCE_PREFIX.to_string(),
            hold_period_hours: DEFAULT_TFC_HOLD_PERIOD_HOURS,
        }
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Opens the TFC record for a pending TFC booking.
///
/// A reference collision is skipped with `ON CONFLICT DO NOTHING` so the
/// surrounding transaction stays usable, then retried with a new reference.
pub(crate) async fn create_for_booking(
    conn: &mut PgConnection,
    booking: &Booking,
    settings: &TfcSettings,
) -> DbResult<TfcBooking> {
    for attempt in 1..=REFERENCE_ATTEMPTS {
        let reference = generate_reference(&settings.reference_prefix);
        let tfc = TfcBooking::for_booking(booking, reference, settings.hold_period_hours)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO tfc_bookings (
                id, booking_id, business_account_id, payment_reference, deadline,
                amount_pence, amount_received_pence, status, credit_id,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (payment_reference) DO NOTHING
            "#,
        )
        .bind(&tfc.id)
        .bind(&tfc.booking_id)
        .bind(&tfc.business_account_id)
        .bind(&tfc.payment_reference)
        .bind(tfc.deadline)
        .bind(tfc.amount_pence)
        .bind(tfc.amount_received_pence)
        .bind(tfc.status)
        .bind(&tfc.credit_id)
        .bind(tfc.created_at)
        .bind(tfc.updated_at)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if inserted == 1 {
            debug!(
                tfc_id = %tfc.id,
                reference = %tfc.payment_reference,
                deadline = %tfc.deadline,
                "TFC record created"
            );
            return Ok(tfc);
        }

        warn!(attempt, reference = %tfc.payment_reference, "Payment reference collision, retrying");
    }

    Err(DbError::duplicate(
        "payment_reference",
        format!("{} attempts exhausted", REFERENCE_ATTEMPTS),
    ))
}

/// Booking a TFC record belongs to. `booking_id` never changes, so no lock.
async fn booking_id_of(conn: &mut PgConnection, id: &str) -> DbResult<String> {
    sqlx::query_scalar::<_, String>("SELECT booking_id FROM tfc_bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("TFC booking", id))
}

async fn lock_tfc(conn: &mut PgConnection, id: &str) -> DbResult<TfcBooking> {
    let sql = format!("{} WHERE id = $1 FOR UPDATE", SELECT_TFC);
    sqlx::query_as::<_, TfcBooking>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("TFC booking", id))
}

/// Open TFC record of a booking, locked.
pub(crate) async fn lock_open_for_booking(
    conn: &mut PgConnection,
    booking_id: &str,
) -> DbResult<Option<TfcBooking>> {
    let sql = format!(
        "{} WHERE booking_id = $1 AND status IN ('pending_payment', 'part_paid') FOR UPDATE",
        SELECT_TFC
    );
    let tfc = sqlx::query_as::<_, TfcBooking>(&sql)
        .bind(booking_id)
        .fetch_optional(conn)
        .await?;
    Ok(tfc)
}

pub(crate) async fn save_tfc(conn: &mut PgConnection, tfc: &TfcBooking) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE tfc_bookings SET
            status = $2,
            amount_received_pence = $3,
            credit_id = $4,
            updated_at = $5
        WHERE id = $1
        "#,
    )
    .bind(&tfc.id)
    .bind(tfc.status)
    .bind(tfc.amount_received_pence)
    .bind(&tfc.credit_id)
    .bind(tfc.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Applies `action` to a locked TFC record and its locked booking, writing
/// the credit and ledger rows the outcome calls for.
pub(crate) async fn apply_locked(
    conn: &mut PgConnection,
    tfc: &mut TfcBooking,
    booking: &mut Booking,
    action: &TfcAction,
) -> DbResult<(TfcOutcome, Option<Credit>)> {
    let outcome = tfc.apply(action)?;
    let mut issued = None;

    match outcome {
        TfcOutcome::Paid => {
            booking.record_payment()?;
            booking.confirm()?;
            ledger::record_settlement(&mut *conn, booking).await?;
        }
        TfcOutcome::PartPaid { .. } => {
            booking.record_part_payment()?;
        }
        TfcOutcome::Cancelled => {
            booking.cancel(Some("TFC payment cancelled".to_string()))?;
        }
        TfcOutcome::ConvertedToCredit { credit: amount } => {
            let credit = Credit::new(
                &booking.parent_id,
                amount,
                CreditSource::TfcConversion,
                Some(tfc.id.clone()),
                None,
            )?;
            credit::insert(&mut *conn, &credit).await?;
            tfc.credit_id = Some(credit.id.clone());
            booking.cancel(Some("TFC payment converted to credit".to_string()))?;
            issued = Some(credit);
        }
    }

    save_tfc(&mut *conn, tfc).await?;
    save_booking(&mut *conn, booking).await?;

    Ok((outcome, issued))
}

fn push_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    business_account_id: Option<&str>,
    filter: &TfcFilter,
) {
    qb.push(" WHERE TRUE");
    if let Some(business) = business_account_id {
        qb.push(" AND business_account_id = ").push_bind(business.to_string());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    match filter.overdue {
        Some(true) => {
            qb.push(" AND status IN ('pending_payment', 'part_paid') AND deadline < NOW()");
        }
        Some(false) => {
            qb.push(" AND NOT (status IN ('pending_payment', 'part_paid') AND deadline < NOW())");
        }
        None => {}
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND payment_reference ILIKE ")
            .push_bind(format!("%{}%", search.replace('%', "\\%").replace('_', "\\_")));
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Result of one reconciliation action.
#[derive(Debug, Clone)]
pub struct TfcApplied {
    pub tfc: TfcBooking,
    pub booking: Booking,
    pub outcome: TfcOutcome,
    /// Credit issued by a conversion.
    pub credit: Option<Credit>,
}

/// Result of a bulk action: the per-id report plus each successful change.
#[derive(Debug, Clone)]
pub struct BulkApplied {
    pub report: BulkReport,
    pub applied: Vec<TfcApplied>,
}

/// Repository for TFC records.
#[derive(Debug, Clone)]
pub struct TfcRepository {
    pool: PgPool,
}

impl TfcRepository {
    pub fn new(pool: PgPool) -> Self {
        TfcRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<TfcBooking>> {
        let sql = format!("{} WHERE id = $1", SELECT_TFC);
        let tfc = sqlx::query_as::<_, TfcBooking>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tfc)
    }

    pub async fn get_by_reference(&self, reference: &str) -> DbResult<Option<TfcBooking>> {
        let sql = format!("{} WHERE payment_reference = $1", SELECT_TFC);
        let tfc = sqlx::query_as::<_, TfcBooking>(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tfc)
    }

    pub async fn get_by_booking(&self, booking_id: &str) -> DbResult<Option<TfcBooking>> {
        let sql = format!("{} WHERE booking_id = $1", SELECT_TFC);
        let tfc = sqlx::query_as::<_, TfcBooking>(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tfc)
    }

    /// Admin inbox, soonest deadline first.
    ///
    /// `business_account_id = None` lists every tenant.
    pub async fn list(
        &self,
        business_account_id: Option<&str>,
        filter: &TfcFilter,
        page: PageRequest,
    ) -> DbResult<Page<TfcBooking>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tfc_bookings");
        push_filters(&mut count, business_account_id, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(SELECT_TFC);
        push_filters(&mut select, business_account_id, filter);
        select
            .push(" ORDER BY deadline ASC, created_at ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = select
            .build_query_as::<TfcBooking>()
            .fetch_all(&self.pool)
            .await?;

        Ok(page_of(items, total, page))
    }

    /// Applies one admin action in its own transaction.
    ///
    /// Records outside `business_account_id` (when given) are reported as
    /// not found.
    pub async fn apply(
        &self,
        id: &str,
        action: &TfcAction,
        actor_id: &str,
        business_account_id: Option<&str>,
    ) -> DbResult<TfcApplied> {
        let mut tx = self.pool.begin().await?;

        // Lock order everywhere: booking, then TFC record.
        let booking_id = booking_id_of(&mut tx, id).await?;
        let mut booking = lock_booking(&mut tx, &booking_id).await?;
        let mut tfc = lock_tfc(&mut tx, id).await?;
        if business_account_id.is_some_and(|b| b != tfc.business_account_id) {
            return Err(DbError::not_found("TFC booking", id));
        }
        let from = tfc.status;

        let (outcome, credit) = apply_locked(&mut tx, &mut tfc, &mut booking, action).await?;

        let entry = AuditEntry::new(actor_id, action.name(), "tfc_booking", &tfc.id)
            .business(&tfc.business_account_id)
            .details(serde_json::json!({
                "bookingId": tfc.booking_id,
                "paymentReference": tfc.payment_reference,
                "from": from,
                "to": tfc.status,
                "amountReceived": tfc.amount_received_pence,
                "creditId": tfc.credit_id,
            }));
        audit::record(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(
            tfc_id = %tfc.id,
            reference = %tfc.payment_reference,
            action = action.name(),
            from = ?from,
            to = ?tfc.status,
            "TFC action applied"
        );

        Ok(TfcApplied {
            tfc,
            booking,
            outcome,
            credit,
        })
    }

    /// Applies one action to many records, each in its own transaction.
    ///
    /// `ids` must already be deduplicated. A failing id never affects the
    /// others; every id gets a line in the report. Failure text is the
    /// client-safe message, with driver detail only in the log.
    pub async fn bulk_apply(
        &self,
        ids: &[String],
        action: BulkTfcAction,
        actor_id: &str,
        business_account_id: Option<&str>,
    ) -> BulkApplied {
        let action = TfcAction::from(action);
        let mut report = BulkReport::with_capacity(ids.len());
        let mut applied = Vec::new();

        for id in ids {
            match self.apply(id, &action, actor_id, business_account_id).await {
                Ok(done) => {
                    report.push(BulkItemResult::ok(id, done.tfc.status));
                    applied.push(done);
                }
                Err(e) => {
                    if e.is_internal() {
                        warn!(tfc_id = %id, error = %e, "Bulk item failed");
                    } else {
                        debug!(tfc_id = %id, error = %e, "Bulk item rejected");
                    }
                    report.push(BulkItemResult::failed(id, e.public_message()));
                }
            }
        }

        info!(
            action = action.name(),
            succeeded = report.succeeded,
            failed = report.failed,
            "Bulk TFC action finished"
        );
        BulkApplied { report, applied }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookon_core::tfc::TfcStatus;

    #[test]
    fn test_default_settings() {
        let settings = TfcSettings::default();
        assert_eq!(settings.reference_prefix, "TFC");
        assert_eq!(settings.hold_period_hours, 120);
    }

    #[test]
    fn test_overdue_filter_sql() {
        let filter = TfcFilter {
            status: Some(TfcStatus::PendingPayment),
            overdue: Some(true),
            search: Some("  ab12 ".to_string()),
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tfc_bookings");
        push_filters(&mut qb, Some("biz-1"), &filter);

        let sql = qb.sql();
        assert!(sql.contains("business_account_id = $1"));
        assert!(sql.contains("status = $2"));
        assert!(sql.contains("deadline < NOW()"));
        assert!(sql.contains("payment_reference ILIKE $3"));
    }

    #[test]
    fn test_empty_search_is_ignored() {
        let filter = TfcFilter {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tfc_bookings");
        push_filters(&mut qb, None, &filter);
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM tfc_bookings WHERE TRUE");
    }
}
