//! # Booking Repository
//!
//! Checkout and every booking state change that touches more than one table.
//!
//! ## Checkout by Payment Method
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create(NewBooking)                     one transaction                 │
//! │                                                                         │
//! │  INSERT bookings (pending) ──┬── card   ─► stays pending (Stripe)       │
//! │                              ├── tfc    ─► INSERT tfc_bookings          │
//! │                              ├── credit ─► redeem ─► paid ─► confirmed  │
//! │                              │                       └─► ledger row     │
//! │                              └── free   ─► confirmed                    │
//! │  INSERT audit_logs                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, AuditEntry};
use crate::repository::tfc::{self, TfcSettings};
use crate::repository::{credit, ledger, page_of};
use bookon_core::booking::{Booking, BookingStatus, NewBooking};
use bookon_core::credit::{Credit, CreditSource, RedemptionStep};
use bookon_core::tfc::{TfcAction, TfcBooking, TfcStatus};
use bookon_core::{CoreError, Page, PageRequest, PaymentMethod};

const SELECT_BOOKING: &str = r#"
    SELECT id, business_account_id, activity_id, child_id, parent_id, date,
           status, payment_status, payment_method, amount_pence,
           created_at, updated_at, cancelled_at, cancellation_reason
    FROM bookings
"#;

// =============================================================================
// Types
// =============================================================================

/// Booking list filter. `None` fields are not filtered.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub business_account_id: Option<String>,
    pub parent_id: Option<String>,
    pub activity_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Everything checkout created.
#[derive(Debug, Clone)]
pub struct CheckoutResult {
    pub booking: Booking,
    /// TFC record for `tfc` bookings.
    pub tfc: Option<TfcBooking>,
    /// Credits consumed for `credit` bookings.
    pub redemptions: Vec<RedemptionStep>,
}

/// Where refunded money goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundTarget {
    /// Back to the card; the provider moves the money.
    OriginalPayment,
    /// Into the parent's wallet as a `refund` credit.
    Credit,
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn lock_booking(conn: &mut PgConnection, id: &str) -> DbResult<Booking> {
    let sql = format!("{} WHERE id = $1 FOR UPDATE", SELECT_BOOKING);
    sqlx::query_as::<_, Booking>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| DbError::not_found("Booking", id))
}

pub(crate) async fn save_booking(conn: &mut PgConnection, booking: &Booking) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE bookings SET
            status = $2,
            payment_status = $3,
            updated_at = $4,
            cancelled_at = $5,
            cancellation_reason = $6
        WHERE id = $1
        "#,
    )
    .bind(&booking.id)
    .bind(booking.status)
    .bind(booking.payment_status)
    .bind(booking.updated_at)
    .bind(booking.cancelled_at)
    .bind(&booking.cancellation_reason)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_booking(conn: &mut PgConnection, booking: &Booking) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bookings (
            id, business_account_id, activity_id, child_id, parent_id, date,
            status, payment_status, payment_method, amount_pence,
            created_at, updated_at, cancelled_at, cancellation_reason
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(&booking.id)
    .bind(&booking.business_account_id)
    .bind(&booking.activity_id)
    .bind(&booking.child_id)
    .bind(&booking.parent_id)
    .bind(booking.date)
    .bind(booking.status)
    .bind(booking.payment_status)
    .bind(booking.payment_method)
    .bind(booking.amount_pence)
    .bind(booking.created_at)
    .bind(booking.updated_at)
    .bind(booking.cancelled_at)
    .bind(&booking.cancellation_reason)
    .execute(conn)
    .await?;
    Ok(())
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &BookingFilter) {
    qb.push(" WHERE TRUE");
    if let Some(business) = &filter.business_account_id {
        qb.push(" AND business_account_id = ").push_bind(business.clone());
    }
    if let Some(parent) = &filter.parent_id {
        qb.push(" AND parent_id = ").push_bind(parent.clone());
    }
    if let Some(activity) = &filter.activity_id {
        qb.push(" AND activity_id = ").push_bind(activity.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND date >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND date <= ").push_bind(to);
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for bookings.
#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: PgPool,
    tfc: TfcSettings,
}

impl BookingRepository {
    pub fn new(pool: PgPool, tfc: TfcSettings) -> Self {
        BookingRepository { pool, tfc }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Booking>> {
        let sql = format!("{} WHERE id = $1", SELECT_BOOKING);
        let booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(booking)
    }

    /// Lists bookings, latest session first.
    pub async fn list(&self, filter: &BookingFilter, page: PageRequest) -> DbResult<Page<Booking>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bookings");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(SELECT_BOOKING);
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY date DESC, created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = select
            .build_query_as::<Booking>()
            .fetch_all(&self.pool)
            .await?;

        Ok(page_of(items, total, page))
    }

    /// Checkout.
    ///
    /// ## Errors
    /// - `Core(Validation | InvalidAmount)` for bad input
    /// - `Core(InsufficientCredit)` when the wallet does not cover a credit booking
    /// - `Core(NoFeeConfig)` when a credit booking settles without fee terms
    pub async fn create(&self, input: NewBooking, actor_id: &str) -> DbResult<CheckoutResult> {
        let mut booking = Booking::new(input)?;
        debug!(
            booking_id = %booking.id,
            method = ?booking.payment_method,
            amount = %booking.amount(),
            "Checkout started"
        );

        let mut tx = self.pool.begin().await?;
        insert_booking(&mut tx, &booking).await?;

        let mut tfc_record = None;
        let mut redemptions = Vec::new();

        match booking.payment_method {
            PaymentMethod::Card => {}
            PaymentMethod::Tfc => {
                tfc_record = Some(tfc::create_for_booking(&mut tx, &booking, &self.tfc).await?);
            }
            PaymentMethod::Credit => {
                redemptions =
                    credit::redeem(&mut tx, &booking.parent_id, &booking.id, booking.amount())
                        .await?;
                booking.record_payment()?;
                booking.confirm()?;
                ledger::record_settlement(&mut tx, &booking).await?;
            }
            PaymentMethod::Free => {
                booking.confirm()?;
            }
        }

        if booking.status != BookingStatus::Pending {
            save_booking(&mut tx, &booking).await?;
        }

        let entry = AuditEntry::new(actor_id, "booking.created", "booking", &booking.id)
            .business(&booking.business_account_id)
            .details(serde_json::json!({
                "paymentMethod": booking.payment_method,
                "amount": booking.amount_pence,
                "status": booking.status,
                "paymentReference": tfc_record.as_ref().map(|t| t.payment_reference.clone()),
            }));
        audit::record(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            method = ?booking.payment_method,
            status = ?booking.status,
            "Booking created"
        );

        Ok(CheckoutResult {
            booking,
            tfc: tfc_record,
            redemptions,
        })
    }

    /// Card payment settled: `paid`, confirmed, ledger row written.
    ///
    /// A booking that is already paid is returned unchanged so a replayed
    /// webhook is harmless.
    pub async fn confirm_paid(&self, id: &str, actor_id: &str) -> DbResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut booking = lock_booking(&mut tx, id).await?;

        if booking.payment_status == bookon_core::PaymentStatus::Paid {
            debug!(booking_id = %id, "Booking already paid");
            return Ok(booking);
        }

        booking.record_payment()?;
        booking.confirm()?;
        save_booking(&mut tx, &booking).await?;
        ledger::record_settlement(&mut tx, &booking).await?;

        let entry = AuditEntry::new(actor_id, "booking.confirmed", "booking", &booking.id)
            .business(&booking.business_account_id)
            .details(serde_json::json!({ "amount": booking.amount_pence }));
        audit::record(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(booking_id = %booking.id, "Booking paid and confirmed");
        Ok(booking)
    }

    /// Card payment failed. The booking stays pending.
    pub async fn mark_payment_failed(&self, id: &str, actor_id: &str) -> DbResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut booking = lock_booking(&mut tx, id).await?;

        booking.record_payment_failure()?;
        save_booking(&mut tx, &booking).await?;

        let entry = AuditEntry::new(actor_id, "booking.payment_failed", "booking", &booking.id)
            .business(&booking.business_account_id);
        audit::record(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(booking_id = %booking.id, "Booking payment failed");
        Ok(booking)
    }

    /// Refunds a paid booking and cancels it.
    ///
    /// With [`RefundTarget::Credit`] the amount is issued as a `refund`
    /// credit in the same transaction.
    pub async fn mark_refunded(
        &self,
        id: &str,
        actor_id: &str,
        target: RefundTarget,
    ) -> DbResult<(Booking, Option<Credit>)> {
        let mut tx = self.pool.begin().await?;
        let mut booking = lock_booking(&mut tx, id).await?;

        let issued = refund_locked(&mut tx, &mut booking, target).await?;

        let entry = AuditEntry::new(actor_id, "booking.refunded", "booking", &booking.id)
            .business(&booking.business_account_id)
            .details(serde_json::json!({
                "amount": booking.amount_pence,
                "creditId": issued.as_ref().map(|c| c.id.clone()),
            }));
        audit::record(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(booking_id = %booking.id, target = ?target, "Booking refunded");
        Ok((booking, issued))
    }

    /// Cancels a booking.
    ///
    /// ## Rules
    /// - An open TFC record is cancelled when nothing was received and
    ///   converted to credit when part paid
    /// - `refund_to_credit` requires a paid booking and issues a `refund` credit
    /// - Bookings outside `business_account_id` (when given) are not found
    pub async fn cancel(
        &self,
        id: &str,
        actor_id: &str,
        reason: Option<String>,
        refund_to_credit: bool,
        business_account_id: Option<&str>,
    ) -> DbResult<(Booking, Option<Credit>)> {
        let mut tx = self.pool.begin().await?;
        let mut booking = lock_booking(&mut tx, id).await?;
        if business_account_id.is_some_and(|b| b != booking.business_account_id) {
            return Err(DbError::not_found("Booking", id));
        }

        let mut issued = None;
        if refund_to_credit {
            issued = refund_locked(&mut tx, &mut booking, RefundTarget::Credit).await?;
        } else if let Some(mut open) = tfc::lock_open_for_booking(&mut tx, &booking.id).await? {
            let action = match open.status {
                TfcStatus::PartPaid => TfcAction::ConvertToCredit { amount: None },
                _ => TfcAction::Cancel,
            };
            let (_, credit) = tfc::apply_locked(&mut tx, &mut open, &mut booking, &action).await?;
            issued = credit;
        } else {
            booking.cancel(None)?;
        }

        if reason.is_some() {
            booking.cancellation_reason = reason;
        }
        save_booking(&mut tx, &booking).await?;

        let entry = AuditEntry::new(actor_id, "booking.cancelled", "booking", &booking.id)
            .business(&booking.business_account_id)
            .details(serde_json::json!({
                "reason": booking.cancellation_reason,
                "creditId": issued.as_ref().map(|c| c.id.clone()),
            }));
        audit::record(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(booking_id = %booking.id, credit_issued = issued.is_some(), "Booking cancelled");
        Ok((booking, issued))
    }
}

async fn refund_locked(
    conn: &mut PgConnection,
    booking: &mut Booking,
    target: RefundTarget,
) -> DbResult<Option<Credit>> {
    let amount = booking.refund()?;
    save_booking(&mut *conn, booking).await?;

    match target {
        RefundTarget::OriginalPayment => Ok(None),
        RefundTarget::Credit => {
            if !amount.is_positive() {
                return Err(CoreError::invalid_amount("nothing to refund").into());
            }
            let credit = Credit::new(
                &booking.parent_id,
                amount,
                CreditSource::Refund,
                Some(booking.id.clone()),
                None,
            )?;
            credit::insert(&mut *conn, &credit).await?;
            Ok(Some(credit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_sql() {
        let filter = BookingFilter {
            parent_id: Some("parent-1".to_string()),
            status: Some(BookingStatus::Confirmed),
            date_from: NaiveDate::from_ymd_opt(2026, 9, 1),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bookings");
        push_filters(&mut qb, &filter);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM bookings WHERE TRUE AND parent_id = $1 AND status = $2 AND date >= $3"
        );
    }

    #[test]
    fn test_unfiltered_sql() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bookings");
        push_filters(&mut qb, &BookingFilter::default());
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM bookings WHERE TRUE");
    }
}
