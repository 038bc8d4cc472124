//! # Ledger Repository
//!
//! One row per settled booking payment, holding the fee split computed with
//! the fee config in effect when the booking was created.
//!
//! Rows are never rewritten. A refund leaves the row in place and the
//! summary moves it out of the revenue totals into the refunded columns.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::fee_config;
use bookon_core::booking::Booking;
use bookon_core::fees::LedgerEntry;
use bookon_core::CoreError;

const SELECT_LEDGER: &str = r#"
    SELECT id, booking_id, business_account_id, fee_config_id, payment_method,
           gross_pence, franchise_fee_pence, vat_pence, admin_fee_pence,
           net_to_venue_pence, created_at
    FROM ledger_transactions
"#;

/// Writes the ledger row for a booking whose payment just settled.
///
/// Zero-amount bookings have nothing to split and get no row.
///
/// ## Errors
/// `Core(NoFeeConfig)` when the business had no config in effect at the
/// booking's `created_at`, which rolls back the caller's transaction.
pub(crate) async fn record_settlement(
    conn: &mut PgConnection,
    booking: &Booking,
) -> DbResult<Option<LedgerEntry>> {
    if booking.amount().is_zero() {
        return Ok(None);
    }

    let config = fee_config::in_effect_at(&mut *conn, &booking.business_account_id, booking.created_at)
        .await?
        .ok_or_else(|| CoreError::NoFeeConfig {
            business_account_id: booking.business_account_id.clone(),
        })?;

    let split = config.split(booking.amount())?;
    let entry = LedgerEntry::record(&booking.id, &config, booking.payment_method, &split);

    debug!(
        booking_id = %booking.id,
        gross = %split.gross,
        net_to_venue = %split.net_to_venue,
        "Recording ledger transaction"
    );

    sqlx::query(
        r#"
        INSERT INTO ledger_transactions (
            id, booking_id, business_account_id, fee_config_id, payment_method,
            gross_pence, franchise_fee_pence, vat_pence, admin_fee_pence,
            net_to_venue_pence, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.booking_id)
    .bind(&entry.business_account_id)
    .bind(&entry.fee_config_id)
    .bind(entry.payment_method)
    .bind(entry.gross_pence)
    .bind(entry.franchise_fee_pence)
    .bind(entry.vat_pence)
    .bind(entry.admin_fee_pence)
    .bind(entry.net_to_venue_pence)
    .bind(entry.created_at)
    .execute(conn)
    .await?;

    Ok(Some(entry))
}

/// Totals over a period.
///
/// Revenue columns cover settled bookings that were not refunded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub transactions: i64,
    pub gross_pence: i64,
    pub franchise_fee_pence: i64,
    pub vat_pence: i64,
    pub admin_fee_pence: i64,
    pub net_to_venue_pence: i64,
    pub refunded_transactions: i64,
    pub refunded_pence: i64,
}

/// Repository for ledger transactions.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        LedgerRepository { pool }
    }

    pub async fn for_booking(&self, booking_id: &str) -> DbResult<Option<LedgerEntry>> {
        let sql = format!("{} WHERE booking_id = $1", SELECT_LEDGER);
        let entry = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    /// Sums a business's ledger over `[from, to)`.
    pub async fn summary(
        &self,
        business_account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<LedgerSummary> {
        let summary = sqlx::query_as::<_, LedgerSummary>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE NOT r)                                   AS transactions,
                COALESCE(SUM(gross_pence) FILTER (WHERE NOT r), 0)::BIGINT        AS gross_pence,
                COALESCE(SUM(franchise_fee_pence) FILTER (WHERE NOT r), 0)::BIGINT AS franchise_fee_pence,
                COALESCE(SUM(vat_pence) FILTER (WHERE NOT r), 0)::BIGINT          AS vat_pence,
                COALESCE(SUM(admin_fee_pence) FILTER (WHERE NOT r), 0)::BIGINT    AS admin_fee_pence,
                COALESCE(SUM(net_to_venue_pence) FILTER (WHERE NOT r), 0)::BIGINT AS net_to_venue_pence,
                COUNT(*) FILTER (WHERE r)                                       AS refunded_transactions,
                COALESCE(SUM(gross_pence) FILTER (WHERE r), 0)::BIGINT            AS refunded_pence
            FROM (
                SELECT l.*, b.payment_status = 'refunded' AS r
                FROM ledger_transactions l
                JOIN bookings b ON b.id = l.booking_id
                WHERE l.business_account_id = $1 AND l.created_at >= $2 AND l.created_at < $3
            ) settled
            "#,
        )
        .bind(business_account_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            business_account_id = %business_account_id,
            transactions = summary.transactions,
            "Ledger summary computed"
        );
        Ok(summary)
    }
}
