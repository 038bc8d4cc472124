//! # Credit Repository
//!
//! Wallet storage and redemption.
//!
//! ## Double-Spend Protection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Checkout A (£30)                    Checkout B (£30)                   │
//! │  ─────────────────                   ─────────────────                  │
//! │  BEGIN                               BEGIN                              │
//! │  SELECT … FOR UPDATE  ◄── locks ──►  SELECT … FOR UPDATE (waits)        │
//! │  plan: A1 £20, A2 £10                                                   │
//! │  Credit::redeem each step, UPDATE                                       │
//! │  COMMIT ───────────────────────────► sees new used_amount               │
//! │                                      plan fails: InsufficientCredit     │
//! │                                      ROLLBACK                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::audit::{self, AuditEntry};
use bookon_core::credit::{self as wallet, Credit, CreditSource, RedemptionStep};
use bookon_core::{CoreError, Money};

const SELECT_CREDIT: &str = r#"
    SELECT id, parent_id, amount_pence, used_amount_pence, source, status,
           source_ref, expires_at, created_at
    FROM credits
"#;

/// Inserts a credit on an open connection.
pub(crate) async fn insert(conn: &mut PgConnection, credit: &Credit) -> DbResult<()> {
    debug!(credit_id = %credit.id, parent_id = %credit.parent_id, "Inserting credit");

    sqlx::query(
        r#"
        INSERT INTO credits (
            id, parent_id, amount_pence, used_amount_pence, source, status,
            source_ref, expires_at, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(&credit.id)
    .bind(&credit.parent_id)
    .bind(credit.amount_pence)
    .bind(credit.used_amount_pence)
    .bind(credit.source)
    .bind(credit.status)
    .bind(&credit.source_ref)
    .bind(credit.expires_at)
    .bind(credit.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Redeems `amount` from the parent's wallet for `booking_id`.
///
/// Locks the parent's active credits, plans with the pure planner, then
/// spends each step on the locked row and writes it back. Must run inside
/// the checkout transaction.
pub(crate) async fn redeem(
    conn: &mut PgConnection,
    parent_id: &str,
    booking_id: &str,
    amount: Money,
) -> DbResult<Vec<RedemptionStep>> {
    let sql = format!(
        "{} WHERE parent_id = $1 AND status = 'active' ORDER BY created_at FOR UPDATE",
        SELECT_CREDIT
    );
    let mut credits: Vec<Credit> = sqlx::query_as(&sql)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;

    let plan = wallet::plan_redemption(&credits, amount, Utc::now())?;

    for step in &plan {
        let credit = credits
            .iter_mut()
            .find(|c| c.id == step.credit_id)
            .ok_or_else(|| CoreError::InsufficientCredit {
                available: Money::zero(),
                requested: step.amount,
            })?;
        credit.redeem(step.amount)?;

        sqlx::query(
            r#"
            UPDATE credits SET
                used_amount_pence = $2,
                status = $3
            WHERE id = $1
            "#,
        )
        .bind(&credit.id)
        .bind(credit.used_amount_pence)
        .bind(credit.status)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO credit_redemptions (id, credit_id, booking_id, amount_pence, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&step.credit_id)
        .bind(booking_id)
        .bind(step.amount.pence())
        .execute(&mut *conn)
        .await?;
    }

    debug!(
        parent_id = %parent_id,
        booking_id = %booking_id,
        steps = plan.len(),
        "Credits redeemed"
    );
    Ok(plan)
}

/// Repository for credits.
#[derive(Debug, Clone)]
pub struct CreditRepository {
    pool: PgPool,
}

impl CreditRepository {
    pub fn new(pool: PgPool) -> Self {
        CreditRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Credit>> {
        let sql = format!("{} WHERE id = $1", SELECT_CREDIT);
        let credit = sqlx::query_as::<_, Credit>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(credit)
    }

    /// Every credit of a parent, newest first.
    pub async fn list_for_parent(&self, parent_id: &str) -> DbResult<Vec<Credit>> {
        let sql = format!("{} WHERE parent_id = $1 ORDER BY created_at DESC", SELECT_CREDIT);
        let credits = sqlx::query_as::<_, Credit>(&sql)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(credits)
    }

    /// Spendable balance right now.
    pub async fn balance(&self, parent_id: &str) -> DbResult<Money> {
        let credits = self.list_for_parent(parent_id).await?;
        Ok(wallet::balance(&credits, Utc::now()))
    }

    /// Admin grant.
    pub async fn grant(
        &self,
        parent_id: &str,
        amount: Money,
        expires_at: Option<DateTime<Utc>>,
        actor_id: &str,
    ) -> DbResult<Credit> {
        let credit = Credit::new(parent_id, amount, CreditSource::AdminGrant, None, expires_at)?;

        let mut tx = self.pool.begin().await?;
        insert(&mut tx, &credit).await?;

        let entry = AuditEntry::new(actor_id, "credit.granted", "credit", &credit.id).details(
            serde_json::json!({ "parentId": parent_id, "amount": amount.pence() }),
        );
        audit::record(&mut tx, &entry).await?;
        tx.commit().await?;

        info!(credit_id = %credit.id, parent_id = %parent_id, amount = %amount, "Credit granted");
        Ok(credit)
    }
}
